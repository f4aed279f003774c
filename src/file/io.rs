//! Big-endian, bounds-checked reading and writing of primitive values.
//!
//! Every multi-byte quantity in a class file is stored in big-endian order (JVMS §4). This module
//! provides the [`ClassIO`] trait together with a small set of free functions that read values
//! from, and write values to, byte buffers without ever panicking on short input.
//!
//! # Key Components
//!
//! - [`ClassIO`] - Conversion between primitive integers and their big-endian byte arrays
//! - [`read_be`] / [`read_be_at`] - Read from the buffer start, or at an offset with auto-advance
//! - [`write_be_at`] - Overwrite a value in place at an offset with auto-advance
//! - [`push_be`] - Append a value to a growing buffer
//!
//! # Examples
//!
//! ```rust,ignore
//! use classweave::file::io::{read_be_at, push_be};
//!
//! let mut buffer = Vec::new();
//! push_be::<u16>(&mut buffer, 0xCAFE);
//! push_be::<i32>(&mut buffer, -2);
//!
//! let mut offset = 0;
//! assert_eq!(read_be_at::<u16>(&buffer, &mut offset)?, 0xCAFE);
//! assert_eq!(read_be_at::<i32>(&buffer, &mut offset)?, -2);
//! # Ok::<(), classweave::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive types that can be read from and written to big-endian byte buffers.
///
/// # Thread Safety
///
/// All implementations are pure conversions without any shared state.
pub trait ClassIO: Sized + Copy {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_class_io {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl ClassIO for $ty {
                type Bytes = [u8; $len];

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_class_io!(
    u8 => 1,
    i8 => 1,
    u16 => 2,
    i16 => 2,
    u32 => 4,
    i32 => 4,
    u64 => 8,
    i64 => 8,
);

/// Safely reads a value of type `T` in big-endian byte order from the start of a data buffer.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be<T: ClassIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Safely reads a value of type `T` in big-endian byte order at a specific offset.
///
/// The offset is advanced by the size of `T` on success and left untouched on failure.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be_at<T: ClassIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let end = offset.checked_add(type_len).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_be_bytes(read))
}

/// Safely writes a value of type `T` in big-endian byte order at a specific offset.
///
/// Used to patch placeholders (branch operands, attribute lengths) after the final value
/// became known.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the value does not fit into the buffer.
pub fn write_be_at<T: ClassIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_be_bytes();
    let bytes = bytes.as_ref();
    let end = offset.checked_add(bytes.len()).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;

    Ok(())
}

/// Appends a value of type `T` in big-endian byte order to a buffer.
pub fn push_be<T: ClassIO>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(value.to_be_bytes().as_ref());
}
