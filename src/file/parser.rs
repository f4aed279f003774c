//! Cursor-based parser over class-file byte slices.
//!
//! [`Parser`] keeps a position within a borrowed slice and offers bounds-checked, big-endian
//! reads of the primitive values that make up class-file structures: constant pool entries,
//! Code attributes and the instruction stream they contain.
//!
//! # Examples
//!
//! ```rust
//! use classweave::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
//! assert_eq!(parser.read_be::<u16>()?, 52);
//! assert!(!parser.has_more_data());
//! # Ok::<(), classweave::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ClassIO},
    Error::OutOfBounds,
    Result,
};

/// A generic binary data parser for reading class-file structures.
///
/// The parser maintains an internal position cursor and provides bounds checking
/// to prevent buffer overruns when reading malformed or truncated data.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Returns the number of bytes left after the current position.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to `len()` is allowed and leaves the parser exhausted.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if step > self.remaining() {
            return Err(OutOfBounds);
        }

        self.position += step;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data length.
    pub fn peek_byte(&self) -> Result<u8> {
        self.data.get(self.position).copied().ok_or(OutOfBounds)
    }

    /// Align the position to a specific boundary.
    ///
    /// `tableswitch` and `lookupswitch` pad their operands to a multiple of four bytes,
    /// measured from the start of the code array.
    ///
    /// # Arguments
    /// * `alignment` - The boundary to align to (must be a power of 2)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if aligning would exceed the data length.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = (alignment - (self.position % alignment)) % alignment;
        self.advance_by(padding)
    }

    /// Read a type `T` from the current position in big-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length.
    pub fn read_be<T: ClassIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Read `length` raw bytes and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `length` bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        if length > self.remaining() {
            return Err(OutOfBounds);
        }

        let slice = &self.data[self.position..self.position + length];
        self.position += length;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0xFF];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_be::<u16>().unwrap(), 0x0102);
        assert_eq!(parser.read_be::<u16>().unwrap(), 0x0304);
        assert_eq!(parser.read_be::<i8>().unwrap(), -1);
        assert!(!parser.has_more_data());
        assert!(parser.read_be::<u8>().is_err());
    }

    #[test]
    fn seek_and_peek() {
        let data = [0x10, 0x20, 0x30];
        let mut parser = Parser::new(&data);

        parser.seek(2).unwrap();
        assert_eq!(parser.peek_byte().unwrap(), 0x30);
        assert_eq!(parser.pos(), 2);

        parser.seek(3).unwrap();
        assert!(parser.peek_byte().is_err());
        assert!(parser.seek(4).is_err());
    }

    #[test]
    fn align_to_four() {
        let data = [0u8; 8];
        let mut parser = Parser::new(&data);

        parser.advance_by(1).unwrap();
        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);

        parser.align(4).unwrap();
        assert_eq!(parser.pos(), 4);
    }

    #[test]
    fn read_bytes_bounds() {
        let data = [1, 2, 3];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_bytes(2).unwrap(), &[1, 2]);
        assert_eq!(parser.remaining(), 1);
        assert!(parser.read_bytes(2).is_err());
        assert_eq!(parser.pos(), 2);
    }
}
