//! Constant pool parsing, symbolic access and de-duplicating insertion.
//!
//! The pool is kept as an indexable table that mirrors the class-file layout: slot `0` is never
//! used and the slot following a `Long` or `Double` entry is reserved. Entries added through the
//! `add_*` helpers are appended at the end and reuse an existing identical entry when present, so
//! indices handed out for the original pool never move.
//!
//! # Examples
//!
//! ```rust
//! use classweave::classfile::ConstantPool;
//!
//! let mut pool = ConstantPool::new();
//! let equals = ("java/lang/String", "equals", "(Ljava/lang/Object;)Z");
//! let method = pool.add_method_ref(equals.0, equals.1, equals.2, false)?;
//! assert_eq!(pool.add_method_ref(equals.0, equals.1, equals.2, false)?, method);
//!
//! let reference = pool.member_ref(method)?;
//! assert_eq!(reference.owner, "java/lang/String");
//! assert_eq!(reference.name, "equals");
//! # Ok::<(), classweave::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    classfile::mutf8,
    file::{io::push_be, parser::Parser},
    Error::{ConstantPoolIndex, ConstantPoolOverflow},
    Result,
};

/// Tags of the constant pool entry kinds (JVMS §4.4).
#[allow(missing_docs)]
pub mod tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD_REF: u8 = 9;
    pub const METHOD_REF: u8 = 10;
    pub const INTERFACE_METHOD_REF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// A single constant pool entry.
///
/// Floating point values are kept as their raw bit patterns so entries can be compared and
/// hashed exactly.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// `CONSTANT_Utf8`, decoded from modified UTF-8
    Utf8(String),
    /// `CONSTANT_Utf8` that is not a Unicode string, such as a Java literal with an unpaired
    /// surrogate. Kept as the original modified UTF-8 bytes.
    RawUtf8(Vec<u8>),
    /// `CONSTANT_Integer`
    Integer(i32),
    /// `CONSTANT_Float`, raw IEEE 754 bits
    Float(u32),
    /// `CONSTANT_Long`, occupies two slots
    Long(i64),
    /// `CONSTANT_Double`, raw IEEE 754 bits, occupies two slots
    Double(u64),
    /// `CONSTANT_Class` pointing at the internal name
    Class(u16),
    /// `CONSTANT_String` pointing at the `Utf8` value
    String(u16),
    /// `CONSTANT_Fieldref`
    FieldRef { class: u16, name_and_type: u16 },
    /// `CONSTANT_Methodref`
    MethodRef { class: u16, name_and_type: u16 },
    /// `CONSTANT_InterfaceMethodref`
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    /// `CONSTANT_NameAndType`
    NameAndType { name: u16, descriptor: u16 },
    /// `CONSTANT_MethodHandle`
    MethodHandle { kind: u8, reference: u16 },
    /// `CONSTANT_MethodType`
    MethodType(u16),
    /// `CONSTANT_Dynamic`
    Dynamic { bootstrap: u16, name_and_type: u16 },
    /// `CONSTANT_InvokeDynamic`
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    /// `CONSTANT_Module`
    Module(u16),
    /// `CONSTANT_Package`
    Package(u16),
}

impl Constant {
    /// Number of pool slots the entry occupies.
    #[must_use]
    pub fn slots(&self) -> u16 {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// A resolved `Fieldref`, `Methodref` or `InterfaceMethodref`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberRef<'a> {
    /// Internal name of the declaring type
    pub owner: &'a str,
    /// Member name
    pub name: &'a str,
    /// Field or method descriptor
    pub descriptor: &'a str,
    /// `true` for `InterfaceMethodref` entries
    pub is_interface: bool,
}

/// The constant pool of a single class.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// Slot-indexed entries, `None` for slot 0 and for the second half of wide entries
    entries: Vec<Option<Constant>>,
    /// Reverse index used to de-duplicate insertions
    lookup: HashMap<Constant, u16>,
}

impl ConstantPool {
    /// Highest `constant_pool_count` the format can express.
    pub const MAX_COUNT: usize = u16::MAX as usize;

    /// Longest encoded `Utf8` entry the format can express.
    pub const MAX_UTF8_LENGTH: usize = u16::MAX as usize;

    /// Creates an empty pool containing only the unused slot 0.
    #[must_use]
    pub fn new() -> Self {
        ConstantPool {
            entries: vec![None],
            lookup: HashMap::new(),
        }
    }

    /// Parses the constant pool section (`constant_pool_count` followed by the entries).
    ///
    /// # Errors
    /// Returns an error for truncated data, unknown tags or invalid string data.
    pub fn parse(parser: &mut Parser) -> Result<Self> {
        let count = parser.read_be::<u16>()?;
        if count == 0 {
            return Err(malformed_error!("Constant pool count must be at least 1"));
        }

        let mut pool = ConstantPool::new();
        while pool.entries.len() < usize::from(count) {
            let index = pool.entries.len();
            let constant = Self::parse_entry(parser)?;
            let slots = constant.slots();
            if index + usize::from(slots) > usize::from(count) {
                return Err(malformed_error!(
                    "Wide constant at {} exceeds pool count {}",
                    index,
                    count
                ));
            }

            let slot = u16::try_from(index).map_err(|_| ConstantPoolOverflow)?;
            pool.lookup.entry(constant.clone()).or_insert(slot);
            pool.entries.push(Some(constant));
            if slots == 2 {
                pool.entries.push(None);
            }
        }

        Ok(pool)
    }

    /// Parses a constant pool section from the start of `data`.
    ///
    /// # Errors
    /// See [`ConstantPool::parse`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(data);
        Self::parse(&mut parser)
    }

    fn parse_entry(parser: &mut Parser) -> Result<Constant> {
        let entry_tag = parser.read_be::<u8>()?;
        let constant = match entry_tag {
            tag::UTF8 => {
                let length = parser.read_be::<u16>()?;
                let bytes = parser.read_bytes(usize::from(length))?;
                let units = mutf8::decode_units(bytes)?;
                match String::from_utf16(&units) {
                    Ok(value) if mutf8::encode(&value) == bytes => Constant::Utf8(value),
                    _ => Constant::RawUtf8(bytes.to_vec()),
                }
            }
            tag::INTEGER => Constant::Integer(parser.read_be::<i32>()?),
            tag::FLOAT => Constant::Float(parser.read_be::<u32>()?),
            tag::LONG => Constant::Long(parser.read_be::<i64>()?),
            tag::DOUBLE => Constant::Double(parser.read_be::<u64>()?),
            tag::CLASS => Constant::Class(parser.read_be::<u16>()?),
            tag::STRING => Constant::String(parser.read_be::<u16>()?),
            tag::FIELD_REF => Constant::FieldRef {
                class: parser.read_be::<u16>()?,
                name_and_type: parser.read_be::<u16>()?,
            },
            tag::METHOD_REF => Constant::MethodRef {
                class: parser.read_be::<u16>()?,
                name_and_type: parser.read_be::<u16>()?,
            },
            tag::INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                class: parser.read_be::<u16>()?,
                name_and_type: parser.read_be::<u16>()?,
            },
            tag::NAME_AND_TYPE => Constant::NameAndType {
                name: parser.read_be::<u16>()?,
                descriptor: parser.read_be::<u16>()?,
            },
            tag::METHOD_HANDLE => Constant::MethodHandle {
                kind: parser.read_be::<u8>()?,
                reference: parser.read_be::<u16>()?,
            },
            tag::METHOD_TYPE => Constant::MethodType(parser.read_be::<u16>()?),
            tag::DYNAMIC => Constant::Dynamic {
                bootstrap: parser.read_be::<u16>()?,
                name_and_type: parser.read_be::<u16>()?,
            },
            tag::INVOKE_DYNAMIC => Constant::InvokeDynamic {
                bootstrap: parser.read_be::<u16>()?,
                name_and_type: parser.read_be::<u16>()?,
            },
            tag::MODULE => Constant::Module(parser.read_be::<u16>()?),
            tag::PACKAGE => Constant::Package(parser.read_be::<u16>()?),
            _ => {
                return Err(malformed_error!(
                    "Unknown constant pool tag {} at offset {}",
                    entry_tag,
                    parser.pos() - 1
                ))
            }
        };

        Ok(constant)
    }

    /// Writes the constant pool section, including `constant_pool_count`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        push_be::<u16>(out, self.count());

        for constant in self.entries.iter().flatten() {
            match constant {
                Constant::Utf8(value) => Self::encode_utf8(out, &mutf8::encode(value)),
                Constant::RawUtf8(bytes) => Self::encode_utf8(out, bytes),
                Constant::Integer(value) => {
                    out.push(tag::INTEGER);
                    push_be::<i32>(out, *value);
                }
                Constant::Float(bits) => {
                    out.push(tag::FLOAT);
                    push_be::<u32>(out, *bits);
                }
                Constant::Long(value) => {
                    out.push(tag::LONG);
                    push_be::<i64>(out, *value);
                }
                Constant::Double(bits) => {
                    out.push(tag::DOUBLE);
                    push_be::<u64>(out, *bits);
                }
                Constant::Class(name) => {
                    out.push(tag::CLASS);
                    push_be::<u16>(out, *name);
                }
                Constant::String(value) => {
                    out.push(tag::STRING);
                    push_be::<u16>(out, *value);
                }
                Constant::FieldRef {
                    class,
                    name_and_type,
                } => Self::encode_pair(out, tag::FIELD_REF, *class, *name_and_type),
                Constant::MethodRef {
                    class,
                    name_and_type,
                } => Self::encode_pair(out, tag::METHOD_REF, *class, *name_and_type),
                Constant::InterfaceMethodRef {
                    class,
                    name_and_type,
                } => Self::encode_pair(out, tag::INTERFACE_METHOD_REF, *class, *name_and_type),
                Constant::NameAndType { name, descriptor } => {
                    Self::encode_pair(out, tag::NAME_AND_TYPE, *name, *descriptor);
                }
                Constant::MethodHandle { kind, reference } => {
                    out.push(tag::METHOD_HANDLE);
                    out.push(*kind);
                    push_be::<u16>(out, *reference);
                }
                Constant::MethodType(descriptor) => {
                    out.push(tag::METHOD_TYPE);
                    push_be::<u16>(out, *descriptor);
                }
                Constant::Dynamic {
                    bootstrap,
                    name_and_type,
                } => Self::encode_pair(out, tag::DYNAMIC, *bootstrap, *name_and_type),
                Constant::InvokeDynamic {
                    bootstrap,
                    name_and_type,
                } => Self::encode_pair(out, tag::INVOKE_DYNAMIC, *bootstrap, *name_and_type),
                Constant::Module(name) => {
                    out.push(tag::MODULE);
                    push_be::<u16>(out, *name);
                }
                Constant::Package(name) => {
                    out.push(tag::PACKAGE);
                    push_be::<u16>(out, *name);
                }
            }
        }
    }

    /// `add` and `parse` only admit values of at most [`ConstantPool::MAX_UTF8_LENGTH`] bytes.
    fn encode_utf8(out: &mut Vec<u8>, bytes: &[u8]) {
        #[allow(clippy::cast_possible_truncation)]
        let length = bytes.len() as u16;
        out.push(tag::UTF8);
        push_be::<u16>(out, length);
        out.extend_from_slice(bytes);
    }

    fn encode_pair(out: &mut Vec<u8>, entry_tag: u8, first: u16, second: u16) {
        out.push(entry_tag);
        push_be::<u16>(out, first);
        push_be::<u16>(out, second);
    }

    /// Returns the encoded constant pool section.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// The `constant_pool_count` value, one more than the highest usable index.
    #[must_use]
    pub fn count(&self) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let count = self.entries.len() as u16;
        count
    }

    /// Number of entries, not counting reserved slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().flatten().count()
    }

    /// Returns `true` if the pool holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the entry at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolIndex`] for slot 0, reserved slots and indices past
    /// the end of the pool.
    pub fn get(&self, index: u16) -> Result<&Constant> {
        self.entries
            .get(usize::from(index))
            .and_then(Option::as_ref)
            .ok_or(ConstantPoolIndex(index))
    }

    /// Returns the string stored in a `Utf8` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolIndex`] if the entry is missing or not `Utf8`, and
    /// [`crate::Error::Malformed`] if it holds no valid Unicode string.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value),
            Constant::RawUtf8(_) => Err(malformed_error!(
                "Constant {} is not a valid Unicode string",
                index
            )),
            _ => Err(ConstantPoolIndex(index)),
        }
    }

    /// Returns the internal name referenced by a `Class` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolIndex`] if the entry is missing or not `Class`.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            _ => Err(ConstantPoolIndex(index)),
        }
    }

    /// Returns the name and descriptor referenced by a `NameAndType` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolIndex`] if the entry is missing or not `NameAndType`.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(ConstantPoolIndex(index)),
        }
    }

    /// Resolves a field, method or interface method reference.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolIndex`] if any part of the reference chain is missing
    /// or of the wrong kind.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        let (class, name_and_type, is_interface) = match self.get(index)? {
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, false),
            Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type, true),
            _ => return Err(ConstantPoolIndex(index)),
        };

        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            owner: self.class_name(class)?,
            name,
            descriptor,
            is_interface,
        })
    }

    /// Adds an entry unless an identical one exists and returns its index.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the pool has no room left, and
    /// [`crate::Error::Malformed`] for a `Utf8` value longer than
    /// [`ConstantPool::MAX_UTF8_LENGTH`] encoded bytes.
    pub fn add(&mut self, constant: Constant) -> Result<u16> {
        if let Some(index) = self.lookup.get(&constant) {
            return Ok(*index);
        }

        let utf8_length = match &constant {
            Constant::Utf8(value) => mutf8::encoded_len(value),
            Constant::RawUtf8(bytes) => bytes.len(),
            _ => 0,
        };
        if utf8_length > Self::MAX_UTF8_LENGTH {
            return Err(malformed_error!(
                "Utf8 constant of {} bytes exceeds {}",
                utf8_length,
                Self::MAX_UTF8_LENGTH
            ));
        }

        let index = self.entries.len();
        if index + usize::from(constant.slots()) > Self::MAX_COUNT {
            return Err(ConstantPoolOverflow);
        }

        #[allow(clippy::cast_possible_truncation)]
        let index = index as u16;
        let slots = constant.slots();
        self.lookup.insert(constant.clone(), index);
        self.entries.push(Some(constant));
        if slots == 2 {
            self.entries.push(None);
        }

        Ok(index)
    }

    /// Adds (or finds) a `Utf8` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the pool has no room left, and
    /// [`crate::Error::Malformed`] if `value` encodes to more than
    /// [`ConstantPool::MAX_UTF8_LENGTH`] bytes.
    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        self.add(Constant::Utf8(value.to_string()))
    }

    /// Adds (or finds) a `Class` entry for an internal name.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the pool has no room left.
    pub fn add_class(&mut self, internal_name: &str) -> Result<u16> {
        let name = self.add_utf8(internal_name)?;
        self.add(Constant::Class(name))
    }

    /// Adds (or finds) a `String` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the pool has no room left.
    pub fn add_string(&mut self, value: &str) -> Result<u16> {
        let utf8 = self.add_utf8(value)?;
        self.add(Constant::String(utf8))
    }

    /// Adds (or finds) a `NameAndType` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the pool has no room left.
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.add_utf8(name)?;
        let descriptor = self.add_utf8(descriptor)?;
        self.add(Constant::NameAndType { name, descriptor })
    }

    /// Adds (or finds) a `Methodref` or `InterfaceMethodref` entry.
    ///
    /// # Errors
    /// Returns [`crate::Error::ConstantPoolOverflow`] if the pool has no room left.
    pub fn add_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<u16> {
        let class = self.add_class(owner)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        if is_interface {
            self.add(Constant::InterfaceMethodRef {
                class,
                name_and_type,
            })
        } else {
            self.add(Constant::MethodRef {
                class,
                name_and_type,
            })
        }
    }
}
