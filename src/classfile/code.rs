//! The `Code` attribute of a method (JVMS §4.7.3) and the offset-bearing attributes nested in it.
//!
//! [`CodeAttribute`] works on the attribute *body*, the bytes following `attribute_length`. The
//! surrounding `method_info` structure stays with the host pipeline.
//!
//! After instructions were inserted, [`CodeAttribute::relocate`] installs the new code array and
//! moves every structure that addresses bytecode: the exception table, `LineNumberTable`,
//! `LocalVariableTable`, `LocalVariableTypeTable` and `StackMapTable`.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    classfile::{relocated, stackmap::StackMapTable, ConstantPool},
    file::{io::push_be, parser::Parser},
    Result,
};

/// One entry of the exception table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First covered instruction
    pub start_pc: u16,
    /// End of the covered range, exclusive
    pub end_pc: u16,
    /// Start of the handler
    pub handler_pc: u16,
    /// Constant pool index of the caught class, `0` for `finally`
    pub catch_type: u16,
}

/// One entry of a `LineNumberTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumber {
    /// First instruction of the line
    pub start_pc: u16,
    /// Source line
    pub line: u16,
}

/// One entry of a `LocalVariableTable` or `LocalVariableTypeTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    /// First instruction where the variable is live
    pub start_pc: u16,
    /// Length of the live range
    pub length: u16,
    /// Constant pool index of the variable name
    pub name_index: u16,
    /// Constant pool index of the descriptor or signature
    pub descriptor_index: u16,
    /// Local variable slot
    pub index: u16,
}

/// An attribute nested inside `Code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSubAttribute {
    /// Bytecode offset to source line mapping
    LineNumberTable {
        /// Constant pool index of the attribute name
        name_index: u16,
        /// Entries in file order
        entries: Vec<LineNumber>,
    },
    /// Debug information about local variables
    LocalVariableTable {
        /// Constant pool index of the attribute name
        name_index: u16,
        /// Entries in file order
        entries: Vec<LocalVariable>,
    },
    /// Generic signatures of local variables
    LocalVariableTypeTable {
        /// Constant pool index of the attribute name
        name_index: u16,
        /// Entries in file order
        entries: Vec<LocalVariable>,
    },
    /// Verification frames
    StackMapTable {
        /// Constant pool index of the attribute name
        name_index: u16,
        /// Parsed frames
        table: StackMapTable,
    },
    /// Any other attribute, kept as raw bytes
    Unknown {
        /// Constant pool index of the attribute name
        name_index: u16,
        /// Attribute body
        data: Vec<u8>,
    },
}

impl CodeSubAttribute {
    fn name_index(&self) -> u16 {
        match self {
            CodeSubAttribute::LineNumberTable { name_index, .. }
            | CodeSubAttribute::LocalVariableTable { name_index, .. }
            | CodeSubAttribute::LocalVariableTypeTable { name_index, .. }
            | CodeSubAttribute::StackMapTable { name_index, .. }
            | CodeSubAttribute::Unknown { name_index, .. } => *name_index,
        }
    }
}

/// A parsed `Code` attribute body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    /// Maximum depth of the operand stack
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// The bytecode
    pub code: Vec<u8>,
    /// Exception handlers in priority order
    pub exception_table: Vec<ExceptionHandler>,
    /// Nested attributes in file order
    pub attributes: Vec<CodeSubAttribute>,
}

impl CodeAttribute {
    /// Parses a `Code` attribute body. Nested attribute names are resolved through `pool`.
    ///
    /// # Errors
    /// Returns an error for truncated data, an empty or oversized code array, or nested
    /// attributes whose length does not match their content.
    pub fn parse(data: &[u8], pool: &ConstantPool) -> Result<Self> {
        let mut parser = Parser::new(data);
        let max_stack = parser.read_be::<u16>()?;
        let max_locals = parser.read_be::<u16>()?;

        let code_length = parser.read_be::<u32>()? as usize;
        if code_length == 0 || code_length > usize::from(u16::MAX) {
            return Err(malformed_error!("Invalid code length {}", code_length));
        }
        let code = parser.read_bytes(code_length)?.to_vec();

        let handler_count = parser.read_be::<u16>()?;
        let mut exception_table = Vec::with_capacity(usize::from(handler_count));
        for _ in 0..handler_count {
            exception_table.push(ExceptionHandler {
                start_pc: parser.read_be::<u16>()?,
                end_pc: parser.read_be::<u16>()?,
                handler_pc: parser.read_be::<u16>()?,
                catch_type: parser.read_be::<u16>()?,
            });
        }

        let attribute_count = parser.read_be::<u16>()?;
        let mut attributes = Vec::with_capacity(usize::from(attribute_count));
        for _ in 0..attribute_count {
            let name_index = parser.read_be::<u16>()?;
            let length = parser.read_be::<u32>()? as usize;
            let body = parser.read_bytes(length)?;
            attributes.push(Self::parse_sub_attribute(name_index, body, pool)?);
        }

        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after Code attribute",
                parser.remaining()
            ));
        }

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    fn parse_sub_attribute(
        name_index: u16,
        body: &[u8],
        pool: &ConstantPool,
    ) -> Result<CodeSubAttribute> {
        let attribute = match pool.utf8(name_index)? {
            "LineNumberTable" => {
                let mut parser = Parser::new(body);
                let count = parser.read_be::<u16>()?;
                let mut entries = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    entries.push(LineNumber {
                        start_pc: parser.read_be::<u16>()?,
                        line: parser.read_be::<u16>()?,
                    });
                }
                Self::expect_consumed(&parser, "LineNumberTable")?;
                CodeSubAttribute::LineNumberTable {
                    name_index,
                    entries,
                }
            }
            "LocalVariableTable" => CodeSubAttribute::LocalVariableTable {
                name_index,
                entries: Self::parse_local_variables(body, "LocalVariableTable")?,
            },
            "LocalVariableTypeTable" => CodeSubAttribute::LocalVariableTypeTable {
                name_index,
                entries: Self::parse_local_variables(body, "LocalVariableTypeTable")?,
            },
            "StackMapTable" => CodeSubAttribute::StackMapTable {
                name_index,
                table: StackMapTable::parse(body)?,
            },
            _ => CodeSubAttribute::Unknown {
                name_index,
                data: body.to_vec(),
            },
        };

        Ok(attribute)
    }

    fn parse_local_variables(body: &[u8], name: &str) -> Result<Vec<LocalVariable>> {
        let mut parser = Parser::new(body);
        let count = parser.read_be::<u16>()?;
        let mut entries = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            entries.push(LocalVariable {
                start_pc: parser.read_be::<u16>()?,
                length: parser.read_be::<u16>()?,
                name_index: parser.read_be::<u16>()?,
                descriptor_index: parser.read_be::<u16>()?,
                index: parser.read_be::<u16>()?,
            });
        }
        Self::expect_consumed(&parser, name)?;
        Ok(entries)
    }

    fn expect_consumed(parser: &Parser, name: &str) -> Result<()> {
        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} has {} trailing bytes",
                name,
                parser.remaining()
            ));
        }
        Ok(())
    }

    /// Encodes the attribute body.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a table is too large for its count field or a
    /// stack map cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.code.len() + 32);
        push_be::<u16>(&mut out, self.max_stack);
        push_be::<u16>(&mut out, self.max_locals);

        let code_length = u32::try_from(self.code.len())
            .map_err(|_| malformed_error!("Code array too large"))?;
        push_be::<u32>(&mut out, code_length);
        out.extend_from_slice(&self.code);

        push_be::<u16>(&mut out, Self::count(self.exception_table.len())?);
        for handler in &self.exception_table {
            push_be::<u16>(&mut out, handler.start_pc);
            push_be::<u16>(&mut out, handler.end_pc);
            push_be::<u16>(&mut out, handler.handler_pc);
            push_be::<u16>(&mut out, handler.catch_type);
        }

        push_be::<u16>(&mut out, Self::count(self.attributes.len())?);
        for attribute in &self.attributes {
            let mut body = Vec::new();
            match attribute {
                CodeSubAttribute::LineNumberTable { entries, .. } => {
                    push_be::<u16>(&mut body, Self::count(entries.len())?);
                    for entry in entries {
                        push_be::<u16>(&mut body, entry.start_pc);
                        push_be::<u16>(&mut body, entry.line);
                    }
                }
                CodeSubAttribute::LocalVariableTable { entries, .. }
                | CodeSubAttribute::LocalVariableTypeTable { entries, .. } => {
                    push_be::<u16>(&mut body, Self::count(entries.len())?);
                    for entry in entries {
                        push_be::<u16>(&mut body, entry.start_pc);
                        push_be::<u16>(&mut body, entry.length);
                        push_be::<u16>(&mut body, entry.name_index);
                        push_be::<u16>(&mut body, entry.descriptor_index);
                        push_be::<u16>(&mut body, entry.index);
                    }
                }
                CodeSubAttribute::StackMapTable { table, .. } => table.encode(&mut body)?,
                CodeSubAttribute::Unknown { data, .. } => body.extend_from_slice(data),
            }

            push_be::<u16>(&mut out, attribute.name_index());
            let length = u32::try_from(body.len())
                .map_err(|_| malformed_error!("Nested attribute too large"))?;
            push_be::<u32>(&mut out, length);
            out.extend_from_slice(&body);
        }

        Ok(out)
    }

    fn count(len: usize) -> Result<u16> {
        u16::try_from(len).map_err(|_| malformed_error!("Table with {} entries is too large", len))
    }

    /// Line number entries of every `LineNumberTable`, in file order.
    pub fn line_numbers(&self) -> impl Iterator<Item = &LineNumber> {
        self.attributes.iter().flat_map(|attribute| match attribute {
            CodeSubAttribute::LineNumberTable { entries, .. } => entries.as_slice(),
            _ => &[],
        })
    }

    /// Every bytecode offset referenced from outside the instruction stream itself.
    ///
    /// The end of the code array is included when a range ends there.
    #[must_use]
    pub fn referenced_offsets(&self) -> BTreeSet<u32> {
        let mut offsets = BTreeSet::new();

        for handler in &self.exception_table {
            offsets.insert(u32::from(handler.start_pc));
            offsets.insert(u32::from(handler.end_pc));
            offsets.insert(u32::from(handler.handler_pc));
        }

        for attribute in &self.attributes {
            match attribute {
                CodeSubAttribute::LineNumberTable { entries, .. } => {
                    offsets.extend(entries.iter().map(|entry| u32::from(entry.start_pc)));
                }
                CodeSubAttribute::LocalVariableTable { entries, .. }
                | CodeSubAttribute::LocalVariableTypeTable { entries, .. } => {
                    for entry in entries {
                        offsets.insert(u32::from(entry.start_pc));
                        offsets.insert(u32::from(entry.start_pc) + u32::from(entry.length));
                    }
                }
                CodeSubAttribute::StackMapTable { table, .. } => {
                    offsets.extend(table.offsets().map(u32::from));
                }
                CodeSubAttribute::Unknown { .. } => {}
            }
        }

        offsets
    }

    /// Installs a new code array and moves every offset-bearing structure.
    ///
    /// `offsets` maps each original offset reported by [`CodeAttribute::referenced_offsets`] to
    /// its position in `code`. Nested attributes this crate does not understand may address
    /// bytecode in unknown ways, so they are dropped.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a referenced offset is missing from `offsets`.
    pub fn relocate(&mut self, code: Vec<u8>, offsets: &BTreeMap<u32, u32>) -> Result<()> {
        for handler in &mut self.exception_table {
            handler.start_pc = relocated(offsets, handler.start_pc)?;
            handler.end_pc = relocated(offsets, handler.end_pc)?;
            handler.handler_pc = relocated(offsets, handler.handler_pc)?;
        }

        let mut attributes = Vec::with_capacity(self.attributes.len());
        for mut attribute in self.attributes.drain(..) {
            match &mut attribute {
                CodeSubAttribute::LineNumberTable { entries, .. } => {
                    for entry in entries {
                        entry.start_pc = relocated(offsets, entry.start_pc)?;
                    }
                }
                CodeSubAttribute::LocalVariableTable { entries, .. }
                | CodeSubAttribute::LocalVariableTypeTable { entries, .. } => {
                    for entry in entries {
                        let end = entry.start_pc.checked_add(entry.length).ok_or_else(|| {
                            malformed_error!("Local variable range exceeds the code size")
                        })?;
                        let start = relocated(offsets, entry.start_pc)?;
                        let end = relocated(offsets, end)?;
                        entry.start_pc = start;
                        entry.length = end.saturating_sub(start);
                    }
                }
                CodeSubAttribute::StackMapTable { table, .. } => table.relocate(offsets)?,
                CodeSubAttribute::Unknown { name_index, .. } => {
                    log::warn!(
                        "Dropping nested Code attribute #{} after bytecode offsets moved",
                        name_index
                    );
                    continue;
                }
            }
            attributes.push(attribute);
        }

        self.attributes = attributes;
        self.code = code;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::stackmap::FrameKind,
        test::{CodeBuilder, PoolBuilder},
    };

    fn pool() -> ConstantPool {
        ConstantPool::from_bytes(
            &PoolBuilder::new()
                .utf8("LineNumberTable")
                .utf8("LocalVariableTable")
                .utf8("StackMapTable")
                .utf8("SourceDebugExtension")
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn parse_and_encode_are_identical() {
        let bytes = CodeBuilder::new(2, 3, &[0x03, 0x3C, 0xB1])
            .handler(0, 2, 2, 0)
            .line_numbers(1, &[(0, 7), (2, 8)])
            .local_variables(2, &[(0, 3, 4, 5, 0)])
            .stack_map(3, 1, &[2])
            .raw_attribute(4, &[0xAA, 0xBB])
            .build();

        let code = CodeAttribute::parse(&bytes, &pool()).unwrap();
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 3);
        assert_eq!(code.code, [0x03, 0x3C, 0xB1]);
        assert_eq!(code.exception_table.len(), 1);
        assert_eq!(code.attributes.len(), 4);
        assert_eq!(
            code.line_numbers().map(|entry| entry.line).collect::<Vec<_>>(),
            [7, 8]
        );
        assert_eq!(code.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn referenced_offsets_include_range_ends() {
        let bytes = CodeBuilder::new(1, 1, &[0x03, 0x3B, 0xB1])
            .handler(0, 1, 2, 0)
            .local_variables(2, &[(1, 2, 4, 5, 0)])
            .build();

        let code = CodeAttribute::parse(&bytes, &pool()).unwrap();
        assert_eq!(
            code.referenced_offsets().into_iter().collect::<Vec<_>>(),
            [0, 1, 2, 3]
        );
    }

    #[test]
    fn relocate_moves_tables_and_drops_unknown() {
        let bytes = CodeBuilder::new(1, 1, &[0x03, 0x3B, 0xB1])
            .handler(0, 1, 2, 0)
            .line_numbers(1, &[(0, 10), (2, 11)])
            .local_variables(2, &[(1, 2, 4, 5, 0)])
            .stack_map(3, 1, &[2])
            .raw_attribute(4, &[0x01])
            .build();

        let mut code = CodeAttribute::parse(&bytes, &pool()).unwrap();
        let offsets = BTreeMap::from([(0, 0), (1, 3), (2, 4), (3, 5)]);
        code.relocate(vec![0x03, 0x01, 0x57, 0x3B, 0xB1], &offsets)
            .unwrap();

        assert_eq!(code.code.len(), 5);
        assert_eq!(
            code.exception_table[0],
            ExceptionHandler {
                start_pc: 0,
                end_pc: 3,
                handler_pc: 4,
                catch_type: 0
            }
        );
        assert_eq!(
            code.line_numbers().map(|entry| entry.start_pc).collect::<Vec<_>>(),
            [0, 4]
        );
        assert_eq!(code.attributes.len(), 3);
        match &code.attributes[1] {
            CodeSubAttribute::LocalVariableTable { entries, .. } => {
                assert_eq!(entries[0].start_pc, 3);
                assert_eq!(entries[0].length, 2);
            }
            other => panic!("unexpected attribute {other:?}"),
        }
        match &code.attributes[2] {
            CodeSubAttribute::StackMapTable { table, .. } => {
                assert_eq!(table.frames[0].offset, 4);
                assert_eq!(table.frames[0].kind, FrameKind::Same);
            }
            other => panic!("unexpected attribute {other:?}"),
        }
    }

    #[test]
    fn relocate_fails_on_unmapped_offset() {
        let bytes = CodeBuilder::new(1, 1, &[0x03, 0x3B, 0xB1])
            .handler(0, 1, 2, 0)
            .build();
        let mut code = CodeAttribute::parse(&bytes, &pool()).unwrap();

        let offsets = BTreeMap::from([(0, 0), (1, 1)]);
        assert!(code.relocate(vec![0xB1], &offsets).is_err());
    }

    #[test]
    fn empty_code_is_malformed() {
        let bytes = CodeBuilder::new(0, 0, &[]).build();
        assert!(CodeAttribute::parse(&bytes, &pool()).is_err());
    }
}
