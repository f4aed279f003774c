//! Decoding of a `Code` attribute into an instruction event stream.
//!
//! # Example
//!
//! ```rust
//! use classweave::{
//!     bytecode::{decode, Instruction, InvokeKind},
//!     classfile::{CodeAttribute, ConstantPool},
//! };
//!
//! let mut pool = ConstantPool::new();
//! let equals = pool.add_method_ref("java/lang/String", "equals", "(Ljava/lang/Object;)Z", false)?;
//! let [high, low] = equals.to_be_bytes();
//!
//! let code = CodeAttribute {
//!     max_stack: 2,
//!     max_locals: 2,
//!     // aload_0, aload_1, invokevirtual #equals, ireturn
//!     code: vec![0x2A, 0x2B, 0xB6, high, low, 0xAC],
//!     exception_table: Vec::new(),
//!     attributes: Vec::new(),
//! };
//!
//! let instructions = decode(&code, &pool)?;
//! assert_eq!(instructions.len(), 4);
//! match &instructions[2] {
//!     Instruction::Method(call) => {
//!         assert_eq!(call.kind, InvokeKind::Virtual);
//!         assert_eq!(call.owner, "java/lang/String");
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! # Ok::<(), classweave::Error>(())
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    bytecode::{
        instruction::{Instruction, InvokeKind, Label, MethodInsn},
        opcodes::*,
    },
    classfile::{CodeAttribute, Constant, ConstantPool},
    descriptor::MethodDescriptor,
    file::parser::Parser,
    Error::InvalidOpcode,
    Result,
};

/// Upper bound for switch tables, far above anything that fits a 64 KiB code array.
const MAX_SWITCH_ENTRIES: i64 = 0x4000;

/// A stateful decoder over one code array
struct Decoder<'a> {
    parser: Parser<'a>,
    pool: &'a ConstantPool,
    /// Offsets targeted by branches and switches
    targets: BTreeSet<u32>,
}

impl<'a> Decoder<'a> {
    fn new(code: &'a [u8], pool: &'a ConstantPool) -> Self {
        Decoder {
            parser: Parser::new(code),
            pool,
            targets: BTreeSet::new(),
        }
    }

    /// Decodes every instruction together with its original offset
    fn decode_all(&mut self) -> Result<Vec<(u32, Instruction)>> {
        let mut instructions = Vec::new();
        while self.parser.has_more_data() {
            #[allow(clippy::cast_possible_truncation)]
            let offset = self.parser.pos() as u32;
            let instruction = self.decode_instruction(offset)?;
            instructions.push((offset, instruction));
        }
        Ok(instructions)
    }

    fn target(&mut self, offset: u32, relative: i32) -> Result<Label> {
        let target = i64::from(offset) + i64::from(relative);
        if target < 0 || target >= self.parser.len() as i64 {
            return Err(malformed_error!(
                "Branch at {} targets {} outside the code array",
                offset,
                target
            ));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let target = target as u32;
        self.targets.insert(target);
        Ok(Label(target))
    }

    fn switch_size(&self, count: i64, offset: u32) -> Result<usize> {
        if !(0..=MAX_SWITCH_ENTRIES).contains(&count) {
            return Err(malformed_error!(
                "Switch at {} declares {} entries",
                offset,
                count
            ));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = count as usize;
        Ok(count)
    }

    fn method(&mut self, opcode: u8, offset: u32) -> Result<Instruction> {
        let Some(kind) = InvokeKind::from_opcode(opcode) else {
            return Err(InvalidOpcode {
                opcode,
                offset: offset as usize,
            });
        };

        let index = self.parser.read_be::<u16>()?;
        if matches!(self.pool.get(index)?, Constant::FieldRef { .. }) {
            return Err(malformed_error!(
                "Invocation at {} references field #{}",
                offset,
                index
            ));
        }
        let reference = self.pool.member_ref(index)?;

        if kind == InvokeKind::Interface {
            let count = self.parser.read_be::<u8>()?;
            let _zero = self.parser.read_be::<u8>()?;
            let expected = MethodDescriptor::parse(reference.descriptor)?.argument_slots() + 1;
            if usize::from(count) != expected {
                return Err(malformed_error!(
                    "invokeinterface at {} declares count {} instead of {}",
                    offset,
                    count,
                    expected
                ));
            }
        }

        Ok(Instruction::Method(MethodInsn {
            kind,
            owner: reference.owner.to_string(),
            name: reference.name.to_string(),
            descriptor: reference.descriptor.to_string(),
            is_interface: reference.is_interface,
            pool_index: Some(index),
        }))
    }

    fn decode_instruction(&mut self, offset: u32) -> Result<Instruction> {
        let opcode = self.parser.read_be::<u8>()?;

        let instruction = match opcode {
            NOP..=DCONST_1
            | ILOAD_0..=SALOAD
            | ISTORE_0..=LXOR
            | I2L..=DCMPG
            | IRETURN..=RETURN
            | ARRAYLENGTH
            | ATHROW
            | MONITORENTER
            | MONITOREXIT => Instruction::Simple(opcode),
            BIPUSH => Instruction::Push {
                opcode,
                value: i16::from(self.parser.read_be::<i8>()?),
            },
            SIPUSH => Instruction::Push {
                opcode,
                value: self.parser.read_be::<i16>()?,
            },
            LDC => Instruction::Constant {
                opcode,
                index: u16::from(self.parser.read_be::<u8>()?),
            },
            LDC_W | LDC2_W => Instruction::Constant {
                opcode,
                index: self.parser.read_be::<u16>()?,
            },
            ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Instruction::Var {
                opcode,
                index: u16::from(self.parser.read_be::<u8>()?),
                wide: false,
            },
            IINC => Instruction::Iinc {
                index: u16::from(self.parser.read_be::<u8>()?),
                delta: i16::from(self.parser.read_be::<i8>()?),
                wide: false,
            },
            IFEQ..=JSR | IFNULL | IFNONNULL => {
                let relative = i32::from(self.parser.read_be::<i16>()?);
                Instruction::Jump {
                    opcode,
                    target: self.target(offset, relative)?,
                }
            }
            GOTO_W | JSR_W => {
                let relative = self.parser.read_be::<i32>()?;
                Instruction::Jump {
                    opcode,
                    target: self.target(offset, relative)?,
                }
            }
            TABLESWITCH => {
                self.parser.align(4)?;
                let default = self.parser.read_be::<i32>()?;
                let default = self.target(offset, default)?;
                let low = self.parser.read_be::<i32>()?;
                let high = self.parser.read_be::<i32>()?;
                let count = self.switch_size(i64::from(high) - i64::from(low) + 1, offset)?;

                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    let relative = self.parser.read_be::<i32>()?;
                    targets.push(self.target(offset, relative)?);
                }
                Instruction::TableSwitch {
                    default,
                    low,
                    high,
                    targets,
                }
            }
            LOOKUPSWITCH => {
                self.parser.align(4)?;
                let default = self.parser.read_be::<i32>()?;
                let default = self.target(offset, default)?;
                let count = self.parser.read_be::<i32>()?;
                let count = self.switch_size(i64::from(count), offset)?;

                let mut pairs = Vec::with_capacity(count);
                for _ in 0..count {
                    let value = self.parser.read_be::<i32>()?;
                    let relative = self.parser.read_be::<i32>()?;
                    pairs.push((value, self.target(offset, relative)?));
                }
                Instruction::LookupSwitch { default, pairs }
            }
            GETSTATIC..=PUTFIELD | NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
                Instruction::PoolRef {
                    opcode,
                    index: self.parser.read_be::<u16>()?,
                }
            }
            INVOKEVIRTUAL..=INVOKEINTERFACE => self.method(opcode, offset)?,
            INVOKEDYNAMIC => {
                let index = self.parser.read_be::<u16>()?;
                let _reserved = self.parser.read_be::<u16>()?;
                Instruction::InvokeDynamic { index }
            }
            NEWARRAY => Instruction::NewArray(self.parser.read_be::<u8>()?),
            MULTIANEWARRAY => Instruction::MultiANewArray {
                index: self.parser.read_be::<u16>()?,
                dimensions: self.parser.read_be::<u8>()?,
            },
            WIDE => {
                let modified = self.parser.read_be::<u8>()?;
                match modified {
                    ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Instruction::Var {
                        opcode: modified,
                        index: self.parser.read_be::<u16>()?,
                        wide: true,
                    },
                    IINC => Instruction::Iinc {
                        index: self.parser.read_be::<u16>()?,
                        delta: self.parser.read_be::<i16>()?,
                        wide: true,
                    },
                    _ => {
                        return Err(InvalidOpcode {
                            opcode: modified,
                            offset: offset as usize + 1,
                        })
                    }
                }
            }
            _ => {
                return Err(InvalidOpcode {
                    opcode,
                    offset: offset as usize,
                })
            }
        };

        Ok(instruction)
    }
}

/// Decodes a method body into instruction events.
///
/// The returned stream contains, in program order:
/// - a [`Instruction::Label`] before every instruction that is targeted by a branch, a switch,
///   the exception table or any offset-bearing nested attribute,
/// - [`Instruction::LineNumber`] events right after the label of the first instruction of a line,
/// - the instructions themselves, with invocations resolved into [`MethodInsn`]s,
/// - a final label at the end of the code array if a range ends there.
///
/// # Errors
/// Returns an error for undefined opcodes, truncated operands, invalid constant pool references,
/// or offsets that do not fall on an instruction boundary.
pub fn decode(code: &CodeAttribute, pool: &ConstantPool) -> Result<Vec<Instruction>> {
    let mut decoder = Decoder::new(&code.code, pool);
    let decoded = decoder.decode_all()?;

    let mut labels = decoder.targets;
    labels.extend(code.referenced_offsets());

    let mut lines: BTreeMap<u32, Vec<u16>> = BTreeMap::new();
    for entry in code.line_numbers() {
        lines
            .entry(u32::from(entry.start_pc))
            .or_default()
            .push(entry.line);
    }

    let mut emitted = 0_usize;
    let mut instructions = Vec::with_capacity(decoded.len() + labels.len() * 2);
    for (offset, instruction) in decoded {
        if labels.contains(&offset) {
            instructions.push(Instruction::Label(Label(offset)));
            emitted += 1;
        }
        if let Some(line_numbers) = lines.get(&offset) {
            for line in line_numbers {
                instructions.push(Instruction::LineNumber {
                    line: *line,
                    start: Label(offset),
                });
            }
        }
        instructions.push(instruction);
    }

    #[allow(clippy::cast_possible_truncation)]
    let end = code.code.len() as u32;
    if labels.contains(&end) {
        instructions.push(Instruction::Label(Label(end)));
        emitted += 1;
    }

    if emitted != labels.len() {
        let boundaries: BTreeSet<u32> = instructions
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Label(label) => Some(label.0),
                _ => None,
            })
            .collect();
        let stray = labels.difference(&boundaries).next().copied().unwrap_or(end);
        return Err(malformed_error!(
            "Offset {} is not an instruction boundary",
            stray
        ));
    }

    Ok(instructions)
}
