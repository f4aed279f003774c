//! Encoding of an instruction event stream back into a code array.
//!
//! Encoding runs in two passes. The first one lowers symbolic operands into the constant pool
//! and lays out every instruction, which fixes label positions and switch padding. The second one
//! writes the bytes, resolving branch offsets against the final layout.

use std::collections::BTreeMap;

use crate::{
    bytecode::{
        instruction::{Instruction, Label},
        opcodes::*,
    },
    classfile::ConstantPool,
    descriptor::MethodDescriptor,
    file::io::push_be,
    Error::BranchOverflow,
    Result,
};

/// Largest code array a method may have (JVMS §4.7.3).
const MAX_CODE_LENGTH: u32 = 65535;

/// A freshly encoded code array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCode {
    /// The bytecode
    pub code: Vec<u8>,
    /// New position of every label, keyed by the label's original offset
    pub offsets: BTreeMap<u32, u32>,
}

/// Stateful encoder for one instruction stream
struct Encoder<'a> {
    instructions: &'a [Instruction],
    /// Constant pool index resolved for each instruction during lowering
    resolved: Vec<Option<u16>>,
    /// Offset of each instruction in the new code array
    positions: Vec<u32>,
    labels: BTreeMap<u32, u32>,
}

impl<'a> Encoder<'a> {
    fn new(instructions: &'a [Instruction]) -> Self {
        Encoder {
            instructions,
            resolved: Vec::with_capacity(instructions.len()),
            positions: Vec::with_capacity(instructions.len()),
            labels: BTreeMap::new(),
        }
    }

    /// Adds symbolic constants to the pool and computes the layout
    fn layout(&mut self, pool: &mut ConstantPool) -> Result<u32> {
        let mut offset = 0_u32;

        for instruction in self.instructions {
            let resolved = match instruction {
                Instruction::LoadString(value) => Some(pool.add_string(value)?),
                Instruction::Method(call) => match call.pool_index {
                    Some(index) => Some(index),
                    None => Some(pool.add_method_ref(
                        &call.owner,
                        &call.name,
                        &call.descriptor,
                        call.is_interface,
                    )?),
                },
                _ => None,
            };

            if let Instruction::Label(Label(original)) = instruction {
                if self.labels.insert(*original, offset).is_some() {
                    return Err(malformed_error!("Label {} placed twice", original));
                }
            }

            self.positions.push(offset);
            offset += Self::size(instruction, offset, resolved);
            self.resolved.push(resolved);

            if offset > MAX_CODE_LENGTH {
                return Err(malformed_error!(
                    "Encoded code exceeds {} bytes",
                    MAX_CODE_LENGTH
                ));
            }
        }

        Ok(offset)
    }

    /// Size in bytes of an instruction placed at `offset`
    fn size(instruction: &Instruction, offset: u32, resolved: Option<u16>) -> u32 {
        let padding = |offset: u32| (4 - (offset + 1) % 4) % 4;

        match instruction {
            Instruction::Label(_) | Instruction::LineNumber { .. } => 0,
            Instruction::Simple(_) => 1,
            Instruction::Push { opcode, .. } => {
                if *opcode == BIPUSH {
                    2
                } else {
                    3
                }
            }
            Instruction::NewArray(_) => 2,
            Instruction::Var { wide, .. } => {
                if *wide {
                    4
                } else {
                    2
                }
            }
            Instruction::Iinc { wide, .. } => {
                if *wide {
                    6
                } else {
                    3
                }
            }
            Instruction::Jump { opcode, .. } => {
                if matches!(*opcode, GOTO_W | JSR_W) {
                    5
                } else {
                    3
                }
            }
            #[allow(clippy::cast_possible_truncation)]
            Instruction::TableSwitch { targets, .. } => {
                1 + padding(offset) + 12 + 4 * targets.len() as u32
            }
            #[allow(clippy::cast_possible_truncation)]
            Instruction::LookupSwitch { pairs, .. } => {
                1 + padding(offset) + 8 + 8 * pairs.len() as u32
            }
            Instruction::Constant { opcode, .. } => {
                if *opcode == LDC {
                    2
                } else {
                    3
                }
            }
            Instruction::LoadString(_) => match resolved {
                Some(index) if index <= u16::from(u8::MAX) => 2,
                _ => 3,
            },
            Instruction::PoolRef { .. } => 3,
            Instruction::Method(call) => {
                if call.kind.opcode() == INVOKEINTERFACE {
                    5
                } else {
                    3
                }
            }
            Instruction::InvokeDynamic { .. } => 5,
            Instruction::MultiANewArray { .. } => 4,
        }
    }

    fn target(&self, from: u32, target: Label) -> Result<i64> {
        let Some(to) = self.labels.get(&target.0) else {
            return Err(malformed_error!("Branch to unplaced label {}", target.0));
        };
        Ok(i64::from(*to) - i64::from(from))
    }

    fn target_i16(&self, from: u32, target: Label) -> Result<i16> {
        let relative = self.target(from, target)?;
        i16::try_from(relative).map_err(|_| BranchOverflow {
            from: from as usize,
            to: (i64::from(from) + relative) as usize,
        })
    }

    fn target_i32(&self, from: u32, target: Label) -> Result<i32> {
        let relative = self.target(from, target)?;
        i32::try_from(relative).map_err(|_| BranchOverflow {
            from: from as usize,
            to: (i64::from(from) + relative) as usize,
        })
    }

    fn emit(&self, length: u32) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(length as usize);

        for ((instruction, position), resolved) in self
            .instructions
            .iter()
            .zip(&self.positions)
            .zip(&self.resolved)
        {
            let position = *position;
            match instruction {
                Instruction::Label(_) | Instruction::LineNumber { .. } => {}
                Instruction::Simple(opcode) => out.push(*opcode),
                Instruction::Push { opcode, value } => {
                    out.push(*opcode);
                    if *opcode == BIPUSH {
                        let value = i8::try_from(*value)
                            .map_err(|_| malformed_error!("bipush value {} out of range", value))?;
                        push_be::<i8>(&mut out, value);
                    } else {
                        push_be::<i16>(&mut out, *value);
                    }
                }
                Instruction::NewArray(array_type) => {
                    out.push(NEWARRAY);
                    out.push(*array_type);
                }
                Instruction::Var {
                    opcode,
                    index,
                    wide,
                } => {
                    if *wide {
                        out.push(WIDE);
                        out.push(*opcode);
                        push_be::<u16>(&mut out, *index);
                    } else {
                        let index = u8::try_from(*index).map_err(|_| {
                            malformed_error!("Local {} needs a wide instruction", index)
                        })?;
                        out.push(*opcode);
                        out.push(index);
                    }
                }
                Instruction::Iinc { index, delta, wide } => {
                    if *wide {
                        out.push(WIDE);
                        out.push(IINC);
                        push_be::<u16>(&mut out, *index);
                        push_be::<i16>(&mut out, *delta);
                    } else {
                        let (Ok(index), Ok(delta)) = (u8::try_from(*index), i8::try_from(*delta))
                        else {
                            return Err(malformed_error!(
                                "iinc {} {} needs a wide instruction",
                                index,
                                delta
                            ));
                        };
                        out.push(IINC);
                        out.push(index);
                        push_be::<i8>(&mut out, delta);
                    }
                }
                Instruction::Jump { opcode, target } => {
                    out.push(*opcode);
                    if matches!(*opcode, GOTO_W | JSR_W) {
                        push_be::<i32>(&mut out, self.target_i32(position, *target)?);
                    } else {
                        push_be::<i16>(&mut out, self.target_i16(position, *target)?);
                    }
                }
                Instruction::TableSwitch {
                    default,
                    low,
                    high,
                    targets,
                } => {
                    out.push(TABLESWITCH);
                    Self::pad(&mut out);
                    push_be::<i32>(&mut out, self.target_i32(position, *default)?);
                    push_be::<i32>(&mut out, *low);
                    push_be::<i32>(&mut out, *high);
                    for target in targets {
                        push_be::<i32>(&mut out, self.target_i32(position, *target)?);
                    }
                }
                Instruction::LookupSwitch { default, pairs } => {
                    out.push(LOOKUPSWITCH);
                    Self::pad(&mut out);
                    push_be::<i32>(&mut out, self.target_i32(position, *default)?);
                    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                    push_be::<i32>(&mut out, pairs.len() as i32);
                    for (value, target) in pairs {
                        push_be::<i32>(&mut out, *value);
                        push_be::<i32>(&mut out, self.target_i32(position, *target)?);
                    }
                }
                Instruction::Constant { opcode, index } => {
                    out.push(*opcode);
                    if *opcode == LDC {
                        let index = u8::try_from(*index)
                            .map_err(|_| malformed_error!("ldc index {} out of range", index))?;
                        out.push(index);
                    } else {
                        push_be::<u16>(&mut out, *index);
                    }
                }
                Instruction::LoadString(value) => {
                    let Some(index) = resolved else {
                        return Err(malformed_error!("String {:?} was not lowered", value));
                    };
                    match u8::try_from(*index) {
                        Ok(short) => {
                            out.push(LDC);
                            out.push(short);
                        }
                        Err(_) => {
                            out.push(LDC_W);
                            push_be::<u16>(&mut out, *index);
                        }
                    }
                }
                Instruction::PoolRef { opcode, index } => {
                    out.push(*opcode);
                    push_be::<u16>(&mut out, *index);
                }
                Instruction::Method(call) => {
                    let Some(index) = resolved else {
                        return Err(malformed_error!(
                            "Call {}.{} was not lowered",
                            call.owner,
                            call.name
                        ));
                    };
                    let opcode = call.kind.opcode();
                    out.push(opcode);
                    push_be::<u16>(&mut out, *index);
                    if opcode == INVOKEINTERFACE {
                        let count = MethodDescriptor::parse(&call.descriptor)?.argument_slots() + 1;
                        let count = u8::try_from(count).map_err(|_| {
                            malformed_error!("Too many arguments for {}", call.descriptor)
                        })?;
                        out.push(count);
                        out.push(0);
                    }
                }
                Instruction::InvokeDynamic { index } => {
                    out.push(INVOKEDYNAMIC);
                    push_be::<u16>(&mut out, *index);
                    push_be::<u16>(&mut out, 0);
                }
                Instruction::MultiANewArray { index, dimensions } => {
                    out.push(MULTIANEWARRAY);
                    push_be::<u16>(&mut out, *index);
                    out.push(*dimensions);
                }
            }
        }

        Ok(out)
    }

    fn pad(out: &mut Vec<u8>) {
        while out.len() % 4 != 0 {
            out.push(0);
        }
    }
}

/// Encodes an instruction stream into a code array.
///
/// [`Instruction::LoadString`] and calls without a pool index are added to `pool`, reusing
/// identical entries. `ldc` is used for string constants whose index fits a byte, `ldc_w`
/// otherwise. An unmodified decoded stream encodes to the original bytes.
///
/// # Errors
/// Returns [`crate::Error::BranchOverflow`] if a branch no longer fits its operand,
/// [`crate::Error::ConstantPoolOverflow`] if the pool is full, and
/// [`crate::Error::Malformed`] for unplaced labels or an oversized code array.
pub fn encode(instructions: &[Instruction], pool: &mut ConstantPool) -> Result<EncodedCode> {
    let mut encoder = Encoder::new(instructions);
    let length = encoder.layout(pool)?;
    let code = encoder.emit(length)?;

    Ok(EncodedCode {
        code,
        offsets: encoder.labels,
    })
}
