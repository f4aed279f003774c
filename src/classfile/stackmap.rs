//! `StackMapTable` frames (JVMS §4.7.4).
//!
//! Frames are kept with absolute bytecode offsets rather than the delta encoding used on disk, so
//! they can be moved when instructions are inserted. On encoding, every frame is written in the
//! most compact form its new delta allows.

use std::collections::BTreeMap;

use crate::{
    classfile::relocated,
    file::{io::push_be, parser::Parser},
    Result,
};

/// Largest delta that fits the single-byte frame forms.
const COMPACT_DELTA_MAX: u16 = 63;

const SAME_LOCALS_1_STACK_ITEM: u8 = 64;
const SAME_LOCALS_1_STACK_ITEM_EXTENDED: u8 = 247;
const CHOP_BASE: u8 = 251;
const SAME_EXTENDED: u8 = 251;
const APPEND_BASE: u8 = 251;
const FULL: u8 = 255;

/// `verification_type_info` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationType {
    /// No type information
    Top,
    /// `int` and smaller integral types
    Integer,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `long`
    Long,
    /// The `null` reference
    Null,
    /// `this` inside a constructor before the super constructor ran
    UninitializedThis,
    /// Instance of the class at the given constant pool index
    Object(u16),
    /// Result of the `new` instruction at the given bytecode offset
    Uninitialized(u16),
}

impl VerificationType {
    fn parse(parser: &mut Parser) -> Result<Self> {
        let tag = parser.read_be::<u8>()?;
        Ok(match tag {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(parser.read_be::<u16>()?),
            8 => VerificationType::Uninitialized(parser.read_be::<u16>()?),
            _ => return Err(malformed_error!("Invalid verification type tag {}", tag)),
        })
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            VerificationType::Top => out.push(0),
            VerificationType::Integer => out.push(1),
            VerificationType::Float => out.push(2),
            VerificationType::Double => out.push(3),
            VerificationType::Long => out.push(4),
            VerificationType::Null => out.push(5),
            VerificationType::UninitializedThis => out.push(6),
            VerificationType::Object(class) => {
                out.push(7);
                push_be::<u16>(out, *class);
            }
            VerificationType::Uninitialized(offset) => {
                out.push(8);
                push_be::<u16>(out, *offset);
            }
        }
    }

    fn relocate(&mut self, offsets: &BTreeMap<u32, u32>) -> Result<()> {
        if let VerificationType::Uninitialized(offset) = self {
            *offset = relocated(offsets, *offset)?;
        }
        Ok(())
    }
}

fn parse_types(parser: &mut Parser, count: usize) -> Result<Vec<VerificationType>> {
    (0..count).map(|_| VerificationType::parse(parser)).collect()
}

/// The shape of a frame relative to the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Same locals, empty stack
    Same,
    /// Same locals, exactly one stack item
    SameLocals1StackItem(VerificationType),
    /// The last `n` locals (1..=3) are absent, empty stack
    Chop(u8),
    /// Additional locals (1..=3), empty stack
    Append(Vec<VerificationType>),
    /// Complete description of locals and stack
    Full {
        /// All locals
        locals: Vec<VerificationType>,
        /// All stack entries
        stack: Vec<VerificationType>,
    },
}

/// A frame located at an absolute bytecode offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapFrame {
    /// Offset of the instruction the frame applies to
    pub offset: u16,
    /// Frame content
    pub kind: FrameKind,
}

/// Parsed content of a `StackMapTable` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackMapTable {
    /// Frames in strictly increasing offset order
    pub frames: Vec<StackMapFrame>,
}

impl StackMapTable {
    /// Parses the attribute body (`number_of_entries` followed by the frames).
    ///
    /// # Errors
    /// Returns an error for truncated data, reserved frame types or offsets beyond `u16`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(data);
        let count = parser.read_be::<u16>()?;
        let mut frames = Vec::with_capacity(usize::from(count));
        let mut previous: Option<u16> = None;

        for _ in 0..count {
            let frame_type = parser.read_be::<u8>()?;
            let (delta, kind) = match frame_type {
                0..=63 => (u16::from(frame_type), FrameKind::Same),
                64..=127 => (
                    u16::from(frame_type - SAME_LOCALS_1_STACK_ITEM),
                    FrameKind::SameLocals1StackItem(VerificationType::parse(&mut parser)?),
                ),
                SAME_LOCALS_1_STACK_ITEM_EXTENDED => {
                    let delta = parser.read_be::<u16>()?;
                    (
                        delta,
                        FrameKind::SameLocals1StackItem(VerificationType::parse(&mut parser)?),
                    )
                }
                248..=250 => (
                    parser.read_be::<u16>()?,
                    FrameKind::Chop(CHOP_BASE - frame_type),
                ),
                SAME_EXTENDED => (parser.read_be::<u16>()?, FrameKind::Same),
                252..=254 => {
                    let delta = parser.read_be::<u16>()?;
                    let locals = parse_types(&mut parser, usize::from(frame_type - APPEND_BASE))?;
                    (delta, FrameKind::Append(locals))
                }
                FULL => {
                    let delta = parser.read_be::<u16>()?;
                    let local_count = parser.read_be::<u16>()?;
                    let locals = parse_types(&mut parser, usize::from(local_count))?;
                    let stack_count = parser.read_be::<u16>()?;
                    let stack = parse_types(&mut parser, usize::from(stack_count))?;
                    (delta, FrameKind::Full { locals, stack })
                }
                _ => {
                    return Err(malformed_error!(
                        "Reserved stack map frame type {}",
                        frame_type
                    ))
                }
            };

            let offset = match previous {
                None => Some(delta),
                Some(previous) => previous
                    .checked_add(delta)
                    .and_then(|offset| offset.checked_add(1)),
            }
            .ok_or_else(|| malformed_error!("Stack map frame offset exceeds the code size"))?;

            previous = Some(offset);
            frames.push(StackMapFrame { offset, kind });
        }

        if parser.has_more_data() {
            return Err(malformed_error!(
                "{} trailing bytes after stack map frames",
                parser.remaining()
            ));
        }

        Ok(StackMapTable { frames })
    }

    /// Writes the attribute body.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if frame offsets are not strictly increasing.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let count = u16::try_from(self.frames.len())
            .map_err(|_| malformed_error!("Too many stack map frames"))?;
        push_be::<u16>(out, count);

        let mut previous: Option<u16> = None;
        for frame in &self.frames {
            let delta = match previous {
                None => Some(frame.offset),
                Some(previous) => frame
                    .offset
                    .checked_sub(previous)
                    .and_then(|delta| delta.checked_sub(1)),
            }
            .ok_or_else(|| {
                malformed_error!(
                    "Stack map frame at {} is not after its predecessor",
                    frame.offset
                )
            })?;
            previous = Some(frame.offset);

            match &frame.kind {
                FrameKind::Same if delta <= COMPACT_DELTA_MAX => {
                    #[allow(clippy::cast_possible_truncation)]
                    out.push(delta as u8);
                }
                FrameKind::Same => {
                    out.push(SAME_EXTENDED);
                    push_be::<u16>(out, delta);
                }
                FrameKind::SameLocals1StackItem(item) if delta <= COMPACT_DELTA_MAX => {
                    #[allow(clippy::cast_possible_truncation)]
                    out.push(SAME_LOCALS_1_STACK_ITEM + delta as u8);
                    item.encode(out);
                }
                FrameKind::SameLocals1StackItem(item) => {
                    out.push(SAME_LOCALS_1_STACK_ITEM_EXTENDED);
                    push_be::<u16>(out, delta);
                    item.encode(out);
                }
                FrameKind::Chop(count) => {
                    out.push(CHOP_BASE - count);
                    push_be::<u16>(out, delta);
                }
                FrameKind::Append(locals) => {
                    #[allow(clippy::cast_possible_truncation)]
                    out.push(APPEND_BASE + locals.len() as u8);
                    push_be::<u16>(out, delta);
                    for local in locals {
                        local.encode(out);
                    }
                }
                FrameKind::Full { locals, stack } => {
                    out.push(FULL);
                    push_be::<u16>(out, delta);
                    #[allow(clippy::cast_possible_truncation)]
                    push_be::<u16>(out, locals.len() as u16);
                    for local in locals {
                        local.encode(out);
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    push_be::<u16>(out, stack.len() as u16);
                    for item in stack {
                        item.encode(out);
                    }
                }
            }
        }

        Ok(())
    }

    /// Every bytecode offset the table refers to, including `Uninitialized` entries.
    pub fn offsets(&self) -> impl Iterator<Item = u16> + '_ {
        self.frames.iter().flat_map(|frame| {
            let types: Vec<&VerificationType> = match &frame.kind {
                FrameKind::Same | FrameKind::Chop(_) => Vec::new(),
                FrameKind::SameLocals1StackItem(item) => vec![item],
                FrameKind::Append(locals) => locals.iter().collect(),
                FrameKind::Full { locals, stack } => locals.iter().chain(stack).collect(),
            };

            std::iter::once(frame.offset).chain(types.into_iter().filter_map(|ty| match ty {
                VerificationType::Uninitialized(offset) => Some(*offset),
                _ => None,
            }))
        })
    }

    /// Moves every frame and `Uninitialized` entry to its new offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if an offset has no new location.
    pub fn relocate(&mut self, offsets: &BTreeMap<u32, u32>) -> Result<()> {
        for frame in &mut self.frames {
            frame.offset = relocated(offsets, frame.offset)?;
            match &mut frame.kind {
                FrameKind::Same | FrameKind::Chop(_) => {}
                FrameKind::SameLocals1StackItem(item) => item.relocate(offsets)?,
                FrameKind::Append(locals) => {
                    for local in locals {
                        local.relocate(offsets)?;
                    }
                }
                FrameKind::Full { locals, stack } => {
                    for entry in locals.iter_mut().chain(stack.iter_mut()) {
                        entry.relocate(offsets)?;
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_bytes(frames: &[&[u8]]) -> Vec<u8> {
        let mut data = (frames.len() as u16).to_be_bytes().to_vec();
        for frame in frames {
            data.extend_from_slice(frame);
        }
        data
    }

    #[test]
    fn parse_absolute_offsets() {
        let data = table_bytes(&[
            &[5],
            &[64 + 2, 1],
            &[252, 0x00, 0x03, 7, 0x00, 0x09],
            &[250, 0x00, 0x00],
        ]);
        let table = StackMapTable::parse(&data).unwrap();

        let offsets: Vec<u16> = table.frames.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, [5, 8, 12, 13]);
        assert_eq!(
            table.frames[1].kind,
            FrameKind::SameLocals1StackItem(VerificationType::Integer)
        );
        assert_eq!(table.frames[3].kind, FrameKind::Chop(1));

        let mut encoded = Vec::new();
        table.encode(&mut encoded).unwrap();
        assert_eq!(encoded, data);
    }

    #[test]
    fn relocation_switches_to_extended_form() {
        let data = table_bytes(&[&[10], &[64 + 3, 8, 0x00, 0x04]]);
        let mut table = StackMapTable::parse(&data).unwrap();
        assert_eq!(table.offsets().collect::<Vec<_>>(), [10, 14, 4]);

        let offsets = BTreeMap::from([(4, 4), (10, 80), (14, 90)]);
        table.relocate(&offsets).unwrap();

        let mut encoded = Vec::new();
        table.encode(&mut encoded).unwrap();
        assert_eq!(
            encoded,
            table_bytes(&[&[251, 0x00, 80], &[64 + 9, 8, 0x00, 0x04]])
        );
    }

    #[test]
    fn full_frame_roundtrip_with_uninitialized() {
        let data = table_bytes(&[&[
            255, 0x00, 0x07, 0x00, 0x02, 6, 7, 0x00, 0x01, 0x00, 0x01, 8, 0x00, 0x03,
        ]]);
        let mut table = StackMapTable::parse(&data).unwrap();
        table
            .relocate(&BTreeMap::from([(3, 5), (7, 12)]))
            .unwrap();

        assert_eq!(table.frames[0].offset, 12);
        assert_eq!(
            table.frames[0].kind,
            FrameKind::Full {
                locals: vec![VerificationType::UninitializedThis, VerificationType::Object(1)],
                stack: vec![VerificationType::Uninitialized(5)],
            }
        );
    }

    #[test]
    fn missing_offset_fails_relocation() {
        let mut table = StackMapTable::parse(&table_bytes(&[&[3]])).unwrap();
        assert!(table.relocate(&BTreeMap::new()).is_err());
    }

    #[test]
    fn reserved_frame_type_is_rejected() {
        assert!(StackMapTable::parse(&table_bytes(&[&[128]])).is_err());
    }
}
