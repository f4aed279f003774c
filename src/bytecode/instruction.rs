use strum::{Display, EnumCount, EnumIter};

use crate::bytecode::opcodes;

/// A position in the instruction stream, identified by its offset in the original code array.
///
/// Labels are what branches, switches and offset-bearing attributes refer to. Since inserted
/// instructions never need to be targeted, every label corresponds to an original offset and
/// keeps pointing at the same instruction after relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u32);

/// The dispatch flavor of a method invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "lowercase")]
pub enum InvokeKind {
    /// `invokevirtual`, virtually dispatched instance call
    Virtual,
    /// `invokespecial`, constructor, private or `super` call
    Special,
    /// `invokestatic`
    Static,
    /// `invokeinterface`, virtually dispatched call through an interface
    Interface,
}

impl InvokeKind {
    /// Maps an invocation opcode to its kind. `invokedynamic` has no owner and is not a call
    /// site in this sense.
    #[must_use]
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            opcodes::INVOKEVIRTUAL => Some(InvokeKind::Virtual),
            opcodes::INVOKESPECIAL => Some(InvokeKind::Special),
            opcodes::INVOKESTATIC => Some(InvokeKind::Static),
            opcodes::INVOKEINTERFACE => Some(InvokeKind::Interface),
            _ => None,
        }
    }

    /// The opcode used to encode this kind.
    #[must_use]
    pub fn opcode(self) -> u8 {
        match self {
            InvokeKind::Virtual => opcodes::INVOKEVIRTUAL,
            InvokeKind::Special => opcodes::INVOKESPECIAL,
            InvokeKind::Static => opcodes::INVOKESTATIC,
            InvokeKind::Interface => opcodes::INVOKEINTERFACE,
        }
    }

    /// Returns `true` for calls without a receiver.
    #[must_use]
    pub fn is_static(self) -> bool {
        self == InvokeKind::Static
    }
}

/// A symbolic method invocation, i.e. a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInsn {
    /// Dispatch flavor
    pub kind: InvokeKind,
    /// Internal name of the owning type (`java/lang/String`)
    pub owner: String,
    /// Method name
    pub name: String,
    /// Method descriptor (`(Ljava/lang/Object;)Z`)
    pub descriptor: String,
    /// Whether the owner is an interface (`InterfaceMethodref`)
    pub is_interface: bool,
    /// Constant pool entry the call was decoded from, `None` for synthesized calls
    pub pool_index: Option<u16>,
}

impl MethodInsn {
    /// Creates a synthesized call that will be added to the constant pool on encoding.
    #[must_use]
    pub fn new(kind: InvokeKind, owner: &str, name: &str, descriptor: &str) -> Self {
        MethodInsn {
            kind,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            is_interface: kind == InvokeKind::Interface,
            pool_index: None,
        }
    }
}

/// One event of a method's instruction stream.
///
/// Besides the real instructions, the stream carries [`Instruction::Label`] and
/// [`Instruction::LineNumber`] pseudo-events. Operand forms mirror the encoding closely enough
/// that an unmodified stream re-encodes to the original bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Marks the position of the next instruction
    Label(Label),
    /// The instructions starting at `start` belong to source line `line`
    LineNumber {
        /// Source line
        line: u16,
        /// Label of the first instruction of the line
        start: Label,
    },
    /// An instruction without operands
    Simple(u8),
    /// `bipush` or `sipush`
    Push {
        /// `bipush` or `sipush`
        opcode: u8,
        /// Pushed value
        value: i16,
    },
    /// `newarray` with its primitive array type code
    NewArray(u8),
    /// Load, store or `ret` with an explicit local variable index
    Var {
        /// The unprefixed opcode
        opcode: u8,
        /// Local variable slot
        index: u16,
        /// Whether the instruction carries the `wide` prefix
        wide: bool,
    },
    /// `iinc`
    Iinc {
        /// Local variable slot
        index: u16,
        /// Increment
        delta: i16,
        /// Whether the instruction carries the `wide` prefix
        wide: bool,
    },
    /// Conditional or unconditional jump, including `jsr`
    Jump {
        /// Branch opcode
        opcode: u8,
        /// Branch target
        target: Label,
    },
    /// `tableswitch`
    TableSwitch {
        /// Target for values outside `low..=high`
        default: Label,
        /// Lowest matched value
        low: i32,
        /// Highest matched value
        high: i32,
        /// One target per value in `low..=high`
        targets: Vec<Label>,
    },
    /// `lookupswitch`
    LookupSwitch {
        /// Target for unmatched values
        default: Label,
        /// Match value and target, sorted by value
        pairs: Vec<(i32, Label)>,
    },
    /// `ldc`, `ldc_w` or `ldc2_w` of an existing constant
    Constant {
        /// Load opcode
        opcode: u8,
        /// Constant pool index
        index: u16,
    },
    /// Loads a string constant that is added to the pool on encoding
    LoadString(String),
    /// Field access, `new`, `anewarray`, `checkcast` or `instanceof`
    PoolRef {
        /// Instruction opcode
        opcode: u8,
        /// Constant pool index of the referenced entry
        index: u16,
    },
    /// `invokevirtual`, `invokespecial`, `invokestatic` or `invokeinterface`
    Method(MethodInsn),
    /// `invokedynamic`
    InvokeDynamic {
        /// Constant pool index of the `InvokeDynamic` entry
        index: u16,
    },
    /// `multianewarray`
    MultiANewArray {
        /// Constant pool index of the array class
        index: u16,
        /// Number of dimensions to allocate
        dimensions: u8,
    },
}

impl Instruction {
    /// Returns `true` for pseudo-events that do not occupy bytes in the code array.
    #[must_use]
    pub fn is_pseudo(&self) -> bool {
        matches!(self, Instruction::Label(_) | Instruction::LineNumber { .. })
    }

    /// Every label the instruction refers to.
    #[must_use]
    pub fn targets(&self) -> Vec<Label> {
        match self {
            Instruction::Jump { target, .. } => vec![*target],
            Instruction::TableSwitch {
                default, targets, ..
            } => std::iter::once(*default).chain(targets.iter().copied()).collect(),
            Instruction::LookupSwitch { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, target)| *target))
                .collect(),
            _ => Vec::new(),
        }
    }
}
