//! JVM instruction streams.
//!
//! A method body is handled as a sequence of [`Instruction`] events: the real instructions plus
//! [`Instruction::Label`] and [`Instruction::LineNumber`] markers. The rewriter folds over that
//! sequence, and [`encode`] turns the result back into bytes.
//!
//! # Key Components
//!
//! - [`decode`] - Code attribute to instruction events, with symbolic call sites
//! - [`encode`] - Instruction events to bytes, lowering inserted constants into the pool
//! - [`opcodes`] - Opcode values and mnemonics
//!
//! # Examples
//!
//! ```rust
//! use classweave::{
//!     bytecode::{decode, encode},
//!     classfile::{CodeAttribute, ConstantPool},
//! };
//!
//! let mut pool = ConstantPool::new();
//! let code = CodeAttribute {
//!     max_stack: 1,
//!     max_locals: 0,
//!     code: vec![0x04, 0xAC], // iconst_1, ireturn
//!     exception_table: Vec::new(),
//!     attributes: Vec::new(),
//! };
//!
//! let instructions = decode(&code, &pool)?;
//! let encoded = encode(&instructions, &mut pool)?;
//! assert_eq!(encoded.code, code.code);
//! # Ok::<(), classweave::Error>(())
//! ```

mod decoder;
mod encoder;
mod instruction;
pub mod opcodes;

pub use decoder::decode;
pub use encoder::{encode, EncodedCode};
pub use instruction::{Instruction, InvokeKind, Label, MethodInsn};
