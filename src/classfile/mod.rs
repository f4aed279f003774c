//! Class-file structures touched by call-site rewriting.
//!
//! Only the pieces the rewriter needs are modelled: the constant pool, where replacement targets
//! and correlation-id strings are added, and the `Code` attribute with the nested attributes that
//! carry bytecode offsets. Everything else in a class file is left to the host pipeline.
//!
//! # Key Components
//!
//! - [`ConstantPool`] - Parsing, symbolic lookup and de-duplicating insertion
//! - [`CodeAttribute`] - Method body with exception table and debug/verification attributes
//! - [`stackmap::StackMapTable`] - Verification frames with absolute offsets
//! - [`mutf8`] - Modified UTF-8 used by `CONSTANT_Utf8`

use std::collections::BTreeMap;

use crate::Result;

mod code;
mod constpool;
pub mod mutf8;
pub mod stackmap;

pub use code::{CodeAttribute, CodeSubAttribute, ExceptionHandler, LineNumber, LocalVariable};
pub use constpool::{tag, Constant, ConstantPool, MemberRef};

/// Looks up the new position of an original bytecode offset.
pub(crate) fn relocated(offsets: &BTreeMap<u32, u32>, offset: u16) -> Result<u16> {
    let Some(new_offset) = offsets.get(&u32::from(offset)) else {
        return Err(malformed_error!("No relocation for bytecode offset {}", offset));
    };

    u16::try_from(*new_offset)
        .map_err(|_| malformed_error!("Relocated offset {} exceeds the code size", new_offset))
}
