//! Operand stack bookkeeping for rewritten methods.

use crate::{Error, Result};

/// Stack slots a rewritten call site needs beyond the original call.
///
/// The correlation id is pushed right before the replacement call, which pops it again, so the
/// extra slot never accumulates across several replaced calls.
pub const EXTRA_STACK_SLOTS: u16 = 1;

/// Returns the `max_stack` of a rewritten method.
///
/// # Errors
/// Returns [`Error::StackOverflow`] if the result does not fit the `u16` of the Code attribute.
///
/// # Examples
///
/// ```rust
/// use classweave::rewriter::adjust_max_stack;
///
/// assert_eq!(adjust_max_stack(2)?, 3);
/// assert!(adjust_max_stack(u16::MAX).is_err());
/// # Ok::<(), classweave::Error>(())
/// ```
pub fn adjust_max_stack(max_stack: u16) -> Result<u16> {
    max_stack
        .checked_add(EXTRA_STACK_SLOTS)
        .ok_or(Error::StackOverflow(max_stack))
}
