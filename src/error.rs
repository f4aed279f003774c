use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most variants describe a defect in the input (a truncated Code attribute, an unknown opcode,
/// a descriptor that does not follow the JVM grammar). Two of them are special:
///
/// - [`Error::ClassNotFound`] is raised when the owner of an eligible call site cannot be
///   resolved. It signals a classpath inconsistency and aborts rewriting of the enclosing class.
/// - [`Error::BranchOverflow`] and [`Error::StackOverflow`] are raised when the inserted
///   instructions push a method past a hard limit of the class-file format.
///
/// Call sites that are simply not eligible for replacement never produce an error.
///
/// # Error Categories
///
/// ## Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the input
/// - [`Error::InvalidOpcode`] - Undefined or reserved instruction
/// - [`Error::InvalidDescriptor`] - Type or method descriptor does not parse
/// - [`Error::ConstantPoolIndex`] - Reference to a missing or mistyped constant
///
/// ## Rewriting Errors
/// - [`Error::ClassNotFound`] - Owner type of a call site cannot be resolved
/// - [`Error::ConstantPoolOverflow`] - More than 65535 constant pool slots required
/// - [`Error::BranchOverflow`] - Relocated branch does not fit its operand
/// - [`Error::StackOverflow`] - Adjusted `max_stack` exceeds `u16`
///
/// # Examples
///
/// ```rust
/// use classweave::{Error, descriptor::MethodDescriptor};
///
/// match MethodDescriptor::parse("(I") {
///     Ok(_) => unreachable!(),
///     Err(Error::InvalidDescriptor(desc)) => assert_eq!(desc, "(I"),
///     Err(e) => panic!("unexpected error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The input uses a feature that is not supported.
    #[error("This feature is not supported")]
    NotSupported,

    /// The owning type of a call site could not be resolved.
    ///
    /// Since the call site references the type, it must be loadable from the same context as the
    /// instrumented code. Failing to resolve it points at a build or classpath inconsistency,
    /// therefore rewriting of the enclosing class is aborted.
    #[error("Failed to resolve class '{owner}'")]
    ClassNotFound {
        /// Internal name (`java/lang/String`) of the type that could not be resolved
        owner: String,
    },

    /// A field, return or method descriptor does not follow the JVM descriptor grammar.
    #[error("Invalid descriptor - {0}")]
    InvalidDescriptor(String),

    /// An undefined or reserved opcode was encountered.
    #[error("Invalid opcode 0x{opcode:02X} at offset {offset}")]
    InvalidOpcode {
        /// The offending opcode
        opcode: u8,
        /// Offset of the instruction within the code array
        offset: usize,
    },

    /// A constant pool index is zero, out of range or points at an entry of the wrong kind.
    #[error("Invalid constant pool index - {0}")]
    ConstantPoolIndex(u16),

    /// Adding an entry would exceed the 65535 slots a constant pool can address.
    #[error("Constant pool is full")]
    ConstantPoolOverflow,

    /// A branch can no longer be encoded after instructions were inserted.
    #[error("Branch from offset {from} to {to} does not fit its operand")]
    BranchOverflow {
        /// New offset of the branch instruction
        from: usize,
        /// New offset of the branch target
        to: usize,
    },

    /// The adjusted maximum operand-stack depth does not fit into `u16`.
    #[error("Maximum stack depth overflow - {0}")]
    StackOverflow(u16),
}
