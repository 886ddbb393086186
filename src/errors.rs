use thiserror::Error;

/// The fatal error taxonomy the code generator can raise. There is no
/// recovery path: any of these halts compilation and the driver discards
/// whatever partial output it was accumulating.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Unsupported syntax in {context}: {reason}")]
    UnsupportedSyntax { context: String, reason: String },

    #[error("Unresolved name in {context}: {name}")]
    UnresolvedName { context: String, name: String },

    #[error("Range error in {context}: {reason}")]
    RangeError { context: String, reason: String },

    #[error("Immediate overflow in {context}: {value} does not fit in {bits} bits")]
    ImmediateOverflow {
        context: String,
        value: i64,
        bits: u8,
    },

    #[error("Return value {value} out of range in {context}: main must return -128..=127")]
    ReturnOutOfRange { context: String, value: i64 },
}
