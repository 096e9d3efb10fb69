//! Error types for the Neo Virtual Machine.
//!
//! Every failure raised while decoding or executing a script is a [`VmError`].
//! Only [`VmError::CatchableException`] can be intercepted by an in-script
//! `TRY` block; every other variant faults the engine.

use thiserror::Error;

/// Errors produced by the virtual machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// An operation was attempted in a state that does not allow it.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A value-domain error that scripts may catch with `TRY`/`CATCH`.
    #[error("{0}")]
    CatchableException(String),

    /// A stack item could not be used as the requested type.
    #[error("Invalid type: {0}")]
    InvalidType(String),

    /// Not enough items on a stack.
    #[error("Stack underflow: {0}")]
    StackUnderflow(String),

    /// An index or position lies outside its container.
    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    /// The script failed structural validation.
    #[error("Bad script: {0}")]
    BadScript(String),

    /// An undefined opcode byte was decoded.
    #[error("Invalid opcode: 0x{0:02X}")]
    InvalidOpCode(u8),

    /// An execution limit was exceeded.
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// An exception thrown by the script reached the bottom of the invocation stack.
    #[error("An unhandled exception was thrown. {0}")]
    UnhandledException(String),

    /// Limits could not be loaded or saved.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type used throughout the virtual machine.
pub type VmResult<T> = Result<T, VmError>;

impl VmError {
    /// Creates an invalid operation error.
    pub fn invalid_operation_msg<S: Into<String>>(message: S) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Creates a catchable exception.
    pub fn catchable_exception_msg<S: Into<String>>(message: S) -> Self {
        Self::CatchableException(message.into())
    }

    /// Creates an invalid type error.
    pub fn invalid_type_msg<S: Into<String>>(message: S) -> Self {
        Self::InvalidType(message.into())
    }

    /// Creates a stack underflow error for a stack holding `available` items.
    pub fn stack_underflow_msg(requested: usize, available: usize) -> Self {
        Self::StackUnderflow(format!("requested {requested}, available {available}"))
    }

    /// Creates an index out of range error.
    pub fn index_out_of_range_msg<S: Into<String>>(message: S) -> Self {
        Self::IndexOutOfRange(message.into())
    }

    /// Creates a bad script error.
    pub fn bad_script_msg<S: Into<String>>(message: S) -> Self {
        Self::BadScript(message.into())
    }

    /// Creates a limit exceeded error.
    pub fn limit_exceeded_msg<S: Into<String>>(message: S) -> Self {
        Self::LimitExceeded(message.into())
    }

    /// Returns `true` when the error may be routed to a script-level handler.
    pub fn is_catchable(&self) -> bool {
        matches!(self, Self::CatchableException(_))
    }

    /// Returns the bare message carried by the error, without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidOperation(m)
            | Self::CatchableException(m)
            | Self::InvalidType(m)
            | Self::StackUnderflow(m)
            | Self::IndexOutOfRange(m)
            | Self::BadScript(m)
            | Self::LimitExceeded(m)
            | Self::UnhandledException(m)
            | Self::Config(m) => m.clone(),
            Self::InvalidOpCode(_) => self.to_string(),
        }
    }
}

impl From<toml::de::Error> for VmError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VmError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for VmError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}
