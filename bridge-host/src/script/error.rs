//! Script error types.

use alloc::string::String;
use core::fmt;

/// Result type for script operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors raised while compiling or running dynamic code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// Source text does not parse.
    SyntaxError(String),
    /// Operation applied to a value of the wrong kind.
    TypeError(String),
    /// Unknown binding.
    ReferenceError(String),
    /// Value out of range (call depth, BigInt overflow, ...).
    RangeError(String),
    /// Value raised by a `throw` statement, rendered as text.
    Thrown(String),
}

impl ScriptError {
    /// Create a syntax error.
    pub fn syntax<S: Into<String>>(msg: S) -> Self {
        ScriptError::SyntaxError(msg.into())
    }

    /// Create a type error.
    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        ScriptError::TypeError(msg.into())
    }

    /// Create a reference error.
    pub fn reference<S: Into<String>>(msg: S) -> Self {
        ScriptError::ReferenceError(msg.into())
    }

    /// Create a range error.
    pub fn range<S: Into<String>>(msg: S) -> Self {
        ScriptError::RangeError(msg.into())
    }

    /// Get error name.
    pub fn name(&self) -> &'static str {
        match self {
            ScriptError::SyntaxError(_) => "SyntaxError",
            ScriptError::TypeError(_) => "TypeError",
            ScriptError::ReferenceError(_) => "ReferenceError",
            ScriptError::RangeError(_) => "RangeError",
            ScriptError::Thrown(_) => "Uncaught",
        }
    }

    /// Get error message.
    pub fn message(&self) -> &str {
        match self {
            ScriptError::SyntaxError(msg)
            | ScriptError::TypeError(msg)
            | ScriptError::ReferenceError(msg)
            | ScriptError::RangeError(msg)
            | ScriptError::Thrown(msg) => msg,
        }
    }

    /// Whether this error comes from parsing rather than running.
    pub fn is_syntax(&self) -> bool {
        matches!(self, ScriptError::SyntaxError(_))
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ScriptError {}
