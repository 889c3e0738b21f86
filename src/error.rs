use crate::types::JsValue;

/// Error taxonomy for the native-object layer.
///
/// `Type`, `Range` and `Thrown` are script-visible and catchable; `Thrown`
/// carries a script value (used for the StopIteration control value).
/// `Internal` marks a broken engine invariant and is never converted into
/// a script-catchable value.
#[derive(thiserror::Error, Debug)]
pub enum JsError {
    #[error("TypeError: {message}")]
    Type { message: String },

    #[error("RangeError: {message}")]
    Range { message: String },

    #[error("Thrown value: {value:?}")]
    Thrown { value: JsValue },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl JsError {
    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::Type {
            message: message.into(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::Range {
            message: message.into(),
        }
    }

    pub fn thrown(value: JsValue) -> Self {
        JsError::Thrown { value }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        JsError::Internal {
            message: message.into(),
        }
    }

    /// Whether script-level `try`/`catch` may observe this error.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, JsError::Internal { .. })
    }
}
