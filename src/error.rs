#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum JSError {
    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    #[error("Infinite loop detected (executed {iterations} iterations)")]
    InfiniteLoopError { iterations: usize },

    #[error("Thrown value: {value}")]
    Throw { value: String },
}

impl JSError {
    /// Name of the JavaScript error constructor this error maps to when it
    /// has to be materialized as a rejection reason.
    pub fn name(&self) -> &'static str {
        match self {
            JSError::TypeError { .. } => "TypeError",
            JSError::RangeError { .. } => "RangeError",
            JSError::InfiniteLoopError { .. } => "RangeError",
            JSError::Throw { .. } => "Error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            JSError::TypeError { message } | JSError::RangeError { message } => message.clone(),
            JSError::InfiniteLoopError { iterations } => format!("job queue did not drain after {iterations} jobs"),
            JSError::Throw { value } => value.clone(),
        }
    }
}

#[macro_export]
macro_rules! raise_type_error {
    ($($arg:tt)*) => {
        $crate::JSError::TypeError {
            message: format!($($arg)*),
        }
    };
}
