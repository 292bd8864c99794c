/// Error types for STL codec operations
use std::path::PathBuf;
use thiserror::Error;

/// Result type for STL codec operations
pub type StlResult<T> = Result<T, StlError>;

/// Lower-level fault preserved underneath a decode or encode failure
#[derive(Debug, Error)]
pub enum Cause {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ParseFloat(#[from] std::num::ParseFloatError),
}

/// Errors surfaced by the STL codec
#[derive(Debug, Error)]
pub enum StlError {
    /// An argument was rejected before any storage was touched.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The path does not resolve to a file.
    #[error("file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    /// The input is not a well-formed STL file, or could not be read.
    #[error("failed to decode STL: {message}")]
    Decode {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    /// The mesh could not be written.
    #[error("failed to encode STL: {message}")]
    Encode {
        message: String,
        #[source]
        cause: Option<Cause>,
    },

    /// Cooperative cancellation was observed.
    #[error("operation cancelled")]
    Cancelled,
}

impl StlError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            cause: None,
        }
    }

    pub fn decode_with(message: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self::Decode {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
            cause: None,
        }
    }

    pub fn encode_with(message: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self::Encode {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_cause_is_preserved() {
        let parse_err = "abc".parse::<f32>().unwrap_err();
        let err = StlError::decode_with("line 3: bad number", parse_err);
        assert!(err.to_string().contains("line 3"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_cancelled_has_no_cause() {
        let err = StlError::Cancelled;
        assert!(err.is_cancelled());
        assert!(err.source().is_none());
    }
}
