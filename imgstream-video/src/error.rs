//! Conversion error types

/// The storage behind a plane was reclaimed or already released
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("buffer is inaccessible: {reason}")]
pub struct BufferAccessError {
    reason: String,
}

impl BufferAccessError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error(transparent)]
    BufferAccess(#[from] BufferAccessError),
    #[error("4:2:0 conversion requires even dimensions, got {width}x{height}")]
    OddDimensions { width: u32, height: u32 },
    #[error("expected {expected} planes, frame has {actual}")]
    PlaneCount { expected: usize, actual: usize },
    #[error("plane {plane} holds {available} bytes, strides address {required}")]
    PlaneTooSmall {
        plane: usize,
        required: usize,
        available: usize,
    },
}

/// Coarse error classification reported to stream consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BufferAccess,
    InvalidFrame,
}

impl ErrorKind {
    /// Stable code string delivered alongside the message
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::BufferAccess => "BufferAccessFault",
            ErrorKind::InvalidFrame => "InvalidFrame",
        }
    }
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::BufferAccess(_) => ErrorKind::BufferAccess,
            ConvertError::OddDimensions { .. }
            | ConvertError::PlaneCount { .. }
            | ConvertError::PlaneTooSmall { .. } => ErrorKind::InvalidFrame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: ConvertError = BufferAccessError::new("reclaimed").into();
        assert_eq!(err.kind(), ErrorKind::BufferAccess);
        assert_eq!(err.to_string(), "buffer is inaccessible: reclaimed");

        let err = ConvertError::OddDimensions {
            width: 3,
            height: 2,
        };
        assert_eq!(err.kind().code(), "InvalidFrame");
    }
}
