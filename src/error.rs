use thiserror::Error;

/// Errors raised while building or evaluating a math transform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Unknown operation method: {0}")]
    UnknownMethod(String),

    #[error("Incompatible units: {0}")]
    IncompatibleUnits(String),

    #[error("Axis mismatch: {0}")]
    AxisMismatch(String),

    #[error("Transform is not invertible: {0}")]
    NonInvertible(String),

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Transform failed: {0}")]
    TransformFailed(String),
}

/// Errors raised by the coordinate operation factory.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    #[error("No coordinate operation found: {message}")]
    OperationNotFound {
        message: String,
        #[source]
        cause: Option<Box<OperationError>>,
    },

    #[error("Construction failure: {0}")]
    ConstructionFailure(String),

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Not invertible: {0}")]
    NonInvertible(String),
}

impl OperationError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::OperationNotFound {
            message: message.into(),
            cause: None,
        }
    }

    pub fn not_found_caused_by(message: impl Into<String>, cause: OperationError) -> Self {
        Self::OperationNotFound {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::OperationNotFound { .. })
    }
}

impl From<TransformError> for OperationError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::NonInvertible(msg) => Self::NonInvertible(msg),
            TransformError::DimensionMismatch { expected, found } => {
                Self::DimensionMismatch { expected, found }
            }
            TransformError::AxisMismatch(msg) => Self::not_found(msg),
            other => Self::ConstructionFailure(other.to_string()),
        }
    }
}

/// Error reported by an external operation authority. Always soft: the
/// factory logs it and falls back to the generic path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthorityError {
    #[error("Authority lookup failed: {0}")]
    Lookup(String),

    #[error("Unknown authority code: {0}")]
    UnknownCode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_transform_error_conversion_keeps_kind() {
        let err: OperationError = TransformError::NonInvertible("singular".into()).into();
        assert!(matches!(err, OperationError::NonInvertible(_)));

        let err: OperationError = TransformError::DimensionMismatch {
            expected: 2,
            found: 3,
        }
        .into();
        assert_eq!(
            err,
            OperationError::DimensionMismatch {
                expected: 2,
                found: 3
            }
        );

        let err: OperationError = TransformError::AxisMismatch("no height".into()).into();
        assert!(err.is_not_found());

        let err: OperationError = TransformError::InvalidParameter("semi_major".into()).into();
        assert!(matches!(err, OperationError::ConstructionFailure(_)));
    }

    #[test]
    fn test_not_found_chains_cause() {
        let inner = OperationError::NonInvertible("conversion".into());
        let outer = OperationError::not_found_caused_by("UTM to WGS84", inner.clone());
        let source = outer.source().expect("cause should be exposed");
        assert_eq!(source.to_string(), inner.to_string());
    }
}
