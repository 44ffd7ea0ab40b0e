//! Error types for aparentar
//!
//! A single crate-wide error enum plus a `Result` alias. Extraction and
//! inference are pure functions of their inputs, so no variant is retried
//! internally; every error carries enough context (expected vs. actual
//! length, shape, or key) to diagnose a model/weights mismatch at the caller.

use thiserror::Error;

/// Errors that can occur during weight extraction or inference
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AparentarError {
    /// Inference was attempted before any parameters were loaded
    #[error("Model '{model}' is not loaded - load weights before running inference")]
    NotLoaded {
        /// Name of the model that was invoked
        model: String,
    },

    /// Flat weight buffer is too short, has a wrong length, or a tensor
    /// arrived with dimensions that contradict the fixed layout
    #[error("Malformed weights: {reason}")]
    MalformedWeights {
        /// What was wrong, with expected vs. actual values
        reason: String,
    },

    /// A required key was absent from a named tensor map
    #[error("Missing parameter '{key}' in weight map")]
    MissingParameter {
        /// The key that could not be resolved
        key: String,
    },

    /// Failure propagated unchanged from the backbone collaborator
    #[error("Backbone error: {reason}")]
    Backbone {
        /// Message reported by the collaborator
        reason: String,
    },

    /// Strict-mode dispose was called on an already-disposed model
    #[error("Model '{model}' is already disposed")]
    AlreadyDisposed {
        /// Name of the model that was disposed twice
        model: String,
    },

    /// Invalid tensor shape for construction or arithmetic
    #[error("Invalid shape: {reason}")]
    InvalidShape {
        /// Description of the shape problem
        reason: String,
    },

    /// Data length does not match the product of the requested dimensions
    #[error("Data size {data_size} does not match shape {shape:?} (expected {expected})")]
    DataShapeMismatch {
        /// Number of scalars supplied
        data_size: usize,
        /// Requested shape
        shape: Vec<usize>,
        /// Product of the requested dimensions
        expected: usize,
    },

    /// Weight file or bundle could not be decoded
    #[error("Format error: {reason}")]
    FormatError {
        /// What part of the file was malformed
        reason: String,
    },

    /// I/O error while opening or reading a weight file
    #[error("IO error: {message}")]
    IoError {
        /// Underlying OS error text
        message: String,
    },
}

/// Result type alias for aparentar operations
pub type Result<T> = std::result::Result<T, AparentarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_loaded_display() {
        let err = AparentarError::NotLoaded {
            model: "AgeGenderNet".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("AgeGenderNet"));
        assert!(msg.contains("not loaded"));
    }

    #[test]
    fn test_malformed_weights_display() {
        let err = AparentarError::MalformedWeights {
            reason: "expected 1539 floats, got 100".to_string(),
        };
        assert!(err.to_string().contains("expected 1539 floats, got 100"));
    }

    #[test]
    fn test_missing_parameter_names_key() {
        let err = AparentarError::MissingParameter {
            key: "fc/age/weights".to_string(),
        };
        assert!(err.to_string().contains("fc/age/weights"));
    }

    #[test]
    fn test_data_shape_mismatch_display() {
        let err = AparentarError::DataShapeMismatch {
            data_size: 10,
            shape: vec![512, 1],
            expected: 512,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("512"));
    }

    #[test]
    fn test_errors_are_comparable() {
        let a = AparentarError::AlreadyDisposed {
            model: "AgeGenderNet".to_string(),
        };
        let b = AparentarError::AlreadyDisposed {
            model: "AgeGenderNet".to_string(),
        };
        assert_eq!(a, b);
    }
}
