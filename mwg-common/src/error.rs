//! Error handling for the memory workload generator
//!
//! Every configuration problem is reported through [`GeneratorError`] before
//! a single line of C is emitted. Generation is all-or-nothing: a caller that
//! receives an error has no partial sections to clean up.

use thiserror::Error;

/// Main generator error type that encompasses resolution, emission and output
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Unknown access pattern '{name}' (known: {known})")]
    UnknownPattern { name: String, known: String },

    #[error("Unknown allocator '{name}' (known: {known})")]
    UnknownAllocator { name: String, known: String },

    #[error("Unknown instrumentation '{name}' (known: {known})")]
    UnknownInstrumentation { name: String, known: String },

    #[error("Unknown data type '{name}' (known: int, long, float, double)")]
    UnknownDataType { name: String },

    #[error("Invalid alignment {value}: must be a positive multiple of 8")]
    InvalidAlignment { value: u64 },

    #[error("Memory alignment is not supported by allocator '{allocator}'")]
    UnsupportedAlignment { allocator: String },

    #[error("Allocator '{allocator}' requires an allocation location: {hint}")]
    MissingLocation { allocator: String, hint: String },

    #[error("Allocator '{allocator}' does not support an allocation location (got '{location}')")]
    UnexpectedLocation { allocator: String, location: String },

    #[error("Allocation location '{location}' is invalid for allocator '{allocator}': {hint}")]
    InvalidLocation {
        allocator: String,
        location: String,
        hint: String,
    },

    #[error("Allocator '{allocator}' can only be used with parallel execution enabled")]
    RequiresParallel { allocator: String },

    #[error("Malformed size '{input}'")]
    InvalidSize { input: String },

    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    #[error("Template error: {message}")]
    Template { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl GeneratorError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(name: &str, message: impl Into<String>) -> Self {
        GeneratorError::InvalidParameter {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error stems from the configuration rather than from output handling
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, GeneratorError::Template { .. } | GeneratorError::Io { .. })
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for GeneratorError {
    fn from(err: std::io::Error) -> Self {
        GeneratorError::Io {
            message: err.to_string(),
        }
    }
}

/// Result alias used across the generator crates
pub type Result<T> = std::result::Result<T, GeneratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GeneratorError::InvalidAlignment { value: 7 };
        assert_eq!(
            err.to_string(),
            "Invalid alignment 7: must be a positive multiple of 8"
        );

        let err = GeneratorError::RequiresParallel {
            allocator: "openmp".to_string(),
        };
        assert!(err.to_string().contains("parallel"));
    }

    #[test]
    fn test_configuration_error_classification() {
        assert!(GeneratorError::invalid_parameter("size", "must be positive").is_configuration_error());
        assert!(GeneratorError::UnsupportedAlignment {
            allocator: "libnuma".to_string()
        }
        .is_configuration_error());
        assert!(!GeneratorError::Template {
            message: "bad".to_string()
        }
        .is_configuration_error());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: GeneratorError = io.into();
        assert!(matches!(err, GeneratorError::Io { .. }));
        assert!(!err.is_configuration_error());
    }
}
