//! Error handling for the disperse pipeline
//!
//! A single error type covers configuration, lifecycle and GPU failures so that
//! misconfiguration is reported before any GPU memory is allocated.

use crate::gpu::{BufferHandle, KernelHandle, MeshHandle};

/// Main error type for disperse-mesh
#[derive(Debug, thiserror::Error)]
pub enum DisperseError {
    // Configuration Errors
    #[error("Invalid config: {field} = {value} ({reason})")]
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Config load failed for {path}: {error}")]
    ConfigLoad { path: String, error: String },

    #[error("Config parse error: {error}")]
    ConfigParse { error: String },

    // Setup Errors
    #[error("Compute kernel not found: {name}")]
    KernelNotFound { name: String },

    #[error("Mesh not found: {mesh:?}")]
    MeshNotFound { mesh: MeshHandle },

    #[error("Mesh {mesh:?} has an empty index buffer")]
    EmptyMesh { mesh: MeshHandle },

    #[error("{count} instances requested; the backend supports at most {limit}")]
    InstanceLimitExceeded { count: u32, limit: u32 },

    // Lifecycle Errors
    #[error("Rendering already active; stop before starting again")]
    AlreadyActive,

    #[error("Rendering not active")]
    NotActive,

    // GPU Errors
    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: u64, actual: u64 },

    #[error("Unknown buffer: {buffer:?}")]
    UnknownBuffer { buffer: BufferHandle },

    #[error("Unknown kernel: {kernel:?}")]
    UnknownKernel { kernel: KernelHandle },

    #[error("Unknown binding name: {name}")]
    UnknownBinding { name: String },

    #[error("GPU operation '{operation}' failed: {error}")]
    GpuOperationFailed { operation: String, error: String },
}

/// Type alias for Results in disperse-mesh
pub type DisperseResult<T> = Result<T, DisperseError>;

impl DisperseError {
    pub fn invalid_config(
        field: impl Into<String>,
        value: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        DisperseError::InvalidConfig {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn gpu(operation: impl Into<String>, error: impl std::fmt::Display) -> Self {
        DisperseError::GpuOperationFailed {
            operation: operation.into(),
            error: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for DisperseError {
    fn from(error: toml::de::Error) -> Self {
        DisperseError::ConfigParse {
            error: error.to_string(),
        }
    }
}

/// Convert Option to Result with context
pub trait OptionExt<T> {
    fn ok_or_disperse<F>(self, f: F) -> DisperseResult<T>
    where
        F: FnOnce() -> DisperseError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_disperse<F>(self, f: F) -> DisperseResult<T>
    where
        F: FnOnce() -> DisperseError,
    {
        self.ok_or_else(f)
    }
}

/// Extension trait for attaching the failing GPU operation to an error
pub trait ErrorContext<T> {
    fn gpu_context(self, operation: &str) -> DisperseResult<T>;
}

impl<T, E: std::fmt::Display> ErrorContext<T> for Result<T, E> {
    fn gpu_context(self, operation: &str) -> DisperseResult<T> {
        self.map_err(|e| DisperseError::gpu(operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DisperseError::BufferSizeMismatch {
            expected: 192,
            actual: 96,
        };
        assert_eq!(err.to_string(), "Buffer size mismatch: expected 192, got 96");

        let err = DisperseError::invalid_config("count", 0, "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid config: count = 0 (must be greater than 0)"
        );
    }

    #[test]
    fn test_option_ext() {
        let opt: Option<u32> = None;
        let result = opt.ok_or_disperse(|| DisperseError::KernelNotFound {
            name: "CSMain".to_string(),
        });
        assert!(matches!(result, Err(DisperseError::KernelNotFound { .. })));
    }

    #[test]
    fn test_gpu_context() {
        let result: Result<(), &str> = Err("device lost");
        let err = result.gpu_context("write_buffer").unwrap_err();
        assert_eq!(
            err.to_string(),
            "GPU operation 'write_buffer' failed: device lost"
        );
    }
}
