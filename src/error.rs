//! Error types for batch generation.
//!
//! Every fallible operation in the crate returns [`Result`], whose error
//! type is [`BatchError`]. Configuration problems are reported at
//! construction time; indexing problems are reported when a batch is
//! requested. Array backend failures propagate unchanged.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Errors raised while configuring a generator or producing batches.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Invalid generator configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required data variable (e.g. `targets`) is absent from the dataset.
    #[error("dataset must have a '{0}' variable")]
    MissingVariable(String),

    /// A named dimension does not exist on the array.
    #[error("dimension not found: {0}")]
    MissingDimension(String),

    /// A coordinate label used in a selection does not exist.
    #[error("label '{label}' not found on dimension '{dim}'")]
    LabelNotFound {
        /// Dimension that was searched
        dim: String,
        /// Missing label
        label: String,
    },

    /// Array reshape or construction failure.
    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reading or writing `.npy` data.
    #[error("npy error: {0}")]
    Npy(String),

    /// Failure (de)serializing configuration or metadata.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Batch index at or beyond the number of batches.
    #[error("batch index {index} out of range for {len} batches")]
    IndexOutOfRange {
        /// Requested index (before wrap-around)
        index: isize,
        /// Number of batches per epoch
        len: usize,
    },

    /// Sample start offset that does not leave room for a full window.
    #[error("sample offset {sample} out of range (n_sample = {n_sample})")]
    SampleOutOfRange {
        /// Requested start offset
        sample: usize,
        /// Number of valid start offsets
        n_sample: usize,
    },

    /// Failure reported by the model collaborator.
    #[error("model error: {0}")]
    Model(String),

    /// Operation not supported for this data layout.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Anything else.
    #[error("{0}")]
    Generic(String),
}

impl BatchError {
    /// Create a generic error from any message.
    pub fn generic(msg: impl Into<String>) -> Self {
        BatchError::Generic(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        BatchError::Config(msg.into())
    }

    /// Whether this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, BatchError::Config(_))
    }
}

impl From<ndarray_npy::ReadNpyError> for BatchError {
    fn from(e: ndarray_npy::ReadNpyError) -> Self {
        BatchError::Npy(e.to_string())
    }
}

impl From<ndarray_npy::WriteNpyError> for BatchError {
    fn from(e: ndarray_npy::WriteNpyError) -> Self {
        BatchError::Npy(e.to_string())
    }
}

impl From<serde_json::Error> for BatchError {
    fn from(e: serde_json::Error) -> Self {
        BatchError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for BatchError {
    fn from(e: toml::ser::Error) -> Self {
        BatchError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for BatchError {
    fn from(e: toml::de::Error) -> Self {
        BatchError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = BatchError::MissingVariable("targets".to_string());
        assert_eq!(err.to_string(), "dataset must have a 'targets' variable");

        let err = BatchError::IndexOutOfRange { index: 4, len: 4 };
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_config_helper() {
        let err = BatchError::config("batch_size must be positive");
        assert!(err.is_config());
        assert!(!BatchError::generic("x").is_config());
    }
}
