//! Model error types

use std::path::PathBuf;

use thiserror::Error;

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur creating or reading models
#[derive(Debug, Error)]
pub enum ModelError {
    /// Source file couldn't be opened or decoded
    #[error("Failed to load {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    /// Source has no audio channels
    #[error("Source has no channels")]
    NoChannels,

    /// Requested channel doesn't exist
    #[error("Channel {channel} out of range (model has {count})")]
    ChannelOutOfRange { channel: usize, count: usize },

    /// A transform or plugin needed to build the model isn't installed
    #[error("Transform \"{name}\" is not available. Check that the plugin providing it is installed.")]
    TransformUnavailable { name: String },

    /// Background thread couldn't be spawned
    #[error("Failed to start background thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}
