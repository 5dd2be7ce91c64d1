//! Error types for AtlasWAL
//!
//! Provides a unified error type for all WAL operations.

use thiserror::Error;

/// Result type alias using WalError
pub type Result<T> = std::result::Result<T, WalError>;

/// Unified error type for AtlasWAL operations
#[derive(Debug, Error)]
pub enum WalError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Frame Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    Corruption(String),

    #[error(
        "checksum mismatch for entry {sequence_number}: stored {expected:#010x}, computed {actual:#010x}"
    )]
    Integrity {
        sequence_number: u64,
        expected: u32,
        actual: u32,
    },

    #[error("Payload too large: frame of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    /// Serializing an in-memory entry failed. Never retryable.
    #[error("Encoding error: {0}")]
    Encoding(String),

    // -------------------------------------------------------------------------
    // Segment Errors
    // -------------------------------------------------------------------------
    #[error("Unexpected file in WAL directory: {0}")]
    CorruptNaming(String),

    #[error("Segment limit reached: at most {max} segments allowed")]
    SegmentLimit { max: usize },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("WAL is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WalError {
    /// True for errors that mean a frame on disk is unusable
    /// (replay should stop at that frame).
    pub fn is_corruption(&self) -> bool {
        matches!(self, WalError::Corruption(_) | WalError::Integrity { .. })
    }
}
