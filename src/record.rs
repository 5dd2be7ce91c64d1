//! Record definitions
//!
//! The caller-facing shape of a logged mutation. The WAL itself only stores
//! opaque payloads; callers that want a ready-made record format can encode
//! one of these and hand the bytes to [`crate::Wal::write`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, WalError};

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    /// The key this operation touches
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }

    /// Encode as a WAL payload
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| WalError::Encoding(e.to_string()))
    }

    /// Decode a WAL payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| WalError::Corruption(format!("cannot parse record: {}", e)))
    }
}
