//! WAL Recovery
//!
//! Validates the tail of a segment after an unclean shutdown.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;

use super::reader::SegmentReader;

/// Handles segment recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of valid entries in the segment
    pub entries_recovered: u64,

    /// Sequence number of the last valid entry (0 if none)
    pub last_sequence: u64,

    /// Length of the valid prefix of the segment
    pub valid_bytes: u64,

    /// Bytes after the valid prefix (torn or corrupt frames)
    pub bytes_discarded: u64,

    /// Whether the file was cut back to `valid_bytes`
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover a segment file
    ///
    /// This will:
    /// 1. Scan frames from the start
    /// 2. Stop at the first frame that fails length, parse or checksum checks
    /// 3. Truncate everything from that frame on (a torn write)
    /// 4. Report the last valid sequence number
    pub fn recover(path: &Path) -> Result<RecoveryResult> {
        let mut result = Self::verify(path)?;

        if result.bytes_discarded > 0 {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_bytes)?;
            file.sync_all()?;
            result.was_truncated = true;

            tracing::warn!(
                path = %path.display(),
                valid_bytes = result.valid_bytes,
                discarded = result.bytes_discarded,
                last_sequence = result.last_sequence,
                "truncated torn segment tail"
            );
        }

        Ok(result)
    }

    /// Scan a segment without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let mut reader = SegmentReader::open(path)?;
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    result.entries_recovered += 1;
                    result.last_sequence = entry.sequence_number;
                }
                Ok(None) => break,
                Err(e) if e.is_corruption() => {
                    tracing::debug!(path = %path.display(), error = %e, "invalid frame");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        result.valid_bytes = reader.position();
        // Measured against the length the scan was bounded by, so a file
        // growing under a live WAL can't make this underflow
        result.bytes_discarded = reader.file_len().saturating_sub(result.valid_bytes);
        Ok(result)
    }
}
