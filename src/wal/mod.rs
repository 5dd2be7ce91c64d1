//! Write-Ahead Log (WAL) Module
//!
//! On-disk building blocks of the log: frame codec, segment files, buffered
//! writer, reader and tail recovery. The engine that ties them together
//! lives in [`crate::engine`].
//!
//! ## Responsibilities
//! - CRC32 checksums for corruption detection
//! - Sequence numbers for ordering
//! - Segment naming, discovery and rotation targets
//! - Crash recovery and replay
//!
//! ## Segment Format
//! ```text
//! segment-<id>
//! ┌──────────────────────────────────────────────────────────┐
//! │ Frame 1                                                  │
//! │ ┌─────────┬────────────────────────────────────────────┐ │
//! │ │ Len (4) │ Entry (Len bytes, bincode)                 │ │
//! │ │ i32 LE  │ ┌─────┬─────────┬────────┬───────┬───────┐ │ │
//! │ │         │ │Ver 1│ Seq (8) │PLen (8)│Payload│CRC (4)│ │ │
//! │ │         │ └─────┴─────────┴────────┴───────┴───────┘ │ │
//! │ └─────────┴────────────────────────────────────────────┘ │
//! ├──────────────────────────────────────────────────────────┤
//! │ Frame 2 ...                                              │
//! └──────────────────────────────────────────────────────────┘
//! CRC = crc32(payload || seq as u8)
//! ```

mod entry;
mod reader;
mod recovery;
pub mod segment;
mod writer;

pub use entry::{
    checksum, encode_frame, frame_len, parse_frame_len, Entry, ENTRY_OVERHEAD, ENTRY_VERSION,
    FRAME_HEADER_SIZE, MAX_FRAME_SIZE,
};
pub use reader::{ReplaySummary, SegmentEntries, SegmentReader, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use segment::SEGMENT_PREFIX;
pub use writer::{SegmentFile, SegmentWriter};
