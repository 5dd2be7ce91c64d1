//! # AtlasWAL
//!
//! A segmented, crash-durable write-ahead log with:
//! - Length-prefixed, CRC32-checked frames
//! - Strictly increasing sequence numbers under a single writer lock
//! - Segment rotation at a configurable size limit
//! - Timed background flush/fsync
//! - Torn-tail recovery and ordered replay
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Callers (any thread)                      │
//! │             write(payload, checkpoint) / sync()              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │            ┌─────────────────────────┐
//! ┌─────────────────────▼─────────┐  │     Sync Scheduler      │
//! │          WAL Engine           │◀─┤  (background thread,    │
//! │   (one Mutex: seq, writer,    │  │   fixed interval)       │
//! │    segment list)              │  └─────────────────────────┘
//! └──────────┬──────────┬─────────┘
//!            │          │
//!            ▼          ▼
//!   ┌─────────────┐  ┌─────────────┐
//!   │ Frame Codec │  │   Segment   │
//!   │ (len + CRC) │  │    Store    │
//!   └─────────────┘  └──────┬──────┘
//!                           ▼
//!                  segment-0, segment-1, ...
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod record;
pub mod scheduler;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, WalError};
pub use config::{DurabilityMode, SegmentOverflowPolicy, WalConfig};
pub use engine::{Wal, WalState};
pub use record::Operation;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasWAL
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
