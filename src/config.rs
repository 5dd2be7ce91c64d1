//! Configuration for AtlasWAL
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, WalError};

/// Main configuration for a WAL instance
#[derive(Debug, Clone)]
pub struct WalConfig {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding the segment files
    /// Internal structure:
    ///   {dir}/
    ///     ├── segment-0
    ///     ├── segment-1
    ///     └── ...
    pub dir: PathBuf,

    /// Rotate to a new segment before a frame would push the active one past this size (bytes)
    pub max_segment_size: u64,

    /// Maximum number of segment files kept in `dir`
    pub max_segment_count: usize,

    /// What happens when rotation would exceed `max_segment_count`
    pub overflow_policy: SegmentOverflowPolicy,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// How hard each write and sync pushes data towards the disk
    pub durability: DurabilityMode,

    /// Interval of the background sync timer
    pub sync_interval: Duration,

    /// Capacity of the in-process write buffer (bytes)
    pub write_buffer_capacity: usize,
}

/// Durability strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// Writes stay in the buffer until a sync; sync hands them to the OS
    /// but never fsyncs.
    Buffered,

    /// Writes stay in the buffer until a sync; sync flushes and fsyncs.
    FsyncOnSync,

    /// Every write is flushed to the OS; sync additionally fsyncs.
    FlushOnWrite,

    /// Every write is flushed and fsynced before it returns (safest, slowest).
    FsyncOnWrite,
}

impl DurabilityMode {
    /// Whether `sync()` must fsync the active segment
    pub fn fsync_on_sync(self) -> bool {
        !matches!(self, DurabilityMode::Buffered)
    }

    /// Whether each write is flushed out of the buffer before returning
    pub fn flush_on_write(self) -> bool {
        matches!(
            self,
            DurabilityMode::FlushOnWrite | DurabilityMode::FsyncOnWrite
        )
    }

    /// Whether each write is fsynced before returning
    pub fn fsync_on_write(self) -> bool {
        matches!(self, DurabilityMode::FsyncOnWrite)
    }
}

impl From<bool> for DurabilityMode {
    /// `true` = "fsync on flush", `false` = buffered only
    fn from(fsync: bool) -> Self {
        if fsync {
            DurabilityMode::FsyncOnSync
        } else {
            DurabilityMode::Buffered
        }
    }
}

/// Policy applied when a rotation would exceed `max_segment_count`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOverflowPolicy {
    /// Refuse the write with `WalError::SegmentLimit`
    Reject,

    /// Delete the oldest segment(s) to make room
    RecycleOldest,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./atlaswal_data"),
            max_segment_size: 16 * 1024 * 1024, // 16 MB
            max_segment_count: 1024,
            overflow_policy: SegmentOverflowPolicy::Reject,
            durability: DurabilityMode::FsyncOnSync,
            sync_interval: Duration::from_millis(200),
            write_buffer_capacity: 64 * 1024, // 64 KB
        }
    }
}

impl WalConfig {
    /// Create a new config builder
    pub fn builder() -> WalConfigBuilder {
        WalConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(WalError::Config(
                "max_segment_size must be greater than zero".to_string(),
            ));
        }
        if self.max_segment_count == 0 {
            return Err(WalError::Config(
                "max_segment_count must be at least 1".to_string(),
            ));
        }
        if self.sync_interval.is_zero() {
            return Err(WalError::Config(
                "sync_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for WalConfig
#[derive(Default)]
pub struct WalConfigBuilder {
    config: WalConfig,
}

impl WalConfigBuilder {
    /// Set the segment directory
    pub fn dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dir = path.into();
        self
    }

    /// Set the durability mode
    pub fn durability(mut self, mode: impl Into<DurabilityMode>) -> Self {
        self.config.durability = mode.into();
        self
    }

    /// Set the maximum segment size (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the maximum number of segments
    pub fn max_segment_count(mut self, count: usize) -> Self {
        self.config.max_segment_count = count;
        self
    }

    /// Set the segment overflow policy
    pub fn overflow_policy(mut self, policy: SegmentOverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    /// Set the background sync interval
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.sync_interval = interval;
        self
    }

    /// Set the write buffer capacity (in bytes)
    pub fn write_buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.write_buffer_capacity = capacity;
        self
    }

    pub fn build(self) -> WalConfig {
        self.config
    }
}
