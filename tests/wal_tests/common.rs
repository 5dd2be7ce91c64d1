//! Shared helpers for the WAL tests

use std::path::{Path, PathBuf};
use std::time::Duration;

use atlaswal::wal::{segment, Entry, SegmentReader};
use atlaswal::{DurabilityMode, WalConfig};
use tempfile::TempDir;

/// Temp directory plus the WAL directory inside it
pub fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_dir = temp_dir.path().join("wal");
    (temp_dir, wal_dir)
}

/// Config with a long sync interval so the scheduler stays out of the way
pub fn test_config(dir: &Path) -> WalConfig {
    WalConfig::builder()
        .dir(dir)
        .durability(DurabilityMode::FsyncOnSync)
        .max_segment_size(1024 * 1024)
        .max_segment_count(16)
        .sync_interval(Duration::from_secs(60))
        .build()
}

/// All entries of one segment (panics on a bad frame)
pub fn read_segment(dir: &Path, id: u64) -> Vec<Entry> {
    let reader = SegmentReader::open(&segment::segment_path(dir, id)).unwrap();
    reader.entries().collect::<Result<Vec<_>, _>>().unwrap()
}
