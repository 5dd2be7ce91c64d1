//! Tests for the background sync scheduler wired into the WAL
//!
//! These tests verify:
//! - Buffered frames reach the segment without an explicit sync
//! - Close stops the scheduler cleanly

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use atlaswal::wal::segment;
use atlaswal::{DurabilityMode, Wal, WalConfig};

use crate::common::{read_segment, setup_temp_dir};

fn fast_sync_config(dir: &std::path::Path) -> WalConfig {
    WalConfig::builder()
        .dir(dir)
        .durability(DurabilityMode::Buffered)
        .sync_interval(Duration::from_millis(20))
        .build()
}

#[test]
fn test_scheduler_flushes_buffered_frames() {
    let (_temp, dir) = setup_temp_dir();
    let wal = Wal::open(fast_sync_config(&dir)).unwrap();

    wal.append(b"value1").unwrap();
    wal.append(b"value2").unwrap();

    // Poll until the timer has fired
    let path = segment::segment_path(&dir, 0);
    let deadline = Instant::now() + Duration::from_secs(5);
    while fs::metadata(&path).unwrap().len() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    let entries = read_segment(&dir, 0);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].payload, b"value1");

    wal.close().unwrap();
}

#[test]
fn test_close_while_writers_and_scheduler_run() {
    let (_temp, dir) = setup_temp_dir();
    let wal = Arc::new(Wal::open(fast_sync_config(&dir)).unwrap());

    let writer = {
        let wal = Arc::clone(&wal);
        thread::spawn(move || {
            let mut written = 0u64;
            // Writes start failing with Closed once close() lands
            while wal.append(b"payload").is_ok() {
                written += 1;
                if written % 50 == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            written
        })
    };

    thread::sleep(Duration::from_millis(100));
    wal.close().unwrap();
    let written = writer.join().unwrap();

    assert!(wal.is_closed());
    assert_eq!(wal.sequence_number(), written);

    // Everything accepted before close is on disk, in order
    let sequences: Vec<u64> = read_segment(&dir, 0).iter().map(|e| e.sequence_number).collect();
    assert_eq!(sequences, (1..=written).collect::<Vec<_>>());
}
