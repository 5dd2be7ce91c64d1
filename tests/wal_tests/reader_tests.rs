//! Tests for WAL Reader
//!
//! These tests verify:
//! - Reading frames from one segment
//! - Torn and corrupt frame handling
//! - Replay across segments in order

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use atlaswal::wal::{encode_frame, segment, Entry, SegmentReader, WalReader};
use atlaswal::WalError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Write raw frames straight into segment `id`
fn write_frames(dir: &Path, id: u64, entries: &[Entry]) {
    let mut file = File::create(segment::segment_path(dir, id)).unwrap();
    for entry in entries {
        file.write_all(&encode_frame(entry).unwrap()).unwrap();
    }
    file.sync_all().unwrap();
}

fn entries(range: std::ops::RangeInclusive<u64>) -> Vec<Entry> {
    range
        .map(|seq| Entry::new(seq, format!("value{}", seq).into_bytes()))
        .collect()
}

// =============================================================================
// Segment Reader Tests
// =============================================================================

#[test]
fn test_read_empty_segment() {
    let temp = TempDir::new().unwrap();
    write_frames(temp.path(), 0, &[]);

    let mut reader = SegmentReader::open(&segment::segment_path(temp.path(), 0)).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_read_multiple_frames() {
    let temp = TempDir::new().unwrap();
    let written = entries(1..=4);
    write_frames(temp.path(), 0, &written);

    let reader = SegmentReader::open(&segment::segment_path(temp.path(), 0)).unwrap();
    let read: Vec<_> = reader.entries().collect::<Result<Vec<_>, _>>().unwrap();

    assert_eq!(read, written);
}

#[test]
fn test_position_advances_per_frame() {
    let temp = TempDir::new().unwrap();
    let written = entries(1..=2);
    write_frames(temp.path(), 0, &written);

    let first_len = encode_frame(&written[0]).unwrap().len() as u64;
    let mut reader = SegmentReader::open(&segment::segment_path(temp.path(), 0)).unwrap();

    reader.next_entry().unwrap().unwrap();
    assert_eq!(reader.position(), first_len);
}

#[test]
fn test_reader_bounded_by_length_at_open() {
    let temp = TempDir::new().unwrap();
    write_frames(temp.path(), 0, &entries(1..=2));

    let path = segment::segment_path(temp.path(), 0);
    let mut reader = SegmentReader::open(&path).unwrap();
    let len_at_open = reader.file_len();

    // A live WAL appends while the scan runs
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&encode_frame(&entries(3..=3)[0]).unwrap()).unwrap();
    drop(file);

    while reader.next_entry().unwrap().is_some() {}
    assert_eq!(reader.file_len(), len_at_open);
    assert_eq!(reader.position(), len_at_open);
    assert!(fs::metadata(&path).unwrap().len() > len_at_open);
}

#[test]
fn test_torn_length_prefix() {
    let temp = TempDir::new().unwrap();
    write_frames(temp.path(), 0, &entries(1..=1));

    let path = segment::segment_path(temp.path(), 0);
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[0x10, 0x00]).unwrap();

    let mut reader = SegmentReader::open(&path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(matches!(reader.next_entry(), Err(WalError::Corruption(_))));
}

#[test]
fn test_torn_frame_body() {
    let temp = TempDir::new().unwrap();
    let frame = encode_frame(&Entry::new(1, b"value1".to_vec())).unwrap();

    let path = segment::segment_path(temp.path(), 0);
    fs::write(&path, &frame[..frame.len() - 3]).unwrap();

    let mut reader = SegmentReader::open(&path).unwrap();
    assert!(matches!(reader.next_entry(), Err(WalError::Corruption(_))));
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_garbage_length_prefix() {
    let temp = TempDir::new().unwrap();
    let path = segment::segment_path(temp.path(), 0);
    fs::write(&path, i32::MAX.to_le_bytes()).unwrap();

    let mut reader = SegmentReader::open(&path).unwrap();
    assert!(matches!(reader.next_entry(), Err(WalError::Corruption(_))));
}

#[test]
fn test_iterator_stops_after_error() {
    let temp = TempDir::new().unwrap();
    let mut bytes = encode_frame(&Entry::new(1, b"ok".to_vec())).unwrap().to_vec();
    let mut bad = encode_frame(&Entry::new(2, b"bad".to_vec())).unwrap().to_vec();
    let last = bad.len() - 5;
    bad[last] ^= 0xFF; // payload byte
    bytes.extend_from_slice(&bad);
    bytes.extend_from_slice(&encode_frame(&Entry::new(3, b"unreached".to_vec())).unwrap());

    let path = segment::segment_path(temp.path(), 0);
    fs::write(&path, &bytes).unwrap();

    let results: Vec<_> = SegmentReader::open(&path).unwrap().entries().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(WalError::Integrity { .. })));
}

// =============================================================================
// Multi-Segment Tests
// =============================================================================

#[test]
fn test_wal_reader_spans_segments() {
    let temp = TempDir::new().unwrap();
    write_frames(temp.path(), 0, &entries(1..=3));
    write_frames(temp.path(), 1, &entries(4..=5));
    write_frames(temp.path(), 2, &[]);
    write_frames(temp.path(), 3, &entries(6..=6));

    let reader = WalReader::open(temp.path()).unwrap();
    let sequences: Vec<u64> = reader
        .map(|entry| entry.unwrap().sequence_number)
        .collect();

    assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_replay_counts_entries() {
    let temp = TempDir::new().unwrap();
    write_frames(temp.path(), 0, &entries(1..=3));
    write_frames(temp.path(), 1, &entries(4..=5));

    let mut payloads = Vec::new();
    let summary = WalReader::replay(temp.path(), |entry| {
        payloads.push(entry.payload.clone());
        Ok(())
    })
    .unwrap();

    assert_eq!(summary.entries, 5);
    assert_eq!(summary.last_sequence, 5);
    assert_eq!(summary.stopped_at, None);
    assert_eq!(payloads[0], b"value1");
    assert_eq!(payloads[4], b"value5");
}

#[test]
fn test_replay_stops_at_corruption() {
    let temp = TempDir::new().unwrap();
    write_frames(temp.path(), 0, &entries(1..=2));
    write_frames(temp.path(), 1, &entries(3..=4));

    // Tear the second segment after its first frame
    let first_len = encode_frame(&entries(3..=3)[0]).unwrap().len();
    let path = segment::segment_path(temp.path(), 1);
    let mut bytes = fs::read(&path).unwrap();
    bytes.truncate(first_len + 6);
    fs::write(&path, &bytes).unwrap();

    let summary = WalReader::replay(temp.path(), |_| Ok(())).unwrap();

    assert_eq!(summary.entries, 3);
    assert_eq!(summary.last_sequence, 3);
    assert_eq!(summary.stopped_at, Some((1, first_len as u64)));
}

#[test]
fn test_replay_propagates_callback_error() {
    let temp = TempDir::new().unwrap();
    write_frames(temp.path(), 0, &entries(1..=3));

    let result = WalReader::replay(temp.path(), |entry| {
        if entry.sequence_number == 2 {
            Err(WalError::Corruption("rejected by caller".to_string()))
        } else {
            Ok(())
        }
    });

    assert!(result.is_err());
}
