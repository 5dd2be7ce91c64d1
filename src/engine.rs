//! Engine Module
//!
//! The WAL engine that owns the active segment and orders every write.
//!
//! ## Responsibilities
//! - Assign sequence numbers under a single lock
//! - Append framed entries through the buffered segment writer
//! - Rotate segments at the size limit, enforce the segment-count policy
//! - Coordinate manual, scheduled and checkpoint syncs
//! - Recover the active segment tail on startup

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{SegmentOverflowPolicy, WalConfig};
use crate::error::{Result, WalError};
use crate::scheduler::SyncScheduler;
use crate::wal::segment::{self, segment_path};
use crate::wal::{
    encode_frame, frame_len, Entry, SegmentWriter, WalRecovery, FRAME_HEADER_SIZE, MAX_FRAME_SIZE,
};

/// Lifecycle of a WAL instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalState {
    /// Accepting writes
    Open,
    /// Terminal; every operation except `close` fails with `WalError::Closed`
    Closed,
}

/// The write-ahead log
///
/// ## Concurrency Model
///
/// - One `parking_lot::Mutex` guards all mutable state (sequence counter,
///   segment writer, segment list). `write`, `sync`, `checkpoint`, the
///   scheduled sync and `close` each hold it for their whole critical
///   section, so writes are totally ordered and on-disk frame order equals
///   sequence order.
/// - The sync scheduler runs on its own thread and only ever reaches the
///   state through the same lock.
/// - Share across threads with `Arc<Wal>`.
pub struct Wal {
    /// Engine configuration
    config: WalConfig,

    /// All mutable state, behind the single WAL lock
    inner: Arc<Mutex<WalInner>>,

    /// Background sync thread (None once stopped)
    scheduler: Mutex<Option<SyncScheduler>>,
}

/// State protected by the WAL lock
struct WalInner {
    config: WalConfig,
    state: WalState,
    /// Writer over the active segment (None once closed)
    writer: Option<SegmentWriter>,
    /// Last assigned sequence number
    sequence_number: u64,
    /// Segment ids on disk, ascending; the last one is active
    segment_ids: VecDeque<u64>,
    /// Sequence number covered by the last checkpoint
    last_checkpoint: Option<u64>,
}

impl Wal {
    /// Open or create a WAL with the given config
    ///
    /// On startup:
    /// 1. Create the directory if it doesn't exist
    /// 2. Discover segments; create segment 0 if there are none
    /// 3. Recover the highest segment (truncate a torn tail)
    /// 4. Restore the sequence counter from the last valid entry
    /// 5. Open the active segment for append and start the sync scheduler
    pub fn open(config: WalConfig) -> Result<Self> {
        config.validate()?;

        // Step 1: Directory
        fs::create_dir_all(&config.dir)?;
        let dir = config.dir.as_path();

        // Step 2: Discover segments
        let mut segment_ids = segment::discover_segments(dir)?;
        let active_id = match segment::highest_id(&segment_ids) {
            Some(id) => id,
            None => {
                segment::create_segment(dir, 0)?;
                segment::sync_dir(dir)?;
                segment_ids.push(0);
                0
            }
        };

        // Step 3: Recover the active segment
        let recovery = WalRecovery::recover(&segment_path(dir, active_id))?;

        // Step 4: Restore the sequence counter
        let sequence_number = if recovery.entries_recovered > 0 {
            recovery.last_sequence
        } else {
            Self::last_sequence_before(dir, &segment_ids, active_id)?
        };

        // Step 5: Writer + scheduler
        let writer = SegmentWriter::open(dir, active_id, config.write_buffer_capacity)?;

        let inner = Arc::new(Mutex::new(WalInner {
            config: config.clone(),
            state: WalState::Open,
            writer: Some(writer),
            sequence_number,
            segment_ids: segment_ids.into_iter().collect(),
            last_checkpoint: None,
        }));

        let weak = Arc::downgrade(&inner);
        let scheduler = SyncScheduler::spawn(config.sync_interval, move || {
            let inner = weak.upgrade().ok_or(WalError::Closed)?;
            let mut guard = inner.lock();
            guard.sync()
        })?;

        tracing::info!(
            dir = %dir.display(),
            active_segment = active_id,
            sequence_number,
            truncated = recovery.was_truncated,
            "WAL opened"
        );

        Ok(Self {
            config,
            inner,
            scheduler: Mutex::new(Some(scheduler)),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = WalConfig::builder().dir(path).build();
        Self::open(config)
    }

    /// Last sequence number stored in any segment older than `active_id`
    fn last_sequence_before(dir: &Path, segment_ids: &[u64], active_id: u64) -> Result<u64> {
        for &id in segment_ids.iter().rev().filter(|&&id| id < active_id) {
            let result = WalRecovery::verify(&segment_path(dir, id))?;
            if result.entries_recovered > 0 {
                return Ok(result.last_sequence);
            }
        }
        Ok(0)
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Write a record payload
    ///
    /// With `is_checkpoint` set nothing is appended: buffered data is flushed
    /// and fsynced and a checkpoint is recorded at the current sequence
    /// number, which is returned. Otherwise the payload is appended as a new
    /// entry and its sequence number is returned.
    pub fn write(&self, payload: &[u8], is_checkpoint: bool) -> Result<u64> {
        let result = {
            let mut inner = self.inner.lock();
            if is_checkpoint {
                inner.checkpoint()
            } else {
                inner.append(payload)
            }
        };

        if is_checkpoint && result.is_ok() {
            self.reset_timer();
        }
        result
    }

    /// Append a payload (same as `write(payload, false)`)
    pub fn append(&self, payload: &[u8]) -> Result<u64> {
        self.write(payload, false)
    }

    /// Flush buffered frames to the OS, fsyncing unless the mode is `Buffered`
    ///
    /// Restarts the background sync timer.
    pub fn sync(&self) -> Result<()> {
        self.inner.lock().sync()?;
        self.reset_timer();
        Ok(())
    }

    /// Flush and fsync regardless of durability mode, and record a checkpoint
    pub fn checkpoint(&self) -> Result<u64> {
        self.write(&[], true)
    }

    /// Close the WAL
    ///
    /// Stops the sync scheduler, flushes remaining frames and releases the
    /// segment file. Calling it again is a no-op.
    pub fn close(&self) -> Result<()> {
        // Stop the scheduler first, outside the state lock: it may be waiting
        // on that lock for a sync.
        let scheduler = self.scheduler.lock().take();
        if let Some(mut scheduler) = scheduler {
            scheduler.stop();
        }

        let mut inner = self.inner.lock();
        if inner.state == WalState::Closed {
            return Ok(());
        }

        let result = inner.sync();
        inner.writer = None;
        inner.state = WalState::Closed;

        tracing::info!(sequence_number = inner.sequence_number, "WAL closed");
        result
    }

    fn reset_timer(&self) {
        if let Some(scheduler) = self.scheduler.lock().as_ref() {
            scheduler.reset();
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Last assigned sequence number (0 before the first write)
    pub fn sequence_number(&self) -> u64 {
        self.inner.lock().sequence_number
    }

    /// Id of the segment currently open for append
    pub fn active_segment_id(&self) -> u64 {
        let inner = self.inner.lock();
        inner.segment_ids.back().copied().unwrap_or(0)
    }

    /// Ids of all segments known to the WAL, ascending
    pub fn segment_ids(&self) -> Vec<u64> {
        self.inner.lock().segment_ids.iter().copied().collect()
    }

    /// Sequence number of the last checkpoint, if any
    pub fn last_checkpoint(&self) -> Option<u64> {
        self.inner.lock().last_checkpoint
    }

    /// Current lifecycle state
    pub fn state(&self) -> WalState {
        self.inner.lock().state
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.state() == WalState::Closed
    }

    /// Segment directory
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Get the configuration
    pub fn config(&self) -> &WalConfig {
        &self.config
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to close WAL on drop");
        }
    }
}

// =============================================================================
// Locked Operations
// =============================================================================

impl WalInner {
    fn writer_mut(&mut self) -> Result<&mut SegmentWriter> {
        match self.state {
            WalState::Closed => Err(WalError::Closed),
            WalState::Open => self.writer.as_mut().ok_or(WalError::Closed),
        }
    }

    /// Append one entry (caller holds the lock)
    fn append(&mut self, payload: &[u8]) -> Result<u64> {
        let frame_size = frame_len(payload.len());
        let body_size = frame_size as usize - FRAME_HEADER_SIZE;
        if body_size > MAX_FRAME_SIZE {
            return Err(WalError::PayloadTooLarge {
                size: body_size,
                max: MAX_FRAME_SIZE,
            });
        }

        // Step 1: Rotate before the frame would overflow the active segment.
        // An empty segment always takes the frame, even an oversized one.
        let max_segment_size = self.config.max_segment_size;
        let needs_rotation = {
            let writer = self.writer_mut()?;
            !writer.is_empty() && writer.size() + frame_size > max_segment_size
        };
        if needs_rotation {
            self.rotate()?;
        }

        // Step 2: Next sequence number; never handed out twice, even if the
        // write below fails
        self.sequence_number += 1;
        let sequence_number = self.sequence_number;

        // Step 3: Encode and append
        let entry = Entry::new(sequence_number, payload.to_vec());
        let frame = encode_frame(&entry)?;

        let durability = self.config.durability;
        let writer = self.writer_mut()?;
        writer.append(&frame)?;

        // Step 4: Per-write durability
        if durability.fsync_on_write() {
            writer.fsync()?;
        } else if durability.flush_on_write() {
            writer.flush()?;
        }

        tracing::trace!(sequence_number, segment = writer.id(), bytes = frame.len(), "appended");
        Ok(sequence_number)
    }

    /// Flush, and fsync if the durability mode asks for it
    fn sync(&mut self) -> Result<()> {
        let fsync = self.config.durability.fsync_on_sync();
        let writer = self.writer_mut()?;
        if fsync {
            writer.fsync()
        } else {
            writer.flush()
        }
    }

    /// Flush + fsync and remember the checkpoint
    fn checkpoint(&mut self) -> Result<u64> {
        self.writer_mut()?.fsync()?;
        self.last_checkpoint = Some(self.sequence_number);

        tracing::debug!(sequence_number = self.sequence_number, "checkpoint");
        Ok(self.sequence_number)
    }

    /// Seal the active segment and switch to the next id
    fn rotate(&mut self) -> Result<()> {
        let max = self.config.max_segment_count;
        let dir = self.config.dir.clone();

        if self.segment_ids.len() >= max
            && self.config.overflow_policy == SegmentOverflowPolicy::Reject
        {
            return Err(WalError::SegmentLimit { max });
        }

        // Step 1: Make the outgoing segment durable
        let old_id = {
            let writer = self.writer_mut()?;
            writer.fsync()?;
            writer.id()
        };
        let new_id = old_id + 1;

        // Step 2: Create the next segment before letting go of the old one
        let writer = SegmentWriter::create(&dir, new_id, self.config.write_buffer_capacity)?;
        segment::sync_dir(&dir)?;
        self.writer = Some(writer);
        self.segment_ids.push_back(new_id);

        tracing::info!(from = old_id, to = new_id, "rotated segment");

        // Step 3: Recycle (RecycleOldest only; Reject returned above). The
        // new segment is already active, so a failed removal doesn't fail the
        // write; the segment stays listed and the next rotation retries it.
        while self.segment_ids.len() > max {
            let Some(&oldest) = self.segment_ids.front() else {
                break;
            };
            match segment::remove_segment(&dir, oldest) {
                Ok(()) => {}
                Err(WalError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(segment = oldest, error = %e, "cannot recycle segment");
                    break;
                }
            }
            self.segment_ids.pop_front();
        }

        Ok(())
    }
}
