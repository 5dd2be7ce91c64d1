//! WAL Writer
//!
//! Buffered appends to the active segment file.
//!
//! A failed write can leave part of a frame in the file. The writer cuts the
//! file back to its last whole frame before reporting the error, and keeps
//! retrying that cut before any later write until it succeeds, so frames
//! written afterwards never land behind a torn one.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;

use super::segment;

/// File handle a segment writer appends to
pub trait SegmentFile: Write {
    /// Cut the file to `len` bytes and continue writing from there
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;

    /// Persist written data to stable storage
    fn sync_data(&self) -> io::Result<()>;
}

impl SegmentFile for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }

    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }
}

/// Writes frames to one segment file
///
/// Owned exclusively by the WAL engine; nothing else writes to the active
/// segment.
pub struct SegmentWriter<F: SegmentFile = File> {
    /// Segment id this writer appends to
    id: u64,
    /// Buffered writer over the segment file
    writer: BufWriter<F>,
    /// Segment size including bytes still sitting in the buffer
    size: u64,
    /// Bytes appended since the last fsync
    unsynced: bool,
    /// A write failed and the file may still hold part of a frame
    torn: bool,
}

impl SegmentWriter<File> {
    /// Open an existing segment for append (created if absent)
    pub fn open(dir: &Path, id: u64, buffer_capacity: usize) -> Result<Self> {
        let file = segment::open_for_append(dir, id)?;
        let size = file.metadata()?.len();
        Ok(Self::from_file(id, file, size, buffer_capacity))
    }

    /// Create a fresh, empty segment
    pub fn create(dir: &Path, id: u64, buffer_capacity: usize) -> Result<Self> {
        let file = segment::create_segment(dir, id)?;
        Ok(Self::from_file(id, file, 0, buffer_capacity))
    }
}

impl<F: SegmentFile> SegmentWriter<F> {
    /// Wrap an already opened segment file holding `size` bytes of whole frames
    pub fn from_file(id: u64, file: F, size: u64, buffer_capacity: usize) -> Self {
        Self {
            id,
            writer: BufWriter::with_capacity(buffer_capacity, file),
            size,
            unsynced: false,
            torn: false,
        }
    }

    /// Append an encoded frame to the buffer
    ///
    /// On error the frame is not part of the segment.
    pub fn append(&mut self, frame: &[u8]) -> Result<()> {
        self.guarded(|writer| writer.write_all(frame))?;
        self.size += frame.len() as u64;
        self.unsynced = true;
        Ok(())
    }

    /// Hand buffered bytes to the OS
    pub fn flush(&mut self) -> Result<()> {
        self.guarded(|writer| writer.flush())
    }

    /// Flush, then force the OS to persist the segment
    ///
    /// Skips the fsync when nothing was appended since the last one.
    pub fn fsync(&mut self) -> Result<()> {
        self.guarded(|writer| writer.flush())?;
        if self.unsynced {
            self.guarded(|writer| writer.get_ref().sync_data())?;
            self.unsynced = false;
        }
        Ok(())
    }

    /// Run a write against the file, cutting torn bytes off if it fails
    fn guarded<T>(&mut self, op: impl FnOnce(&mut BufWriter<F>) -> io::Result<T>) -> Result<T> {
        if self.torn {
            self.cut_torn_bytes()?;
        }

        match op(&mut self.writer) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.torn = true;
                if let Err(cut_err) = self.cut_torn_bytes() {
                    tracing::error!(
                        segment = self.id,
                        error = %cut_err,
                        "cannot cut torn bytes from segment"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Truncate the file to the whole frames it holds
    ///
    /// `BufWriter` keeps whatever it failed to write in its buffer, so the
    /// file should hold exactly `size` minus the buffered bytes. Anything
    /// past that is the head of a frame whose write failed.
    fn cut_torn_bytes(&mut self) -> Result<()> {
        let whole_frames = self.size - self.writer.buffer().len() as u64;
        self.writer.get_mut().truncate_to(whole_frames)?;
        self.torn = false;

        tracing::warn!(segment = self.id, len = whole_frames, "cut segment back to last whole frame");
        Ok(())
    }

    /// Segment id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current segment size in bytes (flushed + buffered)
    pub fn size(&self) -> u64 {
        self.size
    }

    /// True if the segment holds no frames
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of bytes waiting in the write buffer
    pub fn buffered_len(&self) -> usize {
        self.writer.buffer().len()
    }
}
