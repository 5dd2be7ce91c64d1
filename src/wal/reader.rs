//! WAL Reader
//!
//! Sequential frame reading for one segment, and replay across all segments
//! of a WAL directory.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use crate::error::{Result, WalError};

use super::entry::{parse_frame_len, Entry, FRAME_HEADER_SIZE};
use super::segment;

// =============================================================================
// Segment Reader
// =============================================================================

/// Reads frames from a single segment file
pub struct SegmentReader {
    /// Buffered file handle
    reader: BufReader<File>,
    /// Byte offset of the next frame
    position: u64,
    /// File length at open time
    file_len: u64,
}

impl SegmentReader {
    /// Open a segment file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next entry
    ///
    /// Returns `Ok(None)` at a clean end of file. A torn length prefix or a
    /// frame running past the end of the file is reported as `Corruption`,
    /// a bad checksum as `Integrity`.
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(None);
        }

        if remaining < FRAME_HEADER_SIZE as u64 {
            return Err(WalError::Corruption(format!(
                "torn length prefix at offset {} ({} trailing bytes)",
                self.position, remaining
            )));
        }

        let mut prefix = [0u8; FRAME_HEADER_SIZE];
        read_exact_or_torn(&mut self.reader, &mut prefix, self.position)?;

        let body_len = parse_frame_len(prefix).map_err(|e| match e {
            WalError::Corruption(msg) => {
                WalError::Corruption(format!("{} at offset {}", msg, self.position))
            }
            other => other,
        })?;

        // Check bounds before allocating, the prefix may be garbage
        if (FRAME_HEADER_SIZE + body_len) as u64 > remaining {
            return Err(WalError::Corruption(format!(
                "frame at offset {} needs {} bytes, only {} left",
                self.position,
                FRAME_HEADER_SIZE + body_len,
                remaining
            )));
        }

        let mut body = vec![0u8; body_len];
        read_exact_or_torn(&mut self.reader, &mut body, self.position)?;

        let entry = Entry::decode(&body)?;
        self.position += (FRAME_HEADER_SIZE + body_len) as u64;

        Ok(Some(entry))
    }

    /// Byte offset just past the last successfully read frame
    pub fn position(&self) -> u64 {
        self.position
    }

    /// File length seen at open; reading never goes past it
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Iterate over entries; the iterator ends after the first error
    pub fn entries(self) -> SegmentEntries {
        SegmentEntries {
            reader: self,
            done: false,
        }
    }
}

/// `read_exact`, with a short read reported as corruption instead of a bare IO error
fn read_exact_or_torn(reader: &mut impl Read, buf: &mut [u8], offset: u64) -> Result<()> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(WalError::Corruption(format!(
            "unexpected end of segment reading frame at offset {}",
            offset
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Iterator over the entries of one segment
pub struct SegmentEntries {
    reader: SegmentReader,
    done: bool,
}

impl Iterator for SegmentEntries {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// =============================================================================
// WAL Reader (all segments)
// =============================================================================

/// Reads entries across every segment of a WAL directory, oldest first
///
/// Segments other than the active one are immutable, so this can run
/// alongside a live writer. Frames still in the writer's buffer are not
/// visible.
pub struct WalReader {
    /// WAL directory
    dir: PathBuf,
    /// Segment ids still to read, ascending
    pending: std::vec::IntoIter<u64>,
    /// Segment being read
    current: Option<(u64, SegmentReader)>,
}

/// Outcome of [`WalReader::replay`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Number of entries handed to the callback
    pub entries: u64,

    /// Sequence number of the last replayed entry (0 if none)
    pub last_sequence: u64,

    /// Where replay stopped on a bad frame: (segment id, byte offset)
    pub stopped_at: Option<(u64, u64)>,
}

impl WalReader {
    /// Discover the segments in `dir` and prepare to read them in order
    pub fn open(dir: &Path) -> Result<Self> {
        let ids = segment::discover_segments(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            pending: ids.into_iter(),
            current: None,
        })
    }

    /// Read the next entry across segments
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        loop {
            if self.current.is_none() {
                let id = match self.pending.next() {
                    Some(id) => id,
                    None => return Ok(None),
                };
                let reader = SegmentReader::open(&segment::segment_path(&self.dir, id))?;
                self.current = Some((id, reader));
            }

            if let Some((_, reader)) = self.current.as_mut() {
                match reader.next_entry()? {
                    Some(entry) => return Ok(Some(entry)),
                    None => self.current = None,
                }
            }
        }
    }

    /// Segment id and offset of the frame the reader is positioned at
    pub fn location(&self) -> Option<(u64, u64)> {
        self.current
            .as_ref()
            .map(|(id, reader)| (*id, reader.position()))
    }

    /// Feed every valid entry to `apply`, in sequence order
    ///
    /// Stops at the first corrupt or torn frame and reports where. IO errors
    /// and errors returned by `apply` are propagated.
    pub fn replay<F>(dir: &Path, mut apply: F) -> Result<ReplaySummary>
    where
        F: FnMut(&Entry) -> Result<()>,
    {
        let mut reader = Self::open(dir)?;
        let mut summary = ReplaySummary::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    apply(&entry)?;
                    summary.entries += 1;
                    summary.last_sequence = entry.sequence_number;
                }
                Ok(None) => break,
                Err(e) if e.is_corruption() => {
                    tracing::warn!(error = %e, "replay stopped at corrupt frame");
                    summary.stopped_at = reader.location();
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(summary)
    }
}

impl Iterator for WalReader {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                // Fuse after an error
                self.current = None;
                self.pending = Vec::new().into_iter();
                Some(Err(e))
            }
        }
    }
}
