//! Segment Store
//!
//! Filesystem-facing operations over segment files.
//!
//! ## Naming
//! ```text
//! {dir}/segment-0
//! {dir}/segment-1
//! ...
//! {dir}/segment-<id>      (decimal id, no padding)
//! ```
//!
//! Any entry in the directory whose name starts with the prefix must carry a
//! valid id. Anything else under the prefix is treated as corruption rather
//! than skipped: ignoring it could reorder or drop segments on replay.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{Result, WalError};

/// Fixed prefix shared by every segment file
pub const SEGMENT_PREFIX: &str = "segment-";

/// Path of segment `id` inside `dir`
pub fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{}{}", SEGMENT_PREFIX, id))
}

/// Parse a segment id from a file name
///
/// - `None` — the name does not use the segment prefix
/// - `Some(Ok(id))` — a well-formed segment name
/// - `Some(Err(CorruptNaming))` — prefix present, suffix not a decimal id
pub fn parse_segment_id(file_name: &str) -> Option<Result<u64>> {
    let suffix = file_name.strip_prefix(SEGMENT_PREFIX)?;

    // `u64::from_str` accepts a leading '+', which would let two names map to one id
    let valid = !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit());
    if !valid {
        return Some(Err(WalError::CorruptNaming(file_name.to_string())));
    }

    Some(
        suffix
            .parse::<u64>()
            .map_err(|_| WalError::CorruptNaming(file_name.to_string())),
    )
}

/// Create a new, empty segment file (truncating any existing one)
pub fn create_segment(dir: &Path, id: u64) -> Result<File> {
    let path = segment_path(dir, id);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)?;

    tracing::debug!(segment = id, path = %path.display(), "created segment");
    Ok(file)
}

/// List segment ids in `dir`, sorted ascending
pub fn discover_segments(dir: &Path) -> Result<Vec<u64>> {
    let mut ids = Vec::new();

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let name = dir_entry.file_name();
        let name = name.to_string_lossy();

        let id = match parse_segment_id(&name) {
            Some(id) => id?,
            None => continue,
        };

        if !dir_entry.file_type()?.is_file() {
            return Err(WalError::CorruptNaming(format!("{} is not a file", name)));
        }

        ids.push(id);
    }

    ids.sort_unstable();
    Ok(ids)
}

/// Highest id in `ids`, or `None` when there are no segments yet
pub fn highest_id(ids: &[u64]) -> Option<u64> {
    ids.iter().copied().max()
}

/// Open segment `id` for appending, creating it if absent
///
/// Append mode keeps every write at end-of-file.
pub fn open_for_append(dir: &Path, id: u64) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(segment_path(dir, id))?;
    Ok(file)
}

/// Delete segment `id`
pub fn remove_segment(dir: &Path, id: u64) -> Result<()> {
    fs::remove_file(segment_path(dir, id))?;
    tracing::debug!(segment = id, "removed segment");
    Ok(())
}

/// Sync the directory entry itself so newly created segment files survive a crash
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
