//! Sync Scheduler
//!
//! Background thread that syncs the WAL at a fixed interval, independent of
//! the write rate.
//!
//! ## Timer Semantics
//! ```text
//!   sync ──interval──▶ fire: sync ──interval──▶ fire: sync ...
//!          ▲
//!          └── any Reset (a manual sync) restarts the wait
//! ```
//! Each deadline is relative to when the previous sync finished, not a
//! wall-clock schedule.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use crate::error::{Result, WalError};

/// Control messages for the scheduler thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerSignal {
    /// A sync just happened elsewhere; restart the wait
    Reset,
    /// Exit the loop
    Stop,
}

/// Handle to the background sync thread
///
/// Owned by the WAL: started at open, stopped at close.
pub struct SyncScheduler {
    /// Control channel into the thread
    signals: Sender<SchedulerSignal>,
    /// Join handle (taken on stop)
    handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Spawn the scheduler thread
    ///
    /// `sync` runs every `interval`. Returning `Err(WalError::Closed)` ends
    /// the thread; other errors are logged and the timer re-arms.
    pub fn spawn<F>(interval: Duration, sync: F) -> Result<Self>
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let (signals, receiver) = channel::unbounded();

        let handle = thread::Builder::new()
            .name("atlaswal-sync".to_string())
            .spawn(move || run(interval, receiver, sync))?;

        Ok(Self {
            signals,
            handle: Some(handle),
        })
    }

    /// Restart the wait for the next fire
    pub fn reset(&self) {
        // Send only fails once the thread has exited
        let _ = self.signals.send(SchedulerSignal::Reset);
    }

    /// Stop the thread and wait for it
    ///
    /// A sync in progress finishes first; no sync fires after this returns.
    pub fn stop(&mut self) {
        let _ = self.signals.send(SchedulerSignal::Stop);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("sync scheduler thread panicked");
            }
        }
    }

    /// True while the thread has not been stopped
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Scheduler loop
fn run<F>(interval: Duration, receiver: channel::Receiver<SchedulerSignal>, mut sync: F)
where
    F: FnMut() -> Result<()>,
{
    tracing::debug!(interval_ms = interval.as_millis() as u64, "sync scheduler started");

    loop {
        match receiver.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => match sync() {
                Ok(()) => tracing::trace!("scheduled sync complete"),
                Err(WalError::Closed) => break,
                Err(e) => tracing::warn!(error = %e, "scheduled sync failed"),
            },
            Ok(SchedulerSignal::Reset) => continue,
            Ok(SchedulerSignal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!("sync scheduler stopped");
}
