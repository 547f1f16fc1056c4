//! Delayed removal of scratch files.
//!
//! Producers hand paths to a [`CleanupHandle`]; a single background task
//! owns the receiving [`CleanupQueue`] and deletes each batch once its delay
//! has passed.

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A batch of files to delete at `due`.
#[derive(Debug)]
pub struct CleanupJob {
    pub paths: Vec<PathBuf>,
    pub due: Instant,
}

/// Receiving side of the cleanup channel.
pub type CleanupQueue = mpsc::UnboundedReceiver<CleanupJob>;

#[derive(Debug, Clone)]
pub struct CleanupHandle {
    tx: mpsc::UnboundedSender<CleanupJob>,
}

impl CleanupHandle {
    /// Creates a handle and the queue the background task drains.
    pub fn channel() -> (Self, CleanupQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Schedules `paths` for deletion after `delay`.
    ///
    /// If the background task is gone the files are removed right away.
    pub fn schedule(&self, paths: Vec<PathBuf>, delay: Duration) {
        if paths.is_empty() {
            return;
        }
        let job = CleanupJob {
            paths,
            due: Instant::now() + delay,
        };
        if let Err(mpsc::error::SendError(job)) = self.tx.send(job) {
            tracing::warn!(files = job.paths.len(), "cleanup task stopped, removing files now");
            for path in &job.paths {
                remove_quietly(path);
            }
        }
    }
}

/// Deletes a file, logging anything other than "already gone".
pub fn remove_quietly(path: &std::path::Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove file"),
    }
}
