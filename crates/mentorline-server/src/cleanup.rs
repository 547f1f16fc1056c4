//! Background removal of scratch and expired audio files.

use mentorline_voice::{remove_quietly, CleanupJob, CleanupQueue};
use tokio::time::sleep_until;

/// Drains the cleanup queue until every [`CleanupHandle`] is dropped.
///
/// Each batch waits for its own deadline, so a zero-delay spool removal is
/// not held up behind a batch scheduled further out.
///
/// [`CleanupHandle`]: mentorline_voice::CleanupHandle
pub async fn start_cleanup_task(mut queue: CleanupQueue) {
    tracing::info!("starting file cleanup task");

    while let Some(job) = queue.recv().await {
        tokio::spawn(run_job(job));
    }

    tracing::info!("file cleanup task stopped");
}

async fn run_job(job: CleanupJob) {
    sleep_until(job.due).await;

    let count = job.paths.len();
    let res = tokio::task::spawn_blocking(move || {
        for path in &job.paths {
            remove_quietly(path);
        }
    })
    .await;

    match res {
        Ok(()) => tracing::debug!(files = count, "removed scheduled files"),
        Err(e) => tracing::error!("cleanup task join error: {}", e),
    }
}
