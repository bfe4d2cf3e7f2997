use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns deferred deletion of result artifacts.
///
/// Each call to [`schedule`](Janitor::schedule) registers one timer task
/// that removes the given paths after the configured delay. Deletion is
/// best-effort: a target that is already gone is a no-op, and no failure
/// here ever reaches a request. The janitor keeps the task handles so
/// pending deletions can be cancelled on shutdown.
pub struct Janitor {
    delay: Duration,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Janitor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Schedule `paths` for removal after the janitor's delay.
    ///
    /// Returns immediately; the request path never waits on the deletion.
    pub fn schedule(&self, paths: Vec<PathBuf>) {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for path in paths {
                match std::fs::remove_file(&path) {
                    Ok(()) => info!("removed expired result file {}", path.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!("expired result file already gone: {}", path.display());
                    }
                    Err(e) => {
                        warn!("could not remove expired result {}: {}", path.display(), e);
                    }
                }
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|task| !task.is_finished());
        pending.push(handle);
    }

    /// Number of deletion tasks that have not completed yet.
    pub fn pending_count(&self) -> usize {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.iter().filter(|task| !task.is_finished()).count()
    }

    /// Abort every deletion that has not fired yet.
    pub fn cancel_all(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for task in pending.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Let the spawned deletion tasks run on the current-thread test runtime.
    async fn drain_tasks() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn removes_files_after_the_delay() {
        let dir = tempdir().unwrap();
        let result = dir.path().join("updated_a.xlsx");
        let mirror = dir.path().join("updated_a_mirror.xlsx");
        std::fs::write(&result, b"x").unwrap();
        std::fs::write(&mirror, b"x").unwrap();

        let janitor = Janitor::new(Duration::from_secs(60));
        janitor.schedule(vec![result.clone(), mirror.clone()]);
        drain_tasks().await;

        tokio::time::advance(Duration::from_secs(59)).await;
        drain_tasks().await;
        assert!(result.exists());
        assert!(mirror.exists());

        tokio::time::advance(Duration::from_secs(2)).await;
        drain_tasks().await;
        assert!(!result.exists());
        assert!(!mirror.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn missing_target_is_a_no_op() {
        let dir = tempdir().unwrap();
        let janitor = Janitor::new(Duration::from_secs(1));
        janitor.schedule(vec![dir.path().join("already-gone.xlsx")]);
        drain_tasks().await;

        tokio::time::advance(Duration::from_secs(2)).await;
        drain_tasks().await;
        assert_eq!(janitor.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_keeps_the_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kept.xlsx");
        std::fs::write(&path, b"x").unwrap();

        let janitor = Janitor::new(Duration::from_secs(60));
        janitor.schedule(vec![path.clone()]);
        janitor.cancel_all();

        tokio::time::advance(Duration::from_secs(120)).await;
        drain_tasks().await;
        assert!(path.exists());
    }
}
