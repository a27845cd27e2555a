//! Background writer that keeps storage IO off the counting path.
//!
//! Jobs run strictly in submission order, so a reset's delete can never be
//! overtaken by a save queued before it.

use crate::core::ProgressState;
use crate::persistence::store::ProgressStore;
use crate::transparency::SharedTransparencyLog;
use crossbeam_channel::{bounded, unbounded, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

enum Job {
    Save(ProgressState),
    Clear,
    Flush(Sender<()>),
    Shutdown,
}

/// Handle to the writer thread.
pub struct PersistenceWorker {
    jobs: Sender<Job>,
    save_failed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    /// Spawn the writer thread around `store`.
    pub fn spawn(store: Box<dyn ProgressStore>, log: SharedTransparencyLog) -> Self {
        let (jobs, queue) = unbounded::<Job>();
        let save_failed = Arc::new(AtomicBool::new(false));
        let failed = save_failed.clone();

        let handle = thread::spawn(move || {
            for job in queue {
                match job {
                    Job::Save(state) => match store.save(&state) {
                        Ok(()) => {
                            tracing::debug!("Progress saved");
                            failed.store(false, Ordering::SeqCst);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to save progress, will retry: {e}");
                            failed.store(true, Ordering::SeqCst);
                            log.record_failed_save();
                        }
                    },
                    Job::Clear => {
                        if let Err(e) = store.clear() {
                            tracing::warn!("Failed to delete saved progress: {e}");
                        }
                        failed.store(false, Ordering::SeqCst);
                    }
                    Job::Flush(ack) => {
                        let _ = ack.send(());
                    }
                    Job::Shutdown => break,
                }
            }
        });

        Self {
            jobs,
            save_failed,
            handle: Some(handle),
        }
    }

    /// Queue a save. Never blocks.
    pub fn save(&self, state: ProgressState) {
        if self.jobs.send(Job::Save(state)).is_err() {
            tracing::warn!("Persistence worker is gone, dropping save");
        }
    }

    /// Queue deletion of saved progress. Never blocks.
    pub fn clear(&self) {
        if self.jobs.send(Job::Clear).is_err() {
            tracing::warn!("Persistence worker is gone, dropping delete");
        }
    }

    /// Whether the most recent save failed. Reading resets the flag.
    pub fn take_save_failed(&self) -> bool {
        self.save_failed.swap(false, Ordering::SeqCst)
    }

    /// Wait until every queued job has run, up to `deadline`.
    pub fn flush(&self, deadline: Duration) -> bool {
        let (ack, done) = bounded(1);
        if self.jobs.send(Job::Flush(ack)).is_err() {
            return false;
        }
        done.recv_timeout(deadline).is_ok()
    }

    /// Drain the queue (bounded by `deadline`) and stop the thread.
    ///
    /// Safe to call more than once. If the deadline passes, the thread is
    /// left to finish on its own rather than blocking exit.
    pub fn shutdown(&mut self, deadline: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        let flushed = self.flush(deadline);
        let _ = self.jobs.send(Job::Shutdown);
        if flushed {
            let _ = handle.join();
        } else {
            tracing::warn!("Final save did not finish within {}ms", deadline.as_millis());
        }
        flushed
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        self.shutdown(Duration::from_secs(2));
    }
}
