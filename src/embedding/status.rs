//! Observable lifecycle state of the embedding worker
//!
//! One writer (the bridge's event dispatcher) and any number of readers.
//! Readers get a `watch` receiver and never block the writer.
//!
//! Each worker incarnation writes under an epoch. [`StatusStore::reset`]
//! starts a new epoch, so a retired dispatcher can no longer publish.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle of the shared embedding worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// No worker exists
    #[default]
    Idle,
    /// Worker started, model loading
    Loading,
    /// Model loaded, serving requests
    Ready,
    /// Model failed to load; semantic search disabled until recreated
    Error,
}

/// Snapshot of the worker lifecycle plus load progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub state: LifecycleState,
    /// Load progress in percent (0-100), meaningful while `Loading`
    pub progress: f32,
}

impl WorkerStatus {
    pub fn is_ready(&self) -> bool {
        self.state == LifecycleState::Ready
    }

    pub fn is_error(&self) -> bool {
        self.state == LifecycleState::Error
    }
}

/// Observable container for [`WorkerStatus`]
#[derive(Debug)]
pub struct StatusStore {
    tx: watch::Sender<WorkerStatus>,
    epoch: Mutex<u64>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(WorkerStatus::default());
        Self {
            tx,
            epoch: Mutex::new(0),
        }
    }

    /// Epoch for writes from the current worker incarnation
    pub fn epoch(&self) -> u64 {
        *self.epoch.lock()
    }

    /// Retire the current epoch and go back to `Idle`
    pub fn reset(&self) -> u64 {
        let mut epoch = self.epoch.lock();
        *epoch += 1;
        self.set_state(LifecycleState::Idle);
        *epoch
    }

    /// [`set_state`](Self::set_state) unless `epoch` has been retired.
    /// Returns whether the write was accepted.
    pub fn set_state_in(&self, epoch: u64, state: LifecycleState) -> bool {
        let current = self.epoch.lock();
        if *current != epoch {
            return false;
        }
        self.set_state(state);
        true
    }

    /// [`set_progress`](Self::set_progress) unless `epoch` has been retired
    pub fn set_progress_in(&self, epoch: u64, progress: f32) -> bool {
        let current = self.epoch.lock();
        if *current != epoch {
            return false;
        }
        self.set_progress(progress);
        true
    }

    /// Current status
    pub fn current(&self) -> WorkerStatus {
        *self.tx.borrow()
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.tx.subscribe()
    }

    /// Move to `state`; progress resets on `Idle` and completes on `Ready`.
    pub fn set_state(&self, state: LifecycleState) {
        self.tx.send_if_modified(|status| {
            let progress = match state {
                LifecycleState::Idle => 0.0,
                LifecycleState::Ready => 100.0,
                _ => status.progress,
            };
            let changed = status.state != state || status.progress != progress;
            status.state = state;
            status.progress = progress;
            changed
        });
    }

    /// Publish load progress. Implies `Loading`; ignored once the model is ready or failed.
    pub fn set_progress(&self, progress: f32) {
        let progress = progress.clamp(0.0, 100.0);
        self.tx.send_if_modified(|status| match status.state {
            LifecycleState::Ready | LifecycleState::Error => false,
            _ => {
                let changed = status.state != LifecycleState::Loading || status.progress != progress;
                status.state = LifecycleState::Loading;
                status.progress = progress;
                changed
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let store = StatusStore::new();
        assert_eq!(store.current().state, LifecycleState::Idle);

        store.set_state(LifecycleState::Loading);
        store.set_progress(42.0);
        assert_eq!(store.current().state, LifecycleState::Loading);
        assert_eq!(store.current().progress, 42.0);

        store.set_state(LifecycleState::Ready);
        assert!(store.current().is_ready());
        assert_eq!(store.current().progress, 100.0);

        // late progress events never demote a ready model
        store.set_progress(10.0);
        assert!(store.current().is_ready());

        store.set_state(LifecycleState::Idle);
        assert_eq!(store.current(), WorkerStatus::default());
    }

    #[test]
    fn test_progress_is_clamped() {
        let store = StatusStore::new();
        store.set_progress(250.0);
        assert_eq!(store.current().progress, 100.0);
        assert_eq!(store.current().state, LifecycleState::Loading);
    }

    #[test]
    fn test_retired_epoch_cannot_write() {
        let store = StatusStore::new();
        let epoch = store.epoch();
        store.set_state(LifecycleState::Loading);
        assert!(store.set_progress_in(epoch, 60.0));

        assert_eq!(store.reset(), epoch + 1);
        assert!(!store.set_state_in(epoch, LifecycleState::Ready));
        assert!(!store.set_progress_in(epoch, 80.0));
        assert_eq!(store.current(), WorkerStatus::default());

        assert!(store.set_state_in(epoch + 1, LifecycleState::Ready));
        assert!(store.current().is_ready());
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let store = StatusStore::new();
        let mut rx = store.subscribe();

        store.set_state(LifecycleState::Error);
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_error());
    }
}
