//! Cancellable quiet-period timer

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Runs only the most recently scheduled action, once `delay` has passed
/// without another schedule call.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    /// Ticket of the action still waiting to run
    waiting: Arc<watch::Sender<Option<u64>>>,
    next_ticket: AtomicU64,
}

/// Clears the waiting ticket when its task ends, however it ends
struct TicketGuard {
    waiting: Arc<watch::Sender<Option<u64>>>,
    ticket: u64,
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        let ticket = self.ticket;
        self.waiting.send_if_modified(|waiting| {
            if *waiting != Some(ticket) {
                return false;
            }
            *waiting = None;
            true
        });
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        let (waiting, _) = watch::channel(None);
        Self {
            delay,
            pending: Mutex::new(None),
            waiting: Arc::new(waiting),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Restart the timer with a new action. Must be called within a Tokio runtime.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let guard = TicketGuard {
            waiting: self.waiting.clone(),
            ticket,
        };

        let mut pending = self.pending.lock();
        self.waiting.send_replace(Some(ticket));
        let handle = tokio::spawn(async move {
            let _guard = guard;
            sleep(delay).await;
            action.await;
        });
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Drop the scheduled action, if any. Returns whether one was waiting.
    pub fn cancel(&self) -> bool {
        let mut pending = self.pending.lock();
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        self.waiting.send_replace(None).is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.waiting.borrow().is_some()
    }

    /// Resolves once no action is waiting to run
    pub async fn idle(&self) {
        let mut rx = self.waiting.subscribe();
        let _ = rx.wait_for(Option::is_none).await;
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_last_action_once() {
        let debouncer = Debouncer::new(Duration::from_millis(250));
        let runs = Arc::new(Mutex::new(Vec::new()));

        for value in ["c", "ca", "cat"] {
            let runs = runs.clone();
            debouncer.schedule(async move { runs.lock().push(value) });
            sleep(Duration::from_millis(30)).await;
        }
        assert!(debouncer.is_pending());

        sleep(Duration::from_millis(300)).await;
        assert_eq!(*runs.lock(), vec!["cat"]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        debouncer.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_waits_for_scheduled_action() {
        let debouncer = Debouncer::new(Duration::from_millis(250));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.idle().await;

        let counter = runs.clone();
        debouncer.schedule(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.idle().await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_action_keeps_pending() {
        let debouncer = Debouncer::new(Duration::from_millis(100));

        debouncer.schedule(async {});
        sleep(Duration::from_millis(50)).await;
        debouncer.schedule(async {});
        sleep(Duration::from_millis(70)).await;
        assert!(debouncer.is_pending());

        sleep(Duration::from_millis(50)).await;
        assert!(!debouncer.is_pending());
    }
}
