//! Bridge to the background embedding worker
//!
//! The worker is a dedicated OS thread owning the model. Requests carry a
//! monotonically increasing id; the bridge keeps one pending slot per id and
//! a dispatcher task routes every worker event to the slot it belongs to.

use super::backend::{factory_from_settings, BackendFactory, EmbeddingBackend};
use super::error::EmbeddingError;
use super::status::{LifecycleState, StatusStore, WorkerStatus};
use super::Embedder;
use crate::config::EmbeddingSettings;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

type Reply = oneshot::Sender<Result<Vec<f32>, EmbeddingError>>;

/// Request sent to the worker thread
#[derive(Debug)]
struct WorkerRequest {
    id: u64,
    text: String,
}

/// Message posted back by the worker thread
#[derive(Debug)]
enum WorkerEvent {
    Progress(f32),
    Ready,
    Complete { id: u64, output: Vec<f32> },
    Failed { id: u64, error: String },
    InitFailed(String),
}

/// State shared between callers and the dispatcher.
///
/// `init_error` lives under the same lock as `pending` so a caller can never
/// register a request after the pending map was drained for a load failure.
#[derive(Default)]
struct Shared {
    pending: HashMap<u64, Reply>,
    init_error: Option<String>,
}

/// One incarnation of the worker
struct WorkerHandle {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    shared: Arc<Mutex<Shared>>,
    dispatcher: JoinHandle<()>,
}

/// Process-wide embedding handle.
///
/// Lazily spawns a single worker on the first [`embed`](Self::embed) call and
/// keeps it until [`shutdown`](Self::shutdown). Share it behind an `Arc`.
pub struct EmbeddingService {
    factory: BackendFactory,
    request_timeout: Duration,
    load_timeout: Duration,
    status: Arc<StatusStore>,
    worker: Mutex<Option<WorkerHandle>>,
    next_id: AtomicU64,
    spawned: AtomicUsize,
}

impl EmbeddingService {
    /// Create a service that builds backends with `factory`
    pub fn new(factory: BackendFactory, settings: &EmbeddingSettings) -> Self {
        Self {
            factory,
            request_timeout: settings.request_timeout(),
            load_timeout: settings.load_timeout(),
            status: Arc::new(StatusStore::new()),
            worker: Mutex::new(None),
            next_id: AtomicU64::new(1),
            spawned: AtomicUsize::new(0),
        }
    }

    /// Create a service for the backend selected in settings
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self::new(factory_from_settings(settings), settings)
    }

    /// Embed `text` on the shared worker.
    ///
    /// Empty input is not special-cased; callers filter it.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let shared = {
            let mut guard = self.worker.lock();
            let worker = guard.get_or_insert_with(|| self.spawn_worker());

            {
                let mut shared = worker.shared.lock();
                if let Some(ref err) = shared.init_error {
                    return Err(EmbeddingError::WorkerInit(err.clone()));
                }
                shared.pending.insert(id, tx);
            }

            let request = WorkerRequest {
                id,
                text: text.to_string(),
            };
            if worker.requests.send(request).is_err() {
                worker.shared.lock().pending.remove(&id);
                return Err(EmbeddingError::WorkerGone);
            }
            worker.shared.clone()
        };

        let budget = self.budget();
        debug!("Embedding request {} dispatched (budget {:?})", id, budget);

        match timeout(budget, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EmbeddingError::WorkerGone),
            Err(_) => {
                shared.lock().pending.remove(&id);
                warn!("Embedding request {} timed out after {:?}", id, budget);
                Err(EmbeddingError::Timeout(budget))
            }
        }
    }

    /// Terminate the worker and reset to `Idle`.
    ///
    /// In-flight callers fail with [`EmbeddingError::WorkerGone`]. The next
    /// `embed` call spawns a fresh worker.
    pub fn shutdown(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.dispatcher.abort();
            worker.shared.lock().pending.clear();
            // dropping `requests` closes the queue; the thread exits after its current job
            drop(worker.requests);
            info!("Embedding worker shut down");
        }
        // a dispatcher still finishing an event writes under the retired epoch
        self.status.reset();
    }

    /// Current lifecycle status
    pub fn status(&self) -> WorkerStatus {
        self.status.current()
    }

    /// Observe lifecycle changes
    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.subscribe()
    }

    /// Number of worker incarnations spawned so far
    pub fn workers_spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Number of requests awaiting a response
    pub fn pending_requests(&self) -> usize {
        self.worker
            .lock()
            .as_ref()
            .map(|w| w.shared.lock().pending.len())
            .unwrap_or(0)
    }

    fn budget(&self) -> Duration {
        if self.status.current().is_ready() {
            self.request_timeout
        } else {
            self.load_timeout + self.request_timeout
        }
    }

    fn spawn_worker(&self) -> WorkerHandle {
        let incarnation = self.spawned.fetch_add(1, Ordering::SeqCst) + 1;
        let backend = (self.factory)();
        info!(
            "Starting embedding worker #{} (model {})",
            incarnation,
            backend.model_id()
        );
        let epoch = self.status.epoch();
        self.status.set_state(LifecycleState::Loading);

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(Shared::default()));

        let spawned = std::thread::Builder::new()
            .name(format!("embedding-worker-{incarnation}"))
            .spawn(move || run_worker(backend, request_rx, event_tx));

        if let Err(e) = spawned {
            error!("Failed to spawn embedding worker thread: {}", e);
            shared.lock().init_error = Some(e.to_string());
            self.status.set_state(LifecycleState::Error);
        }

        let dispatcher = tokio::spawn(dispatch_events(
            event_rx,
            shared.clone(),
            self.status.clone(),
            epoch,
        ));

        WorkerHandle {
            requests: request_tx,
            shared,
            dispatcher,
        }
    }
}

impl Drop for EmbeddingService {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.dispatcher.abort();
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        EmbeddingService::embed(self, text).await
    }

    fn status(&self) -> WorkerStatus {
        EmbeddingService::status(self)
    }
}

/// Worker thread body: load once, then serve requests until the queue closes
fn run_worker(
    mut backend: Box<dyn EmbeddingBackend>,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    let loaded = backend.load(&mut |progress| {
        let _ = events.send(WorkerEvent::Progress(progress));
    });

    if let Err(e) = loaded {
        let _ = events.send(WorkerEvent::InitFailed(e.to_string()));
        return;
    }
    if events.send(WorkerEvent::Ready).is_err() {
        return;
    }

    while let Some(request) = requests.blocking_recv() {
        let event = match backend.embed(&request.text) {
            Ok(output) => WorkerEvent::Complete {
                id: request.id,
                output,
            },
            Err(e) => WorkerEvent::Failed {
                id: request.id,
                error: e.to_string(),
            },
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

/// Route worker events to lifecycle state and pending requests
async fn dispatch_events(
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    shared: Arc<Mutex<Shared>>,
    status: Arc<StatusStore>,
    epoch: u64,
) {
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Progress(progress) => {
                status.set_progress_in(epoch, progress);
            }
            WorkerEvent::Ready => {
                if status.set_state_in(epoch, LifecycleState::Ready) {
                    info!("Embedding model ready");
                }
            }
            WorkerEvent::Complete { id, output } => resolve(&shared, id, Ok(output)),
            WorkerEvent::Failed { id, error } => {
                warn!("Embedding request {} failed: {}", id, error);
                resolve(&shared, id, Err(EmbeddingError::Extraction(error)));
            }
            WorkerEvent::InitFailed(err) => {
                error!("Embedding model failed to load: {}", err);
                status.set_state_in(epoch, LifecycleState::Error);
                fail_all(&shared, &err);
            }
        }
    }

    // The thread is gone without a shutdown (shutdown aborts this task first).
    if !status.current().is_error() {
        warn!("Embedding worker exited unexpectedly");
        status.set_state_in(epoch, LifecycleState::Error);
        fail_all(&shared, "embedding worker exited");
    }
}

fn resolve(shared: &Mutex<Shared>, id: u64, result: Result<Vec<f32>, EmbeddingError>) {
    match shared.lock().pending.remove(&id) {
        Some(reply) => {
            let _ = reply.send(result);
        }
        None => debug!("Dropping response for abandoned request {}", id),
    }
}

fn fail_all(shared: &Mutex<Shared>, err: &str) {
    let mut shared = shared.lock();
    shared.init_error = Some(err.to_string());
    for (_, reply) in shared.pending.drain() {
        let _ = reply.send(Err(EmbeddingError::WorkerInit(err.to_string())));
    }
}
