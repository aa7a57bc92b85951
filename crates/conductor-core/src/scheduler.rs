//! Request scheduler
//!
//! Owns the registered providers, the admission queue, and the background
//! worker that drains it. `submit` is the sole entry point: it tries an
//! immediate ("fast path") dispatch, and falls back to enqueueing ("slow
//! path") when no key currently has headroom.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::dto::{ChatCompletionRequest, ChatCompletionResponse, ConductorStatus, ProviderKeyStatus};
use crate::error::{ConductorError, Result};
use crate::provider::ProviderAdapter;

/// Default bound on the admission queue.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1000;
/// Default deadline a `submit` call waits on the slow path before timing out.
pub const DEFAULT_MAX_WAIT_TIME: Duration = Duration::from_secs(60);
/// Number of selection attempts the worker makes before giving up on a queued request.
const MAX_ATTEMPTS: u32 = 10;
/// Backoff between failed selection attempts in the worker loop.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);
/// How long the worker blocks on an empty queue before re-checking `running`.
const WORKER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Key-selection policy across providers and keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingStrategy {
    /// Alternate across providers, advancing only on a successful pick.
    RoundRobin,
    /// Score every available key by `requests_remaining * 1000 + tokens_remaining`.
    LeastLoaded,
    /// Fill the first provider with capacity before trying the next.
    Sequential,
}

impl SchedulingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingStrategy::RoundRobin => "round_robin",
            SchedulingStrategy::LeastLoaded => "least_loaded",
            SchedulingStrategy::Sequential => "sequential",
        }
    }
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        SchedulingStrategy::RoundRobin
    }
}

/// A request waiting in the admission queue.
struct PendingRequest {
    request: ChatCompletionRequest,
    result_tx: oneshot::Sender<Result<ChatCompletionResponse>>,
    #[allow(dead_code)] // not yet read; will back a queue-age metric
    created_at: Instant,
    estimated_tokens: u32,
    preferred_provider: Option<String>,
}

struct Inner {
    providers: IndexMap<String, Arc<dyn ProviderAdapter>>,
    strategy: SchedulingStrategy,
    policy_cursor: AtomicUsize,
    queue_tx: mpsc::Sender<PendingRequest>,
    queue_rx: Mutex<Option<mpsc::Receiver<PendingRequest>>>,
    queue_depth: AtomicUsize,
    max_wait_time: Duration,
    running: AtomicBool,
}

impl Inner {
    /// Select a provider+key per `preferred` (if given) or the configured policy.
    /// Does not acquire the bucket; the caller does that next, outside of any
    /// lock held during selection.
    fn select_provider_and_key(
        &self,
        est: u32,
        preferred: Option<&str>,
    ) -> Option<(Arc<dyn ProviderAdapter>, String)> {
        if let Some(name) = preferred {
            // An explicit provider restricts the choice; never fall through.
            let adapter = self.providers.get(name)?.clone();
            let key = adapter.pick_key(est)?;
            let key_name = key.key_name().to_string();
            return Some((adapter, key_name));
        }

        match self.strategy {
            SchedulingStrategy::RoundRobin => self.select_round_robin(est),
            SchedulingStrategy::LeastLoaded => self.select_least_loaded(est),
            SchedulingStrategy::Sequential => self.select_sequential(est),
        }
    }

    fn select_round_robin(&self, est: u32) -> Option<(Arc<dyn ProviderAdapter>, String)> {
        let n = self.providers.len();
        if n == 0 {
            return None;
        }
        let start = self.policy_cursor.load(Ordering::SeqCst) % n;
        for i in 0..n {
            let idx = (start + i) % n;
            let (_, adapter) = self.providers.get_index(idx)?;
            if let Some(key) = adapter.pick_key(est) {
                let key_name = key.key_name().to_string();
                self.policy_cursor.store((idx + 1) % n, Ordering::SeqCst);
                return Some((adapter.clone(), key_name));
            }
        }
        None
    }

    fn select_least_loaded(&self, est: u32) -> Option<(Arc<dyn ProviderAdapter>, String)> {
        let mut best: Option<(Arc<dyn ProviderAdapter>, String, i64)> = None;
        for adapter in self.providers.values() {
            for key in adapter.keys() {
                if !key.bucket().can_acquire(est) {
                    continue;
                }
                let status = key.bucket().status();
                let score =
                    i64::from(status.requests_remaining) * 1000 + i64::from(status.tokens_remaining);
                let better = best.as_ref().is_none_or(|(_, _, best_score)| score > *best_score);
                if better {
                    best = Some((adapter.clone(), key.key_name().to_string(), score));
                }
            }
        }
        best.map(|(adapter, key_name, _)| (adapter, key_name))
    }

    fn select_sequential(&self, est: u32) -> Option<(Arc<dyn ProviderAdapter>, String)> {
        for adapter in self.providers.values() {
            if let Some(key) = adapter.pick_key(est) {
                let key_name = key.key_name().to_string();
                return Some((adapter.clone(), key_name));
            }
        }
        None
    }

    fn estimate_tokens(&self, request: &ChatCompletionRequest) -> u32 {
        let adapter = request
            .provider
            .as_deref()
            .and_then(|name| self.providers.get(name))
            .or_else(|| self.providers.values().next());
        adapter.map_or(0, |adapter| adapter.estimate_tokens(request))
    }

    /// Try once to acquire capacity for `est` tokens and dispatch `request`
    /// through whichever key selection yields. Returns `None` when no key
    /// currently has headroom (the caller decides what to do next).
    async fn try_dispatch(
        &self,
        est: u32,
        preferred: Option<&str>,
        request: &ChatCompletionRequest,
    ) -> Option<Result<ChatCompletionResponse>> {
        let (adapter, key_name) = self.select_provider_and_key(est, preferred)?;
        let key = adapter.keys().iter().find(|k| k.key_name() == key_name)?;
        if !key.bucket().acquire(est) {
            return None;
        }
        Some(adapter.call(key, request).await)
    }

    async fn worker_loop(self: Arc<Self>, mut queue_rx: mpsc::Receiver<PendingRequest>) {
        while self.running.load(Ordering::SeqCst) {
            let pending = match tokio::time::timeout(WORKER_POLL_INTERVAL, queue_rx.recv()).await {
                Ok(Some(pending)) => pending,
                Ok(None) => break,
                Err(_elapsed) => continue,
            };
            self.queue_depth.fetch_sub(1, Ordering::SeqCst);

            let result = self.execute_pending(&pending).await;
            // A closed receiver just means the caller already timed out and
            // stopped listening; the worker still ran the request to
            // completion, and its result is simply dropped here.
            let _ = pending.result_tx.send(result);
        }
    }

    async fn execute_pending(&self, pending: &PendingRequest) -> Result<ChatCompletionResponse> {
        for _ in 0..MAX_ATTEMPTS {
            if let Some(outcome) = self
                .try_dispatch(
                    pending.estimated_tokens,
                    pending.preferred_provider.as_deref(),
                    &pending.request,
                )
                .await
            {
                return outcome;
            }
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
        Err(ConductorError::NoCapacity)
    }
}

/// Owns providers, the admission queue, and the worker that drains it.
pub struct Scheduler {
    inner: Arc<Inner>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        providers: IndexMap<String, Arc<dyn ProviderAdapter>>,
        strategy: SchedulingStrategy,
        max_queue_size: usize,
        max_wait_time: Duration,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(max_queue_size.max(1));
        Self {
            inner: Arc::new(Inner {
                providers,
                strategy,
                policy_cursor: AtomicUsize::new(0),
                queue_tx,
                queue_rx: Mutex::new(Some(queue_rx)),
                queue_depth: AtomicUsize::new(0),
                max_wait_time,
                running: AtomicBool::new(false),
            }),
            worker_handle: Mutex::new(None),
        }
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.inner.providers.len()
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.inner.strategy
    }

    /// Start the background worker. Idempotent.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let queue_rx = self
            .inner
            .queue_rx
            .lock()
            .unwrap()
            .take()
            .expect("scheduler worker already started");
        let inner = self.inner.clone();
        let handle = tokio::spawn(Inner::worker_loop(inner, queue_rx));
        *self.worker_handle.lock().unwrap() = Some(handle);
        tracing::info!(strategy = self.inner.strategy.as_str(), "scheduler started");
    }

    /// Stop the worker and close every provider adapter. In-flight upstream
    /// calls are allowed to finish; queued items with no waiter left get
    /// their results dropped.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        let handle = self.worker_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        for adapter in self.inner.providers.values() {
            adapter.close().await;
        }
        tracing::info!("scheduler stopped");
    }

    /// Submit a chat-completion request for scheduling.
    ///
    /// Tries an immediate dispatch first; if no key has headroom right now,
    /// enqueues and waits (up to `max_wait_time`) for the worker to dispatch it.
    pub async fn submit(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        if request.stream {
            return Err(ConductorError::UnsupportedFeature(
                "streaming responses are not supported".into(),
            ));
        }
        if self.inner.providers.is_empty() {
            return Err(ConductorError::Config("no providers configured".into()));
        }
        if !self.inner.running.load(Ordering::SeqCst) {
            return Err(ConductorError::ShuttingDown);
        }

        let est = self.inner.estimate_tokens(&request);

        if let Some(outcome) = self
            .inner
            .try_dispatch(est, request.provider.as_deref(), &request)
            .await
        {
            return outcome;
        }

        self.enqueue_and_wait(request, est).await
    }

    async fn enqueue_and_wait(
        &self,
        request: ChatCompletionRequest,
        est: u32,
    ) -> Result<ChatCompletionResponse> {
        let (result_tx, result_rx) = oneshot::channel();
        let preferred_provider = request.provider.clone();
        let pending = PendingRequest {
            request,
            result_tx,
            created_at: Instant::now(),
            estimated_tokens: est,
            preferred_provider,
        };

        self.inner
            .queue_tx
            .try_send(pending)
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => ConductorError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => ConductorError::ShuttingDown,
            })?;
        self.inner.queue_depth.fetch_add(1, Ordering::SeqCst);

        match tokio::time::timeout(self.inner.max_wait_time, result_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_dropped)) => Err(ConductorError::ShuttingDown),
            Err(_elapsed) => Err(ConductorError::Timeout),
        }
    }

    /// Read-only snapshot for the status endpoint.
    pub fn status(&self) -> ConductorStatus {
        let mut provider_statuses = Vec::new();
        let mut total_keys = 0usize;
        let mut available_keys = 0usize;

        for adapter in self.inner.providers.values() {
            for key in adapter.keys() {
                total_keys += 1;
                let status = key.bucket().status();
                if status.is_available {
                    available_keys += 1;
                }
                provider_statuses.push(ProviderKeyStatus {
                    provider: adapter.name().to_string(),
                    key_name: key.key_name().to_string(),
                    requests_remaining: status.requests_remaining,
                    tokens_remaining: status.tokens_remaining,
                    requests_per_minute: status.requests_per_minute,
                    tokens_per_minute: status.tokens_per_minute,
                    reset_at: status.reset_at,
                    is_available: status.is_available,
                });
            }
        }

        ConductorStatus {
            status: if self.inner.running.load(Ordering::SeqCst) {
                "running".to_string()
            } else {
                "stopped".to_string()
            },
            scheduling_strategy: self.inner.strategy.as_str().to_string(),
            total_providers: self.inner.providers.len(),
            total_keys,
            available_keys,
            pending_requests: self.inner.queue_depth.load(Ordering::SeqCst),
            providers: provider_statuses,
        }
    }
}
