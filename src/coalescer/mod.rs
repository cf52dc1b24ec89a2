pub mod state;

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::db::ConnectionPool;
use crate::scorer::Scorer;
use crate::upstream::UpstreamClient;
use crate::variant_key::VariantKey;

pub use state::Admission;
use state::CoalescerState;

struct Inner {
    config: Config,
    pool: ConnectionPool,
    upstream: UpstreamClient,
    scorer: Box<dyn Scorer>,
    state: Mutex<CoalescerState>,
    timer: Mutex<Option<JoinHandle<()>>>,
    workers: Semaphore,
    shutting_down: Mutex<bool>,
}

/// The batch coalescer. Cheap to clone: every clone shares the same
/// underlying state, matching the `Arc`-wrapped shared-state pattern
/// `records_cache::RecordsCache` uses for its own background-task state.
#[derive(Clone)]
pub struct Coalescer(Arc<Inner>);

impl Coalescer {
    pub fn new(config: Config, pool: ConnectionPool, upstream: UpstreamClient, scorer: Box<dyn Scorer>) -> Self {
        let workers = Semaphore::new(config.workers);
        Self(Arc::new(Inner {
            config,
            pool,
            upstream,
            scorer,
            state: Mutex::new(CoalescerState::new()),
            timer: Mutex::new(None),
            workers,
            shutting_down: Mutex::new(false),
        }))
    }

    pub fn batch_max_size(&self) -> usize {
        self.0.config.batch_max_size
    }

    pub fn batch_wait_seconds(&self) -> f64 {
        self.0.config.batch_wait_seconds
    }

    pub fn retry_max(&self) -> u32 {
        self.0.config.retry_max
    }

    pub async fn in_progress_count(&self) -> usize {
        self.0.state.lock().await.in_progress_count()
    }

    pub async fn in_progress_keys(&self) -> Vec<String> {
        self.0.state.lock().await.in_progress_keys()
    }

    /// `(in_flight, attempts)` for the given key, used by `poll`.
    pub async fn status(&self, key: &VariantKey) -> (bool, u32) {
        self.0.state.lock().await.status(key)
    }

    /// `add(variant)`. Admits the key under the state lock, then either
    /// dispatches synchronously (size trigger) or (re)arms the idle timer.
    pub async fn submit(&self, key: VariantKey) -> Admission {
        if *self.0.shutting_down.lock().await {
            return Admission::RetryExceeded;
        }

        let retry_max = self.0.config.retry_max;
        let (admission, should_dispatch) = {
            let mut state = self.0.state.lock().await;
            let admission = state.admit(key, retry_max);
            let should_dispatch =
                matches!(admission, Admission::Queued { in_progress: false, .. })
                    && state.buffer_len() >= self.0.config.batch_max_size;
            (admission, should_dispatch)
        };

        if matches!(admission, Admission::Queued { in_progress: false, .. }) {
            if should_dispatch {
                self.cancel_timer().await;
                self.dispatch().await;
            } else {
                self.arm_timer().await;
            }
        }

        admission
    }

    async fn cancel_timer(&self) {
        if let Some(handle) = self.0.timer.lock().await.take() {
            handle.abort();
        }
    }

    /// Re-arms the single idle timer: admission always replaces any
    /// existing timer rather than leaving the old deadline in place, but a
    /// lone variant still fires after exactly one `T_wait`, never sooner and
    /// never later than the most recent admission plus `T_wait`.
    async fn arm_timer(&self) {
        self.cancel_timer().await;
        let this = self.clone();
        let wait = Duration::from_secs_f64(self.0.config.batch_wait_seconds);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            this.dispatch().await;
        });
        *self.0.timer.lock().await = Some(handle);
    }

    /// Dispatch: snapshot and clear the buffer under the state lock, then
    /// hand the batch to the bounded worker pool.
    async fn dispatch(&self) {
        let batch = {
            let mut state = self.0.state.lock().await;
            state.take_batch()
        };
        if batch.is_empty() {
            return;
        }
        self.run_batch(batch).await;
    }

    async fn run_batch(&self, batch: Vec<VariantKey>) {
        let this = self.clone();
        tokio::spawn(async move {
            let _permit = this
                .0
                .workers
                .acquire()
                .await
                .expect("worker semaphore is never closed while batches run");
            this.process_batch(batch).await;
        });
    }

    /// Batch task: one upstream call, per-record parse+score, one bulk
    /// upsert. Any failure fails the whole batch and is recovered by the
    /// completion callback (retry accounting), never propagated to the
    /// caller, since there is no caller left to propagate to once `submit`
    /// has returned.
    async fn process_batch(&self, batch: Vec<VariantKey>) {
        info!("Dispatching batch of {} variants", batch.len());

        let outcome = self.try_process_batch(&batch).await;

        let mut state = self.0.state.lock().await;
        match outcome {
            Ok(()) => {
                info!("Batch of {} variants completed successfully", batch.len());
                state.complete_success(&batch);
            }
            Err(err) => {
                warn!("Batch of {} variants failed: {err}", batch.len());
                state.complete_failure(&batch);
            }
        }
    }

    async fn try_process_batch(&self, batch: &[VariantKey]) -> Result<(), crate::error::Error> {
        let records = self
            .0
            .upstream
            .annotate(batch)
            .await
            .map_err(|err| crate::error::Error::Upstream(err.to_string()))?;

        let mut parsed = Vec::with_capacity(records.len());
        for record in &records {
            match crate::parser::parse_record(record, self.0.scorer.as_ref()) {
                Ok(annotation) => parsed.push(annotation),
                Err(err) => warn!("Skipping unparseable upstream record: {err}"),
            }
        }

        let pool = self.0.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            crate::db::bulk_upsert(&mut conn, &parsed)
        })
        .await
        .expect("bulk upsert blocking task did not panic")
    }

    /// Graceful shutdown: dispatch whatever is left in the buffer,
    /// then wait up to the configured grace period for in-flight batches to
    /// drain. New `submit` calls fail fast from the moment this is called.
    pub async fn shutdown(&self) {
        *self.0.shutting_down.lock().await = true;
        self.cancel_timer().await;

        let remaining = {
            let mut state = self.0.state.lock().await;
            state.drain()
        };
        if !remaining.is_empty() {
            self.run_batch(remaining).await;
        }

        let grace = Duration::from_secs(self.0.config.shutdown_grace_seconds);
        let total_permits = self.0.config.workers;
        let drain = self.0.workers.acquire_many(total_permits as u32);
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!("Shutdown grace period elapsed with batches still in flight");
        }
    }
}
