//! Background recalculation
//!
//! Recalculations triggered by drift reports, action results or an explicit
//! request are queued on a channel and run on a dedicated task, so callers
//! never wait on factor collection. The same task recalculates every scored
//! agent on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use agentid_types::{AgentId, RecalculationReason};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{Result, TrustError, TrustScoreCalculator};

/// Default capacity of the recalculation queue
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A queued recalculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecalculationRequest {
    pub agent_id: AgentId,
    pub reason: RecalculationReason,
}

/// Cloneable handle used to queue recalculations
#[derive(Debug, Clone)]
pub struct RecalculationHandle {
    tx: mpsc::Sender<RecalculationRequest>,
}

impl RecalculationHandle {
    /// Queue a recalculation, waiting for room if the queue is full
    pub async fn enqueue(&self, agent_id: AgentId, reason: RecalculationReason) -> Result<()> {
        self.tx
            .send(RecalculationRequest { agent_id, reason })
            .await
            .map_err(|_| TrustError::QueueClosed)
    }

    /// Queue a recalculation without waiting
    pub fn try_enqueue(&self, agent_id: AgentId, reason: RecalculationReason) -> Result<()> {
        self.tx
            .try_send(RecalculationRequest { agent_id, reason })
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => TrustError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => TrustError::QueueClosed,
            })
    }
}

/// Worker that drains the recalculation queue and runs scheduled passes
pub struct RecalculationWorker {
    calculator: Arc<TrustScoreCalculator>,
    rx: mpsc::Receiver<RecalculationRequest>,
    interval: Option<Duration>,
}

impl RecalculationWorker {
    /// Create a worker and the handle used to feed it. With `interval` set,
    /// every agent with a cached score is recalculated on that period.
    pub fn new(
        calculator: Arc<TrustScoreCalculator>,
        interval: Option<Duration>,
    ) -> (Self, RecalculationHandle) {
        Self::with_capacity(calculator, interval, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        calculator: Arc<TrustScoreCalculator>,
        interval: Option<Duration>,
        capacity: usize,
    ) -> (Self, RecalculationHandle) {
        let (tx, rx) = mpsc::channel(capacity);
        let worker = Self {
            calculator,
            rx,
            interval,
        };
        (worker, RecalculationHandle { tx })
    }

    /// Start the worker on its own task.
    ///
    /// Returns a shutdown sender and the task handle. The task also exits
    /// once every [`RecalculationHandle`] has been dropped.
    pub fn start(self) -> (watch::Sender<bool>, JoinHandle<()>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        (shutdown_tx, task)
    }

    async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval = ?self.interval, "starting trust recalculation worker");

        let mut ticker = self.interval.map(tokio::time::interval);
        if let Some(ticker) = ticker.as_mut() {
            ticker.tick().await; // Skip the first immediate tick
        }

        loop {
            tokio::select! {
                request = self.rx.recv() => {
                    match request {
                        Some(request) => self.recalculate(request).await,
                        None => {
                            info!("recalculation queue closed, worker stopping");
                            break;
                        }
                    }
                }
                _ = tick(&mut ticker) => {
                    self.scheduled_pass().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("trust recalculation worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn recalculate(&self, request: RecalculationRequest) {
        debug!(agent_id = %request.agent_id, reason = %request.reason, "queued recalculation");
        if let Err(e) = self
            .calculator
            .compute_score(&request.agent_id, request.reason)
            .await
        {
            error!(agent_id = %request.agent_id, "queued recalculation failed: {}", e);
        }
    }

    async fn scheduled_pass(&self) {
        let agents = self.calculator.cache().agent_ids();
        info!(agents = agents.len(), "running scheduled trust recalculation");

        let mut failures = 0usize;
        for agent_id in agents {
            if let Err(e) = self
                .calculator
                .compute_score(&agent_id, RecalculationReason::Scheduled)
                .await
            {
                failures += 1;
                error!(agent_id = %agent_id, "scheduled recalculation failed: {}", e);
            }
        }
        if failures > 0 {
            warn!(failures, "scheduled trust recalculation finished with failures");
        }
    }
}

/// Wait for the next tick, or forever when no schedule is configured
async fn tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
