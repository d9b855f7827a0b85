// src/engine/coordinator.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::build::OptimisticStrategy;
use crate::bus::{ConsumeFuture, Consumer, Delivery, Handled, Message};
use crate::consumers::{RunRequestSink, SinkFuture};
use crate::types::TriggerWhileRunningBehaviour;

use super::cycle::CyclePipeline;
use super::queue::{RunQueue, RunRequest};

#[derive(Debug)]
struct WorkerState {
    queue: RunQueue,
    /// Token of the cycle in progress.
    current: Option<CancellationToken>,
    /// The running cycle was cancelled to make room for a newer request; its
    /// own request goes back into the queue.
    restart: bool,
}

#[derive(Debug)]
struct Shared {
    pipeline: CyclePipeline,
    state: Mutex<WorkerState>,
    wake: Notify,
    /// `true` when no cycle is running and nothing is queued.
    idle: watch::Sender<bool>,
    shutdown: CancellationToken,
    cycles: AtomicU64,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, WorkerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Owns the worker task that runs cycles one at a time.
///
/// Requests that arrive while a cycle runs are queued (or, with
/// [`TriggerWhileRunningBehaviour::Abort`], cancel the running cycle and are
/// merged with it). Abort is cooperative: the running cycle stops at the next
/// build or runner group boundary.
#[derive(Debug)]
pub struct RunCoordinator {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RunCoordinator {
    /// Spawn the worker. Must be called inside a Tokio runtime.
    pub fn start(pipeline: CyclePipeline, queue: RunQueue) -> Arc<Self> {
        let (idle, _) = watch::channel(true);
        let shared = Arc::new(Shared {
            pipeline,
            state: Mutex::new(WorkerState {
                queue,
                current: None,
                restart: false,
            }),
            wake: Notify::new(),
            idle,
            shutdown: CancellationToken::new(),
            cycles: AtomicU64::new(0),
        });
        let worker = tokio::spawn(work(Arc::clone(&shared)));
        Arc::new(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn is_idle(&self) -> bool {
        *self.shared.idle.borrow()
    }

    /// Number of cycles completed (aborted ones included).
    pub fn cycles_completed(&self) -> u64 {
        self.shared.cycles.load(Ordering::Acquire)
    }

    /// Resolve once no cycle is running and nothing is queued.
    pub async fn wait_idle(&self) {
        let mut rx = self.shared.idle.subscribe();
        if rx.wait_for(|idle| *idle).await.is_err() {
            debug!("idle flag dropped");
        }
    }

    pub fn set_optimistic_strategy(&self, strategy: Option<OptimisticStrategy>) {
        self.shared.pipeline.set_optimistic_strategy(strategy);
    }

    /// Stop the worker after the current cycle is cancelled.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            warn!(error = %err, "run worker ended abnormally");
        }
    }

    /// Cancel the running cycle and drop everything queued, without waiting.
    pub fn cancel(&self) {
        let mut state = self.shared.state();
        state.queue.clear();
        state.restart = false;
        if let Some(token) = &state.current {
            token.cancel();
        }
    }
}

impl RunRequestSink for RunCoordinator {
    fn submit(&self, request: RunRequest) {
        if request.is_empty() {
            return;
        }
        {
            let mut state = self.shared.state();
            if self.shared.shutdown.is_cancelled() {
                debug!("coordinator shut down; dropping run request");
                return;
            }
            state.queue.record(request);
            self.shared.idle.send_replace(false);

            if state.queue.behaviour() == TriggerWhileRunningBehaviour::Abort
                && let Some(token) = state.current.clone()
                && !token.is_cancelled()
            {
                info!("new changes while running; aborting current cycle");
                state.restart = true;
                token.cancel();
            }
        }
        self.shared.wake.notify_one();
    }

    fn abort(&self) -> SinkFuture<'_> {
        Box::pin(async move {
            self.cancel();
            self.wait_idle().await;
        })
    }

    fn is_running(&self) -> bool {
        self.shared.state().current.is_some()
    }
}

impl Consumer for RunCoordinator {
    fn name(&self) -> &str {
        "run-coordinator"
    }

    fn consume<'a>(&'a self, message: &'a Message, _delivery: Delivery) -> ConsumeFuture<'a> {
        Box::pin(async move {
            if let Message::Abort(abort) = message {
                info!(reason = %abort.reason, "aborting run");
                RunRequestSink::abort(self).await;
            }
            Ok(Handled::Passed)
        })
    }
}

async fn work(shared: Arc<Shared>) {
    debug!("run worker started");
    loop {
        let next = {
            let mut state = shared.state();
            match state.queue.drain() {
                Some(request) => {
                    let token = shared.shutdown.child_token();
                    state.current = Some(token.clone());
                    Some((request, token))
                }
                None => {
                    state.current = None;
                    shared.idle.send_replace(true);
                    None
                }
            }
        };

        match next {
            Some((request, token)) => {
                let report = shared.pipeline.run(request.clone(), &token).await;
                shared.cycles.fetch_add(1, Ordering::AcqRel);

                let mut state = shared.state();
                state.current = None;
                if std::mem::take(&mut state.restart) && report.aborted {
                    debug!("re-queuing aborted cycle");
                    state.queue.record(request);
                }
            }
            None => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = shared.shutdown.cancelled() => break,
                }
            }
        }

        if shared.shutdown.is_cancelled() {
            break;
        }
    }

    let mut state = shared.state();
    state.queue.clear();
    state.current = None;
    shared.idle.send_replace(true);
    debug!("run worker stopped");
}
