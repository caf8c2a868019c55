//! Bounded background replication.
//!
//! A [`Replicator`] owns a fixed pool of worker threads fed through a bounded
//! channel. Each task copies one payload to every registered target. The
//! submitting thread never observes replication failures; they surface only
//! through [`ReplicationStats`] and `warn!` logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trellis_types::ContentId;

use crate::config::ReplicationConfig;
use crate::storage::Storage;

/// What a submitter does when the replication queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaturationPolicy {
    /// Wait for a free slot.
    Block,
    /// Drop the task and count it in [`ReplicationStats::dropped`].
    #[default]
    DropAndCount,
}

/// Snapshot of replication counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationStats {
    /// Tasks accepted into the queue.
    pub submitted: u64,
    /// Successful writes to a target.
    pub replicated: u64,
    /// Tasks rejected because the queue was full.
    pub dropped: u64,
    /// Failed writes to a target.
    pub failed: u64,
}

/// Targets shared between a repo and its replicator.
pub type Targets = Arc<RwLock<Vec<Arc<dyn Storage>>>>;

struct Task {
    id: ContentId,
    data: Bytes,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    replicated: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    pending: Mutex<usize>,
    idle: Condvar,
}

impl Counters {
    fn finish_one(&self) {
        let mut pending = self.pending.lock().expect("lock poisoned");
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Worker pool propagating payloads to secondary backends.
pub struct Replicator {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    targets: Targets,
    counters: Arc<Counters>,
    policy: SaturationPolicy,
}

impl Replicator {
    /// Spawn `config.workers` threads (at least one) replicating to `targets`.
    pub fn new(config: &ReplicationConfig, targets: Targets) -> Self {
        let (sender, receiver) = bounded::<Task>(config.queue_capacity);
        let counters = Arc::new(Counters::default());
        let workers = (0..config.workers.max(1))
            .map(|n| {
                let receiver = receiver.clone();
                let targets = Arc::clone(&targets);
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || worker_loop(n, receiver, targets, counters))
            })
            .collect();

        debug!(
            workers = config.workers.max(1),
            queue = config.queue_capacity,
            policy = ?config.saturation,
            "replicator started"
        );

        Self {
            sender: Some(sender),
            workers,
            targets,
            counters,
            policy: config.saturation,
        }
    }

    pub fn policy(&self) -> SaturationPolicy {
        self.policy
    }

    /// Queue `data` for replication to every current target.
    ///
    /// Returns `false` if the task was dropped. With no targets registered
    /// there is nothing to do and the call returns `true`.
    pub fn submit(&self, id: ContentId, data: Bytes) -> bool {
        if self.targets.read().expect("lock poisoned").is_empty() {
            return true;
        }
        let Some(sender) = &self.sender else {
            return false;
        };

        *self.counters.pending.lock().expect("lock poisoned") += 1;
        let task = Task { id, data };
        let outcome = match self.policy {
            SaturationPolicy::Block => sender.send(task).map_err(|e| e.into_inner()),
            SaturationPolicy::DropAndCount => sender.try_send(task).map_err(|e| match e {
                TrySendError::Full(task) | TrySendError::Disconnected(task) => task,
            }),
        };

        match outcome {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(task) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                self.counters.finish_one();
                warn!(
                    id = %task.id.short_hex(),
                    dropped,
                    "replication queue saturated; task dropped"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> ReplicationStats {
        ReplicationStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            replicated: self.counters.replicated.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Tasks accepted but not yet finished.
    pub fn pending(&self) -> usize {
        *self.counters.pending.lock().expect("lock poisoned")
    }

    /// Block until every accepted task has finished or `timeout` elapses.
    /// Returns `true` if the queue drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let pending = self.counters.pending.lock().expect("lock poisoned");
        let (pending, _) = self
            .counters
            .idle
            .wait_timeout_while(pending, timeout, |p| *p > 0)
            .expect("lock poisoned");
        *pending == 0
    }
}

fn worker_loop(worker: usize, receiver: Receiver<Task>, targets: Targets, counters: Arc<Counters>) {
    for task in receiver.iter() {
        let snapshot: Vec<Arc<dyn Storage>> =
            targets.read().expect("lock poisoned").iter().cloned().collect();
        for target in snapshot {
            match target.put(&task.id, task.data.clone()) {
                Ok(()) => {
                    counters.replicated.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        worker,
                        id = %task.id.short_hex(),
                        target = %target.describe(),
                        error = %e,
                        "replication to secondary failed"
                    );
                }
            }
        }
        counters.finish_one();
    }
}

impl Drop for Replicator {
    fn drop(&mut self) {
        // Closing the channel lets workers drain the queue and exit.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for Replicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replicator")
            .field("workers", &self.workers.len())
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}
