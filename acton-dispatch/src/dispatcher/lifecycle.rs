/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::common::{EventQueueRef, Result};
use crate::dispatcher::{DispatcherState, QueueStats};
use crate::message::DispatchError;

/// Crate-internal: lifecycle, worker threads and bindings shared by every
/// dispatcher implementation.
#[derive(Debug)]
pub(crate) struct DispatcherCore {
    name: String,
    state: Mutex<DispatcherState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    spawned: AtomicUsize,
    bindings: DashMap<u64, EventQueueRef>,
}

impl DispatcherCore {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(DispatcherState::Created),
            workers: Mutex::new(Vec::new()),
            spawned: AtomicUsize::new(0),
            bindings: DashMap::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> DispatcherState {
        *self.state.lock()
    }

    /// Moves `Created → Started`. Returns `false` if that already happened.
    pub(crate) fn begin_start(&self) -> bool {
        let mut state = self.state.lock();
        if *state != DispatcherState::Created {
            return false;
        }
        *state = DispatcherState::Started;
        debug!(dispatcher = %self.name, "dispatcher started");
        true
    }

    /// Moves `Started → ShutdownRequested`. Returns `false` otherwise, which
    /// makes shutdown before start and repeated shutdown no-ops.
    pub(crate) fn begin_shutdown(&self) -> bool {
        let mut state = self.state.lock();
        if *state != DispatcherState::Started {
            return false;
        }
        *state = DispatcherState::ShutdownRequested;
        debug!(dispatcher = %self.name, "dispatcher shutdown requested");
        true
    }

    pub(crate) fn ensure_started(&self) -> Result<()> {
        if self.state() == DispatcherState::Started {
            Ok(())
        } else {
            Err(DispatchError::DispatcherNotStarted {
                dispatcher: self.name.clone(),
            })
        }
    }

    /// Spawns a thread named `<dispatcher>-worker-<n>`, joining any worker
    /// that has already exited.
    pub(crate) fn spawn_worker<F>(&self, work: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let index = self.spawned.fetch_add(1, Ordering::Relaxed);
        let thread_name = format!("{}-worker-{index}", self.name);
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(work)
            .map_err(|source| DispatchError::ThreadSpawn {
                dispatcher: self.name.clone(),
                source,
            })?;
        debug!(dispatcher = %self.name, thread = %thread_name, "worker thread spawned");
        let finished: Vec<_> = {
            let mut workers = self.workers.lock();
            let (finished, running) = std::mem::take(&mut *workers)
                .into_iter()
                .partition(JoinHandle::is_finished);
            *workers = running;
            workers.push(handle);
            finished
        };
        for handle in finished {
            self.join_worker(handle);
        }
        Ok(())
    }

    fn join_worker(&self, handle: JoinHandle<()>) {
        let thread_name = handle.thread().name().unwrap_or("<unnamed>").to_string();
        if handle.join().is_err() {
            error!(dispatcher = %self.name, thread = %thread_name, "worker thread panicked");
        }
    }

    /// Joins every worker spawned so far.
    ///
    /// A worker of this dispatcher calling `wait` on it skips itself rather
    /// than deadlocking.
    pub(crate) fn join_workers(&self) {
        let handles = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                warn!(
                    dispatcher = %self.name,
                    "dispatcher waited on from its own worker; skipping self-join"
                );
                continue;
            }
            self.join_worker(handle);
        }
        let mut state = self.state.lock();
        if *state == DispatcherState::ShutdownRequested {
            *state = DispatcherState::Stopped;
            debug!(dispatcher = %self.name, "dispatcher stopped");
        }
    }

    /// Worker threads not yet finished.
    pub(crate) fn live_workers(&self) -> usize {
        self.workers
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub(crate) fn bind(&self, agent_key: u64, queue: EventQueueRef) {
        self.bindings.insert(agent_key, queue);
    }

    pub(crate) fn unbind(&self, agent_key: u64) -> Option<EventQueueRef> {
        self.bindings.remove(&agent_key).map(|(_, queue)| queue)
    }

    pub(crate) fn queue_for(&self, agent_key: u64) -> Option<EventQueueRef> {
        self.bindings.get(&agent_key).map(|queue| queue.value().clone())
    }

    /// One entry per distinct queue label, with its bound agent count.
    pub(crate) fn queue_stats(&self) -> Vec<QueueStats> {
        let mut queues: BTreeMap<String, QueueStats> = BTreeMap::new();
        for binding in self.bindings.iter() {
            let queue = binding.value();
            queues
                .entry(queue.label().to_string())
                .or_insert_with(|| QueueStats {
                    label: queue.label().to_string(),
                    depth: queue.len(),
                    agents: 0,
                })
                .agents += 1;
        }
        queues.into_values().collect()
    }
}
