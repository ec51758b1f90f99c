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

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::agent::AgentHandle;
use crate::common::{EventQueueRef, Result};
use crate::dispatcher::demand_queue::DemandQueue;
use crate::dispatcher::lifecycle::DispatcherCore;
use crate::dispatcher::{BindHint, DispatcherKind, DispatcherState, DispatcherStats, ShutdownMode};
use crate::traits::Dispatcher;

/// A dedicated worker thread and queue for every bound agent.
///
/// The thread is spawned when the agent binds and exits after the agent is
/// unbound and its queue drained.
#[derive(Debug)]
pub struct ActiveObjectDispatcher {
    core: DispatcherCore,
    queues: DashMap<u64, Arc<DemandQueue>>,
}

impl ActiveObjectDispatcher {
    /// Creates a dispatcher; no threads exist until agents bind.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: DispatcherCore::new(name),
            queues: DashMap::new(),
        }
    }
}

impl Dispatcher for ActiveObjectDispatcher {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> DispatcherKind {
        DispatcherKind::ActiveObject
    }

    fn state(&self) -> DispatcherState {
        self.core.state()
    }

    fn start(&self) -> Result<()> {
        self.core.begin_start();
        Ok(())
    }

    fn shutdown_with(&self, mode: ShutdownMode) {
        if self.core.begin_shutdown() {
            for queue in self.queues.iter() {
                queue.value().shutdown(mode);
            }
        }
    }

    fn wait(&self) {
        self.core.join_workers();
    }

    #[instrument(
        skip(self, agent, _hint),
        fields(dispatcher = %self.core.name(), agent = %agent.id())
    )]
    fn bind_agent(&self, agent: &AgentHandle, _hint: &BindHint) -> Result<EventQueueRef> {
        self.core.ensure_started()?;
        let queue = Arc::new(DemandQueue::new(format!("{}/{}", self.core.name(), agent.id())));
        let worker_queue = Arc::clone(&queue);
        self.core.spawn_worker(move || worker_queue.serve())?;
        self.queues.insert(agent.key(), Arc::clone(&queue));
        if let Err(e) = self.core.ensure_started() {
            // Shutdown raced with this bind and may have missed the new queue.
            self.queues.remove(&agent.key());
            queue.shutdown(ShutdownMode::Drain);
            return Err(e);
        }
        let queue: EventQueueRef = queue;
        self.core.bind(agent.key(), Arc::clone(&queue));
        debug!("agent bound to its own worker");
        Ok(queue)
    }

    fn unbind_agent(&self, agent: &AgentHandle, _hint: &BindHint) {
        self.core.unbind(agent.key());
        if let Some((_, queue)) = self.queues.remove(&agent.key()) {
            queue.shutdown(ShutdownMode::Drain);
            debug!(
                dispatcher = %self.core.name(),
                agent = %agent.id(),
                "agent unbound; worker will exit after draining"
            );
        }
    }

    fn get_queue_for(&self, agent: &AgentHandle) -> Option<EventQueueRef> {
        self.core.queue_for(agent.key())
    }

    fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            name: self.core.name().to_string(),
            kind: self.kind(),
            state: self.core.state(),
            worker_threads: self.core.live_workers(),
            queues: self.core.queue_stats(),
        }
    }
}
