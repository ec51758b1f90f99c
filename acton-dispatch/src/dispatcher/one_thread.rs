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

use tracing::{debug, instrument};

use crate::agent::AgentHandle;
use crate::common::{EventQueueRef, Result};
use crate::dispatcher::demand_queue::DemandQueue;
use crate::dispatcher::lifecycle::DispatcherCore;
use crate::dispatcher::{BindHint, DispatcherKind, DispatcherState, DispatcherStats, ShutdownMode};
use crate::traits::Dispatcher;

/// One worker thread and one queue shared by every bound agent.
///
/// Demands run in strict FIFO order across all agents.
#[derive(Debug)]
pub struct OneThreadDispatcher {
    core: DispatcherCore,
    queue: Arc<DemandQueue>,
}

impl OneThreadDispatcher {
    /// Creates a dispatcher; call [`Dispatcher::start`] (or register it with
    /// the environment) before binding agents.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            queue: Arc::new(DemandQueue::new(name.clone())),
            core: DispatcherCore::new(name),
        }
    }
}

impl Dispatcher for OneThreadDispatcher {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> DispatcherKind {
        DispatcherKind::OneThread
    }

    fn state(&self) -> DispatcherState {
        self.core.state()
    }

    #[instrument(skip(self), fields(dispatcher = %self.core.name()))]
    fn start(&self) -> Result<()> {
        if !self.core.begin_start() {
            return Ok(());
        }
        let queue = Arc::clone(&self.queue);
        self.core.spawn_worker(move || queue.serve())
    }

    fn shutdown_with(&self, mode: ShutdownMode) {
        if self.core.begin_shutdown() {
            self.queue.shutdown(mode);
        }
    }

    fn wait(&self) {
        self.core.join_workers();
    }

    fn bind_agent(&self, agent: &AgentHandle, _hint: &BindHint) -> Result<EventQueueRef> {
        self.core.ensure_started()?;
        let queue: EventQueueRef = self.queue.clone();
        self.core.bind(agent.key(), Arc::clone(&queue));
        debug!(dispatcher = %self.core.name(), agent = %agent.id(), "agent bound");
        Ok(queue)
    }

    fn unbind_agent(&self, agent: &AgentHandle, _hint: &BindHint) {
        if self.core.unbind(agent.key()).is_some() {
            debug!(dispatcher = %self.core.name(), agent = %agent.id(), "agent unbound");
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
