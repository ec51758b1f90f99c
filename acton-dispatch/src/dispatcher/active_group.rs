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

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::agent::AgentHandle;
use crate::common::{EventQueueRef, Result};
use crate::dispatcher::demand_queue::DemandQueue;
use crate::dispatcher::lifecycle::DispatcherCore;
use crate::dispatcher::{BindHint, DispatcherKind, DispatcherState, DispatcherStats, ShutdownMode};
use crate::message::DispatchError;
use crate::traits::Dispatcher;

#[derive(Debug)]
struct Group {
    queue: Arc<DemandQueue>,
    agents: usize,
}

/// One worker thread and queue per named group.
///
/// Agents sharing a group run one at a time on the group's thread; agents in
/// different groups run in parallel. A group's thread starts with its first
/// agent and exits after its last agent is unbound.
///
/// ```ignore
/// let io = env.add_dispatcher(ActiveGroupDispatcher::new("io"))?;
/// let config = AgentConfig::new("reader")?.bind_to("io").in_group("disk");
/// ```
#[derive(Debug)]
pub struct ActiveGroupDispatcher {
    core: DispatcherCore,
    groups: Mutex<HashMap<String, Group>>,
}

impl ActiveGroupDispatcher {
    /// Creates a dispatcher; no threads exist until agents bind.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: DispatcherCore::new(name),
            groups: Mutex::new(HashMap::new()),
        }
    }
}

impl Dispatcher for ActiveGroupDispatcher {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> DispatcherKind {
        DispatcherKind::ActiveGroup
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
            for group in self.groups.lock().values() {
                group.queue.shutdown(mode);
            }
        }
    }

    fn wait(&self) {
        self.core.join_workers();
    }

    #[instrument(skip(self, agent), fields(dispatcher = %self.core.name(), agent = %agent.id()))]
    fn bind_agent(&self, agent: &AgentHandle, hint: &BindHint) -> Result<EventQueueRef> {
        let Some(group_name) = hint.group.as_deref() else {
            return Err(DispatchError::MissingGroup {
                dispatcher: self.core.name().to_string(),
                agent: agent.id().to_string(),
            });
        };
        let queue = {
            let mut groups = self.groups.lock();
            // Checked under the groups lock so shutdown cannot miss a new group.
            self.core.ensure_started()?;
            if let Some(group) = groups.get_mut(group_name) {
                group.agents += 1;
                Arc::clone(&group.queue)
            } else {
                let label = format!("{}/{group_name}", self.core.name());
                let queue = Arc::new(DemandQueue::new(label));
                let worker_queue = Arc::clone(&queue);
                self.core.spawn_worker(move || worker_queue.serve())?;
                groups.insert(
                    group_name.to_string(),
                    Group {
                        queue: Arc::clone(&queue),
                        agents: 1,
                    },
                );
                debug!(group = group_name, "group worker started");
                queue
            }
        };
        let queue: EventQueueRef = queue;
        self.core.bind(agent.key(), Arc::clone(&queue));
        debug!(group = group_name, "agent bound");
        Ok(queue)
    }

    fn unbind_agent(&self, agent: &AgentHandle, hint: &BindHint) {
        if self.core.unbind(agent.key()).is_none() {
            return;
        }
        let Some(group_name) = hint.group.as_deref() else {
            return;
        };
        let mut groups = self.groups.lock();
        let emptied = match groups.get_mut(group_name) {
            Some(group) => {
                group.agents = group.agents.saturating_sub(1);
                group.agents == 0
            }
            None => false,
        };
        if emptied {
            if let Some(group) = groups.remove(group_name) {
                group.queue.shutdown(ShutdownMode::Drain);
                debug!(
                    dispatcher = %self.core.name(),
                    group = group_name,
                    "last agent left group; worker will exit after draining"
                );
            }
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
