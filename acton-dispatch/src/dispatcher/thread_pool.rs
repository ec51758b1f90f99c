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
use tracing::{debug, instrument, trace};

use crate::agent::AgentHandle;
use crate::common::config::{ActonConfig, PRIORITY_COUNT};
use crate::common::{EventQueueRef, Result};
use crate::dispatcher::lifecycle::DispatcherCore;
use crate::dispatcher::pool_queue::{AgentQueue, DispatchQueue};
use crate::dispatcher::{BindHint, DispatcherKind, DispatcherState, DispatcherStats, ShutdownMode};
use crate::traits::Dispatcher;

/// Sizing of a thread pool dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadPoolParams {
    /// Worker threads; at least one is always started.
    pub thread_count: usize,
    /// Demands a worker runs from one agent queue before putting it back
    /// behind the other ready queues.
    pub max_demands_at_once: usize,
}

impl Default for ThreadPoolParams {
    fn default() -> Self {
        Self {
            thread_count: 4,
            max_demands_at_once: 4,
        }
    }
}

impl ThreadPoolParams {
    /// Sizing taken from the `[limits]` section of a configuration.
    #[must_use]
    pub const fn from_config(config: &ActonConfig) -> Self {
        Self {
            thread_count: config.limits.thread_pool_size,
            max_demands_at_once: config.limits.max_demands_at_once,
        }
    }

    /// Overrides the worker count.
    #[must_use]
    pub const fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Overrides the batch size.
    #[must_use]
    pub const fn with_max_demands_at_once(mut self, max_demands_at_once: usize) -> Self {
        self.max_demands_at_once = max_demands_at_once;
        self
    }
}

#[derive(Debug)]
struct PoolGroup {
    queue: Arc<AgentQueue>,
    agents: usize,
}

/// A fixed set of worker threads shared by every bound agent.
///
/// Each agent gets a private queue; agents bound with the same group name
/// share one. Workers take ready queues from a shared dispatch queue, so a
/// busy agent never blocks an unrelated one, and a queue is held by at most
/// one worker at a time, so an agent's handlers never overlap.
///
/// [`ThreadPoolDispatcher::new`] serves ready queues round-robin.
/// [`ThreadPoolDispatcher::with_priorities`] groups them into eight priority
/// bands served highest first, each for at most its quote of turns before
/// the next lower band gets one.
#[derive(Debug)]
pub struct ThreadPoolDispatcher {
    core: DispatcherCore,
    kind: DispatcherKind,
    params: ThreadPoolParams,
    dispatch: Arc<DispatchQueue>,
    groups: Mutex<HashMap<String, PoolGroup>>,
    private: Mutex<HashMap<u64, Arc<AgentQueue>>>,
}

impl ThreadPoolDispatcher {
    /// A round-robin pool.
    #[must_use]
    pub fn new(name: impl Into<String>, params: ThreadPoolParams) -> Self {
        Self::build(name.into(), params, DispatcherKind::ThreadPool, DispatchQueue::round_robin())
    }

    /// A priority-aware pool; `quotes[p]` is the number of consecutive queue
    /// turns priority `p` may take. Zero quotes are raised to one.
    #[must_use]
    pub fn with_priorities(
        name: impl Into<String>,
        params: ThreadPoolParams,
        quotes: [usize; PRIORITY_COUNT],
    ) -> Self {
        Self::build(
            name.into(),
            params,
            DispatcherKind::PriorityThreadPool,
            DispatchQueue::quoted(quotes),
        )
    }

    fn build(
        name: String,
        params: ThreadPoolParams,
        kind: DispatcherKind,
        dispatch: DispatchQueue,
    ) -> Self {
        Self {
            core: DispatcherCore::new(name),
            kind,
            params: ThreadPoolParams {
                thread_count: params.thread_count.max(1),
                max_demands_at_once: params.max_demands_at_once.max(1),
            },
            dispatch: Arc::new(dispatch),
            groups: Mutex::new(HashMap::new()),
            private: Mutex::new(HashMap::new()),
        }
    }

    /// The effective sizing.
    #[must_use]
    pub const fn params(&self) -> ThreadPoolParams {
        self.params
    }
}

fn work_loop(dispatch: &DispatchQueue, max_demands_at_once: usize) {
    while let Some(queue) = dispatch.pop_blocking() {
        if queue.run_batch(max_demands_at_once) && !dispatch.schedule(Arc::clone(&queue)) {
            queue.abandon();
        }
    }
    trace!("pool worker exiting");
}

impl Dispatcher for ThreadPoolDispatcher {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> DispatcherKind {
        self.kind
    }

    fn state(&self) -> DispatcherState {
        self.core.state()
    }

    #[instrument(
        skip(self),
        fields(dispatcher = %self.core.name(), threads = self.params.thread_count)
    )]
    fn start(&self) -> Result<()> {
        if !self.core.begin_start() {
            return Ok(());
        }
        for _ in 0..self.params.thread_count {
            let dispatch = Arc::clone(&self.dispatch);
            let max_demands_at_once = self.params.max_demands_at_once;
            dispatch.register_worker();
            let worker_dispatch = Arc::clone(&dispatch);
            if let Err(e) = self
                .core
                .spawn_worker(move || work_loop(&worker_dispatch, max_demands_at_once))
            {
                // The spawned-but-missing worker must not keep drain waiting.
                dispatch.unregister_worker();
                return Err(e);
            }
        }
        Ok(())
    }

    fn shutdown_with(&self, mode: ShutdownMode) {
        if self.core.begin_shutdown() {
            for queue in self.private.lock().values() {
                queue.close();
            }
            for group in self.groups.lock().values() {
                group.queue.close();
            }
            self.dispatch.shutdown(mode);
        }
    }

    fn wait(&self) {
        self.core.join_workers();
    }

    #[instrument(skip(self, agent), fields(dispatcher = %self.core.name(), agent = %agent.id()))]
    fn bind_agent(&self, agent: &AgentHandle, hint: &BindHint) -> Result<EventQueueRef> {
        self.core.ensure_started()?;
        let queue = match hint.group.as_deref() {
            Some(group_name) => {
                let mut groups = self.groups.lock();
                let group = groups.entry(group_name.to_string()).or_insert_with(|| PoolGroup {
                    queue: AgentQueue::new(
                        format!("{}/{group_name}", self.core.name()),
                        agent.priority(),
                        Arc::clone(&self.dispatch),
                    ),
                    agents: 0,
                });
                group.agents += 1;
                Arc::clone(&group.queue)
            }
            None => {
                let queue = AgentQueue::new(
                    format!("{}/{}", self.core.name(), agent.id()),
                    agent.priority(),
                    Arc::clone(&self.dispatch),
                );
                self.private.lock().insert(agent.key(), Arc::clone(&queue));
                queue
            }
        };
        let queue: EventQueueRef = queue;
        self.core.bind(agent.key(), Arc::clone(&queue));
        debug!(priority = %agent.priority(), "agent bound");
        Ok(queue)
    }

    fn unbind_agent(&self, agent: &AgentHandle, hint: &BindHint) {
        if self.core.unbind(agent.key()).is_none() {
            return;
        }
        match hint.group.as_deref() {
            Some(group_name) => {
                let mut groups = self.groups.lock();
                let emptied = groups.get_mut(group_name).is_some_and(|group| {
                    group.agents = group.agents.saturating_sub(1);
                    group.agents == 0
                });
                if emptied {
                    if let Some(group) = groups.remove(group_name) {
                        group.queue.close();
                    }
                }
            }
            None => {
                if let Some(queue) = self.private.lock().remove(&agent.key()) {
                    queue.close();
                }
            }
        }
        debug!(dispatcher = %self.core.name(), agent = %agent.id(), "agent unbound");
    }

    fn get_queue_for(&self, agent: &AgentHandle) -> Option<EventQueueRef> {
        self.core.queue_for(agent.key())
    }

    fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            name: self.core.name().to_string(),
            kind: self.kind,
            state: self.core.state(),
            worker_threads: self.core.live_workers(),
            queues: self.core.queue_stats(),
        }
    }
}
