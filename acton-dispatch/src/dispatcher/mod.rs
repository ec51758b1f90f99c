//! Dispatchers: the policies that map agents' event queues onto threads.
//!
//! | Dispatcher | Threads | Queues |
//! |---|---|---|
//! | [`OneThreadDispatcher`] | 1 | one shared by every agent |
//! | [`ActiveObjectDispatcher`] | one per agent | one per agent |
//! | [`ActiveGroupDispatcher`] | one per group | one per group |
//! | [`ThreadPoolDispatcher`] | fixed | one per agent (or group), round-robin |
//! | [`ThreadPoolDispatcher::with_priorities`] | fixed | as above, priority bands with quotes |
//!
//! All of them share the lifecycle in `lifecycle.rs` and the queue types in
//! `demand_queue.rs` and `pool_queue.rs`.

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

use std::fmt;

// --- Public Re-exports ---
pub use active_group::ActiveGroupDispatcher;
pub use active_obj::ActiveObjectDispatcher;
pub use one_thread::OneThreadDispatcher;
pub use thread_pool::{ThreadPoolDispatcher, ThreadPoolParams};

// --- Submodules ---

mod active_group;
mod active_obj;
mod demand_queue;
mod lifecycle;
mod one_thread;
mod pool_queue;
mod thread_pool;

/// What happens to pending demands when a dispatcher shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Execute everything already queued, then stop.
    #[default]
    Drain,
    /// Discard everything not yet started; waiting service requests are
    /// canceled and limit counters released.
    Abandon,
}

/// Lifecycle position of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Constructed, no threads yet.
    Created,
    /// Worker threads running; agents may bind.
    Started,
    /// Shutdown signaled; workers are finishing.
    ShutdownRequested,
    /// Every worker has been joined.
    Stopped,
}

/// Which scheduling policy a dispatcher implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherKind {
    /// One thread, one shared queue.
    OneThread,
    /// One thread and queue per agent.
    ActiveObject,
    /// One thread and queue per named group.
    ActiveGroup,
    /// Fixed pool, round-robin over ready queues.
    ThreadPool,
    /// Fixed pool, quoted round-robin over priority bands.
    PriorityThreadPool,
}

impl fmt::Display for DispatcherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OneThread => "one_thread",
            Self::ActiveObject => "active_obj",
            Self::ActiveGroup => "active_group",
            Self::ThreadPool => "thread_pool",
            Self::PriorityThreadPool => "prio_thread_pool",
        };
        f.write_str(name)
    }
}

/// Per-agent binding parameters passed to
/// [`Dispatcher::bind_agent`](crate::traits::Dispatcher::bind_agent).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindHint {
    /// Group name. Required by [`ActiveGroupDispatcher`]; makes agents
    /// share one queue on a [`ThreadPoolDispatcher`]; ignored otherwise.
    pub group: Option<String>,
}

impl BindHint {
    /// A hint placing the agent in `group`.
    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            group: Some(name.into()),
        }
    }
}

/// Statistics for one event queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Queue label.
    pub label: String,
    /// Demands waiting.
    pub depth: usize,
    /// Agents bound to the queue.
    pub agents: usize,
}

/// Read-only statistics for one dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Registered name.
    pub name: String,
    /// Scheduling policy.
    pub kind: DispatcherKind,
    /// Lifecycle position.
    pub state: DispatcherState,
    /// Worker threads not yet joined.
    pub worker_threads: usize,
    /// One entry per queue with at least one bound agent.
    pub queues: Vec<QueueStats>,
}
