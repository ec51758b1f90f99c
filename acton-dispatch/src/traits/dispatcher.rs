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
use std::fmt::Debug;

use crate::agent::AgentHandle;
use crate::common::{EventQueueRef, Result};
use crate::dispatcher::{BindHint, DispatcherKind, DispatcherState, DispatcherStats, ShutdownMode};

/// A scheduling policy that owns worker threads and binds agents to queues.
///
/// Every implementation shares one lifecycle: `Created → Started →
/// ShutdownRequested → Stopped`. [`start`](Self::start) and
/// [`shutdown`](Self::shutdown) are idempotent, and shutting down a dispatcher
/// that never started is a no-op.
///
/// Implementations must guarantee that demands of one agent never run
/// concurrently, and that demands from one mailbox to one agent run in the
/// order they were pushed.
pub trait Dispatcher: Send + Sync + Debug {
    /// The name the dispatcher is registered under.
    fn name(&self) -> &str;

    /// Which scheduling policy this is.
    fn kind(&self) -> DispatcherKind;

    /// Where the dispatcher is in its lifecycle.
    fn state(&self) -> DispatcherState;

    /// Spawns the worker threads.
    fn start(&self) -> Result<()>;

    /// Stops accepting demands, lets workers drain their queues, then exit.
    fn shutdown(&self) {
        self.shutdown_with(ShutdownMode::Drain);
    }

    /// Stops accepting demands, treating pending ones according to `mode`.
    fn shutdown_with(&self, mode: ShutdownMode);

    /// Blocks until every worker thread has exited.
    fn wait(&self);

    /// Gives `agent` the event queue it will receive demands through.
    ///
    /// Fails with `DispatcherNotStarted` unless the dispatcher is running.
    fn bind_agent(&self, agent: &AgentHandle, hint: &BindHint) -> Result<EventQueueRef>;

    /// Releases the binding made by [`bind_agent`](Self::bind_agent).
    ///
    /// Demands already queued still run.
    fn unbind_agent(&self, agent: &AgentHandle, hint: &BindHint);

    /// The queue `agent` is bound to, if any.
    fn get_queue_for(&self, agent: &AgentHandle) -> Option<EventQueueRef>;

    /// Read-only snapshot for monitoring.
    fn stats(&self) -> DispatcherStats;
}
