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

use acton_ern::Ern;

use crate::agent::{LimitGuard, Priority};
use crate::common::{AgentRef, MessageRef, ReplySender};
use crate::mailbox::MboxId;
use crate::message::MessageType;

/// Crate-internal: an admitted message waiting to be handled. Its handler
/// is looked up against the agent's state when the demand runs.
pub(crate) struct EventDemand {
    pub(crate) mbox: MboxId,
    pub(crate) message_type: MessageType,
    pub(crate) message: MessageRef,
    pub(crate) reply: Option<ReplySender>,
    /// Released after the handler returns.
    pub(crate) limit: Option<LimitGuard>,
}

pub(crate) enum DemandKind {
    /// Runs the agent's `on_start` hook.
    Start,
    /// Handles one message.
    Event(EventDemand),
    /// Runs `on_finish` and completes deregistration.
    Finish,
}

/// One unit of pending work: an agent plus what it should do.
///
/// Demands are created by mailbox delivery and by the agent lifecycle, and
/// consumed exactly once by a dispatcher worker. Dropping a demand without
/// executing it releases its message-limit slot and cancels any service
/// request waiting on it.
pub struct ExecutionDemand {
    agent: AgentRef,
    kind: DemandKind,
}

impl ExecutionDemand {
    pub(crate) const fn new(agent: AgentRef, kind: DemandKind) -> Self {
        Self { agent, kind }
    }

    /// Identity of the target agent.
    #[must_use]
    pub fn agent_id(&self) -> &Ern {
        self.agent.id()
    }

    /// Scheduling priority of the target agent.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.agent.priority()
    }

    /// The message type, for message demands.
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        match &self.kind {
            DemandKind::Event(event) => Some(event.message_type),
            DemandKind::Start | DemandKind::Finish => None,
        }
    }

    /// Runs the demand on the calling thread.
    ///
    /// Dispatchers call this from their worker threads; custom dispatchers
    /// must guarantee that demands of one agent never execute concurrently.
    pub fn execute(self) {
        self.agent.execute(self.kind);
    }
}

impl fmt::Debug for ExecutionDemand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            DemandKind::Start => "start",
            DemandKind::Event(_) => "event",
            DemandKind::Finish => "finish",
        };
        f.debug_struct("ExecutionDemand")
            .field("agent", &self.agent.id().to_string())
            .field("kind", &kind)
            .field("message_type", &self.message_type().map(|t| t.name()))
            .finish()
    }
}
