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
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

use acton_ern::Ern;

use crate::agent::{AgentCore, AgentStatus, LimitStats, Priority, StateId};
use crate::common::{AgentRef, Result};
use crate::mailbox::Mailbox;

/// A clonable handle to a registered (or about to be registered) agent.
///
/// `AgentHandle` lets code outside the agent inspect it and end its life.
/// Messages are not sent through the handle; they go through mailboxes,
/// usually the agent's [`direct_mbox`](Self::direct_mbox).
///
/// Equality and hashing are based solely on the agent's environment-unique
/// key, so two handles to the same agent compare equal.
#[derive(Clone)]
pub struct AgentHandle {
    core: AgentRef,
}

impl AgentHandle {
    pub(crate) const fn new(core: AgentRef) -> Self {
        Self { core }
    }

    /// The agent's unique identifier.
    #[must_use]
    pub fn id(&self) -> &Ern {
        self.core.id()
    }

    pub(crate) fn key(&self) -> u64 {
        self.core.key()
    }

    /// The priority the agent was configured with.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.core.priority()
    }

    /// The agent's direct mailbox. Only this agent can subscribe to it.
    #[must_use]
    pub fn direct_mbox(&self) -> Mailbox {
        self.core.direct_mbox().clone()
    }

    /// Where the agent is in its lifecycle.
    #[must_use]
    pub fn status(&self) -> AgentStatus {
        self.core.status()
    }

    /// The state the agent is currently in.
    #[must_use]
    pub fn current_state(&self) -> StateId {
        self.core.current_state()
    }

    /// Whether the agent is in `state` or one of its substates.
    #[must_use]
    pub fn is_in_state(&self, state: StateId) -> bool {
        self.core.is_in_state(state)
    }

    /// The name `state` was defined with.
    #[must_use]
    pub fn state_name(&self, state: StateId) -> String {
        self.core.state_name(state)
    }

    /// In-flight counters for every configured message limit.
    #[must_use]
    pub fn limit_stats(&self) -> Vec<LimitStats> {
        self.core.limit_stats()
    }

    /// Deregisters the agent.
    ///
    /// All subscriptions are dropped immediately, so no new message reaches
    /// the agent. Demands already queued still run, then `on_finish`. Calling
    /// this on an agent that is already leaving is a no-op.
    pub fn deregister(&self) -> Result<()> {
        self.core.deregister()
    }

    pub(crate) fn downgrade(&self) -> Weak<AgentCore> {
        self.core.downgrade()
    }

    pub(crate) fn core(&self) -> &Arc<AgentCore> {
        &self.core
    }
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.id().to_string())
            .field("status", &self.status())
            .finish()
    }
}

impl PartialEq for AgentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for AgentHandle {}

impl Hash for AgentHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}
