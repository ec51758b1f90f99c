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

use acton_ern::Ern;

use crate::agent::{MessageLimit, Priority};
use crate::common::config::FailureReaction;
use crate::common::Result;
use crate::dispatcher::BindHint;
use crate::message::DispatchError;

/// Configuration parameters required to create a new agent.
///
/// Everything except the name has a default: priority `P0`, the
/// environment's default dispatcher, no group, no message limits and the
/// environment's failure reaction.
///
/// ```ignore
/// let config = AgentConfig::new("ingest")?
///     .with_priority(Priority::P5)
///     .bind_to("pool")
///     .with_limit(MessageLimit::drop_with_log::<Chunk>(128));
/// ```
#[derive(Debug, Clone)]
pub struct AgentConfig {
    id: Ern,
    priority: Priority,
    dispatcher: Option<String>,
    bind_hint: BindHint,
    limits: Vec<MessageLimit>,
    failure_reaction: Option<FailureReaction>,
}

impl AgentConfig {
    /// Creates a configuration for an agent named `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAgentName` if `name` cannot be used as the root of an
    /// [`Ern`].
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let id = Ern::with_root(name.clone()).map_err(|e| DispatchError::InvalidAgentName {
            name,
            reason: e.to_string(),
        })?;
        Ok(Self::with_id(id))
    }

    /// Creates a configuration for an agent with an existing identity.
    #[must_use]
    pub fn with_id(id: Ern) -> Self {
        Self {
            id,
            priority: Priority::default(),
            dispatcher: None,
            bind_hint: BindHint::default(),
            limits: Vec::new(),
            failure_reaction: None,
        }
    }

    /// Sets the scheduling priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Binds the agent to the dispatcher registered as `dispatcher`.
    #[must_use]
    pub fn bind_to(mut self, dispatcher: impl Into<String>) -> Self {
        self.dispatcher = Some(dispatcher.into());
        self
    }

    /// Places the agent in a dispatcher group.
    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.bind_hint = BindHint::group(group);
        self
    }

    /// Adds a message limit. Two limits for one message type make agent
    /// creation fail with `DuplicateMessageLimit`.
    #[must_use]
    pub fn with_limit(mut self, limit: MessageLimit) -> Self {
        self.limits.push(limit);
        self
    }

    /// Overrides the environment's failure reaction for this agent.
    #[must_use]
    pub const fn with_failure_reaction(mut self, reaction: FailureReaction) -> Self {
        self.failure_reaction = Some(reaction);
        self
    }

    #[inline]
    pub(crate) const fn id(&self) -> &Ern {
        &self.id
    }

    #[inline]
    pub(crate) const fn priority(&self) -> Priority {
        self.priority
    }

    #[inline]
    pub(crate) fn dispatcher(&self) -> Option<&str> {
        self.dispatcher.as_deref()
    }

    #[inline]
    pub(crate) const fn bind_hint(&self) -> &BindHint {
        &self.bind_hint
    }

    #[inline]
    pub(crate) const fn failure_reaction(&self) -> Option<FailureReaction> {
        self.failure_reaction
    }

    pub(crate) fn take_limits(&mut self) -> Vec<MessageLimit> {
        std::mem::take(&mut self.limits)
    }
}
