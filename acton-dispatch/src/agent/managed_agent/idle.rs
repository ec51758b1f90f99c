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

use std::marker::PhantomData;

use tracing::{instrument, trace};

use crate::agent::agent_core::{AgentParts, AgentSettings};
use crate::agent::context::{erase_event_handler, erase_filter, erase_hook, erase_service_handler};
use crate::agent::message_limit::MessageLimits;
use crate::agent::subscription_storage::HandlerKind;
use crate::agent::{
    AgentConfig, AgentContext, AgentCore, AgentHandle, ManagedAgent, StateId, StateScope,
};
use crate::common::{Environment, Result};
use crate::mailbox::{Mailbox, MboxId};
use crate::message::{DispatchError, MessageType};
use crate::traits::ActonMessage;

/// Type-state marker for a [`ManagedAgent`] that has been configured but not
/// yet registered.
///
/// While `Idle`, the agent can define states, subscribe handlers with
/// [`ManagedAgent::act_on`] and [`ManagedAgent::respond_to`], and install the
/// [`on_start`](ManagedAgent::on_start) and [`on_finish`](ManagedAgent::on_finish)
/// hooks. [`ManagedAgent::register`] binds it to its dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Idle;

impl<Model: Send + 'static> ManagedAgent<Idle, Model> {
    pub(crate) fn new(env: &Environment, mut config: AgentConfig, model: Model) -> Result<Self> {
        let limits = MessageLimits::new(config.take_limits()).map_err(|message_type| {
            DispatchError::DuplicateMessageLimit {
                agent: config.id().to_string(),
                message_type: message_type.name(),
            }
        })?;
        let settings = env.config();
        let key = env.next_id();
        let core = AgentCore::new(AgentParts {
            key,
            id: config.id().clone(),
            priority: config.priority(),
            env: env.downgrade(),
            settings: AgentSettings::from_config(settings),
            failure_reaction: config
                .failure_reaction()
                .unwrap_or(settings.behavior.failure_reaction),
            limits,
            direct_mbox: MboxId::new(env.next_id()),
            model: Box::new(model),
        });
        let dispatcher = config
            .dispatcher()
            .unwrap_or(&settings.defaults.default_dispatcher)
            .to_string();
        trace!(agent = %core.id(), dispatcher = %dispatcher, "agent defined");
        Ok(Self {
            core,
            env: env.clone(),
            dispatcher,
            bind_hint: config.bind_hint().clone(),
            _state: PhantomData,
            _model: PhantomData,
        })
    }

    /// A handle to the agent, usable before registration to wire agents to
    /// each other.
    #[must_use]
    pub fn handle(&self) -> AgentHandle {
        AgentHandle::new(self.core.clone())
    }

    /// The agent's direct mailbox.
    #[must_use]
    pub fn direct_mbox(&self) -> &Mailbox {
        self.core.direct_mbox()
    }

    /// The implicit state every agent starts in.
    #[must_use]
    pub fn default_state(&self) -> StateId {
        self.core.default_state()
    }

    /// Defines a top-level state.
    pub fn define_state(&mut self, name: impl Into<String>) -> Result<StateId> {
        self.core.define_state(name, None)
    }

    /// Defines a state nested in `parent`. A message with no handler in the
    /// substate is looked up in `parent`, then in its ancestors.
    pub fn define_substate(&mut self, name: impl Into<String>, parent: StateId) -> Result<StateId> {
        self.core.define_state(name, Some(parent))
    }

    /// Sets the state the agent starts in.
    pub fn change_state(&mut self, state: StateId) -> Result<&mut Self> {
        self.core.change_state(state)?;
        Ok(self)
    }

    /// Subscribes an event handler for `M` arriving on `mbox` while in `scope`.
    ///
    /// ```ignore
    /// agent.act_on(&ticks, StateScope::Any, |model: &mut Clock, _ctx, tick: &Tick| {
    ///     model.last = tick.at;
    ///     Ok(())
    /// })?;
    /// ```
    #[instrument(
        skip(self, mbox, scope, handler),
        fields(agent = %self.core.id(), message_type = std::any::type_name::<M>()),
        level = "trace"
    )]
    pub fn act_on<M, F>(
        &mut self,
        mbox: &Mailbox,
        scope: impl Into<StateScope>,
        handler: F,
    ) -> Result<&mut Self>
    where
        M: ActonMessage,
        F: Fn(&mut Model, &mut AgentContext<'_, Model>, &M) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.core.subscribe(
            mbox,
            MessageType::of::<M>(),
            scope.into(),
            erase_event_handler::<Model, M, F>(handler),
            HandlerKind::Event,
        )?;
        Ok(self)
    }

    /// Subscribes an event handler for `M` on the agent's own direct mailbox.
    pub fn act_on_direct<M, F>(
        &mut self,
        scope: impl Into<StateScope>,
        handler: F,
    ) -> Result<&mut Self>
    where
        M: ActonMessage,
        F: Fn(&mut Model, &mut AgentContext<'_, Model>, &M) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        let mbox = self.core.direct_mbox().clone();
        self.act_on(&mbox, scope, handler)
    }

    /// Subscribes a service handler: its return value is the reply to
    /// `Mailbox::request`.
    #[instrument(
        skip(self, mbox, scope, handler),
        fields(agent = %self.core.id(), message_type = std::any::type_name::<M>()),
        level = "trace"
    )]
    pub fn respond_to<M, R, F>(
        &mut self,
        mbox: &Mailbox,
        scope: impl Into<StateScope>,
        handler: F,
    ) -> Result<&mut Self>
    where
        M: ActonMessage,
        R: Send + 'static,
        F: Fn(&mut Model, &mut AgentContext<'_, Model>, &M) -> anyhow::Result<R>
            + Send
            + Sync
            + 'static,
    {
        self.core.subscribe(
            mbox,
            MessageType::of::<M>(),
            scope.into(),
            erase_service_handler::<Model, M, R, F>(handler),
            HandlerKind::Service,
        )?;
        Ok(self)
    }

    /// Subscribes a service handler on the agent's own direct mailbox.
    pub fn respond_to_direct<M, R, F>(
        &mut self,
        scope: impl Into<StateScope>,
        handler: F,
    ) -> Result<&mut Self>
    where
        M: ActonMessage,
        R: Send + 'static,
        F: Fn(&mut Model, &mut AgentContext<'_, Model>, &M) -> anyhow::Result<R>
            + Send
            + Sync
            + 'static,
    {
        let mbox = self.core.direct_mbox().clone();
        self.respond_to(&mbox, scope, handler)
    }

    /// Installs a filter deciding which `M` from the broadcast `mbox` reach
    /// this agent at all.
    pub fn set_delivery_filter<M, F>(&mut self, mbox: &Mailbox, filter: F) -> Result<&mut Self>
    where
        M: ActonMessage,
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.core
            .set_delivery_filter(mbox, MessageType::of::<M>(), erase_filter::<M, F>(filter))?;
        Ok(self)
    }

    /// Runs on the agent's worker before any message is handled.
    pub fn on_start<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Model, &mut AgentContext<'_, Model>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.core.set_on_start(erase_hook::<Model, F>(hook));
        self
    }

    /// Runs on the agent's worker after the last message, once deregistered.
    pub fn on_finish<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Model, &mut AgentContext<'_, Model>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.core.set_on_finish(erase_hook::<Model, F>(hook));
        self
    }

    /// Binds the agent to its dispatcher and queues its start.
    ///
    /// # Errors
    ///
    /// `UnknownDispatcher` if the configured dispatcher does not exist,
    /// `DispatcherNotStarted` or `MissingGroup` from the dispatcher itself.
    #[instrument(skip(self), fields(agent = %self.core.id(), dispatcher = %self.dispatcher))]
    pub fn register(self) -> Result<AgentHandle> {
        self.core
            .register(&self.env, &self.dispatcher, self.bind_hint)
    }
}
