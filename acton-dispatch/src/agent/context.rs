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

use std::any::{type_name, Any};
use std::marker::PhantomData;
use std::sync::Arc;

use acton_ern::Ern;
use anyhow::anyhow;

use crate::agent::subscription_storage::HandlerKind;
use crate::agent::{AgentHandle, StateId, StateScope};
use crate::common::{
    AgentRef, Environment, FilterFn, HandlerRef, LifecycleHook, MessageRef, ReplyValue, Result,
};
use crate::mailbox::Mailbox;
use crate::message::MessageType;
use crate::traits::ActonMessage;

/// What a handler can do to the agent it runs on.
///
/// A context is handed to every handler and lifecycle hook next to the
/// agent's model. Handlers use it to switch states, adjust subscriptions
/// and deregister; changes take effect for the next message.
///
/// ```ignore
/// agent.act_on(&jobs, StateScope::Any, |model: &mut Worker, ctx, job: &Job| {
///     model.done += 1;
///     if model.done == model.quota {
///         ctx.change_state(model.resting)?;
///     }
///     Ok(())
/// })?;
/// ```
pub struct AgentContext<'a, Model> {
    agent: &'a AgentRef,
    _model: PhantomData<fn() -> Model>,
}

impl<'a, Model: Send + 'static> AgentContext<'a, Model> {
    pub(crate) const fn new(agent: &'a AgentRef) -> Self {
        Self {
            agent,
            _model: PhantomData,
        }
    }

    /// The agent's unique identifier.
    #[must_use]
    pub fn id(&self) -> &Ern {
        self.agent.id()
    }

    /// A handle to this agent.
    #[must_use]
    pub fn handle(&self) -> AgentHandle {
        AgentHandle::new(Arc::clone(self.agent))
    }

    /// This agent's direct mailbox.
    #[must_use]
    pub fn direct_mbox(&self) -> &Mailbox {
        self.agent.direct_mbox()
    }

    /// The environment the agent lives in, unless it has been dropped.
    #[must_use]
    pub fn environment(&self) -> Option<Environment> {
        self.agent.environment()
    }

    /// The state the agent is currently in.
    #[must_use]
    pub fn current_state(&self) -> StateId {
        self.agent.current_state()
    }

    /// Whether the agent is in `state` or one of its substates.
    #[must_use]
    pub fn is_in_state(&self, state: StateId) -> bool {
        self.agent.is_in_state(state)
    }

    /// The name `state` was defined with.
    #[must_use]
    pub fn state_name(&self, state: StateId) -> String {
        self.agent.state_name(state)
    }

    /// Switches the agent to `state`. Messages already queued are matched
    /// against the new state when they run.
    pub fn change_state(&mut self, state: StateId) -> Result<()> {
        self.agent.change_state(state)
    }

    /// Adds an event handler for `M` arriving on `mbox` while in `scope`.
    pub fn subscribe<M, F>(
        &mut self,
        mbox: &Mailbox,
        scope: impl Into<StateScope>,
        handler: F,
    ) -> Result<()>
    where
        M: ActonMessage,
        F: Fn(&mut Model, &mut AgentContext<'_, Model>, &M) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.agent.subscribe(
            mbox,
            MessageType::of::<M>(),
            scope.into(),
            erase_event_handler::<Model, M, F>(handler),
            HandlerKind::Event,
        )
    }

    /// Adds a service handler for `M` arriving on `mbox` while in `scope`.
    pub fn respond_to<M, R, F>(
        &mut self,
        mbox: &Mailbox,
        scope: impl Into<StateScope>,
        handler: F,
    ) -> Result<()>
    where
        M: ActonMessage,
        R: Send + 'static,
        F: Fn(&mut Model, &mut AgentContext<'_, Model>, &M) -> anyhow::Result<R>
            + Send
            + Sync
            + 'static,
    {
        self.agent.subscribe(
            mbox,
            MessageType::of::<M>(),
            scope.into(),
            erase_service_handler::<Model, M, R, F>(handler),
            HandlerKind::Service,
        )
    }

    /// Removes the handler for `M` on `mbox` in exactly `scope`.
    pub fn unsubscribe<M: ActonMessage>(
        &mut self,
        mbox: &Mailbox,
        scope: impl Into<StateScope>,
    ) -> Result<()> {
        self.agent.unsubscribe(mbox, MessageType::of::<M>(), scope.into())
    }

    /// Removes every handler scoped to `state`.
    pub fn unsubscribe_state(&mut self, state: StateId) -> Result<()> {
        self.agent.unsubscribe_state(state)
    }

    /// Installs (or replaces) this agent's filter for `M` on a broadcast mailbox.
    pub fn set_delivery_filter<M, F>(&mut self, mbox: &Mailbox, filter: F) -> Result<()>
    where
        M: ActonMessage,
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.agent
            .set_delivery_filter(mbox, MessageType::of::<M>(), erase_filter::<M, F>(filter))
    }

    /// Removes this agent's filter for `M` on `mbox`, if any.
    pub fn drop_delivery_filter<M: ActonMessage>(&mut self, mbox: &Mailbox) {
        self.agent.drop_delivery_filter(mbox, MessageType::of::<M>());
    }

    /// Deregisters the agent once the current handler returns.
    pub fn deregister(&mut self) -> Result<()> {
        self.agent.deregister()
    }
}

fn model_of<Model: 'static>(model: &mut (dyn Any + Send)) -> anyhow::Result<&mut Model> {
    model
        .downcast_mut::<Model>()
        .ok_or_else(|| anyhow!("agent model is not a {}", type_name::<Model>()))
}

fn message_of<M: ActonMessage>(message: &MessageRef) -> anyhow::Result<&M> {
    let message: &dyn ActonMessage = &**message;
    message
        .as_any()
        .downcast_ref::<M>()
        .ok_or_else(|| anyhow!("message is not a {}", type_name::<M>()))
}

pub(crate) fn erase_event_handler<Model, M, F>(handler: F) -> HandlerRef
where
    Model: Send + 'static,
    M: ActonMessage,
    F: Fn(&mut Model, &mut AgentContext<'_, Model>, &M) -> anyhow::Result<()>
        + Send
        + Sync
        + 'static,
{
    Arc::new(
        move |model: &mut (dyn Any + Send),
              agent: &AgentRef,
              message: &MessageRef|
              -> anyhow::Result<ReplyValue> {
            let mut context = AgentContext::new(agent);
            handler(model_of::<Model>(model)?, &mut context, message_of::<M>(message)?)?;
            Ok(Box::new(()))
        },
    )
}

pub(crate) fn erase_service_handler<Model, M, R, F>(handler: F) -> HandlerRef
where
    Model: Send + 'static,
    M: ActonMessage,
    R: Send + 'static,
    F: Fn(&mut Model, &mut AgentContext<'_, Model>, &M) -> anyhow::Result<R>
        + Send
        + Sync
        + 'static,
{
    Arc::new(
        move |model: &mut (dyn Any + Send),
              agent: &AgentRef,
              message: &MessageRef|
              -> anyhow::Result<ReplyValue> {
            let mut context = AgentContext::new(agent);
            let reply = handler(
                model_of::<Model>(model)?,
                &mut context,
                message_of::<M>(message)?,
            )?;
            Ok(Box::new(reply))
        },
    )
}

pub(crate) fn erase_hook<Model, F>(hook: F) -> LifecycleHook
where
    Model: Send + 'static,
    F: Fn(&mut Model, &mut AgentContext<'_, Model>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Box::new(
        move |model: &mut (dyn Any + Send), agent: &AgentRef| -> anyhow::Result<()> {
            let mut context = AgentContext::new(agent);
            hook(model_of::<Model>(model)?, &mut context)
        },
    )
}

pub(crate) fn erase_filter<M, F>(filter: F) -> Arc<FilterFn>
where
    M: ActonMessage,
    F: Fn(&M) -> bool + Send + Sync + 'static,
{
    Arc::new(move |message: &dyn ActonMessage| {
        message.as_any().downcast_ref::<M>().is_some_and(&filter)
    })
}
