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

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use acton_ern::Ern;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use crate::agent::message_limit::{LimitControlBlock, LimitVerdict, MessageLimits};
use crate::agent::state::{StateId, StateScope, StateTable};
use crate::agent::subscription_storage::{
    HandlerKind, SubscriptionEntry, SubscriptionKey, SubscriptionStorage,
};
use crate::agent::{AgentHandle, LimitStats, OverlimitReaction, Priority};
use crate::common::config::{ActonConfig, FailureReaction, RedirectCapReaction, UnsubscribePolicy};
use crate::common::{
    fatal, AgentRef, DispatcherRef, Environment, EventQueueRef, FilterFn, HandlerRef,
    LifecycleHook, ReplySender, Result, WeakEnvironment,
};
use crate::dispatcher::BindHint;
use crate::mailbox::{Delivery, DeliveryMode, DirectMailbox, Mailbox, MboxId};
use crate::message::{DemandKind, DispatchError, EventDemand, ExecutionDemand, MessageType};
use crate::traits::{FailureObserver, HandlerFailure, LoggingFailureObserver};

/// Where an agent is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    /// Created and being configured; not yet bound to a dispatcher.
    Defined,
    /// Bound and accepting messages.
    Registered,
    /// Unsubscribed and unbound; queued demands are still running.
    Deregistering,
    /// Finished; the agent will never run again.
    Deregistered,
}

/// Crate-internal: environment settings every agent consults.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AgentSettings {
    pub(crate) max_redirection_depth: u32,
    pub(crate) redirect_cap_reaction: RedirectCapReaction,
    pub(crate) unsubscribe_policy: UnsubscribePolicy,
    pub(crate) request_timeout: Duration,
}

impl AgentSettings {
    pub(crate) const fn from_config(config: &ActonConfig) -> Self {
        Self {
            max_redirection_depth: config.limits.max_redirection_depth,
            redirect_cap_reaction: config.behavior.redirect_cap_reaction,
            unsubscribe_policy: config.behavior.unsubscribe_policy,
            request_timeout: config.service_request_timeout(),
        }
    }
}

/// Crate-internal: everything needed to build an [`AgentCore`].
pub(crate) struct AgentParts {
    pub(crate) key: u64,
    pub(crate) id: Ern,
    pub(crate) priority: Priority,
    pub(crate) env: WeakEnvironment,
    pub(crate) settings: AgentSettings,
    pub(crate) failure_reaction: FailureReaction,
    pub(crate) limits: MessageLimits,
    pub(crate) direct_mbox: MboxId,
    pub(crate) model: Box<dyn Any + Send>,
}

#[derive(Debug)]
struct DispatchTable {
    states: StateTable,
    subscriptions: SubscriptionStorage,
    /// Handlers detached by deregistration, still serving demands queued
    /// before it.
    retired: SubscriptionStorage,
}

impl DispatchTable {
    fn resolve(&self, message_type: MessageType, mbox: MboxId) -> Option<HandlerRef> {
        self.subscriptions
            .find(message_type, mbox, &self.states)
            .or_else(|| self.retired.find(message_type, mbox, &self.states))
            .map(|entry| Arc::clone(&entry.handler))
    }
}

#[derive(Debug)]
struct Binding {
    dispatcher: DispatcherRef,
    queue: EventQueueRef,
    hint: BindHint,
}

/// Crate-internal: the shared heart of an agent.
///
/// Delivery checks for a handler under a read lock on the dispatch table and
/// state changes take the write lock, so a message is always matched against
/// one complete state. The handler that runs is looked up again when the
/// demand executes. The model is only touched by the worker running the
/// agent's current demand.
pub(crate) struct AgentCore {
    key: u64,
    id: Ern,
    priority: Priority,
    me: Weak<AgentCore>,
    env: WeakEnvironment,
    settings: AgentSettings,
    failure_reaction: FailureReaction,
    table: RwLock<DispatchTable>,
    filters: Mutex<Vec<(Mailbox, MessageType)>>,
    limits: MessageLimits,
    direct_mbox: Mailbox,
    binding: RwLock<Option<Binding>>,
    status: Mutex<AgentStatus>,
    model: Mutex<Box<dyn Any + Send>>,
    on_start: Mutex<Option<LifecycleHook>>,
    on_finish: Mutex<Option<LifecycleHook>>,
}

impl fmt::Debug for AgentCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCore")
            .field("id", &self.id.to_string())
            .field("priority", &self.priority)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|reason| (*reason).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "<non-string panic payload>".to_string())
}

impl AgentCore {
    pub(crate) fn new(parts: AgentParts) -> AgentRef {
        let AgentParts {
            key,
            id,
            priority,
            env,
            settings,
            failure_reaction,
            limits,
            direct_mbox,
            model,
        } = parts;
        Arc::new_cyclic(|me: &Weak<Self>| Self {
            key,
            id,
            priority,
            me: me.clone(),
            env,
            settings,
            failure_reaction,
            table: RwLock::new(DispatchTable {
                states: StateTable::new(key),
                subscriptions: SubscriptionStorage::default(),
                retired: SubscriptionStorage::default(),
            }),
            filters: Mutex::new(Vec::new()),
            limits,
            direct_mbox: Mailbox::from_core(
                Arc::new(DirectMailbox::new(direct_mbox, key, me.clone())),
                settings.request_timeout,
            ),
            binding: RwLock::new(None),
            status: Mutex::new(AgentStatus::Defined),
            model: Mutex::new(model),
            on_start: Mutex::new(None),
            on_finish: Mutex::new(None),
        })
    }

    /// An agent outside of any environment, for queue-level tests.
    #[cfg(test)]
    pub(crate) fn detached(key: u64) -> AgentRef {
        let config = ActonConfig::default();
        Self::new(AgentParts {
            key,
            id: Ern::with_root(format!("detached-{key}")).expect("valid test name"),
            priority: Priority::P0,
            env: Weak::new(),
            settings: AgentSettings::from_config(&config),
            failure_reaction: FailureReaction::Ignore,
            limits: MessageLimits::default(),
            direct_mbox: MboxId::new(u64::MAX - key),
            model: Box::new(()),
        })
    }

    pub(crate) const fn id(&self) -> &Ern {
        &self.id
    }

    pub(crate) const fn key(&self) -> u64 {
        self.key
    }

    pub(crate) const fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) const fn direct_mbox(&self) -> &Mailbox {
        &self.direct_mbox
    }

    pub(crate) fn status(&self) -> AgentStatus {
        *self.status.lock()
    }

    pub(crate) fn environment(&self) -> Option<Environment> {
        Environment::upgrade(&self.env)
    }

    pub(crate) fn downgrade(&self) -> Weak<Self> {
        self.me.clone()
    }

    fn handle(self: &Arc<Self>) -> AgentHandle {
        AgentHandle::new(Arc::clone(self))
    }

    pub(crate) fn limit_stats(&self) -> Vec<LimitStats> {
        self.limits.stats()
    }

    // --- behavioral states ---

    pub(crate) fn default_state(&self) -> StateId {
        self.table.read().states.default_state()
    }

    pub(crate) fn define_state(
        &self,
        name: impl Into<String>,
        parent: Option<StateId>,
    ) -> Result<StateId> {
        let name = name.into();
        let mut table = self.table.write();
        table
            .states
            .define(name.clone(), parent)
            .ok_or_else(|| DispatchError::UnknownState {
                agent: self.id.to_string(),
                state: parent.map_or(name, |parent| parent.to_string()),
            })
    }

    pub(crate) fn current_state(&self) -> StateId {
        self.table.read().states.current()
    }

    pub(crate) fn is_in_state(&self, state: StateId) -> bool {
        self.table.read().states.is_in(state)
    }

    pub(crate) fn state_name(&self, state: StateId) -> String {
        self.table.read().states.name(state).to_string()
    }

    pub(crate) fn change_state(&self, state: StateId) -> Result<()> {
        let mut table = self.table.write();
        let previous = table.states.change(state).ok_or_else(|| DispatchError::UnknownState {
            agent: self.id.to_string(),
            state: state.to_string(),
        })?;
        if previous != state {
            trace!(
                agent = %self.id,
                from = table.states.name(previous),
                to = table.states.name(state),
                "state changed"
            );
        }
        Ok(())
    }

    // --- subscriptions ---

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        mailbox: &Mailbox,
        message_type: MessageType,
        scope: StateScope,
        handler: HandlerRef,
        kind: HandlerKind,
    ) -> Result<()> {
        let key = SubscriptionKey {
            message_type,
            mbox: mailbox.id(),
            scope,
        };
        let first_for_mailbox = {
            let mut table = self.table.write();
            if let StateScope::In(state) = scope {
                if !table.states.contains(state) {
                    return Err(DispatchError::UnknownState {
                        agent: self.id.to_string(),
                        state: state.to_string(),
                    });
                }
            }
            let first = !table.subscriptions.has_any_for(message_type, mailbox.id());
            let entry = SubscriptionEntry {
                mailbox: mailbox.clone(),
                handler,
                kind,
            };
            if !table.subscriptions.insert(key, entry) {
                return Err(DispatchError::DuplicateSubscription {
                    agent: self.id.to_string(),
                    message_type: message_type.name(),
                    mbox: mailbox.id(),
                    state: table.states.describe(scope),
                });
            }
            first
        };
        if first_for_mailbox {
            if let Err(e) = mailbox.core().subscribe_agent(message_type, &self.handle()) {
                self.table.write().subscriptions.remove(&key);
                return Err(e);
            }
        }
        trace!(
            agent = %self.id,
            mbox = %mailbox.id(),
            message_type = message_type.name(),
            "subscribed"
        );
        Ok(())
    }

    pub(crate) fn unsubscribe(
        self: &Arc<Self>,
        mailbox: &Mailbox,
        message_type: MessageType,
        scope: StateScope,
    ) -> Result<()> {
        let key = SubscriptionKey {
            message_type,
            mbox: mailbox.id(),
            scope,
        };
        let (removed, missing) = {
            let mut table = self.table.write();
            match table.subscriptions.remove(&key) {
                Some(entry) => (vec![(key, entry)], None),
                None => (
                    Vec::new(),
                    Some(DispatchError::SubscriptionNotFound {
                        agent: self.id.to_string(),
                        message_type: message_type.name(),
                        mbox: mailbox.id(),
                        state: table.states.describe(scope),
                    }),
                ),
            }
        };
        if let Some(missing) = missing {
            return match self.settings.unsubscribe_policy {
                UnsubscribePolicy::Strict => Err(missing),
                UnsubscribePolicy::Silent => Ok(()),
            };
        }
        self.release_mailboxes(removed);
        Ok(())
    }

    pub(crate) fn unsubscribe_state(self: &Arc<Self>, state: StateId) -> Result<()> {
        let removed = {
            let mut table = self.table.write();
            if !table.states.contains(state) {
                return Err(DispatchError::UnknownState {
                    agent: self.id.to_string(),
                    state: state.to_string(),
                });
            }
            table.subscriptions.drain_state(state)
        };
        self.release_mailboxes(removed);
        Ok(())
    }

    /// Detaches every subscription from its mailbox. The handlers stay
    /// reachable for demands that were queued before this call.
    fn retire_subscriptions(self: &Arc<Self>) {
        let removed = {
            let mut table = self.table.write();
            let active = std::mem::take(&mut table.subscriptions);
            let removed = active.snapshot();
            table.retired = active;
            removed
        };
        self.release_mailboxes(removed);
    }

    /// Tells each mailbox the agent no longer has any handler for a type.
    fn release_mailboxes(self: &Arc<Self>, removed: Vec<(SubscriptionKey, SubscriptionEntry)>) {
        let mut seen = HashSet::new();
        let released: Vec<_> = {
            let table = self.table.read();
            removed
                .into_iter()
                .filter(|(key, _)| seen.insert((key.message_type, key.mbox)))
                .filter(|(key, _)| !table.subscriptions.has_any_for(key.message_type, key.mbox))
                .collect()
        };
        if released.is_empty() {
            return;
        }
        let handle = self.handle();
        for (key, entry) in released {
            entry.mailbox.core().unsubscribe_agent(key.message_type, &handle);
        }
    }

    pub(crate) fn set_delivery_filter(
        self: &Arc<Self>,
        mailbox: &Mailbox,
        message_type: MessageType,
        filter: Arc<FilterFn>,
    ) -> Result<()> {
        mailbox
            .core()
            .set_delivery_filter(message_type, &self.handle(), filter)?;
        let mut filters = self.filters.lock();
        if !filters
            .iter()
            .any(|(known, known_type)| known == mailbox && *known_type == message_type)
        {
            filters.push((mailbox.clone(), message_type));
        }
        Ok(())
    }

    pub(crate) fn drop_delivery_filter(
        self: &Arc<Self>,
        mailbox: &Mailbox,
        message_type: MessageType,
    ) {
        mailbox.core().drop_delivery_filter(message_type, &self.handle());
        self.filters
            .lock()
            .retain(|(known, known_type)| !(known == mailbox && *known_type == message_type));
    }

    fn drop_all_filters(self: &Arc<Self>) {
        let filters = std::mem::take(&mut *self.filters.lock());
        let handle = self.handle();
        for (mailbox, message_type) in filters {
            mailbox.core().drop_delivery_filter(message_type, &handle);
        }
    }

    // --- delivery ---

    /// Whether the current state, one of its ancestors or `Any` subscribes
    /// to `message_type` from `mbox`.
    pub(crate) fn has_handler(&self, message_type: MessageType, mbox: MboxId) -> bool {
        let table = self.table.read();
        table
            .subscriptions
            .find(message_type, mbox, &table.states)
            .is_some()
    }

    /// The handler for `message_type` from `mbox` in the current state,
    /// checking the state's ancestors and then `Any`.
    pub(crate) fn find_handler(
        &self,
        message_type: MessageType,
        mbox: MboxId,
    ) -> Option<HandlerRef> {
        self.table.read().resolve(message_type, mbox)
    }

    /// Admits a delivery that has a handler against the limits and queues it.
    pub(crate) fn enqueue(self: &Arc<Self>, mbox: MboxId, delivery: Delivery) -> Result<()> {
        let queue = self
            .binding
            .read()
            .as_ref()
            .map(|binding| Arc::clone(&binding.queue))
            .filter(|_| self.status() == AgentStatus::Registered);
        let Some(queue) = queue else {
            trace!(
                agent = %self.id,
                %mbox,
                message_type = delivery.message_type.name(),
                "agent not accepting messages; discarded"
            );
            return if delivery.is_service() {
                Err(DispatchError::AgentNotRegistered {
                    agent: self.id.to_string(),
                })
            } else {
                Ok(())
            };
        };

        let limit = match self.limits.admit(delivery.message_type) {
            LimitVerdict::Accept(limit) => limit,
            LimitVerdict::Overlimit(block) => return self.react_on_overlimit(&block, delivery),
        };

        let Delivery {
            message,
            message_type,
            mode,
            ..
        } = delivery;
        let reply = match mode {
            DeliveryMode::OneWay => None,
            DeliveryMode::Service(reply) => Some(reply),
        };
        trace!(agent = %self.id, %mbox, message_type = message_type.name(), "demand queued");
        queue.push(ExecutionDemand::new(
            Arc::clone(self),
            DemandKind::Event(EventDemand {
                mbox,
                message_type,
                message,
                reply,
                limit,
            }),
        ))
    }

    fn react_on_overlimit(&self, block: &LimitControlBlock, delivery: Delivery) -> Result<()> {
        let message_type = delivery.message_type.name();
        let exceeded = || DispatchError::MessageLimitExceeded {
            agent: self.id.to_string(),
            message_type,
            limit: block.limit(),
            reaction: block.reaction().kind(),
        };
        match block.reaction() {
            OverlimitReaction::Drop => {
                trace!(
                    agent = %self.id,
                    message_type,
                    limit = block.limit(),
                    "message limit reached; dropped"
                );
                if delivery.is_service() {
                    Err(exceeded())
                } else {
                    Ok(())
                }
            }
            OverlimitReaction::DropWithLog => {
                warn!(
                    agent = %self.id,
                    message_type,
                    limit = block.limit(),
                    "message limit reached; dropped"
                );
                if delivery.is_service() {
                    Err(exceeded())
                } else {
                    Ok(())
                }
            }
            OverlimitReaction::Abort => fatal::terminate(&format!(
                "message limit of {} exceeded for message type {message_type} on agent {}",
                block.limit(),
                self.id
            )),
            OverlimitReaction::Redirect(to) => {
                if delivery.depth >= self.settings.max_redirection_depth {
                    return self.on_redirection_cap(delivery, exceeded);
                }
                trace!(
                    agent = %self.id,
                    message_type,
                    to = %to.id(),
                    depth = delivery.depth + 1,
                    "message limit reached; redirected"
                );
                to.core().deliver(delivery.redirected())
            }
            OverlimitReaction::Transform { to, transform } => {
                if delivery.is_service() {
                    return Err(exceeded());
                }
                if delivery.depth >= self.settings.max_redirection_depth {
                    return self.on_redirection_cap(delivery, exceeded);
                }
                let outputs = transform(delivery.message.as_ref());
                trace!(
                    agent = %self.id,
                    message_type,
                    to = %to.id(),
                    outputs = outputs.len(),
                    "message limit reached; transformed"
                );
                for output in outputs {
                    let hop = Delivery::one_way(output, delivery.depth + 1);
                    if let Err(e) = to.core().deliver(hop) {
                        debug!(
                            agent = %self.id,
                            to = %to.id(),
                            error = %e,
                            "transformed message not delivered"
                        );
                    }
                }
                Ok(())
            }
        }
    }

    fn on_redirection_cap(
        &self,
        delivery: Delivery,
        exceeded: impl FnOnce() -> DispatchError,
    ) -> Result<()> {
        let message_type = delivery.message_type.name();
        match self.settings.redirect_cap_reaction {
            RedirectCapReaction::Abort => fatal::terminate(&format!(
                "message type {message_type} exceeded the redirection depth of {} at agent {}",
                self.settings.max_redirection_depth, self.id
            )),
            RedirectCapReaction::Drop => {
                error!(
                    agent = %self.id,
                    message_type,
                    depth = delivery.depth,
                    "maximum redirection depth reached; message dropped"
                );
                if delivery.is_service() {
                    Err(exceeded())
                } else {
                    Ok(())
                }
            }
        }
    }

    // --- execution ---

    pub(crate) fn set_on_start(&self, hook: LifecycleHook) {
        *self.on_start.lock() = Some(hook);
    }

    pub(crate) fn set_on_finish(&self, hook: LifecycleHook) {
        *self.on_finish.lock() = Some(hook);
    }

    pub(crate) fn execute(self: &Arc<Self>, kind: DemandKind) {
        match kind {
            DemandKind::Start => {
                trace!(agent = %self.id, "agent starting");
                self.run_hook(&self.on_start);
            }
            DemandKind::Event(event) => self.handle_event(event),
            DemandKind::Finish => {
                self.run_hook(&self.on_finish);
                self.complete_deregistration();
            }
        }
    }

    fn handle_event(self: &Arc<Self>, event: EventDemand) {
        let EventDemand {
            mbox,
            message_type,
            message,
            reply,
            limit,
        } = event;
        if self.status() == AgentStatus::Deregistered {
            trace!(
                agent = %self.id,
                %mbox,
                message_type = message_type.name(),
                "agent deregistered; demand skipped"
            );
            return;
        }
        let Some(handler) = self.find_handler(message_type, mbox) else {
            trace!(
                agent = %self.id,
                %mbox,
                message_type = message_type.name(),
                "no handler in current state; demand skipped"
            );
            drop(limit);
            if let Some(reply) = reply {
                let _ = reply.send(Err(DispatchError::NoServiceHandler {
                    mbox,
                    message_type: message_type.name(),
                }));
            }
            return;
        };
        trace!(agent = %self.id, %mbox, message_type = message_type.name(), "handling message");
        let outcome = {
            let mut model = self.model.lock();
            catch_unwind(AssertUnwindSafe(|| handler(&mut **model, self, &message)))
        };
        drop(limit);
        match outcome {
            Ok(Ok(value)) => {
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(value));
                }
            }
            Ok(Err(e)) => self.report_failure(Some(message_type), format!("{e:#}"), false, reply),
            Err(payload) => {
                let reason = panic_reason(payload.as_ref());
                self.report_failure(Some(message_type), reason, true, reply);
            }
        }
    }

    fn run_hook(self: &Arc<Self>, slot: &Mutex<Option<LifecycleHook>>) {
        let Some(hook) = slot.lock().take() else {
            return;
        };
        let outcome = {
            let mut model = self.model.lock();
            catch_unwind(AssertUnwindSafe(|| hook(&mut **model, self)))
        };
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.report_failure(None, format!("{e:#}"), false, None),
            Err(payload) => self.report_failure(None, panic_reason(payload.as_ref()), true, None),
        }
    }

    fn report_failure(
        self: &Arc<Self>,
        message_type: Option<MessageType>,
        reason: String,
        panicked: bool,
        reply: Option<ReplySender>,
    ) {
        let failure = HandlerFailure {
            agent: self.id.clone(),
            message_type: message_type.map(|message_type| message_type.name()),
            reason,
            panicked,
        };
        match self.environment() {
            Some(env) => env.failure_observer().on_handler_failure(&failure),
            None => LoggingFailureObserver.on_handler_failure(&failure),
        }
        if let Some(reply) = reply {
            let _ = reply.send(Err(DispatchError::UnhandledHandlerFailure {
                agent: self.id.to_string(),
                message_type: failure.message_type.unwrap_or("<lifecycle>"),
                reason: failure.reason.clone(),
            }));
        }
        match self.failure_reaction {
            FailureReaction::Ignore => {}
            FailureReaction::Deregister => {
                debug!(agent = %self.id, "deregistering agent after handler failure");
                if let Err(e) = self.deregister() {
                    debug!(agent = %self.id, error = %e, "deregistration after failure skipped");
                }
            }
            FailureReaction::Abort => fatal::terminate(&format!(
                "handler of agent {} failed: {}",
                self.id, failure.reason
            )),
        }
    }

    // --- registration ---

    pub(crate) fn register(
        self: &Arc<Self>,
        env: &Environment,
        dispatcher_name: &str,
        hint: BindHint,
    ) -> Result<AgentHandle> {
        if self.status() != AgentStatus::Defined {
            return Err(DispatchError::AgentAlreadyRegistered {
                agent: self.id.to_string(),
            });
        }
        let dispatcher = env
            .dispatcher(dispatcher_name)
            .ok_or_else(|| DispatchError::UnknownDispatcher {
                dispatcher: dispatcher_name.to_string(),
            })?;
        let handle = self.handle();
        let queue = dispatcher.bind_agent(&handle, &hint)?;
        // Deliveries wait on the binding lock, so nothing reaches the queue
        // ahead of the start demand and `on_start` sees a registered agent.
        let mut binding = self.binding.write();
        env.remember_agent(handle.clone());
        *self.status.lock() = AgentStatus::Registered;
        if let Err(e) = queue.push(ExecutionDemand::new(Arc::clone(self), DemandKind::Start)) {
            *self.status.lock() = AgentStatus::Defined;
            drop(binding);
            env.forget_agent(self.key);
            dispatcher.unbind_agent(&handle, &hint);
            return Err(e);
        }
        *binding = Some(Binding {
            dispatcher,
            queue,
            hint,
        });
        drop(binding);
        debug!(agent = %self.id, dispatcher = dispatcher_name, "agent registered");
        Ok(handle)
    }

    /// Unsubscribes everything, queues the finish demand and releases the
    /// dispatcher binding. Completion happens when the finish demand runs.
    pub(crate) fn deregister(self: &Arc<Self>) -> Result<()> {
        {
            let mut status = self.status.lock();
            match *status {
                AgentStatus::Registered => *status = AgentStatus::Deregistering,
                AgentStatus::Defined => {
                    return Err(DispatchError::AgentNotRegistered {
                        agent: self.id.to_string(),
                    })
                }
                AgentStatus::Deregistering | AgentStatus::Deregistered => return Ok(()),
            }
        }
        debug!(agent = %self.id, "deregistering agent");
        self.retire_subscriptions();
        self.drop_all_filters();
        let binding = self.binding.write().take();
        match binding {
            Some(binding) => {
                let finish = ExecutionDemand::new(Arc::clone(self), DemandKind::Finish);
                if let Err(e) = binding.queue.push(finish) {
                    debug!(
                        agent = %self.id,
                        error = %e,
                        "finish demand rejected; completing deregistration now"
                    );
                    self.complete_deregistration();
                }
                binding.dispatcher.unbind_agent(&self.handle(), &binding.hint);
            }
            None => self.complete_deregistration(),
        }
        Ok(())
    }

    pub(crate) fn complete_deregistration(&self) {
        {
            let mut status = self.status.lock();
            if *status == AgentStatus::Deregistered {
                return;
            }
            *status = AgentStatus::Deregistered;
        }
        self.table.write().retired = SubscriptionStorage::default();
        if let Some(env) = self.environment() {
            env.forget_agent(self.key);
        }
        debug!(agent = %self.id, "agent deregistered");
    }
}
