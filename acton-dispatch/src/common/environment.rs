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
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, instrument, trace};

use crate::agent::{AgentConfig, AgentHandle, Idle, ManagedAgent};
use crate::common::config::ActonConfig;
use crate::common::{DispatcherRef, Result};
use crate::dispatcher::{DispatcherStats, OneThreadDispatcher, ShutdownMode};
use crate::mailbox::{BroadcastMailbox, Mailbox, MboxId};
use crate::message::DispatchError;
use crate::traits::{Dispatcher, FailureObserver, LoggingFailureObserver};

/// Crate-internal: what agents keep so they never extend the environment's life.
pub(crate) type WeakEnvironment = Weak<EnvironmentInner>;

/// Shared state behind every [`Environment`] clone.
pub(crate) struct EnvironmentInner {
    config: ActonConfig,
    next_id: AtomicU64,
    dispatchers: DashMap<String, DispatcherRef>,
    named_mboxes: DashMap<String, Mailbox>,
    agents: DashMap<u64, AgentHandle>,
    failure_observer: RwLock<Arc<dyn FailureObserver>>,
}

impl Drop for EnvironmentInner {
    fn drop(&mut self) {
        for entry in self.dispatchers.iter() {
            entry.value().shutdown();
        }
    }
}

/// The context every runtime component is created through.
///
/// An `Environment` owns the id generator, the dispatcher registry, the named
/// mailbox registry, the registered agents and the failure observer. Cloning
/// is cheap; every clone refers to the same runtime. Nothing in the crate is
/// process-global, so independent environments can coexist in one process.
///
/// ```ignore
/// let env = ActonApp::launch()?;
/// let jobs = env.create_mbox();
/// let mut worker = env.new_agent::<Worker>()?;
/// worker.act_on(&jobs, StateScope::Any, |model: &mut Worker, _ctx, job: &Job| {
///     model.done.push(job.id);
///     Ok(())
/// })?;
/// worker.register()?;
/// jobs.send(Job { id: 1 })?;
/// env.shutdown();
/// ```
#[derive(Clone)]
pub struct Environment(Arc<EnvironmentInner>);

impl Environment {
    /// Builds an environment with a started one-thread dispatcher registered
    /// under `defaults.default_dispatcher`.
    pub fn new(config: ActonConfig) -> Result<Self> {
        let default_dispatcher = config.defaults.default_dispatcher.clone();
        let env = Self(Arc::new(EnvironmentInner {
            config,
            next_id: AtomicU64::new(1),
            dispatchers: DashMap::new(),
            named_mboxes: DashMap::new(),
            agents: DashMap::new(),
            failure_observer: RwLock::new(Arc::new(LoggingFailureObserver)),
        }));
        env.add_dispatcher(OneThreadDispatcher::new(default_dispatcher))?;
        debug!("environment created");
        Ok(env)
    }

    pub(crate) fn upgrade(weak: &WeakEnvironment) -> Option<Self> {
        weak.upgrade().map(Self)
    }

    pub(crate) fn downgrade(&self) -> WeakEnvironment {
        Arc::downgrade(&self.0)
    }

    /// The configuration this environment was built with.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ActonConfig {
        &self.0.config
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.0.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Creates an anonymous broadcast mailbox.
    #[must_use]
    pub fn create_mbox(&self) -> Mailbox {
        self.broadcast_mbox(None)
    }

    /// Returns the broadcast mailbox registered as `name`, creating it on
    /// first use. Every call with the same name yields the same mailbox.
    pub fn create_named_mbox(&self, name: impl Into<String>) -> Mailbox {
        let name = name.into();
        self.0
            .named_mboxes
            .entry(name.clone())
            .or_insert_with(|| self.broadcast_mbox(Some(name)))
            .clone()
    }

    fn broadcast_mbox(&self, name: Option<String>) -> Mailbox {
        let id = MboxId::new(self.next_id());
        trace!(mbox = %id, name = ?name, "mailbox created");
        Mailbox::from_core(
            Arc::new(BroadcastMailbox::new(id, name)),
            self.0.config.service_request_timeout(),
        )
    }

    /// Starts `dispatcher` and registers it under its own name.
    ///
    /// # Errors
    ///
    /// `DuplicateDispatcher` if the name is taken; `ThreadSpawn` if a worker
    /// thread cannot be started.
    #[instrument(skip(self, dispatcher), fields(dispatcher = %dispatcher.name()))]
    pub fn add_dispatcher<D: Dispatcher + 'static>(&self, dispatcher: D) -> Result<DispatcherRef> {
        match self.0.dispatchers.entry(dispatcher.name().to_string()) {
            Entry::Occupied(entry) => Err(DispatchError::DuplicateDispatcher {
                dispatcher: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                dispatcher.start()?;
                let dispatcher: DispatcherRef = Arc::new(dispatcher);
                entry.insert(Arc::clone(&dispatcher));
                debug!(kind = %dispatcher.kind(), "dispatcher added");
                Ok(dispatcher)
            }
        }
    }

    /// The dispatcher registered as `name`.
    #[must_use]
    pub fn dispatcher(&self, name: &str) -> Option<DispatcherRef> {
        self.0
            .dispatchers
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshots of every dispatcher, ordered by name.
    #[must_use]
    pub fn dispatcher_stats(&self) -> Vec<DispatcherStats> {
        let mut stats: Vec<_> = self
            .0
            .dispatchers
            .iter()
            .map(|entry| entry.value().stats())
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// A builder for an agent named `defaults.agent_name` on the default
    /// dispatcher.
    pub fn new_agent<Model>(&self) -> Result<ManagedAgent<Idle, Model>>
    where
        Model: Default + Send + 'static,
    {
        let config = AgentConfig::new(self.0.config.defaults.agent_name.clone())?;
        self.new_agent_with_config(config)
    }

    /// A builder for an agent configured by `config`, starting from
    /// `Model::default()`.
    pub fn new_agent_with_config<Model>(
        &self,
        config: AgentConfig,
    ) -> Result<ManagedAgent<Idle, Model>>
    where
        Model: Default + Send + 'static,
    {
        self.new_agent_with_model(config, Model::default())
    }

    /// A builder for an agent configured by `config` that starts with `model`.
    pub fn new_agent_with_model<Model>(
        &self,
        config: AgentConfig,
        model: Model,
    ) -> Result<ManagedAgent<Idle, Model>>
    where
        Model: Send + 'static,
    {
        ManagedAgent::new(self, config, model)
    }

    /// Deregisters the agent behind `handle`.
    pub fn deregister_agent(&self, handle: &AgentHandle) -> Result<()> {
        handle.deregister()
    }

    /// Number of agents registered and not yet fully deregistered.
    #[inline]
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.0.agents.len()
    }

    pub(crate) fn remember_agent(&self, handle: AgentHandle) {
        self.0.agents.insert(handle.key(), handle);
    }

    pub(crate) fn forget_agent(&self, key: u64) {
        self.0.agents.remove(&key);
    }

    /// Replaces the observer told about handler failures.
    pub fn set_failure_observer(&self, observer: impl FailureObserver + 'static) {
        *self.0.failure_observer.write() = Arc::new(observer);
    }

    /// The observer currently told about handler failures.
    #[must_use]
    pub fn failure_observer(&self) -> Arc<dyn FailureObserver> {
        Arc::clone(&*self.0.failure_observer.read())
    }

    /// Deregisters every agent, drains and stops every dispatcher, and waits
    /// for all worker threads.
    pub fn shutdown(&self) {
        self.shutdown_with(ShutdownMode::Drain);
    }

    /// Like [`shutdown`](Self::shutdown), with `ShutdownMode::Abandon`
    /// discarding pending demands instead of running them.
    #[instrument(skip(self))]
    pub fn shutdown_with(&self, mode: ShutdownMode) {
        let agents: Vec<AgentHandle> = self
            .0
            .agents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        debug!(agents = agents.len(), "deregistering agents");
        for agent in &agents {
            if let Err(e) = agent.deregister() {
                debug!(agent = %agent.id(), error = %e, "agent not deregistered during shutdown");
            }
        }

        let dispatchers: Vec<DispatcherRef> = self
            .0
            .dispatchers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for dispatcher in &dispatchers {
            dispatcher.shutdown_with(mode);
        }
        for dispatcher in &dispatchers {
            dispatcher.wait();
        }

        let leftovers: Vec<AgentHandle> = self
            .0
            .agents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for agent in leftovers {
            agent.core().complete_deregistration();
        }
        debug!("environment shut down");
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("dispatchers", &self.0.dispatchers.len())
            .field("agents", &self.0.agents.len())
            .field("named_mboxes", &self.0.named_mboxes.len())
            .finish_non_exhaustive()
    }
}
