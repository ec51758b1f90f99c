//! Agents: the units of state and behavior the runtime dispatches work to.
//!
//! An agent owns a user model, a set of behavioral states, and a table of
//! subscriptions mapping (message type, mailbox, state) to a handler. Agents
//! are assembled as a [`ManagedAgent`] in the [`Idle`] state and then
//! registered, which binds them to a dispatcher and returns an
//! [`AgentHandle`].
//!
//! # Key Components
//!
//! *   [`AgentConfig`]: name, priority, dispatcher binding and message limits.
//! *   [`ManagedAgent`]: the builder used to define states and handlers.
//! *   [`AgentContext`]: what a running handler can do to its own agent.
//! *   [`StateId`] / [`StateScope`]: hierarchical behavioral states.
//! *   [`MessageLimit`] / [`OverlimitReaction`]: bounds on pending demands.

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

pub use agent_config::AgentConfig;
pub use agent_core::AgentStatus;
pub use agent_handle::AgentHandle;
pub use context::AgentContext;
pub use managed_agent::{Idle, ManagedAgent};
pub use message_limit::{LimitStats, MessageLimit, OverlimitReaction};
pub use priority::Priority;
pub use state::{StateId, StateScope};

pub(crate) use agent_core::AgentCore;
pub(crate) use message_limit::LimitGuard;

mod agent_config;
mod agent_core;
mod agent_handle;
mod context;
mod managed_agent;
mod message_limit;
mod priority;
mod state;
mod subscription_storage;
