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

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Acton Dispatch
//!
//! An in-process agent runtime. Agents are stateful objects that react to
//! messages; the runtime routes messages from mailboxes to subscribed agents
//! and runs each agent's handlers on worker threads owned by dispatchers,
//! never running one agent's handlers concurrently.
//!
//! ## Key Concepts
//!
//! - **Environment (`Environment`)**: The context object every mailbox,
//!   dispatcher and agent is created through. Built by `ActonApp::launch`.
//! - **Agents (`ManagedAgent`, `AgentHandle`)**: A user model plus
//!   hierarchical behavioral states and a subscription table keyed by
//!   message type, mailbox and state.
//! - **Mailboxes (`Mailbox`)**: Broadcast mailboxes fan a message out to every
//!   subscriber; each agent also owns a direct mailbox only it can read.
//! - **Service requests**: `Mailbox::request` delivers a message to exactly
//!   one handler and returns a `ServiceRequest` for its reply.
//! - **Message limits**: Per-agent bounds on pending demands with drop,
//!   abort, redirect and transform reactions.
//! - **Dispatchers**: one-thread, active-object, active-group, thread-pool
//!   and priority-aware thread-pool scheduling policies behind the
//!   `Dispatcher` trait.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use acton_dispatch::prelude::*;
//!
//! #[acton_message]
//! struct Greet {
//!     name: String,
//! }
//!
//! #[acton_agent]
//! struct Greeter {
//!     greeted: usize,
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let env = ActonApp::launch()?;
//!     let greetings = env.create_mbox();
//!
//!     let mut greeter = env.new_agent::<Greeter>()?;
//!     greeter.act_on(&greetings, StateScope::Any, |model: &mut Greeter, _ctx, msg: &Greet| {
//!         model.greeted += 1;
//!         println!("hello, {}", msg.name);
//!         Ok(())
//!     })?;
//!     greeter.register()?;
//!
//!     greetings.send(Greet { name: "world".into() })?;
//!     env.shutdown();
//!     Ok(())
//! }
//! ```

/// Agents, their states, subscriptions and message limits.
pub(crate) mod agent;

/// Configuration, the environment context and shared type aliases.
pub(crate) mod common;

/// Event queues, worker threads and the dispatcher variants.
pub(crate) mod dispatcher;

/// Broadcast and direct mailboxes.
pub(crate) mod mailbox;

/// Execution demands, service requests, message types and errors.
pub(crate) mod message;

/// Core traits used throughout the runtime.
pub(crate) mod traits;

pub use crate::common::Result;

/// A prelude module for conveniently importing the most commonly used items.
///
/// # Re-exports
///
/// ## Macros (from `acton-macro`)
/// *   [`acton_macro::acton_message`]: Attribute macro for defining messages.
/// *   [`acton_macro::acton_agent`]: Attribute macro for defining agent models.
///
/// ## External Crates
/// *   [`acton_ern::Ern`](https://docs.rs/acton-ern): Agent identities.
///
/// ## Core Types
/// *   [`crate::common::ActonApp`] and [`crate::common::Environment`]: runtime setup.
/// *   [`crate::agent::ManagedAgent`], [`crate::agent::AgentHandle`],
///     [`crate::agent::AgentContext`]: building and driving agents.
/// *   [`crate::mailbox::Mailbox`]: sending messages and service requests.
/// *   The dispatcher variants and the [`crate::traits::Dispatcher`] trait.
pub mod prelude {
    // Macros from acton-macro
    pub use acton_macro::*;

    // External crate re-exports
    pub use acton_ern::Ern;

    // Core types
    pub use crate::agent::{
        AgentConfig, AgentContext, AgentHandle, AgentStatus, Idle, LimitStats, ManagedAgent,
        MessageLimit, OverlimitReaction, Priority, StateId, StateScope,
    };
    pub use crate::common::config::{
        BehaviorConfig, DefaultsConfig, FailureReaction, LimitsConfig, PriorityConfig,
        RedirectCapReaction, TimeoutConfig, UnsubscribePolicy, PRIORITY_COUNT,
    };
    pub use crate::common::{
        ActonApp, ActonConfig, DispatcherRef, Environment, EventQueueRef, MessageRef,
    };
    pub use crate::dispatcher::{
        ActiveGroupDispatcher, ActiveObjectDispatcher, BindHint, DispatcherKind, DispatcherState,
        DispatcherStats, OneThreadDispatcher, QueueStats, ShutdownMode, ThreadPoolDispatcher,
        ThreadPoolParams,
    };
    pub use crate::mailbox::{Mailbox, MailboxKind, MboxId};
    pub use crate::message::{
        DispatchError, ExecutionDemand, MessageType, ReactionKind, ServiceRequest,
    };
    pub use crate::traits::{
        ActonMessage, Dispatcher, EventQueue, FailureObserver, HandlerFailure,
        LoggingFailureObserver,
    };
}
