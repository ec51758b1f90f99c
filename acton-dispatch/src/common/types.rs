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

//! Common type aliases shared by the dispatch runtime.
//!
//! Handler aliases describe the type-erased closures stored in subscription
//! tables. The public aliases name the shared handles users pass around.

use std::any::Any;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::agent::AgentCore;
use crate::message::DispatchError;
use crate::traits::{ActonMessage, Dispatcher, EventQueue};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// A shared, immutable message payload.
pub type MessageRef = Arc<dyn ActonMessage>;

/// A shared dispatcher.
pub type DispatcherRef = Arc<dyn Dispatcher>;

/// A shared event queue handed out by a dispatcher binding.
pub type EventQueueRef = Arc<dyn EventQueue>;

/// Crate-internal: strong reference to an agent's core.
pub(crate) type AgentRef = Arc<AgentCore>;

/// Crate-internal: type-erased value a handler produced.
pub(crate) type ReplyValue = Box<dyn Any + Send>;

/// Crate-internal: what travels back through a service request's channel.
pub(crate) type ServiceReply = std::result::Result<ReplyValue, DispatchError>;

/// Crate-internal: sending half of a service request.
pub(crate) type ReplySender = oneshot::Sender<ServiceReply>;

/// Crate-internal: a subscribed handler with the model and message erased.
pub(crate) type HandlerFn = dyn Fn(&mut (dyn Any + Send), &AgentRef, &MessageRef)
        -> anyhow::Result<ReplyValue>
    + Send
    + Sync
    + 'static;

/// Crate-internal: shared handler reference carried by execution demands.
pub(crate) type HandlerRef = Arc<HandlerFn>;

/// Crate-internal: `on_start`/`on_finish` hook with the model erased.
pub(crate) type LifecycleHook =
    Box<dyn Fn(&mut (dyn Any + Send), &AgentRef) -> anyhow::Result<()> + Send + Sync + 'static>;

/// Crate-internal: broadcast delivery filter with the message erased.
pub(crate) type FilterFn = dyn Fn(&dyn ActonMessage) -> bool + Send + Sync + 'static;

/// Crate-internal: overlimit transformation with the message erased.
pub(crate) type TransformFn = dyn Fn(&dyn ActonMessage) -> Vec<MessageRef> + Send + Sync + 'static;
