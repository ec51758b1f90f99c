//! Mailboxes: the addresses messages are sent to.
//!
//! *   [`Mailbox`]: A cheap, cloneable handle to either kind of mailbox.
//!     Broadcast mailboxes deliver to every subscribed agent; direct
//!     mailboxes belong to exactly one agent and are its personal address.
//! *   [`MboxId`]: The numeric identity mailboxes are compared and ordered by.
//!
//! Lock ordering: when an operation must hold the internal locks of two
//! mailboxes at once it takes the lower [`MboxId`] first. No operation in this
//! crate currently needs to, since delivery copies the subscriber list out
//! before touching any agent.

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
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::instrument;

use crate::agent::AgentHandle;
use crate::common::{FilterFn, MessageRef, ReplySender, Result};
use crate::message::{MessageType, ServiceRequest};
use crate::traits::ActonMessage;

pub(crate) use broadcast::BroadcastMailbox;
pub(crate) use direct::DirectMailbox;

mod broadcast;
mod direct;

/// Numeric mailbox identity, unique within an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MboxId(u64);

impl MboxId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mbox#{}", self.0)
    }
}

/// Which delivery semantics a mailbox has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxKind {
    /// Many subscribers, each with its own state-scoped handlers.
    Broadcast,
    /// One owning agent.
    Direct,
}

/// Crate-internal: one-way send or service request.
pub(crate) enum DeliveryMode {
    OneWay,
    Service(ReplySender),
}

/// Crate-internal: a message on its way into agents' queues.
pub(crate) struct Delivery {
    pub(crate) message: MessageRef,
    pub(crate) message_type: MessageType,
    pub(crate) mode: DeliveryMode,
    /// Redirect and transform hops taken so far.
    pub(crate) depth: u32,
}

impl Delivery {
    pub(crate) fn one_way(message: MessageRef, depth: u32) -> Self {
        Self {
            message_type: MessageType::of_message(message.as_ref()),
            message,
            mode: DeliveryMode::OneWay,
            depth,
        }
    }

    pub(crate) fn service(message: MessageRef, reply: ReplySender) -> Self {
        Self {
            message_type: MessageType::of_message(message.as_ref()),
            message,
            mode: DeliveryMode::Service(reply),
            depth: 0,
        }
    }

    pub(crate) const fn is_service(&self) -> bool {
        matches!(self.mode, DeliveryMode::Service(_))
    }

    /// The same delivery one hop further along a redirect chain.
    pub(crate) fn redirected(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }
}

/// Crate-internal: behavior shared by both mailbox kinds.
pub(crate) trait MailboxCore: Send + Sync + fmt::Debug {
    fn id(&self) -> MboxId;
    fn kind(&self) -> MailboxKind;
    fn name(&self) -> Option<&str>;

    /// Records that `agent` has at least one handler for `message_type` here.
    fn subscribe_agent(&self, message_type: MessageType, agent: &AgentHandle) -> Result<()>;

    /// Records that `agent` has no handler left for `message_type` here.
    fn unsubscribe_agent(&self, message_type: MessageType, agent: &AgentHandle);

    fn set_delivery_filter(
        &self,
        message_type: MessageType,
        agent: &AgentHandle,
        filter: Arc<FilterFn>,
    ) -> Result<()>;

    fn drop_delivery_filter(&self, message_type: MessageType, agent: &AgentHandle);

    fn deliver(&self, delivery: Delivery) -> Result<()>;

    fn subscriber_count(&self) -> usize;
}

/// A handle to a mailbox.
///
/// Cloning is cheap and every clone addresses the same mailbox. Handles
/// compare and order by [`MboxId`].
///
/// ```ignore
/// let jobs = env.create_mbox();
/// jobs.send(Job { id: 7 })?;
///
/// let total: u64 = accounts.request_value(Balance)?;
/// ```
#[derive(Clone)]
pub struct Mailbox {
    core: Arc<dyn MailboxCore>,
    request_timeout: Duration,
}

impl Mailbox {
    pub(crate) fn from_core(core: Arc<dyn MailboxCore>, request_timeout: Duration) -> Self {
        Self {
            core,
            request_timeout,
        }
    }

    pub(crate) fn core(&self) -> &dyn MailboxCore {
        self.core.as_ref()
    }

    /// A broadcast mailbox outside of any environment.
    #[cfg(test)]
    pub(crate) fn detached(raw: u64) -> Self {
        Self::from_core(
            Arc::new(BroadcastMailbox::new(MboxId::new(raw), None)),
            Duration::from_secs(1),
        )
    }

    /// This mailbox's identity.
    #[must_use]
    pub fn id(&self) -> MboxId {
        self.core.id()
    }

    /// Broadcast or direct.
    #[must_use]
    pub fn kind(&self) -> MailboxKind {
        self.core.kind()
    }

    /// The registered name, for named broadcast mailboxes.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.core.name()
    }

    /// Number of agents currently subscribed to at least one message type.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.core.subscriber_count()
    }

    /// Sends a one-way message.
    ///
    /// Returns once a demand has been queued for every agent whose current
    /// state has a matching handler. A mailbox without subscribers discards
    /// the message.
    pub fn send<M: ActonMessage>(&self, message: M) -> Result<()> {
        self.send_ref(Arc::new(message))
    }

    /// Sends an already shared payload, avoiding a copy when forwarding.
    #[instrument(level = "trace", skip(self, message), fields(mbox = %self.id()))]
    pub fn send_ref(&self, message: MessageRef) -> Result<()> {
        self.core.deliver(Delivery::one_way(message, 0))
    }

    /// Sends a service request and returns the pending reply.
    ///
    /// Exactly one handler must match: none fails with `NoServiceHandler`,
    /// more than one (on a broadcast mailbox) with `MultipleServiceHandlers`.
    /// Limit rejections are reported here, synchronously.
    pub fn request<M, R>(&self, message: M) -> Result<ServiceRequest<R>>
    where
        M: ActonMessage,
        R: Send + 'static,
    {
        let message_type = MessageType::of::<M>();
        let (reply, receiver) = oneshot::channel();
        self.core
            .deliver(Delivery::service(Arc::new(message), reply))?;
        Ok(ServiceRequest::new(receiver, message_type))
    }

    /// Sends a service request and blocks for the reply, up to the
    /// environment's `service_request_timeout_ms`.
    ///
    /// Must not be called from inside a handler of the agent being asked, or
    /// of any agent sharing its worker thread.
    pub fn request_value<M, R>(&self, message: M) -> Result<R>
    where
        M: ActonMessage,
        R: Send + 'static,
    {
        self.request::<M, R>(message)?.wait_for(self.request_timeout)
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

impl PartialEq for Mailbox {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Mailbox {}

impl Hash for Mailbox {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl PartialOrd for Mailbox {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Mailbox {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id().cmp(&other.id())
    }
}
