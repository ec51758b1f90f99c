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

use std::sync::{Arc, Weak};

use tracing::trace;

use crate::agent::{AgentCore, AgentHandle};
use crate::common::{FilterFn, Result};
use crate::mailbox::{Delivery, MailboxCore, MailboxKind, MboxId};
use crate::message::{DispatchError, MessageType};

/// Crate-internal: multi-producer, single-consumer mailbox owned by one agent.
#[derive(Debug)]
pub(crate) struct DirectMailbox {
    id: MboxId,
    owner_key: u64,
    owner: Weak<AgentCore>,
}

impl DirectMailbox {
    pub(crate) fn new(id: MboxId, owner_key: u64, owner: Weak<AgentCore>) -> Self {
        Self { id, owner_key, owner }
    }
}

impl MailboxCore for DirectMailbox {
    fn id(&self) -> MboxId {
        self.id
    }

    fn kind(&self) -> MailboxKind {
        MailboxKind::Direct
    }

    fn name(&self) -> Option<&str> {
        None
    }

    fn subscribe_agent(&self, message_type: MessageType, agent: &AgentHandle) -> Result<()> {
        if agent.key() == self.owner_key {
            Ok(())
        } else {
            Err(DispatchError::IllegalSubscriber {
                mbox: self.id,
                agent: agent.id().to_string(),
                message_type: message_type.name(),
            })
        }
    }

    fn unsubscribe_agent(&self, _message_type: MessageType, _agent: &AgentHandle) {}

    fn set_delivery_filter(
        &self,
        message_type: MessageType,
        agent: &AgentHandle,
        _filter: Arc<FilterFn>,
    ) -> Result<()> {
        Err(DispatchError::DeliveryFilterNotAllowed {
            mbox: self.id,
            agent: agent.id().to_string(),
            message_type: message_type.name(),
        })
    }

    fn drop_delivery_filter(&self, _message_type: MessageType, _agent: &AgentHandle) {}

    fn deliver(&self, delivery: Delivery) -> Result<()> {
        let owner = self
            .owner
            .upgrade()
            .filter(|owner| owner.has_handler(delivery.message_type, self.id));
        match owner {
            Some(owner) => owner.enqueue(self.id, delivery),
            None if delivery.is_service() => Err(DispatchError::NoServiceHandler {
                mbox: self.id,
                message_type: delivery.message_type.name(),
            }),
            None => {
                trace!(
                    mbox = %self.id,
                    message_type = delivery.message_type.name(),
                    "owner has no handler; message discarded"
                );
                Ok(())
            }
        }
    }

    fn subscriber_count(&self) -> usize {
        usize::from(self.owner.strong_count() > 0)
    }
}
