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

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::agent::{AgentCore, AgentHandle};
use crate::common::{AgentRef, FilterFn, Result};
use crate::mailbox::{Delivery, DeliveryMode, MailboxCore, MailboxKind, MboxId};
use crate::message::{DispatchError, MessageType};

#[derive(Clone, Default)]
struct Subscriber {
    agent: Weak<AgentCore>,
    subscribed: bool,
    filter: Option<Arc<FilterFn>>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("subscribed", &self.subscribed)
            .field("filtered", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

/// Crate-internal: multi-producer, multi-consumer mailbox.
///
/// Keeps, per message type, the agents that subscribed here in any state,
/// plus their delivery filters. Handlers themselves live in each agent's
/// subscription storage and are resolved against its current state at
/// delivery time.
#[derive(Debug)]
pub(crate) struct BroadcastMailbox {
    id: MboxId,
    name: Option<String>,
    subscribers: RwLock<HashMap<MessageType, BTreeMap<u64, Subscriber>>>,
}

impl BroadcastMailbox {
    pub(crate) fn new(id: MboxId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of live subscribed agents that pass their filter.
    fn targets(&self, delivery: &Delivery) -> Vec<AgentRef> {
        let candidates: Vec<_> = {
            let subscribers = self.subscribers.read();
            subscribers
                .get(&delivery.message_type)
                .map(|agents| {
                    agents
                        .values()
                        .filter(|subscriber| subscriber.subscribed)
                        .map(|subscriber| (subscriber.agent.clone(), subscriber.filter.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };
        candidates
            .into_iter()
            .filter_map(|(agent, filter)| {
                let agent = agent.upgrade()?;
                match filter {
                    Some(filter) if !filter(delivery.message.as_ref()) => {
                        trace!(
                            agent = %agent.id(),
                            mbox = %self.id,
                            "delivery filter rejected message"
                        );
                        None
                    }
                    _ => Some(agent),
                }
            })
            .collect()
    }

    fn update(
        &self,
        message_type: MessageType,
        agent: &AgentHandle,
        edit: impl FnOnce(&mut Subscriber),
    ) {
        let mut subscribers = self.subscribers.write();
        let agents = subscribers.entry(message_type).or_default();
        let entry = agents.entry(agent.key()).or_insert_with(|| Subscriber {
            agent: agent.downgrade(),
            ..Subscriber::default()
        });
        edit(entry);
        if !entry.subscribed && entry.filter.is_none() {
            agents.remove(&agent.key());
        }
        if agents.is_empty() {
            subscribers.remove(&message_type);
        }
    }
}

impl MailboxCore for BroadcastMailbox {
    fn id(&self) -> MboxId {
        self.id
    }

    fn kind(&self) -> MailboxKind {
        MailboxKind::Broadcast
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn subscribe_agent(&self, message_type: MessageType, agent: &AgentHandle) -> Result<()> {
        self.update(message_type, agent, |subscriber| subscriber.subscribed = true);
        trace!(
            agent = %agent.id(),
            mbox = %self.id,
            message_type = message_type.name(),
            "agent subscribed"
        );
        Ok(())
    }

    fn unsubscribe_agent(&self, message_type: MessageType, agent: &AgentHandle) {
        self.update(message_type, agent, |subscriber| subscriber.subscribed = false);
        trace!(
            agent = %agent.id(),
            mbox = %self.id,
            message_type = message_type.name(),
            "agent unsubscribed"
        );
    }

    fn set_delivery_filter(
        &self,
        message_type: MessageType,
        agent: &AgentHandle,
        filter: Arc<FilterFn>,
    ) -> Result<()> {
        self.update(message_type, agent, |subscriber| subscriber.filter = Some(filter));
        Ok(())
    }

    fn drop_delivery_filter(&self, message_type: MessageType, agent: &AgentHandle) {
        self.update(message_type, agent, |subscriber| subscriber.filter = None);
    }

    fn deliver(&self, delivery: Delivery) -> Result<()> {
        let targets = self.targets(&delivery);
        let Delivery {
            message,
            message_type,
            mode,
            depth,
        } = delivery;

        match mode {
            DeliveryMode::OneWay => {
                if targets.is_empty() {
                    trace!(
                        mbox = %self.id,
                        message_type = message_type.name(),
                        "no subscribers; message discarded"
                    );
                }
                for agent in targets {
                    if !agent.has_handler(message_type, self.id) {
                        continue;
                    }
                    let delivery = Delivery {
                        message: Arc::clone(&message),
                        message_type,
                        mode: DeliveryMode::OneWay,
                        depth,
                    };
                    if let Err(e) = agent.enqueue(self.id, delivery) {
                        debug!(
                            agent = %agent.id(),
                            mbox = %self.id,
                            message_type = message_type.name(),
                            error = %e,
                            "broadcast delivery to agent failed"
                        );
                    }
                }
                Ok(())
            }
            DeliveryMode::Service(reply) => {
                let mut matching: Vec<_> = targets
                    .into_iter()
                    .filter(|agent| agent.has_handler(message_type, self.id))
                    .collect();
                match matching.len() {
                    0 => Err(DispatchError::NoServiceHandler {
                        mbox: self.id,
                        message_type: message_type.name(),
                    }),
                    1 => {
                        let agent = matching.remove(0);
                        let delivery = Delivery {
                            message,
                            message_type,
                            mode: DeliveryMode::Service(reply),
                            depth,
                        };
                        agent.enqueue(self.id, delivery)
                    }
                    count => Err(DispatchError::MultipleServiceHandlers {
                        mbox: self.id,
                        message_type: message_type.name(),
                        count,
                    }),
                }
            }
        }
    }

    fn subscriber_count(&self) -> usize {
        let subscribers = self.subscribers.read();
        let mut keys: Vec<u64> = subscribers
            .values()
            .flat_map(|agents| {
                agents
                    .iter()
                    .filter(|(_, subscriber)| subscriber.subscribed)
                    .map(|(key, _)| *key)
            })
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys.len()
    }
}
