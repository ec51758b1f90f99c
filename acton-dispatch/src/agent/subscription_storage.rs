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

use std::collections::HashMap;

use crate::agent::state::{StateId, StateScope, StateTable};
use crate::common::HandlerRef;
use crate::mailbox::{Mailbox, MboxId};
use crate::message::MessageType;

/// Crate-internal: what a subscription is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionKey {
    pub(crate) message_type: MessageType,
    pub(crate) mbox: MboxId,
    pub(crate) scope: StateScope,
}

/// Crate-internal: how the handler's return value is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlerKind {
    /// Result is discarded.
    Event,
    /// Result answers a service request.
    Service,
}

/// Crate-internal: a subscribed handler plus the mailbox it listens on.
#[derive(Clone)]
pub(crate) struct SubscriptionEntry {
    pub(crate) mailbox: Mailbox,
    pub(crate) handler: HandlerRef,
    pub(crate) kind: HandlerKind,
}

impl std::fmt::Debug for SubscriptionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEntry")
            .field("mailbox", &self.mailbox.id())
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Per-agent table of handlers keyed by (message type, mailbox, state).
///
/// Lookup picks the subscription closest to the current state: the current
/// state first, then each ancestor, then the `Any` scope.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionStorage {
    entries: HashMap<SubscriptionKey, SubscriptionEntry>,
}

impl SubscriptionStorage {
    /// Adds a subscription. Returns `false` if the key is already taken.
    pub(crate) fn insert(&mut self, key: SubscriptionKey, entry: SubscriptionEntry) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, entry);
        true
    }

    pub(crate) fn remove(&mut self, key: &SubscriptionKey) -> Option<SubscriptionEntry> {
        self.entries.remove(key)
    }

    /// Whether any scope still subscribes this agent to (type, mailbox).
    pub(crate) fn has_any_for(&self, message_type: MessageType, mbox: MboxId) -> bool {
        self.entries
            .keys()
            .any(|key| key.message_type == message_type && key.mbox == mbox)
    }

    pub(crate) fn find(
        &self,
        message_type: MessageType,
        mbox: MboxId,
        states: &StateTable,
    ) -> Option<&SubscriptionEntry> {
        states
            .lineage(states.current())
            .map(StateScope::In)
            .chain(std::iter::once(StateScope::Any))
            .find_map(|scope| {
                self.entries.get(&SubscriptionKey {
                    message_type,
                    mbox,
                    scope,
                })
            })
    }

    /// Removes every subscription scoped to exactly `state`.
    pub(crate) fn drain_state(
        &mut self,
        state: StateId,
    ) -> Vec<(SubscriptionKey, SubscriptionEntry)> {
        let keys: Vec<_> = self
            .entries
            .keys()
            .filter(|key| key.scope == StateScope::In(state))
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|entry| (key, entry)))
            .collect()
    }

    /// Copies of every subscription, leaving the table intact.
    pub(crate) fn snapshot(&self) -> Vec<(SubscriptionKey, SubscriptionEntry)> {
        self.entries
            .iter()
            .map(|(key, entry)| (*key, entry.clone()))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Arc;

    use super::*;
    use crate::common::{AgentRef, MessageRef, ReplyValue};
    use crate::mailbox::Mailbox;

    #[derive(Debug)]
    struct Ping;

    fn entry(mailbox: &Mailbox, kind: HandlerKind) -> SubscriptionEntry {
        SubscriptionEntry {
            mailbox: mailbox.clone(),
            handler: Arc::new(
                |_model: &mut (dyn Any + Send), _agent: &AgentRef, _message: &MessageRef| {
                    Ok(Box::new(()) as ReplyValue)
                },
            ),
            kind,
        }
    }

    fn key(mbox: &Mailbox, scope: StateScope) -> SubscriptionKey {
        SubscriptionKey {
            message_type: MessageType::of::<Ping>(),
            mbox: mbox.id(),
            scope,
        }
    }

    #[test]
    fn duplicate_keys_are_refused() {
        let mbox = Mailbox::detached(1);
        let mut storage = SubscriptionStorage::default();
        assert!(storage.insert(key(&mbox, StateScope::Any), entry(&mbox, HandlerKind::Event)));
        assert!(!storage.insert(key(&mbox, StateScope::Any), entry(&mbox, HandlerKind::Event)));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn closest_state_wins_over_ancestors_and_any() {
        let mbox = Mailbox::detached(1);
        let mut states = StateTable::new(9);
        let parent = states.define("parent", None).expect("state");
        let child = states.define("child", Some(parent)).expect("state");

        let mut storage = SubscriptionStorage::default();
        storage.insert(key(&mbox, StateScope::Any), entry(&mbox, HandlerKind::Event));
        storage.insert(key(&mbox, StateScope::In(parent)), entry(&mbox, HandlerKind::Event));
        storage.insert(key(&mbox, StateScope::In(child)), entry(&mbox, HandlerKind::Service));

        let found = |storage: &SubscriptionStorage, states: &StateTable| {
            storage
                .find(MessageType::of::<Ping>(), mbox.id(), states)
                .map(|entry| entry.kind)
        };

        states.change(child).expect("state");
        assert_eq!(found(&storage, &states), Some(HandlerKind::Service));

        states.change(parent).expect("state");
        assert_eq!(found(&storage, &states), Some(HandlerKind::Event));

        assert!(storage.remove(&key(&mbox, StateScope::In(parent))).is_some());
        assert_eq!(found(&storage, &states), Some(HandlerKind::Event));
        assert!(storage.has_any_for(MessageType::of::<Ping>(), mbox.id()));
    }

    #[test]
    fn other_mailboxes_do_not_match() {
        let subscribed = Mailbox::detached(1);
        let other = Mailbox::detached(2);
        let states = StateTable::new(3);
        let mut storage = SubscriptionStorage::default();
        storage.insert(key(&subscribed, StateScope::Any), entry(&subscribed, HandlerKind::Event));
        assert!(storage
            .find(MessageType::of::<Ping>(), other.id(), &states)
            .is_none());
        assert!(!storage.has_any_for(MessageType::of::<Ping>(), other.id()));
    }

    #[test]
    fn drain_state_leaves_other_scopes() {
        let mbox = Mailbox::detached(1);
        let mut states = StateTable::new(4);
        let busy = states.define("busy", None).expect("state");
        let mut storage = SubscriptionStorage::default();
        storage.insert(key(&mbox, StateScope::Any), entry(&mbox, HandlerKind::Event));
        storage.insert(key(&mbox, StateScope::In(busy)), entry(&mbox, HandlerKind::Event));

        let drained = storage.drain_state(busy);
        assert_eq!(drained.len(), 1);
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.snapshot().len(), 1);
        assert_eq!(storage.len(), 1);
    }
}
