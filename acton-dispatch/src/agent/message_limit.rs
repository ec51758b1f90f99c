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
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::common::{MessageRef, TransformFn};
use crate::mailbox::Mailbox;
use crate::message::{MessageType, ReactionKind};
use crate::traits::ActonMessage;

/// What happens to a message that arrives while its type is at the limit.
#[derive(Clone)]
pub enum OverlimitReaction {
    /// Discard silently.
    Drop,
    /// Discard and log a warning.
    DropWithLog,
    /// Log and abort the process.
    Abort,
    /// Deliver to another mailbox instead.
    Redirect(Mailbox),
    /// Deliver zero or more derived messages to another mailbox instead.
    Transform {
        /// Where the derived messages go.
        to: Mailbox,
        /// Derives the replacement messages.
        transform: Arc<TransformFn>,
    },
}

impl OverlimitReaction {
    /// Short name of the reaction.
    #[must_use]
    pub const fn kind(&self) -> ReactionKind {
        match self {
            Self::Drop => ReactionKind::Drop,
            Self::DropWithLog => ReactionKind::DropWithLog,
            Self::Abort => ReactionKind::Abort,
            Self::Redirect(_) => ReactionKind::Redirect,
            Self::Transform { .. } => ReactionKind::Transform,
        }
    }
}

impl fmt::Debug for OverlimitReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redirect(to) => f.debug_tuple("Redirect").field(&to.id()).finish(),
            Self::Transform { to, .. } => f
                .debug_struct("Transform")
                .field("to", &to.id())
                .finish_non_exhaustive(),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// A cap on how many messages of one type may be pending for an agent.
///
/// A message counts from the moment it is accepted into the agent's queue
/// until its handler finishes, so the limit bounds queued plus running work.
///
/// ```ignore
/// let config = AgentConfig::new("parser")
///     .with_limit(MessageLimit::drop::<Chunk>(64))
///     .with_limit(MessageLimit::redirect::<Frame>(8, &overflow));
/// ```
#[derive(Clone, Debug)]
pub struct MessageLimit {
    message_type: MessageType,
    limit: usize,
    reaction: OverlimitReaction,
}

impl MessageLimit {
    fn new<M: ActonMessage>(limit: usize, reaction: OverlimitReaction) -> Self {
        Self {
            message_type: MessageType::of::<M>(),
            limit,
            reaction,
        }
    }

    /// Silently discard `M` past `limit` pending.
    #[must_use]
    pub fn drop<M: ActonMessage>(limit: usize) -> Self {
        Self::new::<M>(limit, OverlimitReaction::Drop)
    }

    /// Discard `M` past `limit` pending and log a warning.
    #[must_use]
    pub fn drop_with_log<M: ActonMessage>(limit: usize) -> Self {
        Self::new::<M>(limit, OverlimitReaction::DropWithLog)
    }

    /// Abort the process when `M` exceeds `limit` pending.
    #[must_use]
    pub fn abort<M: ActonMessage>(limit: usize) -> Self {
        Self::new::<M>(limit, OverlimitReaction::Abort)
    }

    /// Forward `M` to `to` past `limit` pending.
    #[must_use]
    pub fn redirect<M: ActonMessage>(limit: usize, to: &Mailbox) -> Self {
        Self::new::<M>(limit, OverlimitReaction::Redirect(to.clone()))
    }

    /// Replace `M` past `limit` pending with the messages `transform` derives
    /// from it, delivered to `to`. An empty result drops the message.
    #[must_use]
    pub fn transform<M, Out, F>(limit: usize, to: &Mailbox, transform: F) -> Self
    where
        M: ActonMessage,
        Out: ActonMessage,
        F: Fn(&M) -> Vec<Out> + Send + Sync + 'static,
    {
        let transform: Arc<TransformFn> = Arc::new(move |message: &dyn ActonMessage| {
            message
                .as_any()
                .downcast_ref::<M>()
                .map(|message| {
                    transform(message)
                        .into_iter()
                        .map(|out| Arc::new(out) as MessageRef)
                        .collect()
                })
                .unwrap_or_default()
        });
        Self::new::<M>(
            limit,
            OverlimitReaction::Transform {
                to: to.clone(),
                transform,
            },
        )
    }

    /// The limited message type.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Maximum number of pending messages.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// The configured reaction.
    #[must_use]
    pub const fn reaction(&self) -> &OverlimitReaction {
        &self.reaction
    }
}

/// A snapshot of one limit's counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitStats {
    /// Limited message type.
    pub message_type: &'static str,
    /// Configured limit.
    pub limit: usize,
    /// Messages accepted but not yet fully handled.
    pub in_flight: usize,
}

/// Crate-internal: a limit plus its live in-flight counter.
#[derive(Debug)]
pub(crate) struct LimitControlBlock {
    limit: MessageLimit,
    in_flight: AtomicUsize,
}

impl LimitControlBlock {
    pub(crate) const fn limit(&self) -> usize {
        self.limit.limit
    }

    pub(crate) const fn reaction(&self) -> &OverlimitReaction {
        &self.limit.reaction
    }

    pub(crate) const fn message_type(&self) -> MessageType {
        self.limit.message_type
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Crate-internal: releases one unit of a limit when dropped.
///
/// Travels inside the execution demand, so the count falls after the handler
/// finishes, or when an abandoned demand is discarded.
#[derive(Debug)]
pub(crate) struct LimitGuard {
    block: Arc<LimitControlBlock>,
}

impl Drop for LimitGuard {
    fn drop(&mut self) {
        self.block.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Crate-internal: outcome of admitting a message against the limits.
#[derive(Debug)]
pub(crate) enum LimitVerdict {
    /// Proceed; the guard is `None` when the type is unlimited.
    Accept(Option<LimitGuard>),
    /// The limit is reached; apply the block's reaction.
    Overlimit(Arc<LimitControlBlock>),
}

/// Crate-internal: the immutable set of limits of one agent.
#[derive(Debug, Default)]
pub(crate) struct MessageLimits {
    blocks: HashMap<MessageType, Arc<LimitControlBlock>>,
}

impl MessageLimits {
    /// Builds the set, returning the first duplicated type on conflict.
    pub(crate) fn new(limits: Vec<MessageLimit>) -> Result<Self, MessageType> {
        let mut blocks = HashMap::with_capacity(limits.len());
        for limit in limits {
            let message_type = limit.message_type;
            let block = Arc::new(LimitControlBlock {
                limit,
                in_flight: AtomicUsize::new(0),
            });
            if blocks.insert(message_type, block).is_some() {
                return Err(message_type);
            }
        }
        Ok(Self { blocks })
    }

    /// Counts the message in if its type is below the limit.
    pub(crate) fn admit(&self, message_type: MessageType) -> LimitVerdict {
        let Some(block) = self.blocks.get(&message_type) else {
            return LimitVerdict::Accept(None);
        };
        let mut current = block.in_flight.load(Ordering::Acquire);
        loop {
            if current >= block.limit() {
                return LimitVerdict::Overlimit(Arc::clone(block));
            }
            match block.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return LimitVerdict::Accept(Some(LimitGuard {
                        block: Arc::clone(block),
                    }))
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn stats(&self) -> Vec<LimitStats> {
        let mut stats: Vec<_> = self
            .blocks
            .values()
            .map(|block| LimitStats {
                message_type: block.message_type().name(),
                limit: block.limit(),
                in_flight: block.in_flight(),
            })
            .collect();
        stats.sort_by(|a, b| a.message_type.cmp(b.message_type));
        stats
    }
}
