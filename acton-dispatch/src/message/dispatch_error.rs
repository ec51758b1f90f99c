/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     you may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::mailbox::MboxId;

/// Short name of an overlimit reaction, carried by limit errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    /// The message was silently discarded.
    Drop,
    /// The message was discarded and a warning logged.
    DropWithLog,
    /// The process was aborted.
    Abort,
    /// The message was forwarded to another mailbox.
    Redirect,
    /// The message was replaced by derived messages.
    Transform,
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Drop => "drop",
            Self::DropWithLog => "drop_with_log",
            Self::Abort => "abort",
            Self::Redirect => "redirect",
            Self::Transform => "transform",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the dispatch runtime.
///
/// Every variant names the agent, message type, mailbox or dispatcher
/// involved so a failure can be attributed without extra context.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The agent already has a handler for this (message type, mailbox, state).
    #[error("duplicate subscription: agent {agent}, message type {message_type}, {mbox}, state {state}")]
    DuplicateSubscription {
        /// Subscribing agent.
        agent: String,
        /// Message type of the subscription.
        message_type: &'static str,
        /// Mailbox of the subscription.
        mbox: MboxId,
        /// State scope of the subscription.
        state: String,
    },

    /// No handler matches this (message type, mailbox, state).
    #[error("subscription not found: agent {agent}, message type {message_type}, {mbox}, state {state}")]
    SubscriptionNotFound {
        /// Unsubscribing agent.
        agent: String,
        /// Message type of the subscription.
        message_type: &'static str,
        /// Mailbox of the subscription.
        mbox: MboxId,
        /// State scope of the subscription.
        state: String,
    },

    /// A service request was rejected by the receiver's message limit.
    #[error("message limit exceeded: agent {agent}, message type {message_type}, limit {limit}, reaction {reaction}")]
    MessageLimitExceeded {
        /// Receiving agent.
        agent: String,
        /// Limited message type.
        message_type: &'static str,
        /// Configured limit.
        limit: usize,
        /// Reaction that rejected the request.
        reaction: ReactionKind,
    },

    /// Agents cannot be bound to a dispatcher that is not running.
    #[error("dispatcher '{dispatcher}' is not started")]
    DispatcherNotStarted {
        /// Dispatcher name.
        dispatcher: String,
    },

    /// The agent's event queue no longer accepts demands.
    #[error("event queue '{queue}' is shut down: agent {agent}")]
    QueueShutDown {
        /// Queue label.
        queue: String,
        /// Agent the demand was addressed to.
        agent: String,
    },

    /// A handler returned an error or panicked.
    #[error("handler failure: agent {agent}, message type {message_type}: {reason}")]
    UnhandledHandlerFailure {
        /// Agent whose handler failed.
        agent: String,
        /// Message type being handled.
        message_type: &'static str,
        /// Error text or panic payload.
        reason: String,
    },

    /// A service request found no handler on the mailbox.
    #[error("no service handler: message type {message_type}, {mbox}")]
    NoServiceHandler {
        /// Target mailbox.
        mbox: MboxId,
        /// Request message type.
        message_type: &'static str,
    },

    /// A service request found more than one handler on a broadcast mailbox.
    #[error("{count} service handlers for message type {message_type} on {mbox}; exactly one is required")]
    MultipleServiceHandlers {
        /// Target mailbox.
        mbox: MboxId,
        /// Request message type.
        message_type: &'static str,
        /// Number of matching handlers.
        count: usize,
    },

    /// The request was dropped before a reply was produced.
    #[error("service request canceled: message type {message_type}")]
    ServiceRequestCanceled {
        /// Request message type.
        message_type: &'static str,
    },

    /// No reply arrived within the caller's timeout.
    #[error("service request timed out after {timeout:?}: message type {message_type}")]
    ServiceRequestTimeout {
        /// Request message type.
        message_type: &'static str,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The handler replied with a different type than the caller expected.
    #[error("reply type mismatch: message type {message_type}, expected {expected}")]
    ReplyTypeMismatch {
        /// Request message type.
        message_type: &'static str,
        /// Reply type the caller asked for.
        expected: &'static str,
    },

    /// Only the owner may subscribe to a direct mailbox.
    #[error("agent {agent} cannot subscribe to direct {mbox} (message type {message_type}); only its owner can")]
    IllegalSubscriber {
        /// Direct mailbox.
        mbox: MboxId,
        /// Rejected agent.
        agent: String,
        /// Message type of the attempted subscription.
        message_type: &'static str,
    },

    /// Delivery filters are only supported on broadcast mailboxes.
    #[error("delivery filters are not allowed on direct {mbox}: agent {agent}, message type {message_type}")]
    DeliveryFilterNotAllowed {
        /// Direct mailbox.
        mbox: MboxId,
        /// Agent that tried to set the filter.
        agent: String,
        /// Filtered message type.
        message_type: &'static str,
    },

    /// The state does not belong to this agent.
    #[error("unknown state {state} for agent {agent}")]
    UnknownState {
        /// Agent that was asked about the state.
        agent: String,
        /// Offending state.
        state: String,
    },

    /// No dispatcher with this name is registered.
    #[error("unknown dispatcher '{dispatcher}'")]
    UnknownDispatcher {
        /// Requested name.
        dispatcher: String,
    },

    /// A dispatcher with this name is already registered.
    #[error("dispatcher '{dispatcher}' is already registered")]
    DuplicateDispatcher {
        /// Conflicting name.
        dispatcher: String,
    },

    /// Two limits were configured for the same message type.
    #[error("duplicate message limit: agent {agent}, message type {message_type}")]
    DuplicateMessageLimit {
        /// Agent being configured.
        agent: String,
        /// Message type with two limits.
        message_type: &'static str,
    },

    /// A group-binding dispatcher was asked to bind an agent without a group.
    #[error("dispatcher '{dispatcher}' requires a group name to bind agent {agent}")]
    MissingGroup {
        /// Dispatcher name.
        dispatcher: String,
        /// Agent being bound.
        agent: String,
    },

    /// The agent is not registered (or has already been deregistered).
    #[error("agent {agent} is not registered")]
    AgentNotRegistered {
        /// Agent identity.
        agent: String,
    },

    /// The agent has already been registered once.
    #[error("agent {agent} is already registered")]
    AgentAlreadyRegistered {
        /// Agent identity.
        agent: String,
    },

    /// The name cannot be turned into an agent identity.
    #[error("invalid agent name '{name}': {reason}")]
    InvalidAgentName {
        /// Rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The dispatcher could not start a worker thread.
    #[error("dispatcher '{dispatcher}' failed to spawn a worker thread: {source}")]
    ThreadSpawn {
        /// Dispatcher name.
        dispatcher: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A runtime facility could not be created.
    #[error("runtime I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_error_names_agent_type_and_reaction() {
        let err = DispatchError::MessageLimitExceeded {
            agent: "tag:acton:dispatch:::counter".to_string(),
            message_type: "Ping",
            limit: 2,
            reaction: ReactionKind::DropWithLog,
        };
        let text = err.to_string();
        assert!(text.contains("counter"));
        assert!(text.contains("Ping"));
        assert!(text.contains("drop_with_log"));
    }
}
