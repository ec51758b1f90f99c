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
use std::fmt::Debug;

use acton_ern::Ern;
use tracing::error;

/// A handler that returned an error or panicked.
#[derive(Debug, Clone)]
pub struct HandlerFailure {
    /// Agent whose handler failed.
    pub agent: Ern,
    /// Message type being handled, or `None` for lifecycle hooks.
    pub message_type: Option<&'static str>,
    /// Error chain or panic payload.
    pub reason: String,
    /// Whether the failure was a panic.
    pub panicked: bool,
}

/// Receives handler failures caught at the invocation boundary.
///
/// Called on the worker thread that ran the handler, after the failure and
/// before the agent's failure reaction is applied. Implementations must not
/// block.
pub trait FailureObserver: Send + Sync + Debug {
    /// Called once per failed handler invocation.
    fn on_handler_failure(&self, failure: &HandlerFailure);
}

/// The default observer: logs every failure at `error`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFailureObserver;

impl FailureObserver for LoggingFailureObserver {
    fn on_handler_failure(&self, failure: &HandlerFailure) {
        error!(
            agent = %failure.agent,
            message_type = failure.message_type.unwrap_or("<lifecycle>"),
            panicked = failure.panicked,
            reason = %failure.reason,
            "handler failed"
        );
    }
}
