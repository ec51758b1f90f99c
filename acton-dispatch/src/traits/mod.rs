//! Public capability traits.
//!
//! *   [`ActonMessage`]: Implemented by everything that can be sent.
//! *   [`Dispatcher`]: A scheduling policy binding agents to worker threads.
//! *   [`EventQueue`]: Where a dispatcher keeps an agent's pending demands.
//! *   [`FailureObserver`]: Receives handler failures.

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

// --- Public Re-exports ---
pub use acton_message::ActonMessage;
pub use dispatcher::Dispatcher;
pub use event_queue::EventQueue;
pub use failure_observer::{FailureObserver, HandlerFailure, LoggingFailureObserver};

// --- Submodules ---

/// Defines the [`ActonMessage`] marker trait.
mod acton_message;
/// Defines the [`Dispatcher`] trait.
mod dispatcher;
/// Defines the [`EventQueue`] trait.
mod event_queue;
/// Defines the [`FailureObserver`] trait and its logging default.
mod failure_observer;
