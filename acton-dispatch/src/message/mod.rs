//! Message plumbing: identities, demands, replies and errors.
//!
//! *   [`MessageType`]: Runtime identity of a message type.
//! *   [`ExecutionDemand`]: An admitted (agent, message) waiting in an event
//!     queue; its handler is chosen when it runs.
//! *   [`ServiceRequest`]: The pending reply of a service request.
//! *   [`DispatchError`]: Every error the runtime reports.

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
pub use demand::ExecutionDemand;
pub use dispatch_error::{DispatchError, ReactionKind};
pub use message_type::MessageType;
pub use service_request::ServiceRequest;

// --- Crate-Internal Re-exports ---
pub(crate) use demand::{DemandKind, EventDemand};

// --- Submodules ---

/// Defines [`ExecutionDemand`].
mod demand;
/// Defines [`DispatchError`].
mod dispatch_error;
/// Defines [`MessageType`].
mod message_type;
/// Defines [`ServiceRequest`].
mod service_request;
