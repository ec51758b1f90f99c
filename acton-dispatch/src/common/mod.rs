//! Common types, configuration and the runtime context.
//!
//! # Key Re-exported Components:
//!
//! *   [`ActonApp`]: The entry point for initializing the runtime.
//! *   [`Environment`]: The context object that owns dispatchers, mailboxes
//!     and agents.
//! *   [`ActonConfig`]: Runtime configuration loaded from XDG locations.

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
pub use acton::ActonApp;
pub use config::ActonConfig;
pub use environment::Environment;

// --- Crate-Internal Re-exports ---
pub use types::*;
pub(crate) use environment::WeakEnvironment;

// --- Submodules ---

/// Defines common type aliases.
mod types;

/// Defines the `ActonApp` entry point for runtime initialization.
mod acton;
/// Defines the `Environment` context object.
mod environment;
/// Defines the configuration system for the runtime.
pub mod config;
/// Fatal termination for unrecoverable conditions.
pub(crate) mod fatal;
