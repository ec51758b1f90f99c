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
use std::marker::PhantomData;

use acton_ern::Ern;

pub use idle::Idle;

use crate::common::{AgentRef, Environment};
use crate::dispatcher::BindHint;

mod idle;

/// An agent being assembled, before it is handed to a dispatcher.
///
/// `ManagedAgent` uses a type-state parameter so that configuration methods
/// (defining states, subscribing handlers, installing hooks) are only
/// available while the agent is [`Idle`]. [`register`](ManagedAgent::register)
/// consumes the builder and returns the [`AgentHandle`](crate::agent::AgentHandle)
/// of the running agent.
///
/// # Type Parameters
///
/// *   `AgentState`: lifecycle marker, currently only [`Idle`].
/// *   `Model`: the user data handlers and hooks operate on.
pub struct ManagedAgent<AgentState, Model> {
    pub(crate) core: AgentRef,
    pub(crate) env: Environment,
    pub(crate) dispatcher: String,
    pub(crate) bind_hint: BindHint,
    pub(crate) _state: PhantomData<AgentState>,
    pub(crate) _model: PhantomData<fn() -> Model>,
}

impl<AgentState, Model> ManagedAgent<AgentState, Model> {
    /// The agent's unique identifier.
    #[must_use]
    pub fn id(&self) -> &Ern {
        self.core.id()
    }
}

impl<AgentState, Model> fmt::Debug for ManagedAgent<AgentState, Model> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedAgent")
            .field("id", &self.core.id().to_string())
            .field("dispatcher", &self.dispatcher)
            .field("bind_hint", &self.bind_hint)
            .finish_non_exhaustive()
    }
}
