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

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::traits::ActonMessage;

/// Runtime identity of a message type.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for logs
/// and error messages.
#[derive(Clone, Copy, Debug)]
pub struct MessageType {
    id: TypeId,
    name: &'static str,
}

impl MessageType {
    /// The identity of `M`.
    #[must_use]
    pub fn of<M: ActonMessage>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    /// The identity of the concrete type behind `message`.
    #[must_use]
    pub fn of_message(message: &dyn ActonMessage) -> Self {
        Self {
            id: message.as_any().type_id(),
            name: message.type_name(),
        }
    }

    /// The underlying [`TypeId`].
    #[must_use]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// The fully qualified type name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageType {}

impl Hash for MessageType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ping;

    #[test]
    fn erased_message_reports_concrete_type() {
        let message: std::sync::Arc<dyn ActonMessage> = std::sync::Arc::new(Ping);
        assert_eq!(MessageType::of_message(message.as_ref()), MessageType::of::<Ping>());
        assert!(MessageType::of::<Ping>().name().ends_with("Ping"));
    }
}
