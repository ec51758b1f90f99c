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
use std::any::Any;
use std::fmt::Debug;

/// A marker trait for types that can travel through Acton mailboxes.
///
/// Messages are immutable once sent. A broadcast shares one payload between
/// every demand it produces, which is why the trait requires `Sync` as well
/// as `Send`.
///
/// The `as_any` method is what lets the runtime dispatch on the concrete
/// type and hand handlers a typed reference.
///
/// A blanket implementation covers every `T: Any + Send + Sync + Debug`, so
/// message types usually only need `#[acton_message]` or a `Debug` derive.
pub trait ActonMessage: Any + Send + Sync + Debug {
    /// Returns the message as a dynamic [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the concrete type name, used in logs and errors.
    fn type_name(&self) -> &'static str;
}

impl<T> ActonMessage for T
where
    T: Any + Send + Sync + Debug,
{
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}
