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

use crate::common::Result;
use crate::message::ExecutionDemand;

/// An ordered, thread-safe holding area for demands.
///
/// `push` never blocks. Once the queue is shut down it rejects every push
/// with `QueueShutDown`.
pub trait EventQueue: Send + Sync + Debug {
    /// Appends a demand.
    fn push(&self, demand: ExecutionDemand) -> Result<()>;

    /// Demands currently waiting.
    fn len(&self) -> usize;

    /// Whether no demands are waiting.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label used in logs and statistics.
    fn label(&self) -> &str;
}
