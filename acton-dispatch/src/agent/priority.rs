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

use crate::common::config::PRIORITY_COUNT;

/// Scheduling priority of an agent, from `P0` (lowest) to `P7` (highest).
///
/// Only the priority-aware thread pool looks at it; every other dispatcher
/// treats all agents alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Lowest priority.
    #[default]
    P0,
    #[allow(missing_docs)]
    P1,
    #[allow(missing_docs)]
    P2,
    #[allow(missing_docs)]
    P3,
    #[allow(missing_docs)]
    P4,
    #[allow(missing_docs)]
    P5,
    #[allow(missing_docs)]
    P6,
    /// Highest priority.
    P7,
}

impl Priority {
    /// All priorities, lowest first.
    pub const ALL: [Self; PRIORITY_COUNT] = [
        Self::P0,
        Self::P1,
        Self::P2,
        Self::P3,
        Self::P4,
        Self::P5,
        Self::P6,
        Self::P7,
    ];

    /// Position of this priority in [`Priority::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The priority at `index`, if it is in range.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < PRIORITY_COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.index())
    }
}
