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
#![allow(unused)]

use acton_dispatch::prelude::*;

use crate::setup::{Gate, Journal};

/// Records a line per handled message.
#[acton_agent]
pub struct Recorder {
    pub name: String,
    pub journal: Journal,
}

impl Recorder {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            journal: journal.clone(),
        }
    }

    pub fn note(&self, what: impl std::fmt::Display) {
        self.journal.record(format!("{}:{what}", self.name));
    }
}

/// Keeps a running total.
#[acton_agent]
pub struct Accumulator {
    pub total: u64,
}

/// Blocks in its handlers until the test opens the gate.
#[acton_agent(no_default)]
pub struct Blocker {
    pub name: String,
    pub gate: Gate,
    pub journal: Journal,
}
