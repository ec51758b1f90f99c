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

#[acton_message]
pub struct Ping;

#[acton_message]
pub struct Job {
    pub id: u32,
}

#[acton_message]
pub struct Hold;

#[acton_message]
pub struct Add(pub u64);

#[acton_message]
pub struct GetTotal;

#[acton_message]
pub struct Boom;

#[acton_message]
pub struct Chunk {
    pub size: u32,
}

#[acton_message]
pub struct Summary {
    pub size: u32,
}

#[acton_message]
pub enum Switch {
    On,
    Off,
}
