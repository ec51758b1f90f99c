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

/// Identifies a behavioral state of one agent.
///
/// States are only meaningful to the agent that defined them; using a state
/// of another agent fails with `UnknownState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId {
    owner: u64,
    index: u32,
}

impl StateId {
    /// Position of the state within its agent's state table.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Whether this is the implicit default state every agent starts in.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.index == 0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state#{}", self.index)
    }
}

/// Where a subscription applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateScope {
    /// Active in every state.
    Any,
    /// Active in this state and in all of its substates.
    In(StateId),
}

impl From<StateId> for StateScope {
    fn from(state: StateId) -> Self {
        Self::In(state)
    }
}

#[derive(Debug)]
struct StateNode {
    name: String,
    parent: Option<u32>,
}

/// The state tree of one agent plus its current state.
///
/// Nodes are appended only, and a parent must exist before its children, so
/// the parent links can never form a cycle.
#[derive(Debug)]
pub(crate) struct StateTable {
    owner: u64,
    nodes: Vec<StateNode>,
    current: u32,
}

pub(crate) const DEFAULT_STATE_NAME: &str = "<default>";

impl StateTable {
    pub(crate) fn new(owner: u64) -> Self {
        Self {
            owner,
            nodes: vec![StateNode {
                name: DEFAULT_STATE_NAME.to_string(),
                parent: None,
            }],
            current: 0,
        }
    }

    pub(crate) const fn default_state(&self) -> StateId {
        StateId {
            owner: self.owner,
            index: 0,
        }
    }

    pub(crate) fn define(
        &mut self,
        name: impl Into<String>,
        parent: Option<StateId>,
    ) -> Option<StateId> {
        let parent = match parent {
            Some(parent) if !self.contains(parent) => return None,
            Some(parent) => Some(parent.index),
            None => None,
        };
        let index = u32::try_from(self.nodes.len()).ok()?;
        self.nodes.push(StateNode {
            name: name.into(),
            parent,
        });
        Some(StateId {
            owner: self.owner,
            index,
        })
    }

    pub(crate) fn contains(&self, state: StateId) -> bool {
        state.owner == self.owner && (state.index as usize) < self.nodes.len()
    }

    pub(crate) const fn current(&self) -> StateId {
        StateId {
            owner: self.owner,
            index: self.current,
        }
    }

    /// Switches the current state, returning the previous one.
    pub(crate) fn change(&mut self, state: StateId) -> Option<StateId> {
        if !self.contains(state) {
            return None;
        }
        let previous = self.current();
        self.current = state.index;
        Some(previous)
    }

    pub(crate) fn name(&self, state: StateId) -> &str {
        if self.contains(state) {
            &self.nodes[state.index as usize].name
        } else {
            "<unknown>"
        }
    }

    /// `state` followed by each of its ancestors, nearest first.
    pub(crate) fn lineage(&self, state: StateId) -> impl Iterator<Item = StateId> + '_ {
        let owner = self.owner;
        let start = self.contains(state).then_some(state.index);
        std::iter::successors(start, move |index| self.nodes[*index as usize].parent)
            .map(move |index| StateId { owner, index })
    }

    /// Whether the current state is `state` or one of its substates.
    pub(crate) fn is_in(&self, state: StateId) -> bool {
        self.lineage(self.current()).any(|candidate| candidate == state)
    }

    pub(crate) fn describe(&self, scope: StateScope) -> String {
        match scope {
            StateScope::Any => "<any>".to_string(),
            StateScope::In(state) => self.name(state).to_string(),
        }
    }
}
