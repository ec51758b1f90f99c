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

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::common::Result;
use crate::dispatcher::ShutdownMode;
use crate::message::{DispatchError, ExecutionDemand};
use crate::traits::EventQueue;

#[derive(Debug, Default)]
struct QueueState {
    demands: VecDeque<ExecutionDemand>,
    shut_down: bool,
}

/// Crate-internal: FIFO queue served by one dedicated thread.
///
/// Used by the one-thread, active-object and active-group dispatchers.
#[derive(Debug)]
pub(crate) struct DemandQueue {
    label: String,
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl DemandQueue {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
        }
    }

    /// Waits for the next demand. Returns `None` once the queue is shut down
    /// and empty.
    pub(crate) fn pop_blocking(&self) -> Option<ExecutionDemand> {
        let mut state = self.state.lock();
        loop {
            if let Some(demand) = state.demands.pop_front() {
                return Some(demand);
            }
            if state.shut_down {
                return None;
            }
            self.ready.wait(&mut state);
        }
    }

    /// Executes demands until the queue is shut down and drained.
    pub(crate) fn serve(&self) {
        while let Some(demand) = self.pop_blocking() {
            demand.execute();
        }
        trace!(queue = %self.label, "queue drained; worker exiting");
    }

    /// Rejects further pushes and wakes every waiter.
    pub(crate) fn shutdown(&self, mode: ShutdownMode) {
        let abandoned = {
            let mut state = self.state.lock();
            state.shut_down = true;
            match mode {
                ShutdownMode::Drain => VecDeque::new(),
                ShutdownMode::Abandon => std::mem::take(&mut state.demands),
            }
        };
        self.ready.notify_all();
        if !abandoned.is_empty() {
            debug!(queue = %self.label, count = abandoned.len(), "pending demands abandoned");
        }
    }

    #[cfg(test)]
    pub(crate) fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }
}

impl EventQueue for DemandQueue {
    fn push(&self, demand: ExecutionDemand) -> Result<()> {
        let mut state = self.state.lock();
        if state.shut_down {
            drop(state);
            return Err(DispatchError::QueueShutDown {
                queue: self.label.clone(),
                agent: demand.agent_id().to_string(),
            });
        }
        state.demands.push_back(demand);
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    fn len(&self) -> usize {
        self.state.lock().demands.len()
    }

    fn label(&self) -> &str {
        &self.label
    }
}
