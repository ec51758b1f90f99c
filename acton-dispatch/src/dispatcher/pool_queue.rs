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
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::agent::Priority;
use crate::common::config::PRIORITY_COUNT;
use crate::common::Result;
use crate::dispatcher::ShutdownMode;
use crate::message::{DispatchError, ExecutionDemand};
use crate::traits::EventQueue;

#[derive(Debug, Default)]
struct AgentQueueState {
    demands: VecDeque<ExecutionDemand>,
    /// Sitting in the dispatch queue or held by a worker.
    scheduled: bool,
    closed: bool,
}

/// Crate-internal: the private queue of one agent (or one group) in a pool.
///
/// At most one worker holds an agent queue at a time, which is what keeps an
/// agent's handlers from overlapping while the pool runs many threads.
#[derive(Debug)]
pub(crate) struct AgentQueue {
    label: String,
    priority: Priority,
    me: Weak<AgentQueue>,
    dispatch: Arc<DispatchQueue>,
    state: Mutex<AgentQueueState>,
}

impl AgentQueue {
    pub(crate) fn new(
        label: impl Into<String>,
        priority: Priority,
        dispatch: Arc<DispatchQueue>,
    ) -> Arc<Self> {
        let label = label.into();
        Arc::new_cyclic(|me| Self {
            label,
            priority,
            me: me.clone(),
            dispatch,
            state: Mutex::new(AgentQueueState::default()),
        })
    }

    pub(crate) const fn priority(&self) -> Priority {
        self.priority
    }

    /// Runs up to `max_demands` demands. Returns `true` if demands remain
    /// and the queue must be scheduled again.
    pub(crate) fn run_batch(&self, max_demands: usize) -> bool {
        for _ in 0..max_demands {
            if self.dispatch.is_abandoned() {
                self.abandon();
                return false;
            }
            let demand = self.state.lock().demands.pop_front();
            match demand {
                Some(demand) => demand.execute(),
                None => break,
            }
        }
        let mut state = self.state.lock();
        if state.demands.is_empty() {
            state.scheduled = false;
            false
        } else {
            true
        }
    }

    /// Rejects further pushes; queued demands still run.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
    }

    fn take_pending(&self) -> VecDeque<ExecutionDemand> {
        let mut state = self.state.lock();
        state.scheduled = false;
        std::mem::take(&mut state.demands)
    }

    /// Discards every queued demand.
    pub(crate) fn abandon(&self) {
        let abandoned = self.take_pending();
        if !abandoned.is_empty() {
            debug!(queue = %self.label, count = abandoned.len(), "pending demands abandoned");
        }
    }
}

impl EventQueue for AgentQueue {
    fn push(&self, demand: ExecutionDemand) -> Result<()> {
        let must_schedule = {
            let mut state = self.state.lock();
            if state.closed {
                drop(state);
                return Err(DispatchError::QueueShutDown {
                    queue: self.label.clone(),
                    agent: demand.agent_id().to_string(),
                });
            }
            let must_schedule = !state.scheduled;
            state.scheduled = true;
            state.demands.push_back(demand);
            must_schedule
        };
        if must_schedule {
            if let Some(me) = self.me.upgrade() {
                if !self.dispatch.schedule(me) {
                    let abandoned = self.take_pending();
                    let agent = abandoned
                        .back()
                        .map(|demand| demand.agent_id().to_string())
                        .unwrap_or_default();
                    return Err(DispatchError::QueueShutDown {
                        queue: self.label.clone(),
                        agent,
                    });
                }
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.state.lock().demands.len()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug)]
struct Band {
    ready: VecDeque<Arc<AgentQueue>>,
    quote: usize,
}

#[derive(Debug)]
struct DispatchState {
    bands: Vec<Band>,
    /// Band currently being served.
    current: usize,
    /// Queue turns given to `current` since it became current.
    served: usize,
    ready_total: usize,
    shutdown: Option<ShutdownMode>,
    live_workers: usize,
}

/// Crate-internal: the structure pool workers take ready agent queues from.
///
/// A round-robin pool has a single band with an unbounded quote, which makes
/// it a plain FIFO of ready queues. A priority pool has one band per
/// priority: the current band is served for at most its quote of turns, then
/// the next lower non-empty band gets a turn, wrapping from `P0` back to `P7`.
/// A ready queue therefore waits at most the sum of the quotes.
#[derive(Debug)]
pub(crate) struct DispatchQueue {
    state: Mutex<DispatchState>,
    ready: Condvar,
}

impl DispatchQueue {
    fn with_bands(bands: Vec<Band>) -> Self {
        let current = bands.len() - 1;
        Self {
            state: Mutex::new(DispatchState {
                bands,
                current,
                served: 0,
                ready_total: 0,
                shutdown: None,
                live_workers: 0,
            }),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn round_robin() -> Self {
        Self::with_bands(vec![Band {
            ready: VecDeque::new(),
            quote: usize::MAX,
        }])
    }

    pub(crate) fn quoted(quotes: [usize; PRIORITY_COUNT]) -> Self {
        Self::with_bands(
            quotes
                .into_iter()
                .map(|quote| Band {
                    ready: VecDeque::new(),
                    quote: quote.max(1),
                })
                .collect(),
        )
    }

    /// Records a worker that will call [`pop_blocking`](Self::pop_blocking)
    /// until it returns `None`.
    pub(crate) fn register_worker(&self) {
        self.state.lock().live_workers += 1;
    }

    /// Undoes [`register_worker`](Self::register_worker) for a worker that
    /// never started.
    pub(crate) fn unregister_worker(&self) {
        let mut state = self.state.lock();
        state.live_workers = state.live_workers.saturating_sub(1);
    }

    /// Makes `queue` ready. Returns `false` if no worker will ever take it.
    pub(crate) fn schedule(&self, queue: Arc<AgentQueue>) -> bool {
        let mut state = self.state.lock();
        match state.shutdown {
            Some(ShutdownMode::Abandon) => return false,
            Some(ShutdownMode::Drain) if state.live_workers == 0 => return false,
            _ => {}
        }
        let band = if state.bands.len() == 1 {
            0
        } else {
            queue.priority().index()
        };
        state.bands[band].ready.push_back(queue);
        state.ready_total += 1;
        drop(state);
        self.ready.notify_one();
        true
    }

    /// Waits for the next ready queue. Returns `None` when the worker should
    /// exit, and deregisters it in the same step.
    pub(crate) fn pop_blocking(&self) -> Option<Arc<AgentQueue>> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown == Some(ShutdownMode::Abandon)
                || (state.ready_total == 0 && state.shutdown.is_some())
            {
                state.live_workers = state.live_workers.saturating_sub(1);
                return None;
            }
            if state.ready_total > 0 {
                break;
            }
            self.ready.wait(&mut state);
        }
        loop {
            let current = state.current;
            let quote = state.bands[current].quote;
            if state.served < quote {
                if let Some(queue) = state.bands[current].ready.pop_front() {
                    state.served += 1;
                    state.ready_total -= 1;
                    if state.served >= quote {
                        Self::advance(&mut state);
                    }
                    trace!(queue = %queue.label, band = current, "agent queue taken");
                    return Some(queue);
                }
            }
            Self::advance(&mut state);
        }
    }

    fn advance(state: &mut DispatchState) {
        state.current = if state.current == 0 {
            state.bands.len() - 1
        } else {
            state.current - 1
        };
        state.served = 0;
    }

    pub(crate) fn shutdown(&self, mode: ShutdownMode) {
        let abandoned: Vec<_> = {
            let mut state = self.state.lock();
            state.shutdown = Some(mode);
            if mode == ShutdownMode::Abandon {
                state.ready_total = 0;
                state
                    .bands
                    .iter_mut()
                    .flat_map(|band| band.ready.drain(..))
                    .collect()
            } else {
                Vec::new()
            }
        };
        self.ready.notify_all();
        for queue in abandoned {
            queue.abandon();
        }
    }

    pub(crate) fn is_abandoned(&self) -> bool {
        self.state.lock().shutdown == Some(ShutdownMode::Abandon)
    }

    #[cfg(test)]
    pub(crate) fn ready_queues(&self) -> usize {
        self.state.lock().ready_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentCore;
    use crate::message::DemandKind;

    fn demand(key: u64) -> ExecutionDemand {
        ExecutionDemand::new(AgentCore::detached(key), DemandKind::Start)
    }

    fn ready_queue(
        label: &str,
        priority: Priority,
        dispatch: &Arc<DispatchQueue>,
    ) -> Arc<AgentQueue> {
        let queue = AgentQueue::new(label, priority, Arc::clone(dispatch));
        queue.push(demand(1)).expect("push");
        queue
    }

    #[test]
    fn pushing_schedules_a_queue_once() {
        let dispatch = Arc::new(DispatchQueue::round_robin());
        let queue = AgentQueue::new("solo", Priority::P0, Arc::clone(&dispatch));
        queue.push(demand(1)).expect("push");
        queue.push(demand(1)).expect("push");
        assert_eq!(dispatch.ready_queues(), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn batch_reports_leftover_work() {
        let dispatch = Arc::new(DispatchQueue::round_robin());
        let queue = AgentQueue::new("batch", Priority::P0, Arc::clone(&dispatch));
        for _ in 0..3 {
            queue.push(demand(1)).expect("push");
        }
        assert!(queue.run_batch(2));
        assert!(!queue.run_batch(2));
        assert!(queue.is_empty());
    }

    #[test]
    fn higher_band_served_first_but_lower_band_gets_a_turn() {
        let dispatch = Arc::new(DispatchQueue::quoted([1; PRIORITY_COUNT]));
        let _first_high = ready_queue("high-a", Priority::P7, &dispatch);
        let _low = ready_queue("low", Priority::P0, &dispatch);
        let _second_high = ready_queue("high-b", Priority::P7, &dispatch);

        dispatch.register_worker();
        let order: Vec<_> = (0..3)
            .map(|_| dispatch.pop_blocking().expect("queue").label.clone())
            .collect();
        assert_eq!(order, vec!["high-a", "low", "high-b"]);
    }

    #[test]
    fn quote_bounds_consecutive_turns() {
        let mut quotes = [1; PRIORITY_COUNT];
        quotes[Priority::P7.index()] = 2;
        let dispatch = Arc::new(DispatchQueue::quoted(quotes));
        let _queues: Vec<_> = ["h1", "h2", "h3"]
            .into_iter()
            .map(|label| ready_queue(label, Priority::P7, &dispatch))
            .chain(std::iter::once(ready_queue("l1", Priority::P3, &dispatch)))
            .collect();

        dispatch.register_worker();
        let order: Vec<_> = (0..4)
            .map(|_| dispatch.pop_blocking().expect("queue").label.clone())
            .collect();
        assert_eq!(order, vec!["h1", "h2", "l1", "h3"]);
    }

    #[test]
    fn drained_shutdown_lets_workers_finish_ready_queues() {
        let dispatch = Arc::new(DispatchQueue::round_robin());
        let _queue = ready_queue("pending", Priority::P0, &dispatch);
        dispatch.register_worker();
        dispatch.shutdown(ShutdownMode::Drain);
        assert!(dispatch.pop_blocking().is_some());
        assert!(dispatch.pop_blocking().is_none());
    }

    #[test]
    fn abandoned_shutdown_clears_ready_queues() {
        let dispatch = Arc::new(DispatchQueue::round_robin());
        let queue = ready_queue("pending", Priority::P0, &dispatch);
        dispatch.register_worker();
        dispatch.shutdown(ShutdownMode::Abandon);
        assert!(dispatch.pop_blocking().is_none());
        assert!(queue.is_empty());
        assert!(queue.push(demand(1)).is_err());
    }
}
