/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     you may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::sync::Arc;

use acton_dispatch::prelude::*;
use parking_lot::Mutex;

use crate::setup::messages::{Boom, GetTotal, Job};
use crate::setup::models::{Accumulator, Recorder};
use crate::setup::{environment, wait_until, Journal, PATIENCE};

mod setup;

/// Keeps every reported failure for inspection.
#[derive(Debug, Default, Clone)]
struct Collector(Arc<Mutex<Vec<HandlerFailure>>>);

impl Collector {
    fn failures(&self) -> Vec<HandlerFailure> {
        self.0.lock().clone()
    }
}

impl FailureObserver for Collector {
    fn on_handler_failure(&self, failure: &HandlerFailure) {
        self.0.lock().push(failure.clone());
    }
}

#[test]
fn returned_error_is_reported_and_the_agent_carries_on() -> anyhow::Result<()> {
    let env = environment();
    let collector = Collector::default();
    env.set_failure_observer(collector.clone());
    let journal = Journal::default();

    let mut agent = env.new_agent_with_model(
        AgentConfig::new("picky")?,
        Recorder::new("picky", &journal),
    )?;
    agent.act_on_direct(StateScope::Any, |model: &mut Recorder, _ctx, job: &Job| {
        if job.id % 2 == 1 {
            anyhow::bail!("job {} rejected", job.id);
        }
        model.note(job.id);
        Ok(())
    })?;
    let picky = agent.register()?;

    for id in 0..4 {
        picky.direct_mbox().send(Job { id })?;
    }
    assert!(wait_until(PATIENCE, || journal.len() == 2 && collector.failures().len() == 2));
    assert_eq!(journal.entries(), vec!["picky:0", "picky:2"]);

    let failures = collector.failures();
    assert_eq!(failures[0].reason, "job 1 rejected");
    assert_eq!(failures[1].reason, "job 3 rejected");
    assert!(failures.iter().all(|f| !f.panicked));
    assert!(failures.iter().all(|f| f.agent.to_string() == picky.id().to_string()));
    assert!(failures[0].message_type.is_some_and(|name| name.ends_with("Job")));
    assert_eq!(picky.status(), AgentStatus::Registered);

    env.shutdown();
    Ok(())
}

#[test]
fn panicking_service_handler_fails_the_request() -> anyhow::Result<()> {
    let env = environment();
    let collector = Collector::default();
    env.set_failure_observer(collector.clone());

    let config = AgentConfig::new("fragile")?.with_limit(MessageLimit::drop::<Boom>(1));
    let mut agent = env.new_agent_with_config::<Accumulator>(config)?;
    agent
        .respond_to_direct(
            StateScope::Any,
            |_model: &mut Accumulator, _ctx, _boom: &Boom| -> anyhow::Result<u64> {
                panic!("kaboom");
            },
        )?
        .respond_to_direct(StateScope::Any, |model: &mut Accumulator, _ctx, _get: &GetTotal| {
            Ok(model.total)
        })?;
    let fragile = agent.register()?;

    match fragile.direct_mbox().request_value::<Boom, u64>(Boom) {
        Err(DispatchError::UnhandledHandlerFailure { reason, .. }) => assert_eq!(reason, "kaboom"),
        other => panic!("expected UnhandledHandlerFailure, got {other:?}"),
    }
    let failures = collector.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].panicked);

    // The limit slot is released even though the handler never returned.
    assert_eq!(fragile.limit_stats()[0].in_flight, 0);
    let total: u64 = fragile.direct_mbox().request_value(GetTotal)?;
    assert_eq!(total, 0);

    env.shutdown();
    Ok(())
}

#[test]
fn deregister_reaction_removes_the_failing_agent() -> anyhow::Result<()> {
    let env = environment();
    let collector = Collector::default();
    env.set_failure_observer(collector.clone());
    let journal = Journal::default();

    let config = AgentConfig::new("brittle")?.with_failure_reaction(FailureReaction::Deregister);
    let mut agent = env.new_agent_with_model(config, Recorder::new("brittle", &journal))?;
    agent
        .act_on_direct(StateScope::Any, |_model: &mut Recorder, _ctx, _boom: &Boom| {
            anyhow::bail!("cannot go on")
        })?
        .act_on_direct(StateScope::Any, |model: &mut Recorder, _ctx, job: &Job| {
            model.note(job.id);
            Ok(())
        })?
        .on_finish(|model: &mut Recorder, _ctx| {
            model.note("finished");
            Ok(())
        });
    let brittle = agent.register()?;
    assert_eq!(env.agent_count(), 1);

    brittle.direct_mbox().send(Job { id: 1 })?;
    brittle.direct_mbox().send(Boom)?;
    assert!(wait_until(PATIENCE, || brittle.status() == AgentStatus::Deregistered));
    assert!(wait_until(PATIENCE, || env.agent_count() == 0));
    assert_eq!(journal.entries(), vec!["brittle:1", "brittle:finished"]);
    assert_eq!(collector.failures().len(), 1);

    brittle.direct_mbox().send(Job { id: 2 })?;
    assert_eq!(journal.len(), 2);

    env.shutdown();
    Ok(())
}

#[test]
fn failing_start_hook_is_reported_without_message_type() -> anyhow::Result<()> {
    let env = environment();
    let collector = Collector::default();
    env.set_failure_observer(collector.clone());
    let journal = Journal::default();

    let mut agent = env.new_agent_with_model(
        AgentConfig::new("late")?,
        Recorder::new("late", &journal),
    )?;
    agent
        .on_start(|_model: &mut Recorder, _ctx| anyhow::bail!("not ready"))
        .act_on_direct(StateScope::Any, |model: &mut Recorder, _ctx, job: &Job| {
            model.note(job.id);
            Ok(())
        })?;
    let late = agent.register()?;

    late.direct_mbox().send(Job { id: 9 })?;
    assert!(wait_until(PATIENCE, || journal.len() == 1));
    let failures = collector.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].message_type, None);
    assert_eq!(failures[0].reason, "not ready");

    env.shutdown();
    Ok(())
}
