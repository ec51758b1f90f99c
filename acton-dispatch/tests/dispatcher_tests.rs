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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acton_dispatch::prelude::*;

use crate::setup::messages::{Hold, Job};
use crate::setup::models::{Accumulator, Blocker, Recorder};
use crate::setup::{environment, wait_until, Gate, Journal, PATIENCE};

mod setup;

#[acton_agent]
struct Sequencer {
    journal: Journal,
    inside: Arc<AtomicUsize>,
}

fn blocker(
    env: &Environment,
    name: &str,
    config: AgentConfig,
    gate: &Gate,
    journal: &Journal,
) -> anyhow::Result<AgentHandle> {
    let model = Blocker {
        name: name.to_string(),
        gate: gate.clone(),
        journal: journal.clone(),
    };
    let mut agent = env.new_agent_with_model(config, model)?;
    agent.act_on_direct(StateScope::Any, |model: &mut Blocker, _ctx, _hold: &Hold| {
        model.gate.pass();
        model.journal.record(format!("{}:released", model.name));
        Ok(())
    })?;
    agent.act_on_direct(StateScope::Any, |model: &mut Blocker, _ctx, job: &Job| {
        model.journal.record(format!("{}:{}", model.name, job.id));
        Ok(())
    })?;
    Ok(agent.register()?)
}

#[test]
fn one_thread_dispatcher_is_fifo_across_agents() -> anyhow::Result<()> {
    let env = environment();
    let journal = Journal::default();
    let mut handles = Vec::new();
    for name in ["left", "right"] {
        let mut agent = env.new_agent_with_model(
            AgentConfig::new(name)?,
            Recorder::new(name, &journal),
        )?;
        agent.act_on_direct(StateScope::Any, |model: &mut Recorder, _ctx, job: &Job| {
            model.note(job.id);
            Ok(())
        })?;
        handles.push(agent.register()?);
    }

    let mut expected = Vec::new();
    for id in 0..20 {
        let target = &handles[(id % 2) as usize];
        target.direct_mbox().send(Job { id })?;
        expected.push(format!("{}:{id}", if id % 2 == 0 { "left" } else { "right" }));
    }
    assert!(wait_until(PATIENCE, || journal.len() == 20));
    assert_eq!(journal.entries(), expected);

    env.shutdown();
    Ok(())
}

#[test]
fn thread_pool_keeps_each_agent_ordered_and_exclusive() -> anyhow::Result<()> {
    let env = environment();
    env.add_dispatcher(ThreadPoolDispatcher::new(
        "pool",
        ThreadPoolParams::default().with_thread_count(4).with_max_demands_at_once(3),
    ))?;

    let mut agents = Vec::new();
    for index in 0..3 {
        let journal = Journal::default();
        let model = Sequencer {
            journal: journal.clone(),
            inside: Arc::new(AtomicUsize::new(0)),
        };
        let mut agent = env.new_agent_with_model(
            AgentConfig::new(format!("seq{index}"))?.bind_to("pool"),
            model,
        )?;
        agent.act_on_direct(StateScope::Any, |model: &mut Sequencer, _ctx, job: &Job| {
            if model.inside.fetch_add(1, Ordering::SeqCst) != 0 {
                model.journal.record("overlap");
            }
            for _ in 0..100 {
                std::hint::spin_loop();
            }
            model.journal.record(job.id.to_string());
            model.inside.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })?;
        agents.push((agent.register()?, journal));
    }

    for id in 0..50 {
        for (handle, _) in &agents {
            handle.direct_mbox().send(Job { id })?;
        }
    }

    let expected: Vec<String> = (0..50).map(|id: u32| id.to_string()).collect();
    for (_, journal) in &agents {
        assert!(wait_until(PATIENCE, || journal.len() >= 50));
        assert_eq!(journal.entries(), expected);
    }

    env.shutdown();
    Ok(())
}

#[test]
fn active_objects_run_in_parallel() -> anyhow::Result<()> {
    let env = environment();
    env.add_dispatcher(ActiveObjectDispatcher::new("ao"))?;
    let gate = Gate::new();
    let journal = Journal::default();

    let first = blocker(&env, "first", AgentConfig::new("first")?.bind_to("ao"), &gate, &journal)?;
    let second = blocker(
        &env,
        "second",
        AgentConfig::new("second")?.bind_to("ao"),
        &gate,
        &journal,
    )?;
    first.direct_mbox().send(Hold)?;
    second.direct_mbox().send(Hold)?;

    // Both handlers are blocked at the same time, on their own threads.
    assert!(gate.entered(PATIENCE));
    assert!(gate.entered(PATIENCE));
    gate.open();
    assert!(wait_until(PATIENCE, || journal.len() == 2));

    let stats = env
        .dispatcher_stats()
        .into_iter()
        .find(|stats| stats.name == "ao")
        .expect("ao dispatcher registered");
    assert_eq!(stats.kind, DispatcherKind::ActiveObject);

    env.shutdown();
    Ok(())
}

#[test]
fn active_group_members_share_one_thread() -> anyhow::Result<()> {
    let env = environment();
    env.add_dispatcher(ActiveGroupDispatcher::new("groups"))?;
    let gate = Gate::new();
    let journal = Journal::default();

    let first = blocker(
        &env,
        "first",
        AgentConfig::new("first")?.bind_to("groups").in_group("crew"),
        &gate,
        &journal,
    )?;
    let second = blocker(
        &env,
        "second",
        AgentConfig::new("second")?.bind_to("groups").in_group("crew"),
        &gate,
        &journal,
    )?;
    first.direct_mbox().send(Hold)?;
    second.direct_mbox().send(Hold)?;

    assert!(gate.entered(PATIENCE));
    assert!(!gate.entered(Duration::from_millis(200)));
    gate.open();
    assert!(gate.entered(PATIENCE));
    assert!(wait_until(PATIENCE, || journal.len() == 2));
    assert_eq!(journal.entries(), vec!["first:released", "second:released"]);

    let ungrouped =
        env.new_agent_with_config::<Accumulator>(AgentConfig::new("loner")?.bind_to("groups"));
    assert!(matches!(
        ungrouped.map(ManagedAgent::register),
        Ok(Err(DispatchError::MissingGroup { .. }))
    ));

    env.shutdown();
    Ok(())
}

#[test]
fn active_groups_do_not_block_each_other() -> anyhow::Result<()> {
    let env = environment();
    env.add_dispatcher(ActiveGroupDispatcher::new("groups"))?;
    let gate = Gate::new();
    let journal = Journal::default();

    let stuck = blocker(
        &env,
        "stuck",
        AgentConfig::new("stuck")?.bind_to("groups").in_group("g1"),
        &gate,
        &journal,
    )?;
    let free = blocker(
        &env,
        "free",
        AgentConfig::new("free")?.bind_to("groups").in_group("g2"),
        &gate,
        &journal,
    )?;
    stuck.direct_mbox().send(Hold)?;
    assert!(gate.entered(PATIENCE));

    free.direct_mbox().send(Job { id: 1 })?;
    assert!(wait_until(PATIENCE, || journal.count("free:1") == 1));
    assert_eq!(journal.entries(), vec!["free:1"]);

    gate.open();
    assert!(wait_until(PATIENCE, || journal.len() == 2));

    env.shutdown();
    Ok(())
}

#[test]
fn thread_pool_rejects_messages_after_shutdown() -> anyhow::Result<()> {
    for (name, config) in [
        ("private", AgentConfig::new("private")?.bind_to("pool")),
        ("grouped", AgentConfig::new("grouped")?.bind_to("pool").in_group("team")),
    ] {
        let env = environment();
        env.add_dispatcher(ThreadPoolDispatcher::new(
            "pool",
            ThreadPoolParams::default().with_thread_count(2),
        ))?;
        let gate = Gate::new();
        let journal = Journal::default();
        let held = blocker(&env, name, config, &gate, &journal)?;

        held.direct_mbox().send(Hold)?;
        assert!(gate.entered(PATIENCE));
        let pool = env.dispatcher("pool").expect("pool dispatcher registered");
        pool.shutdown();

        assert!(matches!(
            held.direct_mbox().send(Job { id: 1 }),
            Err(DispatchError::QueueShutDown { .. })
        ));
        gate.open();
        pool.wait();
        assert_eq!(journal.entries(), vec![format!("{name}:released")]);

        env.shutdown();
    }
    Ok(())
}

#[test]
fn priority_pool_serves_higher_priorities_first() -> anyhow::Result<()> {
    let env = environment();
    env.add_dispatcher(ThreadPoolDispatcher::with_priorities(
        "prio",
        ThreadPoolParams::default().with_thread_count(1),
        env.config().priority.quotes,
    ))?;
    let gate = Gate::new();
    let journal = Journal::default();

    let gatekeeper = blocker(
        &env,
        "gatekeeper",
        AgentConfig::new("gatekeeper")?.bind_to("prio"),
        &gate,
        &journal,
    )?;
    let low = blocker(
        &env,
        "low",
        AgentConfig::new("low")?.bind_to("prio").with_priority(Priority::P1),
        &gate,
        &journal,
    )?;
    let high = blocker(
        &env,
        "high",
        AgentConfig::new("high")?.bind_to("prio").with_priority(Priority::P7),
        &gate,
        &journal,
    )?;

    gatekeeper.direct_mbox().send(Hold)?;
    assert!(gate.entered(PATIENCE));
    low.direct_mbox().send(Job { id: 1 })?;
    high.direct_mbox().send(Job { id: 2 })?;
    gate.open();

    assert!(wait_until(PATIENCE, || journal.len() == 3));
    assert_eq!(journal.entries(), vec!["gatekeeper:released", "high:2", "low:1"]);

    env.shutdown();
    Ok(())
}

#[test]
fn dispatcher_lifecycle_calls_are_idempotent() -> anyhow::Result<()> {
    let dispatcher = OneThreadDispatcher::new("solo");
    dispatcher.shutdown();
    assert_eq!(dispatcher.state(), DispatcherState::Created);

    dispatcher.start()?;
    dispatcher.start()?;
    assert_eq!(dispatcher.state(), DispatcherState::Started);

    dispatcher.shutdown();
    dispatcher.shutdown();
    dispatcher.wait();
    assert_eq!(dispatcher.state(), DispatcherState::Stopped);
    dispatcher.wait();
    Ok(())
}

#[test]
fn binding_requires_a_running_known_dispatcher() -> anyhow::Result<()> {
    let env = environment();
    let brief = env.add_dispatcher(OneThreadDispatcher::new("brief"))?;
    brief.shutdown();
    brief.wait();

    let late =
        env.new_agent_with_config::<Accumulator>(AgentConfig::new("late")?.bind_to("brief"))?;
    assert!(matches!(late.register(), Err(DispatchError::DispatcherNotStarted { .. })));

    let lost =
        env.new_agent_with_config::<Accumulator>(AgentConfig::new("lost")?.bind_to("nowhere"))?;
    assert!(matches!(lost.register(), Err(DispatchError::UnknownDispatcher { .. })));

    let duplicate = env.add_dispatcher(OneThreadDispatcher::new("default"));
    assert!(matches!(duplicate, Err(DispatchError::DuplicateDispatcher { .. })));

    env.shutdown();
    Ok(())
}

#[test]
fn dispatcher_stats_report_bound_agents() -> anyhow::Result<()> {
    let env = environment();
    env.add_dispatcher(ThreadPoolDispatcher::new(
        "pool",
        ThreadPoolParams::default().with_thread_count(2),
    ))?;
    for name in ["a", "b"] {
        let mut agent =
            env.new_agent_with_config::<Accumulator>(AgentConfig::new(name)?.bind_to("pool"))?;
        agent.act_on_direct(StateScope::Any, |model: &mut Accumulator, _ctx, job: &Job| {
            model.total += u64::from(job.id);
            Ok(())
        })?;
        agent.register()?;
    }
    assert_eq!(env.agent_count(), 2);

    let stats = env.dispatcher_stats();
    assert_eq!(
        stats.iter().map(|stats| stats.name.as_str()).collect::<Vec<_>>(),
        vec!["default", "pool"]
    );
    let pool = &stats[1];
    assert_eq!(pool.kind, DispatcherKind::ThreadPool);
    assert_eq!(pool.state, DispatcherState::Started);
    assert_eq!(pool.worker_threads, 2);
    assert_eq!(pool.queues.iter().map(|queue| queue.agents).sum::<usize>(), 2);

    env.shutdown();
    assert_eq!(env.agent_count(), 0);
    Ok(())
}
