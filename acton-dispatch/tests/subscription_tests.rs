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

use acton_dispatch::prelude::*;

use crate::setup::messages::{Add, Job, Ping, Switch};
use crate::setup::models::{Accumulator, Recorder};
use crate::setup::{environment, environment_with, wait_until, Journal, PATIENCE};

mod setup;

#[test]
fn broadcast_reaches_every_subscriber() -> anyhow::Result<()> {
    let env = environment();
    let journal = Journal::default();
    let jobs = env.create_mbox();

    for name in ["alpha", "beta"] {
        let mut agent = env.new_agent_with_model(
            AgentConfig::new(name)?,
            Recorder::new(name, &journal),
        )?;
        agent.act_on(&jobs, StateScope::Any, |model: &mut Recorder, _ctx, job: &Job| {
            model.note(job.id);
            Ok(())
        })?;
        agent.register()?;
    }
    assert_eq!(jobs.subscriber_count(), 2);

    jobs.send(Job { id: 7 })?;
    assert!(wait_until(PATIENCE, || journal.len() == 2));
    assert_eq!(journal.count("alpha:7"), 1);
    assert_eq!(journal.count("beta:7"), 1);

    env.shutdown();
    Ok(())
}

#[test]
fn sending_without_subscribers_is_not_an_error() -> anyhow::Result<()> {
    let env = environment();
    let lonely = env.create_mbox();
    lonely.send(Ping)?;
    assert_eq!(lonely.subscriber_count(), 0);
    env.shutdown();
    Ok(())
}

#[test]
fn named_mailboxes_are_shared() -> anyhow::Result<()> {
    let env = environment();
    let first = env.create_named_mbox("orders");
    let second = env.create_named_mbox("orders");
    let other = env.create_named_mbox("refunds");

    assert_eq!(first, second);
    assert_ne!(first, other);
    assert_eq!(first.name(), Some("orders"));
    assert_eq!(first.kind(), MailboxKind::Broadcast);
    env.shutdown();
    Ok(())
}

#[test]
fn duplicate_subscription_is_rejected() -> anyhow::Result<()> {
    let env = environment();
    let adds = env.create_mbox();
    let mut agent = env.new_agent::<Accumulator>()?;
    let busy = agent.define_state("busy")?;

    agent.act_on(&adds, StateScope::Any, |model: &mut Accumulator, _ctx, add: &Add| {
        model.total += add.0;
        Ok(())
    })?;
    // Same type and mailbox in another state is a separate subscription.
    agent.act_on(&adds, busy, |_model: &mut Accumulator, _ctx, _add: &Add| Ok(()))?;

    let duplicate = agent.act_on(
        &adds,
        StateScope::Any,
        |_model: &mut Accumulator, _ctx, _add: &Add| Ok(()),
    );
    assert!(matches!(
        duplicate,
        Err(DispatchError::DuplicateSubscription { message_type, .. })
            if message_type.ends_with("Add")
    ));

    env.shutdown();
    Ok(())
}

#[test]
fn only_the_owner_subscribes_to_a_direct_mailbox() -> anyhow::Result<()> {
    let env = environment();
    let owner = env.new_agent::<Accumulator>()?;
    let mut intruder = env.new_agent::<Accumulator>()?;

    let foreign = owner.direct_mbox().clone();
    assert_eq!(foreign.kind(), MailboxKind::Direct);
    let result = intruder.act_on(
        &foreign,
        StateScope::Any,
        |_model: &mut Accumulator, _ctx, _add: &Add| Ok(()),
    );
    assert!(matches!(result, Err(DispatchError::IllegalSubscriber { .. })));

    let filtered = intruder.set_delivery_filter(&foreign, |_add: &Add| true);
    assert!(matches!(filtered, Err(DispatchError::DeliveryFilterNotAllowed { .. })));

    env.shutdown();
    Ok(())
}

#[test]
fn unsubscribed_handlers_stop_receiving() -> anyhow::Result<()> {
    let env = environment();
    let journal = Journal::default();
    let adds = env.create_mbox();

    let mut agent = env.new_agent_with_model(
        AgentConfig::new("fickle")?,
        Recorder::new("fickle", &journal),
    )?;
    agent.act_on(&adds, StateScope::Any, |model: &mut Recorder, _ctx, add: &Add| {
        model.note(add.0);
        Ok(())
    })?;
    let source = adds.clone();
    agent.act_on_direct(StateScope::Any, move |model: &mut Recorder, ctx, switch: &Switch| {
        if matches!(switch, Switch::Off) {
            ctx.unsubscribe::<Add>(&source, StateScope::Any)?;
            model.note("off");
        }
        Ok(())
    })?;
    let handle = agent.register()?;

    adds.send(Add(1))?;
    handle.direct_mbox().send(Switch::Off)?;
    assert!(wait_until(PATIENCE, || journal.count("fickle:off") == 1));
    assert_eq!(adds.subscriber_count(), 0);

    adds.send(Add(2))?;
    handle.direct_mbox().send(Ping)?;
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert_eq!(journal.entries(), vec!["fickle:1".to_string(), "fickle:off".to_string()]);

    env.shutdown();
    Ok(())
}

#[test]
fn unsubscribing_a_missing_handler_follows_the_policy() -> anyhow::Result<()> {
    for (policy, expected) in [
        (UnsubscribePolicy::Strict, "not-found"),
        (UnsubscribePolicy::Silent, "ok"),
    ] {
        let mut config = ActonConfig::default();
        config.behavior.unsubscribe_policy = policy;
        let env = environment_with(config);
        let journal = Journal::default();
        let adds = env.create_mbox();

        let mut agent = env.new_agent_with_model(
            AgentConfig::new("quitter")?,
            Recorder::new("quitter", &journal),
        )?;
        agent.act_on_direct(StateScope::Any, move |model: &mut Recorder, ctx, _ping: &Ping| {
            match ctx.unsubscribe::<Add>(&adds, StateScope::Any) {
                Ok(()) => model.note("ok"),
                Err(DispatchError::SubscriptionNotFound { .. }) => model.note("not-found"),
                Err(other) => model.note(other),
            }
            Ok(())
        })?;
        let handle = agent.register()?;

        handle.direct_mbox().send(Ping)?;
        assert!(wait_until(PATIENCE, || journal.len() == 1));
        assert_eq!(journal.entries(), vec![format!("quitter:{expected}")]);
        env.shutdown();
    }
    Ok(())
}

#[test]
fn delivery_filters_screen_broadcasts_per_agent() -> anyhow::Result<()> {
    let env = environment();
    let journal = Journal::default();
    let jobs = env.create_mbox();

    let mut even = env.new_agent_with_model(
        AgentConfig::new("even")?,
        Recorder::new("even", &journal),
    )?;
    even.act_on(&jobs, StateScope::Any, |model: &mut Recorder, _ctx, job: &Job| {
        model.note(job.id);
        Ok(())
    })?;
    even.set_delivery_filter(&jobs, |job: &Job| job.id % 2 == 0)?;
    even.register()?;

    let mut all = env.new_agent_with_model(
        AgentConfig::new("all")?,
        Recorder::new("all", &journal),
    )?;
    all.act_on(&jobs, StateScope::Any, |model: &mut Recorder, _ctx, job: &Job| {
        model.note(job.id);
        Ok(())
    })?;
    all.register()?;

    for id in 1..=4 {
        jobs.send(Job { id })?;
    }
    assert!(wait_until(PATIENCE, || journal.len() == 6));
    std::thread::sleep(std::time::Duration::from_millis(20));

    let entries = journal.entries();
    let even_seen: Vec<_> = entries.iter().filter(|e| e.starts_with("even:")).cloned().collect();
    assert_eq!(even_seen, vec!["even:2".to_string(), "even:4".to_string()]);
    assert_eq!(entries.iter().filter(|e| e.starts_with("all:")).count(), 4);

    env.shutdown();
    Ok(())
}

#[test]
fn dropping_a_delivery_filter_restores_delivery() -> anyhow::Result<()> {
    let env = environment();
    let journal = Journal::default();
    let jobs = env.create_mbox();

    let mut picky = env.new_agent_with_model(
        AgentConfig::new("picky")?,
        Recorder::new("picky", &journal),
    )?;
    picky.act_on(&jobs, StateScope::Any, |model: &mut Recorder, _ctx, job: &Job| {
        model.note(job.id);
        Ok(())
    })?;
    picky.set_delivery_filter(&jobs, |_job: &Job| false)?;
    let source = jobs.clone();
    picky.act_on_direct(StateScope::Any, move |model: &mut Recorder, ctx, _ping: &Ping| {
        ctx.drop_delivery_filter::<Job>(&source);
        model.note("relaxed");
        Ok(())
    })?;
    let handle = picky.register()?;

    jobs.send(Job { id: 1 })?;
    handle.direct_mbox().send(Ping)?;
    assert!(wait_until(PATIENCE, || journal.count("picky:relaxed") == 1));
    jobs.send(Job { id: 2 })?;
    assert!(wait_until(PATIENCE, || journal.len() == 2));
    assert_eq!(journal.entries(), vec!["picky:relaxed".to_string(), "picky:2".to_string()]);

    env.shutdown();
    Ok(())
}
