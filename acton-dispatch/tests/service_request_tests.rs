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

use std::time::Duration;

use acton_dispatch::prelude::*;

use crate::setup::messages::{Add, GetTotal, Hold, Ping};
use crate::setup::models::{Accumulator, Blocker};
use crate::setup::{environment, Gate, Journal, PATIENCE};

mod setup;

fn accumulator(env: &Environment, name: &str) -> anyhow::Result<AgentHandle> {
    let mut agent = env.new_agent_with_config::<Accumulator>(AgentConfig::new(name)?)?;
    agent
        .act_on_direct(StateScope::Any, |model: &mut Accumulator, _ctx, add: &Add| {
            model.total += add.0;
            Ok(())
        })?
        .respond_to_direct(StateScope::Any, |model: &mut Accumulator, _ctx, _get: &GetTotal| {
            Ok(model.total)
        })?;
    Ok(agent.register()?)
}

#[test]
fn request_value_sees_every_earlier_message() -> anyhow::Result<()> {
    let env = environment();
    let counter = accumulator(&env, "counter")?;

    for amount in 1..=10 {
        counter.direct_mbox().send(Add(amount))?;
    }
    let total: u64 = counter.direct_mbox().request_value(GetTotal)?;
    assert_eq!(total, 55);

    let pending = counter.direct_mbox().request::<GetTotal, u64>(GetTotal)?;
    assert_eq!(pending.message_type(), MessageType::of::<GetTotal>());
    assert_eq!(pending.wait()?, 55);

    env.shutdown();
    Ok(())
}

#[tokio::test]
async fn request_can_be_awaited() -> anyhow::Result<()> {
    let env = environment();
    let counter = accumulator(&env, "async-counter")?;

    counter.direct_mbox().send(Add(7))?;
    let total = counter.direct_mbox().request::<GetTotal, u64>(GetTotal)?.recv().await?;
    assert_eq!(total, 7);

    let total = counter
        .direct_mbox()
        .request::<GetTotal, u64>(GetTotal)?
        .recv_timeout(PATIENCE)
        .await?;
    assert_eq!(total, 7);

    env.shutdown();
    Ok(())
}

#[test]
fn broadcast_request_needs_exactly_one_handler() -> anyhow::Result<()> {
    let env = environment();
    let desk = env.create_named_mbox("desk");

    let nobody = desk.request::<GetTotal, u64>(GetTotal);
    assert!(matches!(nobody, Err(DispatchError::NoServiceHandler { .. })));

    let mut clerks = Vec::new();
    for name in ["first-clerk", "second-clerk"] {
        let mut agent = env.new_agent_with_config::<Accumulator>(AgentConfig::new(name)?)?;
        agent.respond_to(&desk, StateScope::Any, |model: &mut Accumulator, _ctx, _get: &GetTotal| {
            Ok(model.total)
        })?;
        clerks.push(agent.register()?);
    }

    match desk.request::<GetTotal, u64>(GetTotal) {
        Err(DispatchError::MultipleServiceHandlers { count, mbox, .. }) => {
            assert_eq!(count, 2);
            assert_eq!(mbox, desk.id());
        }
        other => panic!("expected MultipleServiceHandlers, got {other:?}"),
    }

    clerks[1].deregister()?;
    let total: u64 = desk.request_value(GetTotal)?;
    assert_eq!(total, 0);

    env.shutdown();
    Ok(())
}

#[test]
fn direct_request_without_handler_fails() -> anyhow::Result<()> {
    let env = environment();
    let counter = accumulator(&env, "no-ping")?;

    let result = counter.direct_mbox().request::<Ping, ()>(Ping);
    assert!(matches!(result, Err(DispatchError::NoServiceHandler { .. })));

    env.shutdown();
    Ok(())
}

#[test]
fn reply_of_the_wrong_type_is_reported() -> anyhow::Result<()> {
    let env = environment();
    let counter = accumulator(&env, "typed")?;

    let result = counter.direct_mbox().request_value::<GetTotal, String>(GetTotal);
    match result {
        Err(DispatchError::ReplyTypeMismatch { expected, .. }) => {
            assert_eq!(expected, std::any::type_name::<String>());
        }
        other => panic!("expected ReplyTypeMismatch, got {other:?}"),
    }

    env.shutdown();
    Ok(())
}

#[test]
fn waiting_for_a_busy_agent_times_out() -> anyhow::Result<()> {
    let env = environment();
    let gate = Gate::new();
    let model = Blocker {
        name: "slow".to_string(),
        gate: gate.clone(),
        journal: Journal::default(),
    };
    let mut agent = env.new_agent_with_model(AgentConfig::new("slow")?, model)?;
    agent.respond_to_direct(StateScope::Any, |model: &mut Blocker, _ctx, _hold: &Hold| {
        model.gate.pass();
        Ok("done")
    })?;
    let slow = agent.register()?;

    let request = slow.direct_mbox().request::<Hold, &'static str>(Hold)?;
    assert!(gate.entered(PATIENCE));
    match request.wait_for(Duration::from_millis(50)) {
        Err(DispatchError::ServiceRequestTimeout { timeout, .. }) => {
            assert_eq!(timeout, Duration::from_millis(50));
        }
        other => panic!("expected ServiceRequestTimeout, got {other:?}"),
    }

    gate.open();
    let answer: &'static str = slow.direct_mbox().request_value(Hold)?;
    assert_eq!(answer, "done");

    env.shutdown();
    Ok(())
}

#[test]
fn abandoning_shutdown_cancels_queued_requests() -> anyhow::Result<()> {
    let env = environment();
    let gate = Gate::new();
    let model = Blocker {
        name: "stuck".to_string(),
        gate: gate.clone(),
        journal: Journal::default(),
    };
    let mut agent = env.new_agent_with_model(AgentConfig::new("stuck")?, model)?;
    agent
        .act_on_direct(StateScope::Any, |model: &mut Blocker, _ctx, _hold: &Hold| {
            model.gate.pass();
            Ok(())
        })?
        .respond_to_direct(StateScope::Any, |_model: &mut Blocker, _ctx, _get: &GetTotal| {
            Ok(0_u64)
        })?;
    let stuck = agent.register()?;

    stuck.direct_mbox().send(Hold)?;
    assert!(gate.entered(PATIENCE));
    let queued = stuck.direct_mbox().request::<GetTotal, u64>(GetTotal)?;

    let shutdown = {
        let env = env.clone();
        std::thread::spawn(move || env.shutdown_with(ShutdownMode::Abandon))
    };
    assert!(matches!(queued.wait(), Err(DispatchError::ServiceRequestCanceled { .. })));

    gate.open();
    shutdown.join().expect("shutdown thread panicked");
    assert_eq!(stuck.status(), AgentStatus::Deregistered);
    assert_eq!(env.agent_count(), 0);
    Ok(())
}
