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
#![allow(dead_code)]

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use acton_dispatch::prelude::*;
use parking_lot::Mutex;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub mod messages;
pub mod models;

// Ensures tracing initialization happens only once across all tests.
static INIT: Once = Once::new();

/// Initializes the global tracing subscriber for tests, writing to
/// `logs/dispatch_tests.txt`.
pub fn initialize_tracing() {
    INIT.call_once(|| {
        std::fs::create_dir_all("logs").expect("could not create logs dir");

        let file_appender = RollingFileAppender::new(Rotation::NEVER, "logs", "dispatch_tests.txt");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leak the guard so the non-blocking writer outlives every test
        Box::leak(Box::new(guard));

        let filter = EnvFilter::new("info")
            .add_directive("acton_dispatch=trace".parse().unwrap())
            .add_directive(tracing_subscriber::filter::LevelFilter::TRACE.into());

        let subscriber = FmtSubscriber::builder()
            .with_span_events(FmtSpan::NONE)
            .with_max_level(Level::TRACE)
            .compact()
            .with_line_number(true)
            .without_time()
            .with_target(true)
            .with_thread_names(true)
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("setting default subscriber failed");
    });
}

/// An environment built from default configuration, ignoring any
/// `dispatch.toml` on the machine running the tests.
pub fn environment() -> Environment {
    initialize_tracing();
    ActonApp::launch_with_config(ActonConfig::default()).expect("environment should launch")
}

/// An environment built from `config`.
pub fn environment_with(config: ActonConfig) -> Environment {
    initialize_tracing();
    ActonApp::launch_with_config(config).expect("environment should launch")
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// A shared, ordered record of what handlers did.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| e.as_str() == entry).count()
    }
}

/// Lets a test hold handlers inside their bodies until it says go.
///
/// A handler calls [`Gate::pass`], which reports that it entered and then
/// blocks until [`Gate::open`] is called.
#[derive(Clone, Debug)]
pub struct Gate {
    entered_tx: Sender<()>,
    entered_rx: Arc<Mutex<Receiver<()>>>,
    opened: Arc<(std::sync::Mutex<bool>, std::sync::Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        let (entered_tx, entered_rx) = mpsc::channel();
        Self {
            entered_tx,
            entered_rx: Arc::new(Mutex::new(entered_rx)),
            opened: Arc::new((std::sync::Mutex::new(false), std::sync::Condvar::new())),
        }
    }

    pub fn pass(&self) {
        let _ = self.entered_tx.send(());
        let (lock, cvar) = &*self.opened;
        let mut opened = lock.lock().unwrap();
        while !*opened {
            opened = cvar.wait(opened).unwrap();
        }
    }

    /// Waits for one handler to reach the gate.
    pub fn entered(&self, timeout: Duration) -> bool {
        self.entered_rx.lock().recv_timeout(timeout).is_ok()
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.opened;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }
}

pub const PATIENCE: Duration = Duration::from_secs(5);
