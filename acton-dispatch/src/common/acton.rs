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

use tracing::trace;

use crate::common::config::ActonConfig;
use crate::common::{Environment, Result};

/// The entry point for initializing the Acton dispatch runtime.
///
/// `ActonApp` is a marker type; use [`ActonApp::launch`] to build an
/// [`Environment`] from the XDG configuration file, or
/// [`ActonApp::launch_with_config`] to supply the configuration yourself.
/// Both work from synchronous and asynchronous code alike, since the runtime
/// runs on its own worker threads.
#[derive(Default, Debug, Clone)]
pub struct ActonApp;

impl ActonApp {
    /// Loads `dispatch.toml` from the XDG config directories (falling back
    /// to defaults) and builds an environment.
    ///
    /// ```rust,ignore
    /// use acton_dispatch::prelude::*;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let env = ActonApp::launch()?;
    ///     // Create mailboxes and agents...
    ///     env.shutdown();
    ///     Ok(())
    /// }
    /// ```
    pub fn launch() -> Result<Environment> {
        let config = ActonConfig::load();
        trace!("Configuration loaded: {:?}", config);
        Self::launch_with_config(config)
    }

    /// Builds an environment from an explicit configuration.
    pub fn launch_with_config(config: ActonConfig) -> Result<Environment> {
        trace!("Starting Acton dispatch initialization");
        let env = Environment::new(config)?;
        trace!("Acton dispatch initialization complete");
        Ok(env)
    }
}
