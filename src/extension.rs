//! Launch extensions.
//!
//! Extensions adjust a launch without the compiler or supervisor knowing
//! about them: a coverage agent appending a `-javaagent` option, a profiler
//! attaching its own observer, and so on. They are injected explicitly and
//! run in registration order.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use winstone_runner::compiler::CompiledLaunchPlan;
//! use winstone_runner::config::LaunchConfiguration;
//! use winstone_runner::extension::LaunchExtension;
//! use winstone_runner::Result;
//!
//! struct HeadlessExtension;
//!
//! #[async_trait]
//! impl LaunchExtension for HeadlessExtension {
//!     fn name(&self) -> &str {
//!         "headless"
//!     }
//!
//!     async fn before_spawn(
//!         &self,
//!         _config: &LaunchConfiguration,
//!         mut plan: CompiledLaunchPlan,
//!     ) -> Result<CompiledLaunchPlan> {
//!         plan.vm_args.push("-Djava.awt.headless=true".to_string());
//!         Ok(plan)
//!     }
//! }
//! ```
use crate::compiler::CompiledLaunchPlan;
use crate::config::LaunchConfiguration;
use crate::error::Result;
use crate::server::ProcessHandle;
use async_trait::async_trait;
use std::sync::Arc;

/// Hook invoked around spawning a server process.
#[async_trait]
pub trait LaunchExtension: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Adjusts the plan before the process is spawned.
    async fn before_spawn(
        &self,
        _config: &LaunchConfiguration,
        plan: CompiledLaunchPlan,
    ) -> Result<CompiledLaunchPlan> {
        Ok(plan)
    }

    /// Called once the process exists and before event dispatch starts.
    async fn after_spawn(&self, _config: &LaunchConfiguration, _handle: &ProcessHandle) -> Result<()> {
        Ok(())
    }
}

/// Ordered list of launch extensions.
#[derive(Clone, Default)]
pub struct ExtensionChain {
    extensions: Vec<Arc<dyn LaunchExtension>>,
}

impl ExtensionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, extension: Arc<dyn LaunchExtension>) {
        self.extensions.push(extension);
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Threads `plan` through every extension in registration order.
    ///
    /// Stops at the first failing extension; nothing has been spawned at
    /// that point.
    #[tracing::instrument(skip_all, fields(extensions = self.extensions.len()))]
    pub async fn before_spawn(
        &self,
        config: &LaunchConfiguration,
        mut plan: CompiledLaunchPlan,
    ) -> Result<CompiledLaunchPlan> {
        for extension in &self.extensions {
            tracing::debug!(extension = extension.name(), "Running before-spawn hook");
            plan = extension.before_spawn(config, plan).await.map_err(|e| {
                tracing::error!(extension = extension.name(), error = %e, "Before-spawn hook failed");
                e
            })?;
        }
        Ok(plan)
    }

    /// Lets every extension attach to the spawned process, in registration order.
    #[tracing::instrument(skip_all, fields(extensions = self.extensions.len(), pid = handle.pid()))]
    pub async fn after_spawn(&self, config: &LaunchConfiguration, handle: &ProcessHandle) -> Result<()> {
        for extension in &self.extensions {
            tracing::debug!(extension = extension.name(), "Running after-spawn hook");
            extension.after_spawn(config, handle).await.map_err(|e| {
                tracing::error!(extension = extension.name(), error = %e, "After-spawn hook failed");
                e
            })?;
        }
        Ok(())
    }
}
