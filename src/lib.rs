/*!
 # Winstone Runner

 A Rust library for launching and supervising Winstone servlet container processes.

 ## Overview

 Winstone Runner provides functionality to:
 - Load, default and validate launch configurations (JSON or YAML)
 - Compile a configuration into the exact JVM command line Winstone needs
 - Spawn the server, stream its output and report its lifecycle to observers
 - Open the application in a browser once the server reports ready
 - Let extensions adjust a launch before and after the process is spawned

 ## Basic Usage

 ```no_run
 use winstone_runner::{LifecycleRecorder, Result, WinstoneRunner};
 use std::sync::Arc;

 #[tokio::main]
 async fn main() -> Result<()> {
     let recorder = Arc::new(LifecycleRecorder::new());

     // Create a runner from a config file
     let runner = WinstoneRunner::from_config_file("winstone.yaml")?
         .with_observer(recorder.clone());

     // Launch with the SDK's JDK, without a debugger
     let handle = runner.launch(Some("/usr/lib/jvm/java-8"), None).await?;
     println!("Winstone running with pid {}", handle.pid());

     // Stop it again
     handle.terminate()?;
     let outcome = handle.wait().await?;
     println!("Exited with {:?}", outcome.exit_code);

     Ok(())
 }
 ```

 ## Features

 - **Configuration**: JSON and YAML files with serde defaults
 - **Parameter Compilation**: Deterministic Winstone and JVM arguments, including debug transport
 - **Process Supervision**: Ordered lifecycle events from a single dispatcher
 - **Readiness Trigger**: One-shot browser launch on the listener-started log line
 - **Extensions**: Async hooks around spawning
 - **Error Handling**: Typed errors with stable kinds
*/

pub mod compiler;
pub mod config;
pub mod error;
pub mod extension;
pub mod server;

pub use compiler::{CompiledLaunchPlan, DebugRequest, ParameterCompiler};
pub use config::LaunchConfiguration;
pub use error::{Error, ErrorKind, Result};
pub use extension::{ExtensionChain, LaunchExtension};
pub use server::{
    ExitOutcome, LifecycleRecorder, ProcessHandle, ProcessLifecycleEvent, ProcessObserver,
    ProcessState, ServerSupervisor,
};

use server::{BrowserLauncher, ReadyTrigger, SupervisorOptions, SystemBrowser};
use std::path::Path;
use std::sync::Arc;

/// Configure and launch Winstone servers
///
/// This struct is the main entry point: it owns a launch configuration and
/// the collaborators used for every launch attempt made from it. Each call
/// to [`launch`](Self::launch) gets its own supervisor, so a runner can be
/// used for any number of re-runs.
/// All public methods are instrumented with `tracing` spans.
pub struct WinstoneRunner {
    /// Configuration
    config: LaunchConfiguration,
    compiler: ParameterCompiler,
    extensions: ExtensionChain,
    browser: Arc<dyn BrowserLauncher>,
    /// Observers registered on every launch
    observers: Vec<Arc<dyn ProcessObserver>>,
    options: SupervisorOptions,
}

impl WinstoneRunner {
    /// Create a new runner from a configuration file path
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(path), fields(config_path = ?path.as_ref()))]
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        tracing::info!("Loading configuration from file");
        let config = LaunchConfiguration::from_file(path)?;
        Ok(Self::new(config))
    }

    /// Create a new runner from a JSON configuration string
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(config))]
    pub fn from_config_str(config: &str) -> Result<Self> {
        tracing::info!("Loading configuration from string");
        let config = LaunchConfiguration::parse_from_str(config)?;
        Ok(Self::new(config))
    }

    /// Create a new runner from a configuration
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(config), fields(context = %config.context_name))]
    pub fn new(config: LaunchConfiguration) -> Self {
        tracing::info!("Creating new WinstoneRunner");
        Self {
            config,
            compiler: ParameterCompiler::new(),
            extensions: ExtensionChain::new(),
            browser: Arc::new(SystemBrowser),
            observers: Vec::new(),
            options: SupervisorOptions::default(),
        }
    }

    /// Appends an extension; extensions run in the order they were added.
    pub fn with_extension(mut self, extension: Arc<dyn LaunchExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Registers an observer on every launch.
    pub fn with_observer(mut self, observer: Arc<dyn ProcessObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Replaces the browser launcher used by the readiness trigger.
    pub fn with_browser_launcher(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_compiler(mut self, compiler: ParameterCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn with_options(mut self, options: SupervisorOptions) -> Self {
        self.options = options;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &LaunchConfiguration {
        &self.config
    }

    /// Validates and compiles the configuration, then applies before-spawn hooks.
    ///
    /// `sdk_home` is the JDK of the project's SDK; an enabled alternative
    /// JRE in the configuration takes precedence over it.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self, debug_request), fields(debug = debug_request.is_some()))]
    pub async fn prepare(
        &self,
        sdk_home: Option<&str>,
        debug_request: Option<&DebugRequest>,
    ) -> Result<CompiledLaunchPlan> {
        config::validate_config(&self.config).map_err(|e| {
            tracing::error!(error = %e, "Invalid launch configuration");
            e
        })?;

        let jdk_home = compiler::resolve_jdk_home(&self.config, sdk_home);
        tracing::debug!(jdk_home = %jdk_home, "Resolved JDK home");

        let plan = self.compiler.compile(&self.config, &jdk_home, debug_request)?;
        self.extensions.before_spawn(&self.config, plan).await
    }

    /// Prepares and spawns a new server process.
    ///
    /// After-spawn hooks run before event dispatch starts, so observers they
    /// attach see the whole lifecycle. A failing after-spawn hook is logged
    /// and does not fail the launch; the process is already running.
    ///
    /// This method is instrumented with `tracing`.
    #[tracing::instrument(skip(self, debug_request), fields(debug = debug_request.is_some()))]
    pub async fn launch(
        &self,
        sdk_home: Option<&str>,
        debug_request: Option<&DebugRequest>,
    ) -> Result<ProcessHandle> {
        let plan = self.prepare(sdk_home, debug_request).await?;

        tracing::info!("Attempting to launch server");
        let mut supervisor = self.supervisor()?;
        let handle = supervisor.spawn(&plan).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to launch server process");
            e
        })?;

        if let Err(e) = self.extensions.after_spawn(&self.config, &handle).await {
            tracing::warn!(error = %e, "After-spawn hooks did not complete");
        }

        handle.start_notify();
        tracing::info!(launch_id = %handle.id(), pid = handle.pid(), "Server launched successfully");
        Ok(handle)
    }

    fn supervisor(&self) -> Result<ServerSupervisor> {
        let name = if self.config.context_name.is_empty() {
            "winstone".to_string()
        } else {
            format!("winstone:{}", self.config.context_name)
        };

        let mut supervisor = ServerSupervisor::new(name).with_options(self.options.clone());
        if let Some(trigger) = ReadyTrigger::for_config(&self.config, Arc::clone(&self.browser)) {
            tracing::debug!(url = %trigger.url(), "Installing readiness trigger");
            supervisor = supervisor.with_ready_trigger(trigger);
        }

        for observer in &self.observers {
            supervisor.add_observer(Arc::clone(observer))?;
        }

        Ok(supervisor)
    }
}
