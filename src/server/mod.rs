/// Server process supervision for Winstone Runner.
///
/// This module spawns the Winstone process, drains its output, delivers
/// lifecycle events to observers and opens the browser once the server is
/// ready. All public entry points are instrumented with `tracing` spans.
///
/// # Components
///
/// * `lifecycle` - Process states, lifecycle events and observers
/// * `trigger` - One-shot readiness trigger and browser launching
/// * `process` - Spawning and supervising the server process
///
/// # Examples
///
/// Supervising an arbitrary command and recording its events:
///
/// ```no_run
/// use winstone_runner::server::{LaunchCommand, LifecycleRecorder, ServerSupervisor};
/// use std::sync::Arc;
///
/// # async fn run() -> winstone_runner::Result<()> {
/// let recorder = Arc::new(LifecycleRecorder::new());
/// let mut supervisor = ServerSupervisor::new("echo");
/// supervisor.add_observer(recorder.clone())?;
///
/// let handle = supervisor
///     .spawn_command(LaunchCommand::new("echo").arg("hello"))
///     .await?;
/// let outcome = handle.wait().await?;
///
/// assert!(outcome.success());
/// assert_eq!(recorder.output()?, vec!["hello"]);
/// # Ok(())
/// # }
/// ```
pub mod lifecycle;
mod process;
pub mod trigger;

pub use lifecycle::{
    LifecycleRecorder, OutputStream, ProcessLifecycleEvent, ProcessObserver, ProcessState,
    RecordedEvent,
};
pub use process::{
    ExitOutcome, LaunchCommand, LaunchId, ProcessHandle, ServerSupervisor, SupervisorOptions,
};
pub use trigger::{BrowserLauncher, READINESS_MARKER, ReadyTrigger, SystemBrowser};
