// src/server/process.rs
use crate::compiler::CompiledLaunchPlan;
use crate::error::{Error, Result};
use crate::server::lifecycle::{OutputStream, ProcessLifecycleEvent, ProcessObserver, ProcessState};
use crate::server::trigger::ReadyTrigger;
use async_process::{Child, Command, Stdio};
use futures_lite::io::{AsyncBufReadExt, AsyncRead, BufReader};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

type ObserverList = Arc<RwLock<Vec<Arc<dyn ProcessObserver>>>>;
type SharedState = Arc<Mutex<ProcessState>>;

/// Unique identifier for one launch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchId(Uuid);

impl LaunchId {
    // Private constructor, only usable within our crate
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for LaunchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Program, arguments and environment of a process to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Working directory; inherited from the caller when `None`
    pub working_directory: Option<PathBuf>,
    /// Variables set on top of the inherited environment
    pub environment: BTreeMap<String, String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_directory: None,
            environment: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }
}

impl From<&CompiledLaunchPlan> for LaunchCommand {
    fn from(plan: &CompiledLaunchPlan) -> Self {
        Self {
            program: plan.executable.clone(),
            args: plan.command_args(),
            working_directory: Some(plan.working_directory.clone()),
            environment: plan.environment.clone(),
        }
    }
}

/// Supervisor tuning
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Capacity of the queue between the output readers and observer dispatch
    pub event_capacity: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            event_capacity: 256,
        }
    }
}

/// How a supervised process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
    /// Output read failure observed before the exit, if any
    pub error: Option<String>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && self.error.is_none()
    }
}

/// Starts one server process and supervises it.
///
/// A supervisor is good for exactly one launch attempt; re-runs create a
/// new supervisor. Observers registered before [`spawn`](Self::spawn) and
/// on the returned [`ProcessHandle`] receive every lifecycle event.
pub struct ServerSupervisor {
    /// Launch ID
    id: LaunchId,
    /// Server name, used in logs
    name: String,
    options: SupervisorOptions,
    state: SharedState,
    observers: ObserverList,
    trigger: Option<Arc<ReadyTrigger>>,
    handle: Option<ProcessHandle>,
}

impl ServerSupervisor {
    /// Create a new supervisor in the `Idle` state
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LaunchId::new(),
            name: name.into(),
            options: SupervisorOptions::default(),
            state: Arc::new(Mutex::new(ProcessState::Idle)),
            observers: Arc::new(RwLock::new(Vec::new())),
            trigger: None,
            handle: None,
        }
    }

    pub fn with_options(mut self, options: SupervisorOptions) -> Self {
        self.options = options;
        self
    }

    /// Installs the one-shot readiness trigger.
    pub fn with_ready_trigger(mut self, trigger: ReadyTrigger) -> Self {
        self.trigger = Some(Arc::new(trigger));
        self
    }

    /// Registers an observer for every event of the launch.
    pub fn add_observer(&self, observer: Arc<dyn ProcessObserver>) -> Result<()> {
        add_observer(&self.observers, observer)
    }

    /// Get the launch ID
    pub fn id(&self) -> LaunchId {
        self.id
    }

    /// Get the server name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current process state
    pub fn state(&self) -> ProcessState {
        current_state(&self.state)
    }

    /// Handle of the spawned process, if any
    pub fn handle(&self) -> Option<&ProcessHandle> {
        self.handle.as_ref()
    }

    /// Spawns the server described by `plan`.
    pub async fn spawn(&mut self, plan: &CompiledLaunchPlan) -> Result<ProcessHandle> {
        self.spawn_command(LaunchCommand::from(plan)).await
    }

    /// Spawns `command` and starts reading its output.
    ///
    /// Returns as soon as the operating system created the process.
    /// Observers are not called until [`ProcessHandle::start_notify`] (or
    /// [`ProcessHandle::wait`]) starts event dispatch; events produced in the
    /// meantime are queued.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyRunning`] - this supervisor already spawned a process
    /// * [`Error::SpawnFailed`] - the process could not be created
    #[tracing::instrument(skip(self, command), fields(launch_id = %self.id, name = %self.name, program = ?command.program))]
    pub async fn spawn_command(&mut self, command: LaunchCommand) -> Result<ProcessHandle> {
        if self.handle.is_some() || !transition(&self.state, ProcessState::Spawning) {
            return Err(Error::AlreadyRunning);
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        if let Some(dir) = &command.working_directory {
            cmd.current_dir(dir);
        }

        // Set environment variables
        for (key, value) in &command.environment {
            cmd.env(key, value);
        }

        // Configure stdio
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Start the process
        let mut child = cmd.spawn().map_err(|e| {
            tracing::error!(error = %e, "Failed to spawn server process");
            transition(&self.state, ProcessState::Terminated);
            Error::SpawnFailed {
                cause: e.to_string(),
            }
        })?;

        let pid = child.id();
        transition(&self.state, ProcessState::Running);
        tracing::info!(pid, "Server process spawned");

        let (events_tx, events_rx) = mpsc::channel(self.options.event_capacity.max(1));
        // Queued first, so it precedes any output.
        let _ = events_tx.send(ProcessLifecycleEvent::Started { pid }).await;

        let stream_error = Arc::new(Mutex::new(None));
        let mut readers = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(read_output(
                stdout,
                OutputStream::Stdout,
                events_tx.clone(),
                Arc::clone(&self.state),
                self.trigger.clone(),
                Arc::clone(&stream_error),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(read_output(
                stderr,
                OutputStream::Stderr,
                events_tx.clone(),
                Arc::clone(&self.state),
                self.trigger.clone(),
                Arc::clone(&stream_error),
            )));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(wait_for_exit(
            child,
            stop_rx,
            readers,
            stream_error,
            Arc::clone(&self.state),
            events_tx,
        ));

        let (exit_tx, exit_rx) = watch::channel(None);
        let handle = ProcessHandle {
            inner: Arc::new(HandleInner {
                id: self.id,
                name: self.name.clone(),
                pid,
                state: Arc::clone(&self.state),
                observers: Arc::clone(&self.observers),
                pending: Mutex::new(Some((events_rx, exit_tx))),
                stop: Mutex::new(Some(stop_tx)),
                exit_rx,
            }),
        };

        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

struct HandleInner {
    id: LaunchId,
    name: String,
    pid: u32,
    state: SharedState,
    observers: ObserverList,
    /// Event queue and exit publisher, until dispatch starts
    pending: Mutex<
        Option<(
            mpsc::Receiver<ProcessLifecycleEvent>,
            watch::Sender<Option<ExitOutcome>>,
        )>,
    >,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    exit_rx: watch::Receiver<Option<ExitOutcome>>,
}

/// Shared handle to a spawned server process.
///
/// Dropping every handle does not stop the process; the output is still
/// drained until it exits.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<HandleInner>,
}

impl ProcessHandle {
    pub fn id(&self) -> LaunchId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// OS process id
    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    pub fn state(&self) -> ProcessState {
        current_state(&self.inner.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == ProcessState::Running
    }

    /// Registers an additional observer.
    ///
    /// Observers added before [`start_notify`](Self::start_notify) see the
    /// `Started` event; later ones see events from the next one on.
    pub fn add_observer(&self, observer: Arc<dyn ProcessObserver>) -> Result<()> {
        add_observer(&self.inner.observers, observer)
    }

    /// Starts delivering queued and future events to observers.
    ///
    /// Returns `false` if dispatch was already running.
    pub fn start_notify(&self) -> bool {
        let pending = match self.inner.pending.lock() {
            Ok(mut pending) => pending.take(),
            Err(_) => None,
        };

        match pending {
            Some((events, exit_tx)) => {
                tracing::debug!(launch_id = %self.inner.id, "Starting lifecycle event dispatch");
                tokio::spawn(dispatch_events(
                    events,
                    Arc::clone(&self.inner.observers),
                    exit_tx,
                ));
                true
            }
            None => false,
        }
    }

    /// Requests the process to stop.
    ///
    /// Emits `WillTerminate { will_be_killed: true }` and kills the process.
    /// If the process was already exiting on its own when the request
    /// arrived, `WillTerminate { will_be_killed: false }` is emitted instead.
    /// Output is still drained until the pipes close; completion is
    /// reported by the `Terminated` event and [`wait`](Self::wait).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRunning`] if the process already exited or a stop
    /// was already requested.
    #[tracing::instrument(skip(self), fields(launch_id = %self.inner.id, pid = self.inner.pid))]
    pub fn terminate(&self) -> Result<()> {
        let stop = self
            .inner
            .stop
            .lock()
            .map_err(|_| Error::Other("Failed to lock stop request".to_string()))?
            .take();

        let Some(stop) = stop else {
            tracing::warn!("Stop requested for a process that is already stopping");
            return Err(Error::NotRunning);
        };

        if !transition(&self.inner.state, ProcessState::Terminating) {
            tracing::warn!("Stop requested for a process that is not running");
            return Err(Error::NotRunning);
        }

        tracing::info!("Stopping server process");
        // A closed receiver means the process is already exiting on its own.
        let _ = stop.send(());
        Ok(())
    }

    /// Waits until the process exited and `Terminated` reached every observer.
    ///
    /// Starts event dispatch if it is not running yet.
    pub async fn wait(&self) -> Result<ExitOutcome> {
        self.start_notify();

        let mut exit_rx = self.inner.exit_rx.clone();
        let outcome = exit_rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::Process("Event dispatch ended before the process exited".to_string()))?;

        outcome
            .clone()
            .ok_or_else(|| Error::Process("Missing exit outcome".to_string()))
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("pid", &self.inner.pid)
            .field("state", &self.state())
            .finish()
    }
}

async fn read_output<R>(
    reader: R,
    stream: OutputStream,
    events: mpsc::Sender<ProcessLifecycleEvent>,
    state: SharedState,
    trigger: Option<Arc<ReadyTrigger>>,
    stream_error: Arc<Mutex<Option<String>>>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break, // EOF
            Ok(_) => {
                let text = String::from_utf8_lossy(trim_line_end(&line)).into_owned();

                if let Some(trigger) = &trigger {
                    if current_state(&state) == ProcessState::Running {
                        trigger.observe(&text);
                    }
                }

                // Once dispatch is gone nobody listens, but the pipe still has to be drained.
                let _ = events
                    .send(ProcessLifecycleEvent::OutputChunk { text, stream })
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, %stream, "Failed to read server output");
                if let Ok(mut slot) = stream_error.lock() {
                    if slot.is_none() {
                        *slot = Some(Error::StreamRead(format!("{}: {}", stream, e)).to_string());
                    }
                }
                break;
            }
        }
    }

    tracing::trace!(%stream, "Output reader finished");
}

async fn wait_for_exit(
    mut child: Child,
    stop: oneshot::Receiver<()>,
    readers: Vec<JoinHandle<()>>,
    stream_error: Arc<Mutex<Option<String>>>,
    state: SharedState,
    events: mpsc::Sender<ProcessLifecycleEvent>,
) {
    let status = tokio::select! {
        status = child.status() => {
            // Fails only when a stop request already moved the state.
            if !transition(&state, ProcessState::Terminating) {
                let _ = events
                    .send(ProcessLifecycleEvent::WillTerminate { will_be_killed: false })
                    .await;
            }
            status
        }
        Ok(()) = stop => {
            let _ = events
                .send(ProcessLifecycleEvent::WillTerminate { will_be_killed: true })
                .await;
            if let Err(e) = child.kill() {
                tracing::warn!(error = %e, "Failed to kill server process");
            }
            child.status().await
        }
    };

    // Terminated must follow every output chunk.
    for reader in readers {
        let _ = reader.await;
    }

    let (exit_code, wait_error) = match status {
        Ok(status) => (status.code(), None),
        Err(e) => (None, Some(format!("Failed to wait for server process: {}", e))),
    };
    let error = wait_error.or_else(|| stream_error.lock().ok().and_then(|slot| slot.clone()));

    transition(&state, ProcessState::Terminated);
    tracing::info!(?exit_code, error = ?error, "Server process terminated");

    let _ = events
        .send(ProcessLifecycleEvent::Terminated { exit_code, error })
        .await;
}

async fn dispatch_events(
    mut events: mpsc::Receiver<ProcessLifecycleEvent>,
    observers: ObserverList,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
) {
    while let Some(event) = events.recv().await {
        let snapshot = match observers.read() {
            Ok(observers) => observers.clone(),
            Err(_) => Vec::new(),
        };

        for observer in &snapshot {
            observer.on_event(&event);
        }

        if let ProcessLifecycleEvent::Terminated { exit_code, error } = event {
            exit_tx.send_replace(Some(ExitOutcome { exit_code, error }));
            break;
        }
    }
}

fn add_observer(observers: &ObserverList, observer: Arc<dyn ProcessObserver>) -> Result<()> {
    observers
        .write()
        .map_err(|_| Error::Other("Failed to lock observers".to_string()))?
        .push(observer);
    Ok(())
}

fn current_state(state: &Mutex<ProcessState>) -> ProcessState {
    match state.lock() {
        Ok(state) => *state,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

fn transition(state: &Mutex<ProcessState>, next: ProcessState) -> bool {
    let Ok(mut current) = state.lock() else {
        return false;
    };

    if current.can_transition_to(next) {
        tracing::trace!(from = ?*current, to = ?next, "Process state transition");
        *current = next;
        true
    } else {
        false
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
