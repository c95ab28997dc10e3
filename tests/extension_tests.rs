use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use winstone_runner::compiler::{CompiledLaunchPlan, DebugRequest};
use winstone_runner::config::LaunchConfiguration;
use winstone_runner::error::{Error, Result};
use winstone_runner::extension::{ExtensionChain, LaunchExtension};
use winstone_runner::server::{LifecycleRecorder, ProcessHandle, ProcessLifecycleEvent};
use winstone_runner::{ParameterCompiler, WinstoneRunner};

/// Appends a VM option and records the order it ran in.
struct TaggingExtension {
    tag: &'static str,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LaunchExtension for TaggingExtension {
    fn name(&self) -> &str {
        self.tag
    }

    async fn before_spawn(
        &self,
        _config: &LaunchConfiguration,
        mut plan: CompiledLaunchPlan,
    ) -> Result<CompiledLaunchPlan> {
        self.calls.lock().unwrap().push(format!("before:{}", self.tag));
        plan.vm_args.push(format!("-Dtag={}", self.tag));
        Ok(plan)
    }

    async fn after_spawn(&self, _config: &LaunchConfiguration, _handle: &ProcessHandle) -> Result<()> {
        self.calls.lock().unwrap().push(format!("after:{}", self.tag));
        Ok(())
    }
}

struct RejectingExtension;

#[async_trait]
impl LaunchExtension for RejectingExtension {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn before_spawn(
        &self,
        _config: &LaunchConfiguration,
        _plan: CompiledLaunchPlan,
    ) -> Result<CompiledLaunchPlan> {
        Err(Error::Extension {
            name: "rejecting".to_string(),
            message: "launch vetoed".to_string(),
        })
    }
}

fn valid_config() -> LaunchConfiguration {
    LaunchConfiguration {
        webapp_directory: "/app".to_string(),
        working_directory: "/work".to_string(),
        launcher_archive_path: "/lib/launcher.jar".to_string(),
        ..LaunchConfiguration::default()
    }
}

#[tokio::test]
async fn test_before_spawn_runs_in_registration_order() -> Result<()> {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut chain = ExtensionChain::new();
    for tag in ["first", "second"] {
        chain.push(Arc::new(TaggingExtension {
            tag,
            calls: calls.clone(),
        }));
    }

    let config = valid_config();
    let plan = ParameterCompiler::new().compile(&config, "", None)?;
    let plan = chain.before_spawn(&config, plan).await?;

    assert_eq!(plan.vm_args, vec!["-Dtag=first", "-Dtag=second"]);
    assert_eq!(*calls.lock().unwrap(), vec!["before:first", "before:second"]);

    Ok(())
}

#[tokio::test]
async fn test_rejecting_extension_aborts_prepare() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let runner = WinstoneRunner::new(valid_config())
        .with_extension(Arc::new(RejectingExtension))
        .with_extension(Arc::new(TaggingExtension {
            tag: "never",
            calls: calls.clone(),
        }));

    let err = runner.prepare(None, None).await.unwrap_err();

    assert!(matches!(err, Error::Extension { ref name, .. } if name == "rejecting"));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_prepare_with_debug_request() -> Result<()> {
    let runner = WinstoneRunner::new(valid_config())
        .with_compiler(ParameterCompiler::new().with_debug_host("devbox"));

    let plan = runner
        .prepare(Some("/jdk"), Some(&DebugRequest::with_port("5005")))
        .await?;

    assert_eq!(
        plan.vm_args,
        vec![
            "-Xdebug",
            "-Xrunjdwp:transport=dt_socket,address=devbox:5005,suspend=y,server=n",
        ]
    );
    assert_eq!(plan.debug_endpoint.map(|e| e.to_string()), Some("devbox:5005".to_string()));

    let plan = runner.prepare(Some("/jdk"), None).await?;
    assert!(plan.debug_endpoint.is_none());

    Ok(())
}

#[tokio::test]
async fn test_invalid_config_never_reaches_extensions() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let runner = WinstoneRunner::new(LaunchConfiguration {
        context_name: "/shop".to_string(),
        ..valid_config()
    })
    .with_extension(Arc::new(TaggingExtension {
        tag: "unused",
        calls: calls.clone(),
    }));

    let err = runner.prepare(Some("/jdk"), None).await.unwrap_err();

    assert!(matches!(err, Error::InvalidContextName(_)));
    assert!(calls.lock().unwrap().is_empty());
}

#[cfg(unix)]
mod launch {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use winstone_runner::server::{BrowserLauncher, READINESS_MARKER};

    /// Swaps the java command for a shell script, keeping the rest of the plan.
    struct ShellExtension {
        script: String,
    }

    #[async_trait]
    impl LaunchExtension for ShellExtension {
        fn name(&self) -> &str {
            "shell"
        }

        async fn before_spawn(
            &self,
            _config: &LaunchConfiguration,
            mut plan: CompiledLaunchPlan,
        ) -> Result<CompiledLaunchPlan> {
            // Everything after the script becomes positional parameters.
            plan.executable = "sh".into();
            plan.vm_args = vec!["-c".to_string(), self.script.clone()];
            Ok(plan)
        }
    }

    /// Attaches a recorder from the after-spawn hook.
    struct AttachingExtension {
        recorder: Arc<LifecycleRecorder>,
    }

    #[async_trait]
    impl LaunchExtension for AttachingExtension {
        fn name(&self) -> &str {
            "attaching"
        }

        async fn after_spawn(&self, _config: &LaunchConfiguration, handle: &ProcessHandle) -> Result<()> {
            handle.add_observer(self.recorder.clone())
        }
    }

    struct FailingAfterSpawn;

    #[async_trait]
    impl LaunchExtension for FailingAfterSpawn {
        fn name(&self) -> &str {
            "failing"
        }

        async fn after_spawn(&self, _config: &LaunchConfiguration, _handle: &ProcessHandle) -> Result<()> {
            Err(Error::Other("profiler unavailable".to_string()))
        }
    }

    struct RecordingBrowser {
        urls: Mutex<Vec<String>>,
        launches: AtomicUsize,
    }

    impl BrowserLauncher for RecordingBrowser {
        fn launch(&self, url: &str) -> Result<()> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn config_in(dir: &tempfile::TempDir) -> LaunchConfiguration {
        LaunchConfiguration {
            working_directory: dir.path().to_string_lossy().into_owned(),
            ..valid_config()
        }
    }

    #[tokio::test]
    async fn test_after_spawn_observer_sees_whole_lifecycle() -> Result<()> {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let recorder = Arc::new(LifecycleRecorder::new());

        let runner = WinstoneRunner::new(config_in(&dir))
            .with_extension(Arc::new(ShellExtension {
                script: "echo hello from $PWD".to_string(),
            }))
            .with_extension(Arc::new(AttachingExtension {
                recorder: recorder.clone(),
            }));

        let handle = runner.launch(None, None).await?;
        let outcome = handle.wait().await?;

        assert!(outcome.success());
        let events = recorder.events()?;
        assert_eq!(events[0], ProcessLifecycleEvent::Started { pid: handle.pid() });
        assert_eq!(recorder.output()?.len(), 1);
        assert!(recorder.output()?[0].starts_with("hello from "));
        assert!(matches!(
            events.last(),
            Some(ProcessLifecycleEvent::Terminated { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_failing_after_spawn_keeps_launch() -> Result<()> {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let runner = WinstoneRunner::new(config_in(&dir))
            .with_extension(Arc::new(ShellExtension {
                script: "exit 0".to_string(),
            }))
            .with_extension(Arc::new(FailingAfterSpawn));

        let handle = runner.launch(None, None).await?;

        assert!(handle.wait().await?.success());

        Ok(())
    }

    #[tokio::test]
    async fn test_launch_opens_browser_once_when_ready() -> Result<()> {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let browser = Arc::new(RecordingBrowser {
            urls: Mutex::new(Vec::new()),
            launches: AtomicUsize::new(0),
        });
        let config = LaunchConfiguration {
            context_name: "shop".to_string(),
            open_web_browser_on_ready: true,
            ..config_in(&dir)
        };

        let script = format!(
            "echo '{m}8080'; echo '{m}8080'; exec sleep 30",
            m = READINESS_MARKER
        );
        let runner = WinstoneRunner::new(config)
            .with_browser_launcher(browser.clone())
            .with_extension(Arc::new(ShellExtension { script }));

        let handle = runner.launch(None, None).await?;

        tokio::time::timeout(std::time::Duration::from_secs(10), async {
            while browser.launches.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("browser was never launched");

        handle.terminate()?;
        handle.wait().await?;

        assert_eq!(browser.launches.load(Ordering::SeqCst), 1);
        assert_eq!(*browser.urls.lock().unwrap(), vec!["http://localhost:8080/shop"]);

        Ok(())
    }

    #[tokio::test]
    async fn test_each_launch_is_independent() -> Result<()> {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let runner = WinstoneRunner::new(config_in(&dir)).with_extension(Arc::new(ShellExtension {
            script: "echo run".to_string(),
        }));

        let first = runner.launch(None, None).await?;
        first.wait().await?;
        let second = runner.launch(None, None).await?;
        second.wait().await?;

        assert_ne!(first.id(), second.id());

        Ok(())
    }
}
