use std::sync::Arc;
use winstone_runner::error::Result;
use winstone_runner::{ProcessLifecycleEvent, ProcessObserver, WinstoneRunner};
use tracing_subscriber::{EnvFilter, fmt};

/// Prints server output to the console.
struct ConsoleObserver;

impl ProcessObserver for ConsoleObserver {
    fn on_event(&self, event: &ProcessLifecycleEvent) {
        match event {
            ProcessLifecycleEvent::Started { pid } => println!("[started pid={}]", pid),
            ProcessLifecycleEvent::OutputChunk { text, stream } => println!("[{}] {}", stream, text),
            ProcessLifecycleEvent::WillTerminate { .. } => println!("[stopping]"),
            ProcessLifecycleEvent::Terminated { exit_code, error } => {
                println!("[terminated code={:?} error={:?}]", exit_code, error)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // `with_env_filter` reads RUST_LOG, e.g. RUST_LOG=winstone_runner=debug
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .init();

    tracing::info!("Starting launch example");

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "demos/winstone.yaml".to_string());
    let jdk_home = args.next().or_else(|| std::env::var("JAVA_HOME").ok());

    let runner = WinstoneRunner::from_config_file(&config_path)?
        .with_observer(Arc::new(ConsoleObserver));

    let plan = runner.prepare(jdk_home.as_deref(), None).await?;
    println!("Command line: {}", plan.command_line());

    let handle = runner.launch(jdk_home.as_deref(), None).await?;
    println!("Press Ctrl+C to stop the server");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received, stopping server");
            if let Err(e) = handle.terminate() {
                tracing::warn!(error = %e, "Server was not running");
            }
        }
        outcome = handle.wait() => {
            tracing::info!(outcome = ?outcome, "Server exited on its own");
        }
    }

    let outcome = handle.wait().await?;
    println!("Server exited with {:?}", outcome.exit_code);

    Ok(())
}
