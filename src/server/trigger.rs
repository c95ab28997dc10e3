use crate::config::LaunchConfiguration;
use crate::error::{Error, Result};
use std::sync::{Arc, Once};

/// Line fragment Winstone logs once its HTTP listener accepts connections.
pub const READINESS_MARKER: &str = "HTTP Listener started: port=";

/// Opens URLs in the user's browser.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, url: &str) -> Result<()>;
}

/// Opens URLs with the desktop's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn launch(&self, url: &str) -> Result<()> {
        open::that_detached(url)
            .map_err(|e| Error::Other(format!("Failed to open browser for {}: {}", url, e)))
    }
}

/// Opens the application in a browser the first time the server reports ready.
///
/// Output lines from stdout and stderr are checked concurrently; the
/// launch is guarded by a [`Once`] latch so it happens at most once per
/// process run no matter how many lines carry the marker.
pub struct ReadyTrigger {
    marker: String,
    url: String,
    launcher: Arc<dyn BrowserLauncher>,
    fired: Once,
}

impl ReadyTrigger {
    pub fn new(url: impl Into<String>, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            marker: READINESS_MARKER.to_string(),
            url: url.into(),
            launcher,
            fired: Once::new(),
        }
    }

    /// Trigger for `config`, or `None` when it does not ask for a browser.
    pub fn for_config(
        config: &LaunchConfiguration,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Option<Self> {
        config
            .open_web_browser_on_ready
            .then(|| Self::new(config.application_url(), launcher))
    }

    /// Replaces the readiness marker.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the browser launch already happened.
    pub fn has_fired(&self) -> bool {
        self.fired.is_completed()
    }

    /// Checks one line of output; returns `true` if this call fired the launch.
    pub fn observe(&self, text: &str) -> bool {
        if self.fired.is_completed() || !text.contains(&self.marker) {
            return false;
        }

        let mut fired_here = false;
        self.fired.call_once(|| {
            fired_here = true;
            tracing::info!(url = %self.url, "Server ready, opening browser");
            if let Err(e) = self.launcher.launch(&self.url) {
                tracing::warn!(error = %e, "Failed to open browser");
            }
        });
        fired_here
    }
}
