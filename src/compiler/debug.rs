use crate::error::{Error, Result};
use std::fmt;
use std::net::{Ipv4Addr, TcpListener};

/// Host used in the debug transport when the local hostname is unavailable.
pub const FALLBACK_DEBUG_HOST: &str = "localhost";

/// Request to start the server under a debugger.
///
/// The debugger listens and the JVM connects to it (`server=n`), so the
/// port names the debugger's listening endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugRequest {
    /// Port chosen by the caller; `None` or empty lets the compiler allocate one.
    pub preassigned_port: Option<String>,
}

impl DebugRequest {
    /// Debug request with a port to be allocated.
    pub fn new() -> Self {
        Self::default()
    }

    /// Debug request with a caller-chosen port.
    pub fn with_port(port: impl Into<String>) -> Self {
        Self {
            preassigned_port: Some(port.into()),
        }
    }

    pub(crate) fn port(&self) -> Option<&str> {
        self.preassigned_port
            .as_deref()
            .filter(|port| !port.is_empty())
    }
}

/// Resolved debugger address for a compiled launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEndpoint {
    pub host: String,
    pub port: String,
}

impl DebugEndpoint {
    /// JDWP agent argument connecting the JVM to this endpoint.
    pub fn transport_arg(&self) -> String {
        format!(
            "-Xrunjdwp:transport=dt_socket,address={}:{},suspend=y,server=n",
            self.host, self.port
        )
    }
}

impl fmt::Display for DebugEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Finds free local ports for debug sessions.
pub trait PortAllocator: Send + Sync {
    /// Returns a port that was free at the time of the call.
    fn allocate(&self) -> Result<u16>;
}

/// Allocates ports by briefly binding an ephemeral loopback listener.
#[derive(Debug, Clone)]
pub struct LocalPortAllocator {
    attempts: u32,
}

impl LocalPortAllocator {
    pub const DEFAULT_ATTEMPTS: u32 = 5;

    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }
}

impl Default for LocalPortAllocator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS)
    }
}

impl PortAllocator for LocalPortAllocator {
    fn allocate(&self) -> Result<u16> {
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.attempts {
            // The listener is dropped at the end of the match arm, releasing the port.
            match TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).and_then(|l| l.local_addr()) {
                Ok(addr) if addr.port() != 0 => {
                    tracing::debug!(port = addr.port(), attempt, "Allocated debug port");
                    return Ok(addr.port());
                }
                Ok(_) => last_error = "operating system returned port 0".to_string(),
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "Debug port allocation attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(Error::NoAvailablePort(format!(
            "gave up after {} attempts: {}",
            self.attempts, last_error
        )))
    }
}

/// Best-effort local hostname for the debug transport.
///
/// Falls back to [`FALLBACK_DEBUG_HOST`] when the name cannot be looked up
/// or is not valid Unicode.
pub fn local_debug_host() -> String {
    match hostname::get().map(|name| name.into_string()) {
        Ok(Ok(name)) if !name.is_empty() => name,
        Ok(Ok(_)) => {
            tracing::debug!("Local hostname is empty, using {}", FALLBACK_DEBUG_HOST);
            FALLBACK_DEBUG_HOST.to_string()
        }
        Ok(Err(raw)) => {
            tracing::debug!(hostname = ?raw, "Local hostname is not valid UTF-8, using {}", FALLBACK_DEBUG_HOST);
            FALLBACK_DEBUG_HOST.to_string()
        }
        Err(e) => {
            tracing::debug!(error = %e, "Hostname lookup failed, using {}", FALLBACK_DEBUG_HOST);
            FALLBACK_DEBUG_HOST.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_arg_format() {
        let endpoint = DebugEndpoint {
            host: "devbox".to_string(),
            port: "5005".to_string(),
        };
        assert_eq!(
            endpoint.transport_arg(),
            "-Xrunjdwp:transport=dt_socket,address=devbox:5005,suspend=y,server=n"
        );
        assert_eq!(endpoint.to_string(), "devbox:5005");
    }

    #[test]
    fn test_empty_preassigned_port_means_allocate() {
        assert_eq!(DebugRequest::with_port("").port(), None);
        assert_eq!(DebugRequest::new().port(), None);
        assert_eq!(DebugRequest::with_port("5005").port(), Some("5005"));
    }

    #[test]
    fn test_local_allocator_returns_bindable_port() {
        let port = LocalPortAllocator::default().allocate().unwrap();
        assert_ne!(port, 0);
        // The port has been released and can be bound again.
        TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
    }

    #[test]
    fn test_local_debug_host_is_never_empty() {
        assert!(!local_debug_host().is_empty());
    }
}
