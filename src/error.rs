/// Error handling module for Winstone Runner.
///
/// This module defines the error types used throughout the library.
/// Every error carries a stable [`ErrorKind`] tag so callers can branch on
/// the failure category without matching on message text.
///
/// # Example
///
/// ```
/// use winstone_runner::error::{Error, ErrorKind, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Launch succeeded"),
///         Err(Error::SpawnFailed { cause }) => println!("Could not start the server: {}", cause),
///         Err(e) if e.kind() == ErrorKind::MissingJdkHome => println!("Configure a JDK first"),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use thiserror::Error;

/// Stable classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidContextName,
    MissingWebappDirectory,
    MissingWorkingDirectory,
    MissingLauncherArchive,
    MissingJdkHome,
    NoAvailablePort,
    SpawnFailed,
    StreamReadError,
    ConfigParse,
    AlreadyRunning,
    NotRunning,
    Extension,
    Process,
    Other,
}

/// Errors that can occur in the winstone-runner library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The context name starts with a path separator.
    ///
    /// Winstone prepends the separator itself, so the configured name must
    /// be given without it (for example `shop`, not `/shop`).
    #[error("Context name must not start with '/': {0}")]
    InvalidContextName(String),

    /// No web application directory was configured.
    #[error("Webapp directory is not specified")]
    MissingWebappDirectory,

    /// No working directory was configured.
    #[error("Working directory is not specified")]
    MissingWorkingDirectory,

    /// No launcher archive was configured.
    #[error("Winstone launcher archive is not specified")]
    MissingLauncherArchive,

    /// JSP support was requested but no JDK home could be resolved.
    ///
    /// Jasper needs a full JDK (not a bare JRE) for `--javaHome` and the
    /// derived `--toolsJar` path.
    #[error("JDK home could not be resolved, but Jasper support requires one")]
    MissingJdkHome,

    /// A debug session was requested and no free local port was found.
    #[error("No available debug port: {0}")]
    NoAvailablePort(String),

    /// The operating system refused to create the server process.
    ///
    /// This error occurs when:
    /// - The java executable does not exist
    /// - Permission to execute it is denied
    /// - The working directory does not exist
    #[error("Failed to spawn server process: {cause}")]
    SpawnFailed {
        /// Underlying OS error description
        cause: String,
    },

    /// Reading the server's output stream failed mid-run.
    #[error("Failed to read server output: {0}")]
    StreamRead(String),

    /// Failed to read or parse a configuration file or string.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// The supervisor already spawned its process.
    #[error("Already running")]
    AlreadyRunning,

    /// The process is not running.
    #[error("Not running")]
    NotRunning,

    /// A launch extension rejected or failed to update the launch.
    #[error("Extension '{name}' failed: {message}")]
    Extension {
        /// Name reported by the extension
        name: String,
        /// Failure description
        message: String,
    },

    /// Error while controlling a running server process.
    #[error("Server process error: {0}")]
    Process(String),

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Returns the stable kind tag of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidContextName(_) => ErrorKind::InvalidContextName,
            Error::MissingWebappDirectory => ErrorKind::MissingWebappDirectory,
            Error::MissingWorkingDirectory => ErrorKind::MissingWorkingDirectory,
            Error::MissingLauncherArchive => ErrorKind::MissingLauncherArchive,
            Error::MissingJdkHome => ErrorKind::MissingJdkHome,
            Error::NoAvailablePort(_) => ErrorKind::NoAvailablePort,
            Error::SpawnFailed { .. } => ErrorKind::SpawnFailed,
            Error::StreamRead(_) => ErrorKind::StreamReadError,
            Error::ConfigParse(_) => ErrorKind::ConfigParse,
            Error::AlreadyRunning => ErrorKind::AlreadyRunning,
            Error::NotRunning => ErrorKind::NotRunning,
            Error::Extension { .. } => ErrorKind::Extension,
            Error::Process(_) => ErrorKind::Process,
            Error::Other(_) => ErrorKind::Other,
        }
    }
}

/// Result type for winstone-runner operations.
///
/// This is a convenience type alias for `std::result::Result` with the `Error` type
/// from this module.
pub type Result<T> = std::result::Result<T, Error>;
