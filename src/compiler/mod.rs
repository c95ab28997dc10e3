//! Launch parameter compilation.
//!
//! Turns a [`LaunchConfiguration`] into a [`CompiledLaunchPlan`]: the JVM
//! options, classpath, entry point and Winstone flags needed to start the
//! server. Compilation is deterministic for fixed inputs, so plans can be
//! compared and logged as-is.
//!
//! # Examples
//!
//! ```
//! use winstone_runner::compiler::ParameterCompiler;
//! use winstone_runner::config::LaunchConfiguration;
//!
//! let config = LaunchConfiguration {
//!     webapp_directory: "/app".to_string(),
//!     working_directory: "/work".to_string(),
//!     launcher_archive_path: "/lib/launcher.jar".to_string(),
//!     ..LaunchConfiguration::default()
//! };
//!
//! let plan = ParameterCompiler::new().compile(&config, "/jdk", None).unwrap();
//! assert_eq!(plan.program_args[0], "--webroot=/app");
//! assert_eq!(plan.classpath, vec!["/lib/launcher.jar"]);
//! ```
mod debug;
mod plan;

pub use debug::{
    DebugEndpoint, DebugRequest, FALLBACK_DEBUG_HOST, LocalPortAllocator, PortAllocator,
    local_debug_host,
};
pub use plan::CompiledLaunchPlan;

use crate::config::LaunchConfiguration;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Entry point of the Winstone launcher archive.
pub const LAUNCHER_MAIN_CLASS: &str = "winstone.Launcher";

/// Compiles launch configurations into launch plans.
///
/// The compiler itself is stateless; its collaborators only matter when a
/// debug session is requested.
#[derive(Clone)]
pub struct ParameterCompiler {
    port_allocator: Arc<dyn PortAllocator>,
    /// Fixed debug host; resolved from the local hostname when unset.
    debug_host: Option<String>,
}

impl ParameterCompiler {
    pub fn new() -> Self {
        Self {
            port_allocator: Arc::new(LocalPortAllocator::default()),
            debug_host: None,
        }
    }

    /// Uses `allocator` for debug sessions without a pre-assigned port.
    pub fn with_port_allocator(mut self, allocator: Arc<dyn PortAllocator>) -> Self {
        self.port_allocator = allocator;
        self
    }

    /// Pins the debugger host instead of looking up the local hostname.
    pub fn with_debug_host(mut self, host: impl Into<String>) -> Self {
        self.debug_host = Some(host.into());
        self
    }

    /// Compiles `config` into a launch plan.
    ///
    /// `resolved_jdk_home` may be empty unless Jasper is enabled. The
    /// configuration is expected to have passed validation.
    ///
    /// # Errors
    ///
    /// * [`Error::MissingJdkHome`] - Jasper is enabled and no JDK home was resolved
    /// * [`Error::NoAvailablePort`] - debugging without a port and none could be allocated
    #[tracing::instrument(skip_all, fields(jdk_home = %resolved_jdk_home, debug = debug_request.is_some()))]
    pub fn compile(
        &self,
        config: &LaunchConfiguration,
        resolved_jdk_home: &str,
        debug_request: Option<&DebugRequest>,
    ) -> Result<CompiledLaunchPlan> {
        let program_args = program_args(config, resolved_jdk_home)?;

        let mut vm_args = Vec::new();
        if !config.vm_parameters.is_empty() {
            vm_args.extend(split_vm_parameters(&config.vm_parameters));
        }

        let debug_endpoint = match debug_request {
            Some(request) => {
                let endpoint = self.resolve_debug_endpoint(request)?;
                vm_args.push("-Xdebug".to_string());
                vm_args.push(endpoint.transport_arg());
                Some(endpoint)
            }
            None => None,
        };

        let plan = CompiledLaunchPlan {
            executable: java_executable(resolved_jdk_home),
            vm_args,
            classpath: vec![normalize_path(&config.launcher_archive_path)],
            main_class: LAUNCHER_MAIN_CLASS.to_string(),
            program_args,
            working_directory: PathBuf::from(&config.working_directory),
            environment: config.environment.clone(),
            debug_endpoint,
        };

        tracing::debug!(command = %plan.command_line(), "Compiled launch plan");
        Ok(plan)
    }

    fn resolve_debug_endpoint(&self, request: &DebugRequest) -> Result<DebugEndpoint> {
        let port = match request.port() {
            Some(port) => port.to_string(),
            None => self
                .port_allocator
                .allocate()
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to allocate debug port");
                    e
                })?
                .to_string(),
        };

        let host = match &self.debug_host {
            Some(host) => host.clone(),
            None => local_debug_host(),
        };

        Ok(DebugEndpoint { host, port })
    }
}

impl Default for ParameterCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn program_args(config: &LaunchConfiguration, jdk_home: &str) -> Result<Vec<String>> {
    let mut params = Vec::new();

    if config.use_web_root {
        params.push(format!("--webroot={}", config.webapp_directory));
    }
    if config.use_web_apps {
        params.push(format!("--webappsDir={}", config.webapp_directory));
    }
    if !config.context_name.is_empty() {
        params.push(format!("--prefix=/{}", config.context_name));
    }
    if !config.http_port.is_empty() {
        params.push(format!("--httpPort={}", config.http_port));
    }
    if !config.ajp13_port.is_empty() {
        params.push(format!("--ajp13Port={}", config.ajp13_port));
    }

    if config.use_jasper {
        if jdk_home.is_empty() {
            return Err(Error::MissingJdkHome);
        }
        let tools_archive = if config.tools_archive_override_enabled {
            config.tools_archive_override_path.clone()
        } else {
            format!("{}/lib/tools.jar", jdk_home)
        };
        params.push("--useJasper=true".to_string());
        params.push(format!("--javaHome={}", jdk_home));
        params.push(format!("--toolsJar={}", tools_archive));
    }

    params.push(format!("--useJNDI={}", config.use_jndi));
    params.push(format!("--useServletReloading={}", config.use_servlet_reloading));
    params.push(format!("--directoryListings={}", config.use_directory_listing));
    params.push(format!("--debug={}", config.debug_level));

    if !config.properties_file_path.is_empty() {
        params.push(format!("--config={}", config.properties_file_path));
    }
    if !config.common_lib_directory.is_empty() {
        params.push(format!(
            "--commonLibFolder={}",
            normalize_path(&config.common_lib_directory)
        ));
    }

    Ok(params)
}

/// Splits raw JVM options before every space that is followed by `-`.
///
/// Values containing spaces stay intact as long as the text after the
/// space does not look like a new option. Empty tokens are dropped.
///
/// ```
/// use winstone_runner::compiler::split_vm_parameters;
///
/// assert_eq!(
///     split_vm_parameters("-Xmx512m -Dfoo=bar baz -Dqux=1"),
///     vec!["-Xmx512m", "-Dfoo=bar baz", "-Dqux=1"]
/// );
/// ```
pub fn split_vm_parameters(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut start = 0;

    for (index, _) in raw.match_indices(' ') {
        if raw[index + 1..].starts_with('-') {
            tokens.push(&raw[start..index]);
            start = index + 1;
        }
    }
    tokens.push(&raw[start..]);

    tokens
        .into_iter()
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Picks the JDK home for a launch.
///
/// An enabled, non-empty alternative JRE wins over the SDK home supplied
/// by the caller. Returns an empty string when neither is known.
pub fn resolve_jdk_home(config: &LaunchConfiguration, sdk_home: Option<&str>) -> String {
    if config.alternative_jre_enabled && !config.alternative_jre_path.is_empty() {
        return config.alternative_jre_path.clone();
    }
    sdk_home.unwrap_or_default().to_string()
}

/// Java executable under `jdk_home`, or `java` from `PATH` when empty.
pub fn java_executable(jdk_home: &str) -> PathBuf {
    let name = format!("java{}", std::env::consts::EXE_SUFFIX);
    if jdk_home.is_empty() {
        PathBuf::from(name)
    } else {
        Path::new(jdk_home).join("bin").join(name)
    }
}

/// Separator canonicalization.
///
/// Separators become the platform separator, repeated separators collapse
/// into one and a trailing separator is dropped unless it is the root.
/// `.` and `..` segments are kept as written.
pub fn normalize_path(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut previous_was_separator = false;

    for c in raw.chars() {
        if std::path::is_separator(c) {
            if !previous_was_separator {
                normalized.push(std::path::MAIN_SEPARATOR);
            }
            previous_was_separator = true;
        } else {
            normalized.push(c);
            previous_was_separator = false;
        }
    }

    if normalized.len() > 1 && normalized.ends_with(std::path::MAIN_SEPARATOR) {
        normalized.pop();
    }
    normalized
}
