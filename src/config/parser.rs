use crate::config::defaults::RuntimeDefaults;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Launch settings for a single Winstone server.
///
/// Each field maps onto one or more launcher flags or onto how the JVM
/// itself is started. Boolean mode flags are independent: with both
/// `use_web_root` and `use_web_apps` set, both `--webroot` and
/// `--webappsDir` are emitted for the same directory.
///
/// # JSON Schema
///
/// Field names are camelCase and every field is optional:
///
/// ```json
/// {
///   "webappDirectory": "/srv/shop/web",
///   "useWebRoot": true,
///   "workingDirectory": "/srv/shop",
///   "contextName": "shop",
///   "httpPort": "8080",
///   "launcherArchivePath": "/opt/winstone/winstone-0.9.10.jar",
///   "vmParameters": "-Xmx512m -Dfile.encoding=UTF-8"
/// }
/// ```
///
/// # Examples
///
/// ```
/// use winstone_runner::config::LaunchConfiguration;
///
/// let config = LaunchConfiguration {
///     webapp_directory: "/srv/shop/web".to_string(),
///     working_directory: "/srv/shop".to_string(),
///     launcher_archive_path: "/opt/winstone/winstone.jar".to_string(),
///     ..LaunchConfiguration::default()
/// };
/// assert!(config.use_web_root);
/// assert_eq!(config.http_port, "8080");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct LaunchConfiguration {
    /// Web application root, or a directory of applications.
    pub webapp_directory: String,
    /// Serve `webapp_directory` as a single application root.
    pub use_web_root: bool,
    /// Deploy every application found under `webapp_directory`.
    pub use_web_apps: bool,
    /// Working directory of the server process.
    pub working_directory: String,
    /// Context path without the leading separator; empty means root.
    pub context_name: String,
    /// HTTP listener port; empty disables the flag.
    pub http_port: String,
    /// AJP13 listener port; empty omits the flag, `-1` disables the listener.
    pub ajp13_port: String,
    /// Open a browser on the application once the server reports ready.
    pub open_web_browser_on_ready: bool,
    /// Enable JSP compilation through Jasper.
    pub use_jasper: bool,
    pub use_jndi: bool,
    pub use_servlet_reloading: bool,
    pub use_directory_listing: bool,
    pub debug_level: String,
    /// Optional Winstone properties file passed through `--config`.
    pub properties_file_path: String,
    /// Path to the Winstone launcher archive.
    pub launcher_archive_path: String,
    /// Optional directory of libraries shared by every application.
    pub common_lib_directory: String,
    /// Raw JVM options, split before each ` -` boundary.
    pub vm_parameters: String,
    pub alternative_jre_path: String,
    pub alternative_jre_enabled: bool,
    pub tools_archive_override_enabled: bool,
    pub tools_archive_override_path: String,
    /// Extra environment variables for the server process.
    pub environment: BTreeMap<String, String>,
}

impl Default for LaunchConfiguration {
    fn default() -> Self {
        Self {
            webapp_directory: String::new(),
            use_web_root: true,
            use_web_apps: false,
            working_directory: String::new(),
            context_name: String::new(),
            http_port: "8080".to_string(),
            ajp13_port: "-1".to_string(),
            open_web_browser_on_ready: false,
            use_jasper: false,
            use_jndi: false,
            use_servlet_reloading: false,
            use_directory_listing: true,
            debug_level: "5".to_string(),
            properties_file_path: String::new(),
            launcher_archive_path: String::new(),
            common_lib_directory: String::new(),
            vm_parameters: String::new(),
            alternative_jre_path: String::new(),
            alternative_jre_enabled: false,
            tools_archive_override_enabled: false,
            tools_archive_override_path: String::new(),
            environment: BTreeMap::new(),
        }
    }
}

impl LaunchConfiguration {
    /// Loads a configuration from a file path.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else
    /// as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] if the file cannot be read or its
    /// contents do not match the schema.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::parse_from_yaml_str(&content)
        } else {
            Self::parse_from_str(&content)
        }
    }

    /// Parses a configuration from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Parses a configuration from a YAML string.
    pub fn parse_from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse YAML config: {}", e)))
    }

    /// Fills empty install-dependent fields from `defaults`.
    ///
    /// Explicitly configured values are never replaced.
    pub fn with_defaults(mut self, defaults: &RuntimeDefaults) -> Self {
        fill_if_empty(&mut self.working_directory, &defaults.working_directory);
        fill_if_empty(&mut self.launcher_archive_path, &defaults.launcher_archive);
        fill_if_empty(&mut self.common_lib_directory, &defaults.common_lib_directory);
        self
    }

    /// URL of the deployed application on the local HTTP listener.
    pub fn application_url(&self) -> String {
        format!("http://localhost:{}/{}", self.http_port, self.context_name)
    }
}

fn fill_if_empty(field: &mut String, default: &Path) {
    if field.is_empty() && !default.as_os_str().is_empty() {
        *field = default.to_string_lossy().into_owned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_match_launcher_conventions() {
        let config = LaunchConfiguration::default();

        assert!(config.use_web_root);
        assert!(!config.use_web_apps);
        assert!(config.use_directory_listing);
        assert_eq!(config.http_port, "8080");
        assert_eq!(config.ajp13_port, "-1");
        assert_eq!(config.debug_level, "5");
        assert!(config.environment.is_empty());
    }

    #[test]
    fn test_parse_partial_config() {
        let config_str = r#"{
            "webappDirectory": "/app",
            "workingDirectory": "/work",
            "contextName": "shop",
            "useJndi": true,
            "environment": { "JAVA_TOOL_OPTIONS": "-Dx=y" }
        }"#;

        let config = LaunchConfiguration::parse_from_str(config_str).unwrap();

        assert_eq!(config.webapp_directory, "/app");
        assert_eq!(config.working_directory, "/work");
        assert_eq!(config.context_name, "shop");
        assert!(config.use_jndi);
        assert!(config.use_web_root);
        assert_eq!(config.debug_level, "5");
        assert_eq!(
            config.environment.get("JAVA_TOOL_OPTIONS").map(String::as_str),
            Some("-Dx=y")
        );
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = LaunchConfiguration::parse_from_str(r#"{ "httpPrt": "80" }"#).unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn test_with_defaults_keeps_explicit_values() {
        let defaults = RuntimeDefaults {
            working_directory: PathBuf::from("/project"),
            launcher_archive: PathBuf::from("/plugins/winstone.jar"),
            common_lib_directory: PathBuf::from("/system/commonLibs"),
        };
        let config = LaunchConfiguration {
            working_directory: "/explicit".to_string(),
            ..LaunchConfiguration::default()
        }
        .with_defaults(&defaults);

        assert_eq!(config.working_directory, "/explicit");
        assert_eq!(config.launcher_archive_path, "/plugins/winstone.jar");
        assert_eq!(config.common_lib_directory, "/system/commonLibs");
    }

    #[test]
    fn test_application_url() {
        let config = LaunchConfiguration {
            http_port: "9090".to_string(),
            context_name: "shop".to_string(),
            ..LaunchConfiguration::default()
        };
        assert_eq!(config.application_url(), "http://localhost:9090/shop");
    }
}
