//! Configuration module for Winstone Runner.
//!
//! This module handles parsing, defaulting and validation of the settings
//! that shape a Winstone launch. Configurations can be loaded from JSON or
//! YAML files, or built programmatically.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use winstone_runner::config::LaunchConfiguration;
//!
//! let config = LaunchConfiguration::from_file("winstone.json").unwrap();
//! println!("Serving {} on port {}", config.webapp_directory, config.http_port);
//! ```
//!
//! Filling install-dependent defaults and validating:
//!
//! ```
//! use winstone_runner::config::{validate_config, LaunchConfiguration, RuntimeDefaults};
//! use std::path::Path;
//!
//! let defaults = RuntimeDefaults::from_layout(
//!     Path::new("/home/dev/shop"),
//!     Path::new("/opt/ide/plugins"),
//!     Path::new("/home/dev/.ide/system"),
//! );
//! let config = LaunchConfiguration {
//!     webapp_directory: "/home/dev/shop/web".to_string(),
//!     ..LaunchConfiguration::default()
//! }
//! .with_defaults(&defaults);
//!
//! assert!(validate_config(&config).is_ok());
//! ```
mod defaults;
mod parser;
pub mod validator;

pub use defaults::{INSTALL_DIR_NAME, LAUNCHER_ARCHIVE_NAME, RuntimeDefaults};
pub use parser::LaunchConfiguration;
pub use validator::{validate, validate_config};
