use crate::config::LaunchConfiguration;
use crate::error::{Error, Result};

/// Collects every violated constraint, in check order.
///
/// The order is stable: context name, webapp directory, working directory,
/// launcher archive.
pub fn validate(config: &LaunchConfiguration) -> Vec<Error> {
    let mut errors = Vec::new();

    if !config.context_name.is_empty() && config.context_name.starts_with('/') {
        errors.push(Error::InvalidContextName(config.context_name.clone()));
    }

    if config.webapp_directory.is_empty() {
        errors.push(Error::MissingWebappDirectory);
    }

    if config.working_directory.is_empty() {
        errors.push(Error::MissingWorkingDirectory);
    }

    if config.launcher_archive_path.is_empty() {
        errors.push(Error::MissingLauncherArchive);
    }

    errors
}

/// Full configuration validation, reporting the first failure.
pub fn validate_config(config: &LaunchConfiguration) -> Result<()> {
    match validate(config).into_iter().next() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn valid() -> LaunchConfiguration {
        LaunchConfiguration {
            webapp_directory: "/app".to_string(),
            working_directory: "/work".to_string(),
            launcher_archive_path: "/lib/launcher.jar".to_string(),
            ..LaunchConfiguration::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid()).is_empty());
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_all_failures_in_order() {
        let config = LaunchConfiguration {
            context_name: "/shop".to_string(),
            ..LaunchConfiguration::default()
        };

        let kinds: Vec<ErrorKind> = validate(&config).iter().map(Error::kind).collect();

        assert_eq!(
            kinds,
            vec![
                ErrorKind::InvalidContextName,
                ErrorKind::MissingWebappDirectory,
                ErrorKind::MissingWorkingDirectory,
                ErrorKind::MissingLauncherArchive,
            ]
        );
    }

    #[test]
    fn test_first_failure_short_circuits() {
        let mut config = valid();
        config.working_directory.clear();
        config.launcher_archive_path.clear();

        assert_eq!(validate_config(&config), Err(Error::MissingWorkingDirectory));
    }

    #[test]
    fn test_nested_context_name_is_allowed() {
        let mut config = valid();
        config.context_name = "shop/admin".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
