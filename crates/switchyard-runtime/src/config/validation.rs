//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LogRotation, LoggingConfig, SwitchyardConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &SwitchyardConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File {
        let Some(path) = &logging.file_path else {
            return Err(ConfigError::missing_field("logging.file_path"));
        };
        if path.file_name().is_none() {
            return Err(ConfigError::validation(format!(
                "Log file path has no file name: {}",
                path.display()
            )));
        }
    } else if logging.rotation != LogRotation::Never {
        return Err(ConfigError::validation(
            "Log rotation requires file output",
        ));
    }

    for module in logging.filters.keys() {
        validate_filter_module(module)?;
    }

    Ok(())
}

/// Validates the module part of a filter directive.
fn validate_filter_module(module: &str) -> ConfigResult<()> {
    if module.trim().is_empty() {
        return Err(ConfigError::validation(
            "Log filter module cannot be empty",
        ));
    }

    if module.contains(|c: char| c.is_whitespace() || c == '=' || c == ',') {
        return Err(ConfigError::validation(format!(
            "Invalid log filter module: {module}"
        )));
    }

    Ok(())
}
