// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::KestrelConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing fast.
pub fn validate_config(config: &KestrelConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.agent.name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "agent.name must not be empty".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "agent.log_level `{}` must be one of {}",
                config.agent.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.agent.max_tool_iterations == 0 {
        errors.push(ConfigError::Validation {
            message: "agent.max_tool_iterations must be at least 1".to_string(),
        });
    }

    if config.agent.memory_window < 2 {
        errors.push(ConfigError::Validation {
            message: format!(
                "agent.memory_window must be at least 2, got {}",
                config.agent.memory_window
            ),
        });
    }

    if config.agent.max_tool_result_chars == 0 {
        errors.push(ConfigError::Validation {
            message: "agent.max_tool_result_chars must be positive".to_string(),
        });
    }

    if !(0.0..=2.0).contains(&config.provider.temperature) {
        errors.push(ConfigError::Validation {
            message: format!(
                "provider.temperature must be between 0.0 and 2.0, got {}",
                config.provider.temperature
            ),
        });
    }

    if config.provider.api_base.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "provider.api_base must not be empty".to_string(),
        });
    }

    if config.approval.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "approval.timeout_secs must be at least 1".to_string(),
        });
    }

    if config.cron.store_path.as_os_str().is_empty() {
        errors.push(ConfigError::Validation {
            message: "cron.store_path must not be empty".to_string(),
        });
    }

    if config.gateway.enabled {
        let addr = config.gateway.bind_address.trim();
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = !addr.is_empty()
            && addr
                .chars()
                .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!(
                    "gateway.bind_address `{addr}` is not a valid IP address or hostname"
                ),
            });
        }
    }

    if config.tools.bash_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "tools.bash_timeout_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&KestrelConfig::default()).is_ok());
    }

    #[test]
    fn zero_iterations_fails_validation() {
        let mut config = KestrelConfig::default();
        config.agent.max_tool_iterations = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "max_tool_iterations"));
    }

    #[test]
    fn all_violations_are_collected() {
        let mut config = KestrelConfig::default();
        config.agent.log_level = "loud".to_string();
        config.provider.temperature = 5.0;
        config.approval.timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_message(&errors, "log_level"));
        assert!(has_message(&errors, "temperature"));
        assert!(has_message(&errors, "approval.timeout_secs"));
    }

    #[test]
    fn bind_address_checked_only_when_gateway_enabled() {
        let mut config = KestrelConfig::default();
        config.gateway.bind_address = "not an address!".to_string();
        assert!(validate_config(&config).is_ok());

        config.gateway.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "bind_address"));
    }
}
