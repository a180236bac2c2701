use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Chunk size and small-file threshold are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.install.chunk_size == 0 {
        return Err(ConfigError::ValidationError(
            "install.chunk_size cannot be 0".to_string(),
        ));
    }

    if config.install.small_file_threshold == 0 {
        return Err(ConfigError::ValidationError(
            "install.small_file_threshold cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstallConfig, ServerConfig};
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Default::default()
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_chunk_size_fails() {
        let config = Config {
            install: InstallConfig::default().with_chunk_size(0),
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn test_validate_zero_threshold_fails() {
        let config = Config {
            install: InstallConfig::default().with_small_file_threshold(0),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
