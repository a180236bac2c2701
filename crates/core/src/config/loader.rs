use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

use super::{types::Config, ConfigError};

/// Prefix of environment overrides. Nested keys are joined with `__`, so
/// `DISCVAULT_INSTALL__CHUNK_SIZE` sets `install.chunk_size`.
const ENV_PREFIX: &str = "DISCVAULT_";

fn env_overrides() -> Env {
    Env::prefixed(ENV_PREFIX).split("__")
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load the TOML file at `path`, then apply `DISCVAULT_*` overrides.
///
/// Every table is optional; anything left out takes its default.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    extract(Figment::new().merge(Toml::file(path)).merge(env_overrides()))
}

/// Parse a configuration from TOML text alone, ignoring the environment.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    extract(Figment::new().merge(Toml::string(toml_str)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use figment::Jail;
    use std::path::PathBuf;

    #[test]
    fn test_empty_file_yields_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("discvault.toml", "")?;

            let config = load_config(Path::new("discvault.toml")).map_err(|e| e.to_string())?;
            let defaults = crate::config::InstallConfig::default();
            assert_eq!(config.storage.backend, StorageBackend::Sqlite);
            assert_eq!(config.install.chunk_size, defaults.chunk_size);
            assert_eq!(
                config.install.small_file_threshold,
                defaults.small_file_threshold
            );
            assert!(config.install.spool_dir.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_install_sizes() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "discvault.toml",
                r#"
                [install]
                chunk_size = 1048576
                small_file_threshold = 4096
                "#,
            )?;
            jail.set_env("DISCVAULT_INSTALL__CHUNK_SIZE", "65536");

            let config = load_config(Path::new("discvault.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.install.chunk_size, 65536);
            assert_eq!(config.install.small_file_threshold, 4096);

            jail.set_env("DISCVAULT_INSTALL__SMALL_FILE_THRESHOLD", "0");
            let config = load_config(Path::new("discvault.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.install.small_file_threshold, 0);
            Ok(())
        });
    }

    #[test]
    fn test_fs_backend_with_spool_dir() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "discvault.toml",
                r#"
                [storage]
                backend = "fs"
                chunk_dir = "/srv/discvault/chunks"

                [install]
                spool_dir = "/var/tmp/discvault"
                "#,
            )?;

            let config = load_config(Path::new("discvault.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.storage.backend, StorageBackend::Fs);
            assert_eq!(
                config.storage.chunk_dir,
                PathBuf::from("/srv/discvault/chunks")
            );
            assert_eq!(
                config.install.spool_dir,
                Some(PathBuf::from("/var/tmp/discvault"))
            );
            Ok(())
        });
    }

    #[test]
    fn test_env_selects_backend() {
        Jail::expect_with(|jail| {
            jail.create_file("discvault.toml", "[storage]\nbackend = \"sqlite\"\n")?;
            jail.set_env("DISCVAULT_STORAGE__BACKEND", "fs");

            let config = load_config(Path::new("discvault.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.storage.backend, StorageBackend::Fs);
            Ok(())
        });
    }

    #[test]
    fn test_unparsable_env_override_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("discvault.toml", "")?;
            jail.set_env("DISCVAULT_INSTALL__CHUNK_SIZE", "huge");

            let result = load_config(Path::new("discvault.toml"));
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result = load_config_from_str("[storage]\nbackend = \"tape\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_missing_file_or_directory_is_not_found() {
        Jail::expect_with(|jail| {
            std::fs::create_dir(jail.directory().join("conf.d")).map_err(|e| e.to_string())?;

            for path in ["absent.toml", "conf.d"] {
                let result = load_config(Path::new(path));
                assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
            }
            Ok(())
        });
    }
}
