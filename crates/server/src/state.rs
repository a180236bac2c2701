use std::sync::Arc;

use discvault_core::{Config, Library, NotificationLog, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    library: Arc<Library>,
    notifications: NotificationLog,
}

impl AppState {
    pub fn new(config: Config, library: Arc<Library>, notifications: NotificationLog) -> Self {
        Self {
            config,
            library,
            notifications,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn notifications(&self) -> &NotificationLog {
        &self.notifications
    }
}
