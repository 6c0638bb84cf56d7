// Configuration - Environment variables

use std::env;
use std::time::Duration;

use crate::models::ColorScheme;

/// Application configuration loaded from environment
#[derive(Clone, Debug)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Firebase project ID; without it services are kept in memory
    pub firebase_project_id: Option<String>,
    /// Firebase Web API key (for Identity Toolkit)
    pub firebase_api_key: Option<String>,
    /// Google Application Credentials path for Firestore
    pub google_application_credentials: Option<String>,
    /// Firestore emulator `host:port`
    pub firestore_emulator_host: Option<String>,
    /// Poll interval of the live service stream (seconds)
    pub services_poll_interval_secs: u64,
    /// Raw DEFAULT_COLOR_SCHEME value
    pub default_color_scheme: Option<String>,
    /// Log file path
    pub log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            firebase_project_id: None,
            firebase_api_key: None,
            google_application_credentials: None,
            firestore_emulator_host: None,
            services_poll_interval_secs: 5,
            default_color_scheme: None,
            log_file: "/tmp/service-tracker.log".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            firebase_project_id: non_empty_var("FIREBASE_PROJECT_ID")
                .or_else(|| non_empty_var("GCP_PROJECT_ID")),
            firebase_api_key: non_empty_var("FIREBASE_API_KEY"),
            google_application_credentials: non_empty_var("GOOGLE_APPLICATION_CREDENTIALS"),
            firestore_emulator_host: non_empty_var("FIRESTORE_EMULATOR_HOST"),
            services_poll_interval_secs: env::var("SERVICES_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.services_poll_interval_secs),
            default_color_scheme: non_empty_var("DEFAULT_COLOR_SCHEME"),
            log_file: non_empty_var("LOG_FILE").unwrap_or(defaults.log_file),
        }
    }

    pub fn color_scheme(&self) -> Result<ColorScheme, String> {
        match &self.default_color_scheme {
            Some(raw) => raw.parse(),
            None => Ok(ColorScheme::default()),
        }
    }

    /// Never shorter than one second
    pub fn services_poll_interval(&self) -> Duration {
        Duration::from_secs(self.services_poll_interval_secs.max(1))
    }

    /// Validate that required configuration is present
    pub fn validate(&self) -> Result<(), String> {
        self.color_scheme()?;
        if self.services_poll_interval_secs == 0 {
            return Err("SERVICES_POLL_INTERVAL_SECS must be at least 1".to_string());
        }
        if self.firebase_project_id.is_none() {
            tracing::warn!("FIREBASE_PROJECT_ID not set - services are kept in memory and ID tokens cannot be verified");
        }
        if self.google_application_credentials.is_none() && self.firestore_emulator_host.is_none() {
            tracing::warn!("GOOGLE_APPLICATION_CREDENTIALS not set - Firestore will use default credentials");
        }
        Ok(())
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
