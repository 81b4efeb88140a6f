use crate::application::display_session::SessionLimits;
use crate::application::sensor_service::PipelineSettings;
use crate::domain::date_range::DateRange;
use crate::domain::time_basis::TimeBasis;
use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_sessions: default_max_sessions(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl ServerSettings {
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            capacity: self.max_sessions,
            idle_ttl: Duration::from_secs(self.session_idle_secs),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Firestore,
    JsonFile,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub firestore: FirestoreSettings,
    #[serde(default)]
    pub json_file: JsonFileSettings,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            collection: default_collection(),
            firestore: FirestoreSettings::default(),
            json_file: JsonFileSettings::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FirestoreSettings {
    #[serde(default = "default_firestore_url")]
    pub base_url: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_database")]
    pub database: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FirestoreSettings {
    fn default() -> Self {
        Self {
            base_url: default_firestore_url(),
            project_id: String::new(),
            database: default_database(),
            api_key: None,
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct JsonFileSettings {
    #[serde(default = "default_json_path")]
    pub path: PathBuf,
}

impl Default for JsonFileSettings {
    fn default() -> Self {
        Self {
            path: default_json_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_export_page_size")]
    pub export_page_size: usize,
    #[serde(default = "default_start")]
    pub default_start: String,
    #[serde(default = "default_end")]
    pub default_end: String,
    /// `local`, `utc`, or a fixed offset such as `+02:00`
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            export_page_size: default_export_page_size(),
            default_start: default_start(),
            default_end: default_end(),
            timezone: default_timezone(),
        }
    }
}

impl PipelineConfig {
    pub fn settings(&self) -> anyhow::Result<PipelineSettings> {
        if self.page_size == 0 || self.export_page_size == 0 {
            anyhow::bail!("pipeline page sizes must be positive");
        }
        let basis: TimeBasis = self.timezone.parse()?;

        Ok(PipelineSettings {
            page_size: self.page_size,
            export_page_size: self.export_page_size,
            basis,
        })
    }

    pub fn default_range(&self) -> anyhow::Result<DateRange> {
        DateRange::parse(&self.default_start, &self.default_end).with_context(|| {
            format!(
                "invalid default range {}..{}",
                self.default_start, self.default_end
            )
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_sessions() -> usize {
    1024
}

fn default_session_idle_secs() -> u64 {
    3600
}

fn default_collection() -> String {
    "daily_measurements".to_string()
}

fn default_firestore_url() -> String {
    "https://firestore.googleapis.com".to_string()
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_json_path() -> PathBuf {
    PathBuf::from("data/documents.json")
}

fn default_page_size() -> usize {
    5
}

fn default_export_page_size() -> usize {
    100
}

fn default_start() -> String {
    "2025-01-01".to_string()
}

fn default_end() -> String {
    "2025-12-31".to_string()
}

fn default_timezone() -> String {
    "local".to_string()
}

/// `config/sensor.toml` (optional) overlaid with `SENSOR__SECTION__KEY`
/// environment variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/sensor").required(false))
        .add_source(
            config::Environment::with_prefix("SENSOR")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
