use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub influx: InfluxSettings,
    pub registration: RegistrationSettings,
    #[serde(default)]
    pub snapshot: SnapshotSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    #[serde(default = "default_measurement")]
    pub measurement: String,
    #[serde(default = "default_station_measurement")]
    pub station_measurement: String,
    /// How far back the monthly series reaches; older months are not returned
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistrationSettings {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SnapshotSettings {
    #[serde(default)]
    pub parallel_species: bool,
}

fn default_measurement() -> String {
    "measurements".to_string()
}

fn default_station_measurement() -> String {
    "stations".to_string()
}

fn default_history_days() -> u32 {
    3650
}

fn default_timeout_secs() -> u64 {
    10
}

impl ServerSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load `config/datahub.*`, overridden by `DATAHUB__SECTION__KEY` variables
pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/datahub"))
        .add_source(
            config::Environment::with_prefix("DATAHUB")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read configuration")?;

    settings
        .try_deserialize()
        .context("Failed to parse configuration")
}
