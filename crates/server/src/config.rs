use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Admin client settings for the external authorization server (Hydra).
#[derive(Clone, Debug, Deserialize)]
pub struct HydraConfig {
    pub admin_url: String,
    pub public_url: String,
    /// Seconds the authorization server should remember a login/consent decision.
    #[serde(default = "default_remember_for")]
    pub remember_for: i64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Human-readable description of a grantable scope, shown on the consent page.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct GrantScope {
    pub description: String,
    #[serde(default)]
    pub details: String,
}

/// Argon2id cost parameters.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct HashingConfig {
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Directory holding the `static` UI assets.
    #[serde(default = "default_base_ui_path")]
    pub base_ui_path: String,
    /// Externally reachable base URL, used to build links in emails.
    pub public_url: String,
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    /// Keys both the password hashes and the action token signatures.
    pub secret_key: String,
    #[serde(default = "default_action_token_lifetime_secs")]
    pub action_token_lifetime_secs: i64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub hashing: HashingConfig,
    pub hydra: HydraConfig,
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub grant_scopes: BTreeMap<String, GrantScope>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:7070".into()
}

fn default_base_ui_path() -> String {
    "ui".into()
}

fn default_db_max_connections() -> u32 {
    20
}

fn default_db_min_connections() -> u32 {
    4
}

fn default_action_token_lifetime_secs() -> i64 {
    600
}

fn default_log_level() -> String {
    "info".into()
}

fn default_memory_kib() -> u32 {
    19 * 1024
}

fn default_iterations() -> u32 {
    2
}

fn default_parallelism() -> u32 {
    1
}

fn default_remember_for() -> i64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl AppConfig {
    /// Checks invariants the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.len() < 32 {
            return Err(ConfigError::Validation(
                "secret_key must be at least 32 bytes".into(),
            ));
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::Validation("smtp.port must be > 0".into()));
        }
        for (name, value) in [
            ("public_url", &self.public_url),
            ("hydra.admin_url", &self.hydra.admin_url),
            ("hydra.public_url", &self.hydra.public_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be an absolute http(s) URL"
                )));
            }
        }
        if self.action_token_lifetime_secs <= 0 {
            return Err(ConfigError::Validation(
                "action_token_lifetime_secs must be > 0".into(),
            ));
        }
        if self.db_min_connections > self.db_max_connections {
            return Err(ConfigError::Validation(
                "db_min_connections must not exceed db_max_connections".into(),
            ));
        }
        Ok(())
    }

    /// Public URL without a trailing slash.
    pub fn public_base(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `SMTP__PORT`, `HYDRA__ADMIN_URL`) overrides the file value.
/// A `.env` file in the working directory is loaded first when present.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};

    let _ = dotenvy::dotenv();

    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}
