// ⚙️ Configuration - TOML file, then environment, then CLI flags
//
// Every field has a default, so an empty (or missing) file is valid.
//
//   database_path = "fueleu.db"
//   listen_addr   = "127.0.0.1:3000"
//   log_level     = "info"
//   log_json      = false

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter,
    Layer,
};

pub const ENV_DATABASE: &str = "FUELEU_DATABASE";
pub const ENV_LISTEN: &str = "FUELEU_LISTEN";
pub const ENV_LOG: &str = "FUELEU_LOG";
pub const ENV_LOG_JSON: &str = "FUELEU_LOG_JSON";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP listen address (server binary only)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Default tracing filter; RUST_LOG wins when set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

// Default value helpers
fn default_database_path() -> PathBuf {
    PathBuf::from("fueleu.db")
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Defaults, overlaid by the file at `path` (if any), overlaid by the
    /// process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply FUELEU_* overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup(ENV_LISTEN) {
            self.listen_addr = addr;
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log_level = level;
        }
        if let Some(json) = lookup(ENV_LOG_JSON) {
            self.log_json = parse_bool(&json)
                .with_context(|| format!("{} must be true or false, got {:?}", ENV_LOG_JSON, json))?;
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Install the global tracing subscriber: EnvFilter from RUST_LOG, falling
/// back to `level`, with an optional JSON formatter.
///
/// Both formats write to stderr; stdout is reserved for command output.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer(json, std::io::stderr))
        .try_init()?;

    Ok(())
}

/// Text or JSON formatting layer writing to `make_writer`
fn log_layer<S, W>(json: bool, make_writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(make_writer);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}
