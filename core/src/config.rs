use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, Map};
use serde::Deserialize;
use std::env;
use std::time::Duration;

const ENV_PREFIX: &str = "HOPPIPOLLA";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Address handed to the policy engine for invalidation callbacks.
    pub fn callback_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    pub sciond_addr: String,
    pub cache_size: usize,
    pub policy_manager_addr: String,
    pub upstream_timeout_ms: u64,
}

impl AnalyzerConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct NipConfig {
    pub sciond_addr: String,
    pub cache_size: usize,
    pub google_maps_api_key: String,
    pub enable_geolocation: bool,
    pub refresh_interval_secs: u64,
    pub local_data_dir: Option<String>,
    pub upstream_timeout_ms: u64,
}

impl NipConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub analyzer: AnalyzerConfig,
    pub nip: NipConfig,
}

impl AppConfig {
    /// Defaults, then `config/default` and `config/{RUN_MODE}` when present, then
    /// `HOPPIPOLLA_*` environment variables (`__` separates sections).
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(environment());

        Self::build(builder)
    }

    /// Same layering as [`load`](Self::load) with an explicit variable map in place of
    /// the process environment and no config files.
    pub fn from_env_map(vars: Map<String, String>) -> Result<Self, ConfigError> {
        let builder = defaults()?.add_source(environment().source(Some(vars)));
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let require = |ok: bool, message: &str| {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Message(message.to_string()))
            }
        };

        require(!self.server.host.is_empty(), "server.host must not be empty")?;
        require(
            !self.analyzer.sciond_addr.is_empty(),
            "analyzer.sciond_addr must not be empty",
        )?;
        require(
            !self.analyzer.policy_manager_addr.is_empty(),
            "analyzer.policy_manager_addr must not be empty",
        )?;
        require(self.analyzer.cache_size > 0, "analyzer.cache_size must be positive")?;
        require(
            self.analyzer.upstream_timeout_ms > 0,
            "analyzer.upstream_timeout_ms must be positive",
        )?;
        require(!self.nip.sciond_addr.is_empty(), "nip.sciond_addr must not be empty")?;
        require(self.nip.cache_size > 0, "nip.cache_size must be positive")?;
        require(
            self.nip.refresh_interval_secs > 0,
            "nip.refresh_interval_secs must be positive",
        )?;
        require(
            self.nip.upstream_timeout_ms > 0,
            "nip.upstream_timeout_ms must be positive",
        )?;
        require(
            !self.nip.enable_geolocation || !self.nip.google_maps_api_key.is_empty(),
            "nip.google_maps_api_key is required when geolocation is enabled",
        )?;
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 27001)?
        .set_default("analyzer.sciond_addr", "127.0.0.1:30255")?
        .set_default("analyzer.cache_size", 1000)?
        .set_default("analyzer.policy_manager_addr", "127.0.0.1:27002")?
        .set_default("analyzer.upstream_timeout_ms", 5000)?
        .set_default("nip.sciond_addr", "127.0.0.1:30255")?
        .set_default("nip.cache_size", 1000)?
        .set_default("nip.google_maps_api_key", "")?
        .set_default("nip.enable_geolocation", false)?
        // SCION default path lifetime.
        .set_default("nip.refresh_interval_secs", 60)?
        .set_default("nip.upstream_timeout_ms", 5000)
}
