//! Configuration module

use serde::Deserialize;

/// Loggamera platform API v2
pub const DEFAULT_BASE_URL: &str = "https://platform.loggamera.se/api/v2";

/// 20 minutes; power meters typically publish every ~30 minutes
pub const DEFAULT_SCAN_INTERVAL: u64 = 1200;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_setup_retry_secs")]
    pub setup_retry_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// One Loggamera account; each gets its own client and coordinator
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub api_key: String,
    #[serde(default)]
    pub organization_id: Option<i64>,
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_workers() -> usize {
    4
}

fn default_setup_retry_secs() -> u64 {
    60
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("LOGGAMERA").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for account in &self.accounts {
            if account.api_key.trim().is_empty() {
                anyhow::bail!("account '{}' has an empty api_key", account.name);
            }
            if account.scan_interval == 0 {
                anyhow::bail!("account '{}' has a zero scan_interval", account.name);
            }
            url::Url::parse(&account.base_url).map_err(|e| {
                anyhow::anyhow!("account '{}' has an invalid base_url: {}", account.name, e)
            })?;
        }
        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        Ok(())
    }
}
