use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix every REST route is mounted under.
pub const API_PREFIX: &str = "/api/v1";

pub const YAHOO_SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";
pub const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

const DEV_SECRET_KEY: &str = "stockwatch-dev-secret-change-me";

/// Process-wide configuration used by the server binary.
///
/// Layering: built-in defaults, then `stockwatch.toml` in the working
/// directory, then `STOCKWATCH_*` environment variables (`__` separates
/// sections, e.g. `STOCKWATCH_AUTH__SECRET_KEY`).
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::load().unwrap_or_else(|e| panic!("FATAL: invalid stockwatch configuration: {e}"))
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub market: MarketConfig,
    pub upload: UploadConfig,
    pub client: ClientConfig,
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("stockwatch.toml"))
            .merge(Env::prefixed("STOCKWATCH_").split("__"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub app_name: String,
    pub listen_addr: String,
    pub loglevel: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            app_name: "stockwatch".to_string(),
            listen_addr: "0.0.0.0:8000".to_string(),
            loglevel: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret_key: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

impl AuthConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.secret_key == DEV_SECRET_KEY
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: DEV_SECRET_KEY.to_string(),
            access_token_minutes: 15,
            refresh_token_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:stockwatch.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub requests_per_minute: u32,
    pub max_concurrent: usize,
    /// How often expired cache entries are swept out.
    pub cache_sweep_secs: u64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout_secs: u64,
    pub proxy: Option<Url>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
            max_concurrent: 2,
            cache_sweep_secs: 60,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_secs: 300,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_upload_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Settings for hosts embedding the API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub session_file: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: format!("http://127.0.0.1:8000{API_PREFIX}"),
            session_file: None,
            timeout_secs: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.auth.access_token_minutes, 15);
        assert_eq!(cfg.auth.refresh_token_days, 7);
        assert_eq!(cfg.upload.max_upload_size, 52_428_800);
        assert!(cfg.auth.uses_dev_secret());
        assert!(cfg.client.base_url.ends_with("/api/v1"));
    }

    #[test]
    fn figment_overrides_nested_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("STOCKWATCH_AUTH__SECRET_KEY", "s3cr3t");
            jail.set_env("STOCKWATCH_MARKET__MAX_CONCURRENT", "4");
            let cfg: Config = Config::figment().extract()?;
            assert_eq!(cfg.auth.secret_key, "s3cr3t");
            assert_eq!(cfg.market.max_concurrent, 4);
            assert!(!cfg.auth.uses_dev_secret());
            Ok(())
        });
    }
}
