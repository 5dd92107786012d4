//! Configuration module for the catalog importer

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::path::PathBuf;
use std::time::Duration;

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub shop: ShopSettings,
    pub credentials: CredentialSettings,
    pub rate_limit: RateLimitSettings,
    pub http: HttpSettings,
    pub retry: RetrySettings,
    pub sync: SyncSettings,
}

/// Remote shop addressing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShopSettings {
    pub domain: String,
    pub api_version: String,
    /// Overrides the `https://{domain}/admin/api/{version}/` base when set
    pub base_url: Option<String>,
    /// Location used for inventory level updates
    pub location_id: Option<i64>,
}

/// Credential store location
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub path: PathBuf,
}

/// Per-credential sliding window
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_calls: usize,
    pub period_ms: u64,
}

/// Outbound HTTP session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub accept_invalid_certs: bool,
}

/// Retry policy for transient failures
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Sync run tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub concurrency: usize,
    pub max_pages: usize,
    pub page_size: u32,
    pub link_variant_images: bool,
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with CATALOG_SYNC_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    /// 4. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // CATALOG_SYNC__SHOP__DOMAIN, CATALOG_SYNC__RATE_LIMIT__MAX_CALLS, etc.
            .add_source(
                Environment::with_prefix("CATALOG_SYNC")
                    .separator("__")
                    .try_parsing(true)
            );

        builder.build()?.try_deserialize()
    }

    /// Base URL of the admin REST API, always ending with `/`
    pub fn api_base_url(&self) -> String {
        let base = match &self.shop.base_url {
            Some(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => format!(
                "https://{}/admin/api/{}/",
                self.shop.domain, self.shop.api_version
            ),
        };

        if base.ends_with('/') {
            base
        } else {
            format!("{}/", base)
        }
    }
}

impl RateLimitSettings {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            shop: ShopSettings::default(),
            credentials: CredentialSettings::default(),
            rate_limit: RateLimitSettings::default(),
            http: HttpSettings::default(),
            retry: RetrySettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl Default for ShopSettings {
    fn default() -> Self {
        ShopSettings {
            domain: "broderiedumonde.com".to_string(),
            api_version: "2025-01".to_string(),
            base_url: None,
            location_id: None,
        }
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        CredentialSettings {
            path: PathBuf::from("tokens.json"),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        RateLimitSettings {
            max_calls: 2,
            period_ms: 1000,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("catalog-sync/{}", env!("CARGO_PKG_VERSION")),
            accept_invalid_certs: false,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            concurrency: 4,
            max_pages: 1000,
            page_size: 250,
            link_variant_images: false,
        }
    }
}
