use std::net::SocketAddr;
use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the
/// process, without touching `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup
/// function, so tests can drive it from a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let store_base_url = require("CATSYNC_STORE_BASE_URL")?;
    let store_key = require("CATSYNC_STORE_KEY")?;
    let store_secret = require("CATSYNC_STORE_SECRET")?;
    let catalog_id = require("CATSYNC_CATALOG_ID")?;
    let catalog_token = require("CATSYNC_CATALOG_TOKEN")?;
    let webhook_secret = require("CATSYNC_WEBHOOK_SECRET")?;
    let admin_user = require("CATSYNC_ADMIN_USER")?;
    let admin_password = require("CATSYNC_ADMIN_PASSWORD")?;

    let ads_base_url = or_default("CATSYNC_ADS_BASE_URL", "https://graph.facebook.com/v19.0");
    let brand = or_default("CATSYNC_BRAND", "catsync");
    let currency_suffix = or_default("CATSYNC_CURRENCY_SUFFIX", "BAM");
    let cache_path = PathBuf::from(or_default("CATSYNC_CACHE_PATH", "./data/cache.db"));
    let render_base_url = or_default(
        "CATSYNC_RENDER_BASE_URL",
        "https://render.catsync.dev/render",
    );
    let bind_addr = parse_addr("CATSYNC_BIND_ADDR", "0.0.0.0:8787")?;
    let log_level = or_default("CATSYNC_LOG_LEVEL", "info");
    let request_timeout_secs = parse_u64("CATSYNC_REQUEST_TIMEOUT_SECS", "30")?;
    let public_dir = PathBuf::from(or_default("CATSYNC_PUBLIC_DIR", "./public"));

    Ok(AppConfig {
        store_base_url,
        store_key,
        store_secret,
        ads_base_url,
        catalog_id,
        catalog_token,
        webhook_secret,
        brand,
        currency_suffix,
        cache_path,
        render_base_url,
        admin_user,
        admin_password,
        bind_addr,
        log_level,
        request_timeout_secs,
        public_dir,
    })
}
