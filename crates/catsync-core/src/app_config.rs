use std::net::SocketAddr;
use std::path::PathBuf;

/// Pure inputs the item mapper needs; split out of [`AppConfig`] so the
/// mapper stays callable without dragging the whole config around.
#[derive(Debug, Clone)]
pub struct MapperConfig {
    pub brand: String,
    pub currency_suffix: String,
    pub render_base_url: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub store_base_url: String,
    pub store_key: String,
    pub store_secret: String,
    pub ads_base_url: String,
    pub catalog_id: String,
    pub catalog_token: String,
    pub webhook_secret: String,
    pub brand: String,
    pub currency_suffix: String,
    pub cache_path: PathBuf,
    pub render_base_url: String,
    pub admin_user: String,
    pub admin_password: String,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub public_dir: PathBuf,
}

impl AppConfig {
    #[must_use]
    pub fn mapper_config(&self) -> MapperConfig {
        MapperConfig {
            brand: self.brand.clone(),
            currency_suffix: self.currency_suffix.clone(),
            render_base_url: self.render_base_url.clone(),
        }
    }

    /// Hostname of the source store, used to validate webhook origins.
    #[must_use]
    pub fn store_host(&self) -> Option<String> {
        url::Url::parse(&self.store_base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("store_base_url", &self.store_base_url)
            .field("store_key", &self.store_key)
            .field("store_secret", &"[redacted]")
            .field("ads_base_url", &self.ads_base_url)
            .field("catalog_id", &self.catalog_id)
            .field("catalog_token", &"[redacted]")
            .field("webhook_secret", &"[redacted]")
            .field("brand", &self.brand)
            .field("currency_suffix", &self.currency_suffix)
            .field("cache_path", &self.cache_path)
            .field("render_base_url", &self.render_base_url)
            .field("admin_user", &self.admin_user)
            .field("admin_password", &"[redacted]")
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("public_dir", &self.public_dir)
            .finish()
    }
}
