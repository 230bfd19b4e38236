use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod html;
pub mod images;
pub mod mapper;
pub mod product;
pub mod retailer;

pub use app_config::{AppConfig, MapperConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use images::RenderedImage;
pub use mapper::{csv_row, map_item, CatalogItem, CSV_COLUMNS};
pub use product::{
    FeedStyle, ProductKind, SourceAttribute, SourceCategory, SourceImage, SourceProduct,
    StockStatus,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
