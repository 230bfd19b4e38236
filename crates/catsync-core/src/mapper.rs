//! Maps source products into the ad-catalog item shape and CSV row shape.
//!
//! Pure and deterministic: byte-identical input yields byte-identical
//! output. Called by the replication engine (batch items) and the feed
//! generator (CSV rows); both go through [`map_item`] so the two surfaces
//! can never drift apart.

use serde::Serialize;

use crate::app_config::MapperConfig;
use crate::html::{strip_markup, truncate_chars};
use crate::images::{rendered_images, RenderedImage};
use crate::product::{FeedStyle, SourceProduct};
use crate::retailer;

/// Descriptions are truncated to this many characters for the `description`
/// field; `rich_text_description` carries the full text.
pub const DESCRIPTION_LIMIT: usize = 5000;

/// One replicable item in the ad-catalog wire shape. Also the source of
/// every CSV column via [`csv_row`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub rich_text_description: String,
    pub availability: String,
    pub condition: String,
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price: Option<String>,
    pub link: String,
    pub image: Vec<RenderedImage>,
    pub brand: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_group_id: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub product_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<i64>,
}

impl CatalogItem {
    /// Image 0's URL, reused as the CSV `image_link` column.
    #[must_use]
    pub fn image_link(&self) -> &str {
        self.image.first().map_or("", |i| i.url.as_str())
    }
}

/// Maps a source product (with optional parent context for variations) into
/// an ad-catalog item.
#[must_use]
pub fn map_item(
    cfg: &MapperConfig,
    product: &SourceProduct,
    parent: Option<&SourceProduct>,
    style: FeedStyle,
) -> CatalogItem {
    let title = parent
        .filter(|p| !p.name.is_empty())
        .map_or(product.name.as_str(), |p| p.name.as_str())
        .to_string();

    let link = if product.permalink.is_empty() {
        parent.map_or("", |p| p.permalink.as_str()).to_string()
    } else {
        product.permalink.clone()
    };

    let stripped = strip_markup(&product.description);
    let description = truncate_chars(&stripped, DESCRIPTION_LIMIT);

    let price_amount = product.display_price().to_string();
    let price = format!("{} {}", price_amount, cfg.currency_suffix);
    let sale_price = product
        .sale_price
        .as_deref()
        .map(|s| format!("{} {}", s, cfg.currency_suffix));

    let categories = if product.is_variation() {
        parent.map_or(&product.categories, |p| &p.categories)
    } else {
        &product.categories
    };
    let product_type = categories
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join("/");

    let image = rendered_images(
        &cfg.render_base_url,
        &title,
        &price_amount,
        product.sale_price.as_deref(),
        product.primary_image(),
        style,
    );

    CatalogItem {
        id: retailer::retailer_id_for(product),
        title,
        rich_text_description: stripped,
        description,
        availability: retailer::availability(product.stock_status).to_string(),
        condition: "new".to_string(),
        price,
        sale_price,
        link,
        image,
        brand: cfg.brand.clone(),
        color: extract_attribute(product, parent, "color"),
        size: extract_attribute(product, parent, "size"),
        gender: extract_attribute(product, parent, "gender"),
        age_group: extract_attribute(product, parent, "age"),
        item_group_id: retailer::group_id(product),
        product_type,
        inventory: retailer::inventory(product),
    }
}

/// Finds the first merged attribute (parent first, then own) whose
/// lowercased name mentions `key`, and returns its selected value.
fn extract_attribute(
    product: &SourceProduct,
    parent: Option<&SourceProduct>,
    key: &str,
) -> Option<String> {
    parent
        .map(|p| p.attributes.as_slice())
        .unwrap_or_default()
        .iter()
        .chain(product.attributes.iter())
        .find(|a| a.name.to_lowercase().contains(key))
        .and_then(|a| a.value())
        .map(str::to_owned)
}

/// CSV column order. A hard external contract: reordering silently breaks
/// downstream ingestion.
pub const CSV_COLUMNS: [&str; 28] = [
    "id",
    "title",
    "description",
    "rich_text_description",
    "availability",
    "condition",
    "price",
    "link",
    "image_link",
    "brand",
    "image[0].url",
    "image[0].tag[0]",
    "image[1].url",
    "image[1].tag[0]",
    "image[2].url",
    "image[2].tag[0]",
    "image[2].tag[1]",
    "age_group",
    "color",
    "gender",
    "item_group_id",
    "google_product_category",
    "product_type",
    "sale_price",
    "sale_price_effective_date",
    "size",
    "status",
    "inventory",
];

/// Flattens an item into the fixed CSV column order. Absent values are
/// empty strings.
#[must_use]
pub fn csv_row(item: &CatalogItem) -> Vec<String> {
    let image_url = |i: usize| -> String {
        item.image.get(i).map_or(String::new(), |img| img.url.clone())
    };
    let image_tag = |i: usize, t: usize| -> String {
        item.image
            .get(i)
            .and_then(|img| img.tag.get(t))
            .cloned()
            .unwrap_or_default()
    };
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();

    vec![
        item.id.clone(),
        item.title.clone(),
        item.description.clone(),
        item.rich_text_description.clone(),
        item.availability.clone(),
        item.condition.clone(),
        item.price.clone(),
        item.link.clone(),
        item.image_link().to_string(),
        item.brand.clone(),
        image_url(0),
        image_tag(0, 0),
        image_url(1),
        image_tag(1, 0),
        image_url(2),
        image_tag(2, 0),
        image_tag(2, 1),
        opt(&item.age_group),
        opt(&item.color),
        opt(&item.gender),
        opt(&item.item_group_id),
        String::new(),
        item.product_type.clone(),
        opt(&item.sale_price),
        String::new(),
        opt(&item.size),
        String::new(),
        item.inventory.map(|n| n.to_string()).unwrap_or_default(),
    ]
}
