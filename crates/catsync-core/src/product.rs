//! Domain model for products as read from the source store.
//!
//! The source API speaks a single `product` shape for top-level products and
//! variations alike; the `type` field distinguishes them. Variations arrive
//! with `parent_id > 0` and never carry a nested variation list of their own.

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize, Serializer};

/// Product kind as reported by the source store's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductKind {
    Simple,
    Variable,
    Variation,
}

impl ProductKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProductKind::Simple => "simple",
            ProductKind::Variable => "variable",
            ProductKind::Variation => "variation",
        }
    }

    /// Parses a wire string. Unknown kinds (`grouped`, `external`, ...) are
    /// treated as simple products so they still replicate as single items.
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s {
            "variable" => ProductKind::Variable,
            "variation" => ProductKind::Variation,
            _ => ProductKind::Simple,
        }
    }
}

impl Default for ProductKind {
    fn default() -> Self {
        ProductKind::Simple
    }
}

impl Serialize for ProductKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProductKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ProductKind::from_wire(&s))
    }
}

/// Stock status as reported by the source store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockStatus {
    InStock,
    OutOfStock,
    OnBackorder,
}

impl StockStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StockStatus::InStock => "instock",
            StockStatus::OutOfStock => "outofstock",
            StockStatus::OnBackorder => "onbackorder",
        }
    }

    /// Parses a wire string; anything unrecognized is out of stock.
    #[must_use]
    pub fn from_wire(s: &str) -> Self {
        match s {
            "instock" => StockStatus::InStock,
            "onbackorder" => StockStatus::OnBackorder,
            _ => StockStatus::OutOfStock,
        }
    }
}

impl Default for StockStatus {
    fn default() -> Self {
        StockStatus::OutOfStock
    }
}

impl Serialize for StockStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StockStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(StockStatus::from_wire(&s))
    }
}

/// Feed style tag. Only influences the rendered-image URL query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStyle {
    Standard,
    Christmas,
}

impl FeedStyle {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeedStyle::Standard => "standard",
            FeedStyle::Christmas => "christmas",
        }
    }

    #[must_use]
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "standard" => Some(FeedStyle::Standard),
            "christmas" => Some(FeedStyle::Christmas),
            _ => None,
        }
    }
}

/// A single product image reference from the source store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceImage {
    #[serde(default)]
    pub src: String,
}

/// A typed product attribute: name plus either a single selected option
/// (variations) or the full option list (parents).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceAttribute {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub option: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

impl SourceAttribute {
    /// The selected value: `option` for variations, first of `options` for
    /// parents.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.option
            .as_deref()
            .or_else(|| self.options.first().map(String::as_str))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCategory {
    #[serde(default)]
    pub name: String,
}

/// A product row as read from the source store.
///
/// The same shape covers top-level products and variations. Invariants from
/// the source: `kind == Variation` implies `parent_id > 0`; `kind ==
/// Variable` implies `parent_id == 0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceProduct {
    pub id: i64,
    #[serde(default)]
    pub parent_id: i64,
    #[serde(rename = "type", default)]
    pub kind: ProductKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub regular_price: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub sale_price: Option<String>,
    #[serde(default)]
    pub stock_status: StockStatus,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<SourceImage>,
    #[serde(default)]
    pub attributes: Vec<SourceAttribute>,
    #[serde(default)]
    pub categories: Vec<SourceCategory>,
    #[serde(default)]
    pub variations: Vec<i64>,
}

impl SourceProduct {
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.kind == ProductKind::Simple
    }

    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.kind == ProductKind::Variable
    }

    #[must_use]
    pub fn is_variation(&self) -> bool {
        self.kind == ProductKind::Variation
    }

    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        self.stock_status == StockStatus::InStock
    }

    /// Display price: the regular price, falling back to the sale price when
    /// the source sends no regular price at all.
    #[must_use]
    pub fn display_price(&self) -> &str {
        if self.regular_price.is_empty() {
            self.sale_price.as_deref().unwrap_or("")
        } else {
            &self.regular_price
        }
    }

    /// First image URL, if any.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(|i| i.src.as_str())
    }
}

/// The source serializes "no sale price" as an empty string.
fn empty_string_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => {
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
        Some(other) => Err(D::Error::custom(format!(
            "expected string or null for price, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_known_values() {
        for kind in [
            ProductKind::Simple,
            ProductKind::Variable,
            ProductKind::Variation,
        ] {
            assert_eq!(ProductKind::from_wire(kind.as_str()), kind);
        }
    }

    #[test]
    fn unknown_kind_falls_back_to_simple() {
        assert_eq!(ProductKind::from_wire("grouped"), ProductKind::Simple);
        assert_eq!(ProductKind::from_wire(""), ProductKind::Simple);
    }

    #[test]
    fn unknown_stock_status_is_out_of_stock() {
        assert_eq!(StockStatus::from_wire("whatever"), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_wire("instock"), StockStatus::InStock);
        assert_eq!(
            StockStatus::from_wire("onbackorder"),
            StockStatus::OnBackorder
        );
    }

    #[test]
    fn deserializes_source_payload() {
        let json = serde_json::json!({
            "id": 42,
            "type": "simple",
            "name": "Shirt",
            "permalink": "https://x/shirt",
            "regular_price": "10.00",
            "sale_price": "",
            "stock_status": "instock",
            "stock_quantity": 7,
            "images": [{"src": "https://x/s.jpg", "alt": "ignored"}],
            "attributes": [{"name": "Color", "options": ["Red", "Blue"]}],
            "categories": [{"name": "Shirts", "slug": "shirts"}],
        });
        let product: SourceProduct = serde_json::from_value(json).expect("deserialize");
        assert_eq!(product.id, 42);
        assert_eq!(product.kind, ProductKind::Simple);
        assert_eq!(product.parent_id, 0);
        assert_eq!(product.sale_price, None, "empty sale price becomes None");
        assert_eq!(product.stock_quantity, Some(7));
        assert_eq!(product.primary_image(), Some("https://x/s.jpg"));
        assert_eq!(product.attributes[0].value(), Some("Red"));
        assert!(product.variations.is_empty());
    }

    #[test]
    fn display_price_prefers_regular() {
        let product = SourceProduct {
            regular_price: "10.00".into(),
            sale_price: Some("8.00".into()),
            ..SourceProduct::default()
        };
        assert_eq!(product.display_price(), "10.00");

        let sale_only = SourceProduct {
            sale_price: Some("8.00".into()),
            ..SourceProduct::default()
        };
        assert_eq!(sale_only.display_price(), "8.00");
    }

    #[test]
    fn attribute_value_prefers_single_option() {
        let attr = SourceAttribute {
            name: "Color".into(),
            option: Some("Blue".into()),
            options: vec!["Red".into(), "Blue".into()],
        };
        assert_eq!(attr.value(), Some("Blue"));
    }

    #[test]
    fn feed_style_param_parsing() {
        assert_eq!(FeedStyle::from_param("standard"), Some(FeedStyle::Standard));
        assert_eq!(
            FeedStyle::from_param("christmas"),
            Some(FeedStyle::Christmas)
        );
        assert_eq!(FeedStyle::from_param("easter"), None);
    }
}
