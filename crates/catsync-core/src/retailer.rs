//! Retailer-id, group-id, and availability policy.
//!
//! This module is the single place these values are computed. The bulk
//! replication path, the event processor, and the feed generator all call
//! through here so the same source row always maps to the same ad-catalog
//! row no matter which path reached it.

use crate::product::{ProductKind, SourceProduct, StockStatus};

pub const AVAILABILITY_IN_STOCK: &str = "in stock";
pub const AVAILABILITY_PREORDER: &str = "preorder";
pub const AVAILABILITY_OUT_OF_STOCK: &str = "out of stock";

/// Stable external id for one replicable item.
///
/// The `_main` suffix on variable parents keeps the parent's id from
/// colliding with its own group id.
#[must_use]
pub fn retailer_id(kind: ProductKind, id: i64) -> String {
    match kind {
        ProductKind::Simple | ProductKind::Variation => format!("wc_{id}"),
        ProductKind::Variable => format!("wc_{id}_main"),
    }
}

#[must_use]
pub fn retailer_id_for(product: &SourceProduct) -> String {
    retailer_id(product.kind, product.id)
}

/// Group id shared by sibling variations. Simple products have none.
#[must_use]
pub fn group_id(product: &SourceProduct) -> Option<String> {
    match product.kind {
        ProductKind::Variation => Some(format!("wc_{}", product.parent_id)),
        ProductKind::Variable => Some(format!("wc_{}", product.id)),
        ProductKind::Simple => None,
    }
}

/// Maps source stock status onto the ad-catalog availability vocabulary.
#[must_use]
pub fn availability(status: StockStatus) -> &'static str {
    match status {
        StockStatus::InStock => AVAILABILITY_IN_STOCK,
        StockStatus::OnBackorder => AVAILABILITY_PREORDER,
        StockStatus::OutOfStock => AVAILABILITY_OUT_OF_STOCK,
    }
}

/// Inventory reported downstream. An out-of-stock product always reports 0,
/// never an absent quantity.
#[must_use]
pub fn inventory(product: &SourceProduct) -> Option<i64> {
    if product.stock_status == StockStatus::OutOfStock {
        Some(0)
    } else {
        product.stock_quantity
    }
}
