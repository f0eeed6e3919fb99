//! Product catalog models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use almacen_core::{ProductId, ProductStatus};

/// A catalog product as exposed to clients.
///
/// The image blob is never inlined in listings; `has_image` tells clients
/// whether the binary image endpoint will return anything.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub stock: i32,
    pub status: ProductStatus,
    pub barcode: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub has_image: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a product an order transaction needs: current price, name,
/// status and stock, read fresh inside the transaction.
#[derive(Debug, Clone)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub status: ProductStatus,
    pub stock: i32,
}

/// Partial update for a product.
///
/// Each field is applied only when present; absent fields leave the stored
/// value untouched. Stock is deliberately not patchable here - stock changes
/// go through the stock adjustment flow so alerting stays uniform.
///
/// `image` accepts a `data:` URL to set the image, or an empty string to
/// clear it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub status: Option<ProductStatus>,
    pub barcode: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl ProductPatch {
    /// True when no field is present, i.e. there is nothing to update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.original_price.is_none()
            && self.status.is_none()
            && self.barcode.is_none()
            && self.category.is_none()
            && self.subcategory.is_none()
            && self.description.is_none()
            && self.image.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_is_detected() {
        assert!(ProductPatch::default().is_empty());

        let patch = ProductPatch {
            price: Some(Decimal::new(999, 2)),
            ..ProductPatch::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn patch_deserializes_with_missing_fields() {
        let patch: ProductPatch =
            serde_json::from_str(r#"{"name":"Yerba 1kg","price":"320.00"}"#).expect("parse");
        assert_eq!(patch.name.as_deref(), Some("Yerba 1kg"));
        assert_eq!(patch.price, Some(Decimal::new(32000, 2)));
        assert!(patch.status.is_none());
    }
}
