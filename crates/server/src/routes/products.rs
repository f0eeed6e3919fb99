//! Catalog route handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, patch},
};
use base64::Engine;
use rust_decimal::Decimal;

use almacen_core::ProductId;

use crate::db;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{Product, ProductPatch};
use crate::state::AppState;

/// Build the catalog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(list_active))
        .route("/api/products/all", get(list_all))
        .route("/api/products/{id}", patch(update_product))
        .route("/api/products/{id}/image", get(product_image))
}

/// Active products, visible without authentication.
async fn list_active(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    let products = db::products::list_active(state.pool()).await?;
    Ok(Json(products))
}

/// Full catalog for the staff dashboard.
async fn list_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Product>>, AppError> {
    user.require_staff()?;
    let products = db::products::list_all(state.pool()).await?;
    Ok(Json(products))
}

/// Product image bytes, served with the stored MIME type. Public so plain
/// `<img src>` tags work.
async fn product_image(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let Some((bytes, mime)) = db::products::get_image(state.pool(), ProductId::new(id)).await?
    else {
        return Err(AppError::NotFound(format!("product {id} has no image")));
    };

    Ok((
        [
            (header::CONTENT_TYPE, mime),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    ))
}

/// Apply a partial product update.
async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>, AppError> {
    user.require_staff()?;

    if patch.is_empty() {
        return Err(AppError::BadRequest("nothing to update".to_string()));
    }
    validate_patch(&patch)?;

    let id = ProductId::new(id);
    let name = patch.name.as_deref().map(str::trim);

    let has_scalar_change = name.is_some()
        || patch.price.is_some()
        || patch.original_price.is_some()
        || patch.status.is_some()
        || patch.barcode.is_some()
        || patch.category.is_some()
        || patch.subcategory.is_some()
        || patch.description.is_some();

    if has_scalar_change {
        db::products::update_fields(
            state.pool(),
            id,
            name,
            patch.price,
            patch.original_price,
            patch.status,
            patch.barcode.as_deref(),
            patch.category.as_deref(),
            patch.subcategory.as_deref(),
            patch.description.as_deref(),
        )
        .await?;
    }

    match patch.image.as_deref() {
        None => {}
        Some("") => {
            db::products::clear_image(state.pool(), id).await?;
        }
        Some(data_url) => {
            let (mime, bytes) = parse_data_url(data_url)
                .ok_or_else(|| AppError::BadRequest("invalid image data URL".to_string()))?;
            db::products::set_image(state.pool(), id, &bytes, &mime).await?;
        }
    }

    let product = db::products::get(state.pool(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(Json(product))
}

fn validate_patch(patch: &ProductPatch) -> Result<(), AppError> {
    if let Some(name) = patch.name.as_deref()
        && name.trim().len() < 2
    {
        return Err(AppError::BadRequest(
            "product name must be at least 2 characters".to_string(),
        ));
    }
    for price in [patch.price, patch.original_price].into_iter().flatten() {
        if price < Decimal::ZERO {
            return Err(AppError::BadRequest("price cannot be negative".to_string()));
        }
    }
    if let Some(barcode) = patch.barcode.as_deref()
        && barcode.trim().is_empty()
    {
        return Err(AppError::BadRequest("barcode cannot be empty".to_string()));
    }
    Ok(())
}

/// Parse a `data:<mime>;base64,<payload>` URL into MIME type and bytes.
fn parse_data_url(input: &str) -> Option<(String, Vec<u8>)> {
    let rest = input.strip_prefix("data:")?;
    let (mime, encoded) = rest.split_once(";base64,")?;
    if mime.is_empty() {
        return None;
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    (!bytes.is_empty()).then(|| (mime.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_parses() {
        let (mime, bytes) = parse_data_url("data:image/png;base64,aGVsbG8=").expect("parse");
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(parse_data_url("not-a-data-url").is_none());
        assert!(parse_data_url("data:;base64,aGVsbG8=").is_none());
        assert!(parse_data_url("data:image/png;base64,!!!").is_none());
        assert!(parse_data_url("data:image/png;base64,").is_none());
    }

    #[test]
    fn patch_validation() {
        let patch = ProductPatch {
            name: Some("x".to_string()),
            ..ProductPatch::default()
        };
        assert!(validate_patch(&patch).is_err());

        let patch = ProductPatch {
            price: Some(Decimal::new(-100, 2)),
            ..ProductPatch::default()
        };
        assert!(validate_patch(&patch).is_err());

        let patch = ProductPatch {
            name: Some("Yerba 1kg".to_string()),
            price: Some(Decimal::new(32000, 2)),
            ..ProductPatch::default()
        };
        assert!(validate_patch(&patch).is_ok());
    }
}
