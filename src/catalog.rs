//! Product form operations and catalog browsing.
//!
//! Every local edit clears `synced` so the next sync pushes it.

use tracing::{debug, info};

use crate::db::DbState;
use crate::error::StoreError;
use crate::files::ImageStore;
use crate::models::Product;

/// Save a product entered through the "new product" form.
pub fn create_product(db: &DbState, product: &mut Product) -> Result<i64, StoreError> {
    product.id = 0;
    product.remote_id = None;
    product.synced = false;
    product.last_sync_at = None;
    let id = db.save_product(product)?;
    info!(product_id = id, name = %product.name, "Product created");
    Ok(id)
}

/// Save an edit to an existing product. Returns `false` when the product
/// has never been stored locally.
pub fn update_product(db: &DbState, product: &mut Product) -> Result<bool, StoreError> {
    if product.id == 0 || db.get_product(product.id)?.is_none() {
        return Ok(false);
    }
    product.synced = false;
    db.save_product(product)?;
    debug!(product_id = product.id, remote_id = ?product.remote_id, "Product edited");
    Ok(true)
}

/// Local-only delete. An image kept in `images` is removed with the row.
pub fn delete_product(
    db: &DbState,
    images: Option<&ImageStore>,
    product: &Product,
) -> Result<usize, StoreError> {
    let deleted = db.delete_product(product)?;
    if deleted > 0 {
        if let Some(store) = images {
            if store.contains(&product.image_url) {
                store.delete_image(std::path::Path::new(&product.image_url));
            }
        }
        info!(product_id = product.id, "Product deleted");
    }
    Ok(deleted)
}

pub fn products_in_category(db: &DbState, category_id: i64) -> Result<Vec<Product>, StoreError> {
    db.get_products_by_category(category_id)
}

/// `(id, name)` pairs for category pickers.
pub fn category_names(db: &DbState) -> Result<Vec<(i64, String)>, StoreError> {
    Ok(db
        .get_categories()?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect())
}
