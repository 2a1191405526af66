//! Product catalog sync engine.
//!
//! A cycle runs top to bottom with no partial resume:
//!
//! 1. **Pull**: every remote product is upserted locally, matched solely by
//!    remote id. Remote values always overwrite local ones.
//! 2. **Push**: every local product that is unlinked or edited since its last
//!    push is created (no remote id) or updated (linked) remotely.
//!
//! Per-record push failures are logged and skipped. Anything else aborts the
//! cycle; writes already committed stay committed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::db::DbState;
use crate::error::{RemoteError, SyncError};
use crate::models::Product;

/// Name sent for products saved without one.
pub const FALLBACK_PRODUCT_NAME: &str = "Producto sin nombre";

/// Remote operations the sync engine needs.
#[async_trait]
pub trait CatalogRemote: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>, RemoteError>;

    async fn create_product(
        &self,
        product: &Product,
        image_path: Option<&str>,
    ) -> Result<Product, RemoteError>;

    async fn update_product(
        &self,
        product: &Product,
        image_path: Option<&str>,
    ) -> Result<Product, RemoteError>;
}

#[async_trait]
impl CatalogRemote for ApiClient {
    async fn list_products(&self) -> Result<Vec<Product>, RemoteError> {
        self.get_products().await
    }

    async fn create_product(
        &self,
        product: &Product,
        image_path: Option<&str>,
    ) -> Result<Product, RemoteError> {
        ApiClient::create_product(self, product, image_path).await
    }

    async fn update_product(
        &self,
        product: &Product,
        image_path: Option<&str>,
    ) -> Result<Product, RemoteError> {
        ApiClient::update_product(self, product, image_path).await
    }
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub pulled_inserted: usize,
    pub pulled_updated: usize,
    pub pushed_created: usize,
    pub pushed_updated: usize,
    pub push_failed: usize,
}

enum PushOutcome {
    Created,
    Updated,
}

/// Clears the running flag when a cycle ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncService<R> {
    db: Arc<DbState>,
    remote: R,
    is_running: AtomicBool,
    last_sync: Mutex<Option<DateTime<Utc>>>,
}

impl<R: CatalogRemote> SyncService<R> {
    pub fn new(db: Arc<DbState>, remote: R) -> Self {
        Self {
            db,
            remote,
            is_running: AtomicBool::new(false),
            last_sync: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Completion time of the last successful cycle.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync.lock().ok().and_then(|guard| *guard)
    }

    /// Run a full pull-then-push cycle.
    pub async fn sync_all(&self) -> Result<SyncReport, SyncError> {
        if self
            .is_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Sync requested while another cycle is running");
            return Err(SyncError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.is_running);

        info!("Sync cycle started");
        let mut report = SyncReport::default();
        let result: Result<(), SyncError> = async {
            self.pull_products(&mut report).await?;
            self.push_products(&mut report).await
        }
        .await;

        match result {
            Ok(()) => {
                if let Ok(mut last) = self.last_sync.lock() {
                    *last = Some(Utc::now());
                }
                info!(
                    pulled_inserted = report.pulled_inserted,
                    pulled_updated = report.pulled_updated,
                    pushed_created = report.pushed_created,
                    pushed_updated = report.pushed_updated,
                    push_failed = report.push_failed,
                    "Sync cycle completed"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Sync cycle aborted");
                Err(e)
            }
        }
    }

    /// Single success flag for UI callers.
    pub async fn sync_all_data(&self) -> bool {
        self.sync_all().await.is_ok()
    }

    /// Upsert every remote product by remote id.
    pub async fn pull_products(&self, report: &mut SyncReport) -> Result<(), SyncError> {
        let remote_products = self.remote.list_products().await?;
        debug!("Pulled {} remote products", remote_products.len());

        for remote in remote_products {
            let Some(remote_id) = remote.remote_id else {
                warn!(name = %remote.name, "Remote product without id, skipping");
                continue;
            };

            match self.db.find_product_by_remote_id(remote_id)? {
                None => {
                    let mut product = remote;
                    product.id = 0;
                    product.category = None;
                    product.synced = true;
                    product.last_sync_at = Some(Utc::now());
                    self.db.save_product(&mut product)?;
                    debug!(remote_id, id = product.id, "Inserted remote product locally");
                    report.pulled_inserted += 1;
                }
                Some(mut local) => {
                    local.name = remote.name;
                    local.description = remote.description;
                    local.price = remote.price;
                    local.image_url = remote.image_url;
                    local.category_id = remote.category_id;
                    local.is_available = remote.is_available;
                    local.stock_quantity = remote.stock_quantity;
                    local.synced = true;
                    local.last_sync_at = Some(Utc::now());
                    self.db.save_product(&mut local)?;
                    debug!(remote_id, id = local.id, "Applied remote product");
                    report.pulled_updated += 1;
                }
            }
        }
        Ok(())
    }

    /// Push unlinked and locally edited products. Record-level failures are
    /// logged and counted; the loop moves on.
    pub async fn push_products(&self, report: &mut SyncReport) -> Result<(), SyncError> {
        let pending: Vec<Product> = self
            .db
            .get_products()?
            .into_iter()
            .filter(Product::needs_push)
            .collect();
        debug!("{} products pending push", pending.len());

        for mut product in pending {
            match self.push_one(&mut product).await {
                Ok(PushOutcome::Created) => report.pushed_created += 1,
                Ok(PushOutcome::Updated) => report.pushed_updated += 1,
                Err(e) => {
                    warn!(
                        id = product.id,
                        name = %product.name,
                        error = %e,
                        "Failed to push product, continuing"
                    );
                    report.push_failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn push_one(&self, product: &mut Product) -> Result<PushOutcome, SyncError> {
        let mut outgoing = product.clone();
        if outgoing.name.trim().is_empty() {
            outgoing.name = FALLBACK_PRODUCT_NAME.to_string();
        }
        let image_path = Some(product.image_url.as_str()).filter(|p| !p.trim().is_empty());

        let outcome = if !product.is_linked() {
            let created = self.remote.create_product(&outgoing, image_path).await?;
            let remote_id = created.remote_id.ok_or_else(|| {
                RemoteError::InvalidResponse("created product has no id".to_string())
            })?;
            product.remote_id = Some(remote_id);
            if !created.image_url.is_empty() {
                product.image_url = created.image_url;
            }
            PushOutcome::Created
        } else {
            let updated = self.remote.update_product(&outgoing, image_path).await?;
            if !updated.image_url.is_empty() {
                product.image_url = updated.image_url;
            }
            PushOutcome::Updated
        };

        product.synced = true;
        product.last_sync_at = Some(Utc::now());
        self.db.save_product(product)?;
        debug!(id = product.id, remote_id = ?product.remote_id, "Pushed product");
        Ok(outcome)
    }
}
