//! # Void Engine
//!
//! Reverses a completed sale: restores stock for every line and marks the
//! order cancelled. Voiding is a status transition, never a delete; the
//! original totals stay available for reporting.
//!
//! ## Idempotence
//! The COMPLETED → CANCELLED flip is a guarded update and runs *first* in
//! the transaction. A concurrent or repeated void finds zero affected rows
//! and stops with `AlreadyVoided` before touching stock, so stock is
//! restored exactly once.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::engine::{retry_contention, LedgerConfig};
use crate::error::{DbError, LedgerResult};
use crate::repository::movement::MovementRepository;
use crate::repository::new_id;
use crate::repository::order::OrderRepository;
use crate::repository::product::ProductRepository;
use crate::repository::stock::StockLedger;
use till_core::{CoreError, MovementKind, Order, StockMovement};

/// Input for [`VoidEngine::void_sale`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoidRequest {
    pub order_id: String,
    /// Operator-supplied reason, recorded on the order.
    #[serde(default)]
    pub reason: Option<String>,
    /// Operator performing the void, recorded on the audit trail.
    #[serde(default)]
    pub actor: Option<String>,
}

/// The void engine.
#[derive(Debug, Clone)]
pub struct VoidEngine {
    pool: SqlitePool,
    config: LedgerConfig,
}

impl VoidEngine {
    /// Creates a new VoidEngine.
    pub fn new(pool: SqlitePool, config: LedgerConfig) -> Self {
        VoidEngine { pool, config }
    }

    /// Voids a completed sale and returns the updated order.
    ///
    /// ## Stock Restoration
    /// Every line with a live, stock-tracked product is restored with
    /// `allow_negative = true` - putting units back must never fail a floor
    /// check. Lines whose product is gone (null reference or hard-deleted)
    /// are skipped for restoration but still counted in the log.
    pub async fn void_sale(&self, request: &VoidRequest) -> LedgerResult<Order> {
        retry_contention(|| self.void_tx(request)).await
    }

    async fn void_tx(&self, request: &VoidRequest) -> LedgerResult<Order> {
        let tenant_id = &self.config.tenant_id;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let flipped = OrderRepository::mark_voided_tx(
            &mut tx,
            tenant_id,
            &request.order_id,
            request.reason.as_deref(),
        )
        .await?;

        if !flipped {
            // Zero rows: the order is missing or not COMPLETED.
            return match OrderRepository::get_by_id_tx(&mut tx, tenant_id, &request.order_id)
                .await?
            {
                None => Err(CoreError::OrderNotFound(request.order_id.clone()).into()),
                Some(_) => Err(CoreError::AlreadyVoided {
                    order_id: request.order_id.clone(),
                }
                .into()),
            };
        }

        let items = OrderRepository::get_items_tx(&mut tx, &request.order_id).await?;

        let mut restored: usize = 0;
        let mut skipped: usize = 0;
        for item in &items {
            let Some(product_id) = item.product_id.as_deref() else {
                skipped += 1;
                continue;
            };
            let Some(product) =
                ProductRepository::get_by_id_tx(&mut tx, tenant_id, product_id).await?
            else {
                skipped += 1;
                continue;
            };
            if !product.track_stock {
                continue;
            }

            let change =
                StockLedger::adjust(&mut tx, tenant_id, product_id, item.quantity, true).await?;

            let movement = StockMovement {
                id: new_id(),
                tenant_id: tenant_id.clone(),
                product_id: product_id.to_string(),
                kind: MovementKind::Void,
                quantity: item.quantity,
                previous_stock: change.previous,
                new_stock: change.new,
                reference_id: Some(request.order_id.clone()),
                reference_type: Some("order_void".to_string()),
                notes: request.reason.clone(),
                created_by: request.actor.clone(),
                location_id: None,
                created_at: now,
            };
            MovementRepository::insert_tx(&mut tx, &movement).await?;

            restored += 1;
        }

        let order = OrderRepository::get_by_id_tx(&mut tx, tenant_id, &request.order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(request.order_id.clone()))?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %request.order_id,
            restored,
            skipped,
            "Sale voided"
        );

        Ok(order)
    }
}
