//! # Inventory Service
//!
//! Manual operator corrections, routed through the same contracts as the
//! automated flows: stock moves only via the stock ledger, cost only via
//! the cost history log.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::engine::{retry_contention, LedgerConfig};
use crate::error::{DbError, LedgerResult};
use crate::repository::cost_history::{CostHistoryLog, NewCostEntry};
use crate::repository::movement::MovementRepository;
use crate::repository::new_id;
use crate::repository::product::ProductRepository;
use crate::repository::stock::{StockChange, StockLedger};
use till_core::validation::validate_amount;
use till_core::{
    CoreError, CostHistoryEntry, CostSource, MovementKind, StockMovement, ValidationError,
};

/// Input for [`Inventory::adjust_stock`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustmentRequest {
    pub product_id: String,
    /// Signed correction. Decrements respect the zero floor; a manual
    /// adjustment cannot push a tracked product negative.
    pub delta: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Input for [`Inventory::set_cost`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetCostRequest {
    pub product_id: String,
    pub new_cost: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Manual inventory operations.
#[derive(Debug, Clone)]
pub struct Inventory {
    pool: SqlitePool,
    config: LedgerConfig,
}

impl Inventory {
    /// Creates a new Inventory service.
    pub fn new(pool: SqlitePool, config: LedgerConfig) -> Self {
        Inventory { pool, config }
    }

    /// Applies a manual stock correction and records an `ADJUST` movement.
    pub async fn adjust_stock(&self, request: &StockAdjustmentRequest) -> LedgerResult<StockChange> {
        if request.delta == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "delta".to_string(),
                reason: "must not be zero".to_string(),
            }
            .into());
        }
        retry_contention(|| self.adjust_stock_tx(request)).await
    }

    async fn adjust_stock_tx(&self, request: &StockAdjustmentRequest) -> LedgerResult<StockChange> {
        let tenant_id = &self.config.tenant_id;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let change =
            StockLedger::adjust(&mut tx, tenant_id, &request.product_id, request.delta, false)
                .await?;

        if change.moved() {
            let movement = StockMovement {
                id: new_id(),
                tenant_id: tenant_id.clone(),
                product_id: request.product_id.clone(),
                kind: MovementKind::Adjust,
                quantity: request.delta,
                previous_stock: change.previous,
                new_stock: change.new,
                reference_id: None,
                reference_type: Some("manual".to_string()),
                notes: request.reason.clone(),
                created_by: request.actor.clone(),
                location_id: None,
                created_at: now,
            };
            MovementRepository::insert_tx(&mut tx, &movement).await?;
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            product_id = %request.product_id,
            delta = %request.delta,
            new_stock = %change.new,
            "Stock adjusted manually"
        );

        Ok(change)
    }

    /// Sets a product's cost by hand.
    ///
    /// Appends a `MANUAL` cost history entry; an edit to the same value is
    /// a no-op and returns `None` (unlike purchase ingestion with an
    /// explicit cost, which always records).
    pub async fn set_cost(
        &self,
        request: &SetCostRequest,
    ) -> LedgerResult<Option<CostHistoryEntry>> {
        validate_amount("cost", request.new_cost)?;
        retry_contention(|| self.set_cost_tx(request)).await
    }

    async fn set_cost_tx(
        &self,
        request: &SetCostRequest,
    ) -> LedgerResult<Option<CostHistoryEntry>> {
        let tenant_id = &self.config.tenant_id;

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let product = ProductRepository::get_by_id_tx(&mut tx, tenant_id, &request.product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(request.product_id.clone()))?;

        if product.cost == Some(request.new_cost) {
            return Ok(None);
        }

        let entry = CostHistoryLog::record_tx(
            &mut tx,
            NewCostEntry {
                tenant_id,
                product_id: &request.product_id,
                new_cost: request.new_cost,
                source: CostSource::Manual,
                currency: &self.config.currency,
                purchase_id: None,
                supplier_id: None,
                invoice_number: None,
                reason: request.reason.as_deref().or(Some("Manual cost adjustment")),
                created_by: request.actor.as_deref(),
            },
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            product_id = %request.product_id,
            previous = ?entry.previous_cost,
            new = %entry.new_cost,
            "Cost set manually"
        );

        Ok(Some(entry))
    }
}
