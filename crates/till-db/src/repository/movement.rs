//! # Stock Movement Repository
//!
//! Append-only audit trail of stock deltas. One row per ledger adjustment,
//! written by the engines in the same transaction as the adjustment itself.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use till_core::StockMovement;

const MOVEMENT_COLUMNS: &str = "id, tenant_id, product_id, kind, quantity, \
     previous_stock, new_stock, reference_id, reference_type, notes, \
     created_by, location_id, created_at";

/// Repository for stock movement records.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Appends a movement inside the caller's transaction.
    pub async fn insert_tx(conn: &mut SqliteConnection, movement: &StockMovement) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, tenant_id, product_id, kind, quantity,
                previous_stock, new_stock, reference_id, reference_type,
                notes, created_by, location_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.tenant_id)
        .bind(&movement.product_id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(movement.previous_stock)
        .bind(movement.new_stock)
        .bind(&movement.reference_id)
        .bind(&movement.reference_type)
        .bind(&movement.notes)
        .bind(&movement.created_by)
        .bind(&movement.location_id)
        .bind(movement.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Returns a product's movements, newest first.
    pub async fn list_for_product(
        &self,
        tenant_id: &str,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE product_id = ?1 AND tenant_id = ?2 \
             ORDER BY created_at DESC, id DESC LIMIT ?3"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(product_id)
            .bind(tenant_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }

    /// Returns the movements caused by one order/purchase, oldest first.
    pub async fn list_for_reference(
        &self,
        tenant_id: &str,
        reference_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE reference_id = ?1 AND tenant_id = ?2 \
             ORDER BY created_at ASC, id ASC"
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(reference_id)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(movements)
    }
}
