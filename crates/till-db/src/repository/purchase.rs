//! # Purchase Repository
//!
//! Database operations for supplier invoices and their lines.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::{Purchase, PurchaseItem};

const PURCHASE_COLUMNS: &str = "id, tenant_id, supplier_id, invoice_number, status, \
     total_amount, invoice_photo, notes, cancel_reason, created_by, \
     purchased_at, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, purchase_id, product_id, product_name, quantity, \
     purchase_price, previous_stock, new_stock, created_at";

/// Repository for purchase database operations.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Gets a purchase by ID.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Purchase>> {
        let sql =
            format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?1 AND tenant_id = ?2");
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(purchase)
    }

    /// Gets all lines of a purchase (product lines and extra charges), in
    /// insertion order.
    pub async fn get_items(&self, purchase_id: &str) -> DbResult<Vec<PurchaseItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM purchase_items WHERE purchase_id = ?1 \
             ORDER BY created_at, id"
        );
        let items = sqlx::query_as::<_, PurchaseItem>(&sql)
            .bind(purchase_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Lists a tenant's purchases, newest first.
    pub async fn list(&self, tenant_id: &str, limit: u32, offset: u32) -> DbResult<Vec<Purchase>> {
        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE tenant_id = ?1 \
             ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
        );
        let purchases = sqlx::query_as::<_, Purchase>(&sql)
            .bind(tenant_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(purchases)
    }

    /// Fetches a purchase inside the caller's transaction.
    pub async fn get_by_id_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
    ) -> DbResult<Option<Purchase>> {
        let sql =
            format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = ?1 AND tenant_id = ?2");
        let purchase = sqlx::query_as::<_, Purchase>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(purchase)
    }

    /// Fetches a purchase's lines inside the caller's transaction.
    pub async fn get_items_tx(
        conn: &mut SqliteConnection,
        purchase_id: &str,
    ) -> DbResult<Vec<PurchaseItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM purchase_items WHERE purchase_id = ?1 \
             ORDER BY created_at, id"
        );
        let items = sqlx::query_as::<_, PurchaseItem>(&sql)
            .bind(purchase_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(items)
    }

    /// Inserts a purchase header inside the caller's transaction.
    pub async fn insert_tx(conn: &mut SqliteConnection, purchase: &Purchase) -> DbResult<()> {
        debug!(id = %purchase.id, invoice = ?purchase.invoice_number, "Inserting purchase");

        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, tenant_id, supplier_id, invoice_number, status,
                total_amount, invoice_photo, notes, cancel_reason, created_by,
                purchased_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.tenant_id)
        .bind(&purchase.supplier_id)
        .bind(&purchase.invoice_number)
        .bind(purchase.status)
        .bind(purchase.total_amount)
        .bind(&purchase.invoice_photo)
        .bind(&purchase.notes)
        .bind(&purchase.cancel_reason)
        .bind(&purchase.created_by)
        .bind(purchase.purchased_at)
        .bind(purchase.created_at)
        .bind(purchase.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts a purchase line inside the caller's transaction.
    pub async fn insert_item_tx(conn: &mut SqliteConnection, item: &PurchaseItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_items (
                id, purchase_id, product_id, product_name, quantity,
                purchase_price, previous_stock, new_stock, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.purchase_id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.purchase_price)
        .bind(item.previous_stock)
        .bind(item.new_stock)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Flips a completed purchase to cancelled, inside the caller's
    /// transaction.
    ///
    /// Guarded on `status = 'COMPLETED'`: cancelling a draft or an already
    /// cancelled purchase finds zero rows, and stock is never reversed twice.
    pub async fn mark_cancelled_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
        reason: Option<&str>,
        cancelled_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE purchases
            SET status = 'CANCELLED', cancel_reason = ?3, updated_at = ?4
            WHERE id = ?1 AND tenant_id = ?2 AND status = 'COMPLETED'
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(reason)
        .bind(cancelled_at)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
