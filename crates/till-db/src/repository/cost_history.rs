//! # Cost History Log
//!
//! Append-only per-product record of cost changes, tagged by source
//! (purchase, manual, system), plus the sibling sale-price log.
//!
//! ## Contract
//! - `record_tx` reads the product's current `cost` as `previous_cost`,
//!   appends an entry, and refreshes the product's cached `cost` column -
//!   all inside the caller's transaction.
//! - An entry is appended even when `new_cost` equals the current cost:
//!   the log is a literal audit trail, not a dedup index. Repeated
//!   purchases at the same price stay auditable events.
//! - Entries are never mutated or deleted. Reversals append compensating
//!   `SYSTEM` entries.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use till_core::{CostHistoryEntry, CostSource, PriceHistoryEntry};

/// Context for one cost history append.
///
/// `previous_cost` is not a field on purpose: the log reads it from the
/// product row inside the same transaction, so the chain of entries can
/// never skip or duplicate a link.
#[derive(Debug, Clone)]
pub struct NewCostEntry<'a> {
    pub tenant_id: &'a str,
    pub product_id: &'a str,
    pub new_cost: i64,
    pub source: CostSource,
    pub currency: &'a str,
    pub purchase_id: Option<&'a str>,
    pub supplier_id: Option<&'a str>,
    pub invoice_number: Option<&'a str>,
    pub reason: Option<&'a str>,
    pub created_by: Option<&'a str>,
}

/// Context for one price history append.
#[derive(Debug, Clone)]
pub struct NewPriceEntry<'a> {
    pub tenant_id: &'a str,
    pub product_id: &'a str,
    pub new_price: i64,
    pub source: CostSource,
    pub currency: &'a str,
    pub purchase_id: Option<&'a str>,
    pub reason: Option<&'a str>,
    pub created_by: Option<&'a str>,
}

/// The cost (and price) history log.
#[derive(Debug, Clone)]
pub struct CostHistoryLog {
    pool: SqlitePool,
}

impl CostHistoryLog {
    /// Creates a new CostHistoryLog.
    pub fn new(pool: SqlitePool) -> Self {
        CostHistoryLog { pool }
    }

    /// Appends a cost entry and refreshes the product's cached cost, inside
    /// the caller's transaction.
    pub async fn record_tx(
        conn: &mut SqliteConnection,
        entry: NewCostEntry<'_>,
    ) -> DbResult<CostHistoryEntry> {
        let now = Utc::now();

        // Current cost becomes previous_cost. Same transaction as the
        // append, so no other writer can slip a change in between.
        let previous_cost: Option<i64> =
            sqlx::query_scalar("SELECT cost FROM products WHERE id = ?1 AND tenant_id = ?2")
                .bind(entry.product_id)
                .bind(entry.tenant_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| DbError::not_found("Product", entry.product_id))?;

        let record = CostHistoryEntry {
            id: new_id(),
            tenant_id: entry.tenant_id.to_string(),
            product_id: entry.product_id.to_string(),
            source: entry.source,
            previous_cost,
            new_cost: entry.new_cost,
            currency: entry.currency.to_string(),
            purchase_id: entry.purchase_id.map(str::to_string),
            supplier_id: entry.supplier_id.map(str::to_string),
            invoice_number: entry.invoice_number.map(str::to_string),
            reason: entry.reason.map(str::to_string),
            created_by: entry.created_by.map(str::to_string),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO product_cost_history (
                id, tenant_id, product_id, source, previous_cost, new_cost,
                currency, purchase_id, supplier_id, invoice_number, reason,
                created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&record.id)
        .bind(&record.tenant_id)
        .bind(&record.product_id)
        .bind(record.source)
        .bind(record.previous_cost)
        .bind(record.new_cost)
        .bind(&record.currency)
        .bind(&record.purchase_id)
        .bind(&record.supplier_id)
        .bind(&record.invoice_number)
        .bind(&record.reason)
        .bind(&record.created_by)
        .bind(record.created_at)
        .execute(&mut *conn)
        .await?;

        sqlx::query("UPDATE products SET cost = ?3, updated_at = ?4 WHERE id = ?1 AND tenant_id = ?2")
            .bind(entry.product_id)
            .bind(entry.tenant_id)
            .bind(entry.new_cost)
            .bind(now)
            .execute(&mut *conn)
            .await?;

        debug!(
            product_id = %entry.product_id,
            previous = ?record.previous_cost,
            new = %record.new_cost,
            source = ?entry.source,
            "Cost recorded"
        );

        Ok(record)
    }

    /// Appends a sale-price entry and moves the product's `base_price`,
    /// inside the caller's transaction.
    pub async fn record_price_tx(
        conn: &mut SqliteConnection,
        entry: NewPriceEntry<'_>,
    ) -> DbResult<PriceHistoryEntry> {
        let now = Utc::now();

        let previous_price: i64 =
            sqlx::query_scalar("SELECT base_price FROM products WHERE id = ?1 AND tenant_id = ?2")
                .bind(entry.product_id)
                .bind(entry.tenant_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| DbError::not_found("Product", entry.product_id))?;

        let record = PriceHistoryEntry {
            id: new_id(),
            tenant_id: entry.tenant_id.to_string(),
            product_id: entry.product_id.to_string(),
            source: entry.source,
            previous_price: Some(previous_price),
            new_price: entry.new_price,
            currency: entry.currency.to_string(),
            purchase_id: entry.purchase_id.map(str::to_string),
            reason: entry.reason.map(str::to_string),
            created_by: entry.created_by.map(str::to_string),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO product_price_history (
                id, tenant_id, product_id, source, previous_price, new_price,
                currency, purchase_id, reason, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&record.id)
        .bind(&record.tenant_id)
        .bind(&record.product_id)
        .bind(record.source)
        .bind(record.previous_price)
        .bind(record.new_price)
        .bind(&record.currency)
        .bind(&record.purchase_id)
        .bind(&record.reason)
        .bind(&record.created_by)
        .bind(record.created_at)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "UPDATE products SET base_price = ?3, updated_at = ?4 WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(entry.product_id)
        .bind(entry.tenant_id)
        .bind(entry.new_price)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(record)
    }

    /// Returns a product's cost entries, newest first.
    pub async fn history(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<CostHistoryEntry>> {
        let entries = sqlx::query_as::<_, CostHistoryEntry>(
            r#"
            SELECT id, tenant_id, product_id, source, previous_cost, new_cost,
                   currency, purchase_id, supplier_id, invoice_number, reason,
                   created_by, created_at
            FROM product_cost_history
            WHERE product_id = ?1 AND tenant_id = ?2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(product_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Returns the `new_cost` of the most recent entry, if any.
    ///
    /// Equal to the product's cached `cost` column by construction.
    pub async fn current(&self, tenant_id: &str, product_id: &str) -> DbResult<Option<i64>> {
        let cost: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT new_cost
            FROM product_cost_history
            WHERE product_id = ?1 AND tenant_id = ?2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cost)
    }

    /// Returns a product's price entries, newest first.
    pub async fn price_history(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> DbResult<Vec<PriceHistoryEntry>> {
        let entries = sqlx::query_as::<_, PriceHistoryEntry>(
            r#"
            SELECT id, tenant_id, product_id, source, previous_price, new_price,
                   currency, purchase_id, reason, created_by, created_at
            FROM product_price_history
            WHERE product_id = ?1 AND tenant_id = ?2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(product_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Fetches the cost entries written by one purchase, inside the caller's
    /// transaction. Used to build compensating entries on cancellation.
    pub async fn entries_for_purchase_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        purchase_id: &str,
    ) -> DbResult<Vec<CostHistoryEntry>> {
        let entries = sqlx::query_as::<_, CostHistoryEntry>(
            r#"
            SELECT id, tenant_id, product_id, source, previous_cost, new_cost,
                   currency, purchase_id, supplier_id, invoice_number, reason,
                   created_by, created_at
            FROM product_cost_history
            WHERE purchase_id = ?1 AND tenant_id = ?2
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(purchase_id)
        .bind(tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(entries)
    }
}
