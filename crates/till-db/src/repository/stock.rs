//! # Stock Ledger
//!
//! Atomic increment/decrement of a product's on-hand quantity, with the
//! zero floor for stock-tracked products. Every stock mutation in the
//! system goes through [`StockLedger::adjust`]; no other code writes the
//! `stock` column.
//!
//! ## The Guarded Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ❌ RACY: read-then-write                                               │
//! │     let stock = SELECT stock ...          ← cashier B reads the same   │
//! │     if stock >= qty { UPDATE stock = .. } ← both pass, stock goes < 0  │
//! │                                                                         │
//! │  ✅ ATOMIC: single conditional update                                   │
//! │     UPDATE products SET stock = stock + delta                          │
//! │     WHERE ... AND (allow_negative OR stock + delta >= 0)               │
//! │     RETURNING stock                                                    │
//! │                                                                         │
//! │  Two concurrent decrements of the last unit serialize on the row;      │
//! │  exactly one matches the guard, the other gets InsufficientStock.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger runs inside the *caller's* transaction and has no side
//! effects beyond the counter: movement/audit rows are the engines' job.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use till_core::CoreError;

/// Before/after snapshot of one stock adjustment.
///
/// Captured atomically with the update itself; engines copy it into the
/// order/purchase item rows for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub previous: i64,
    pub new: i64,
}

impl StockChange {
    /// Whether the adjustment actually moved the counter.
    #[inline]
    pub fn moved(&self) -> bool {
        self.previous != self.new
    }
}

/// The stock ledger. Stateless; all methods operate on the caller's open
/// transaction.
pub struct StockLedger;

impl StockLedger {
    /// Applies `delta` (positive or negative) to a product's stock.
    ///
    /// ## Contract
    /// - Runs inside the caller's transaction; rolls back with it.
    /// - Fails with `InsufficientStock` if the product is stock-tracked,
    ///   `allow_negative` is false, and the result would be negative.
    /// - Products with `track_stock = false` are left untouched; the
    ///   returned snapshot reports the current counter twice.
    /// - Fails with `ProductNotFound` for a missing id or foreign tenant.
    ///
    /// The floor check and the write are one statement. The follow-up
    /// SELECT below only classifies a zero-row outcome for error reporting;
    /// it is not part of the decision.
    pub async fn adjust(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        product_id: &str,
        delta: i64,
        allow_negative: bool,
    ) -> LedgerResult<StockChange> {
        let now = Utc::now();

        let updated: Option<(i64,)> = sqlx::query_as(
            r#"
            UPDATE products
            SET stock = stock + ?4, updated_at = ?5
            WHERE id = ?1 AND tenant_id = ?2 AND track_stock = 1
              AND (?3 = 1 OR stock + ?4 >= 0)
            RETURNING stock
            "#,
        )
        .bind(product_id)
        .bind(tenant_id)
        .bind(allow_negative)
        .bind(delta)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await
        .map_err(crate::error::DbError::from)?;

        if let Some((new,)) = updated {
            debug!(product_id = %product_id, delta = %delta, new_stock = %new, "Stock adjusted");
            return Ok(StockChange {
                previous: new - delta,
                new,
            });
        }

        // Zero rows: missing product, untracked product, or floor hit.
        let row: Option<(String, i64, bool)> = sqlx::query_as(
            "SELECT name, stock, track_stock FROM products WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(product_id)
        .bind(tenant_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(crate::error::DbError::from)?;

        match row {
            None => Err(LedgerError::Core(CoreError::ProductNotFound(
                product_id.to_string(),
            ))),
            Some((_, stock, false)) => Ok(StockChange {
                previous: stock,
                new: stock,
            }),
            Some((name, stock, true)) => Err(LedgerError::Core(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                name,
                requested: -delta,
                available: stock,
            })),
        }
    }
}
