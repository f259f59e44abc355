//! # Order Repository
//!
//! Database operations for orders and order items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE (sale engine, one transaction)                              │
//! │     └── header + all items + stock decrements land together            │
//! │         status: COMPLETED, payment_status: PAID                        │
//! │                                                                         │
//! │  2. (OPTIONAL) VOID (void engine, one transaction)                     │
//! │     └── guarded flip COMPLETED → CANCELLED, stock restored             │
//! │         payment_status: VOIDED; the row is never deleted               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::{Order, OrderItem};

const ORDER_COLUMNS: &str = "id, tenant_id, order_number, status, payment_method, \
     payment_status, subtotal, total, amount_paid, customer_id, pos_session_id, \
     location_id, void_reason, created_at, completed_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, \
     unit_price, subtotal, previous_stock, new_stock, created_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by ID.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1 AND tenant_id = ?2");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets all items for an order, in insertion order.
    pub async fn get_items(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY created_at, id"
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Fetches an order inside the caller's transaction.
    pub async fn get_by_id_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
    ) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1 AND tenant_id = ?2");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(order)
    }

    /// Fetches an order's items inside the caller's transaction.
    pub async fn get_items_tx(
        conn: &mut SqliteConnection,
        order_id: &str,
    ) -> DbResult<Vec<OrderItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY created_at, id"
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(items)
    }

    /// Counts a tenant's orders inside the caller's transaction.
    ///
    /// Orders are never deleted, so the count is monotonic and the derived
    /// `POS-%05d` numbers never collide.
    pub async fn count_tx(conn: &mut SqliteConnection, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE tenant_id = ?1")
            .bind(tenant_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }

    /// Inserts an order header inside the caller's transaction.
    pub async fn insert_tx(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, order_number = %order.order_number, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, tenant_id, order_number, status, payment_method,
                payment_status, subtotal, total, amount_paid, customer_id,
                pos_session_id, location_id, void_reason, created_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&order.id)
        .bind(&order.tenant_id)
        .bind(&order.order_number)
        .bind(order.status)
        .bind(order.payment_method)
        .bind(order.payment_status)
        .bind(order.subtotal)
        .bind(order.total)
        .bind(order.amount_paid)
        .bind(&order.customer_id)
        .bind(&order.pos_session_id)
        .bind(&order.location_id)
        .bind(&order.void_reason)
        .bind(order.created_at)
        .bind(order.completed_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts an order item inside the caller's transaction.
    ///
    /// ## Snapshot Pattern
    /// Product name, unit price and the stock level around the decrement are
    /// copied onto the item. The sale history stays intact even if the
    /// product is later renamed, repriced, or deleted.
    pub async fn insert_item_tx(conn: &mut SqliteConnection, item: &OrderItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, product_name, quantity,
                unit_price, subtotal, previous_stock, new_stock, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.subtotal)
        .bind(item.previous_stock)
        .bind(item.new_stock)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Flips a completed order to cancelled, inside the caller's transaction.
    ///
    /// Guarded on `status = 'COMPLETED'`: the returned row count is the
    /// idempotence check. A second void finds zero rows and never restores
    /// stock twice.
    pub async fn mark_voided_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
        reason: Option<&str>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'CANCELLED', payment_status = 'VOIDED', void_reason = ?3
            WHERE id = ?1 AND tenant_id = ?2 AND status = 'COMPLETED'
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(reason)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Totals of the orders stamped with a session, inside the caller's
    /// transaction. Tuple: (total, payment_method, status) per order.
    pub async fn session_order_totals_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        session_id: &str,
    ) -> DbResult<Vec<(i64, String, String)>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT total, payment_method, status FROM orders \
             WHERE pos_session_id = ?1 AND tenant_id = ?2",
        )
        .bind(session_id)
        .bind(tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Lists the orders stamped with a session, newest first.
    pub async fn list_by_session(
        &self,
        tenant_id: &str,
        session_id: &str,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE pos_session_id = ?1 AND tenant_id = ?2 ORDER BY created_at DESC"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(session_id)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }
}
