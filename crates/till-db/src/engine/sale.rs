//! # Sale Engine
//!
//! Turns a priced cart into a persisted order, decrementing stock once per
//! line inside one atomic transaction.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate input (no transaction yet)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN ───► session open? ───► resolve products (sorted ids)           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  insert order header (POS-NNNNN, COMPLETED, PAID)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  per line: StockLedger::adjust(-qty) ──► item snapshot ──► movement    │
//! │       │                  │                                              │
//! │       │                  └── InsufficientStock? → ROLLBACK everything   │
//! │       ▼                                                                 │
//! │  COMMIT → receipt                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No partial order is ever visible: the header, every item and every stock
//! decrement land together or not at all.

use std::collections::HashMap;

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
use crate::repository::session::SessionRepository;
use crate::repository::stock::StockLedger;
use till_core::validation::{
    validate_amount, validate_line_count, validate_payment_covers_total, validate_quantity,
};
use till_core::{
    CoreError, MovementKind, Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, Product,
    StockMovement,
};

// =============================================================================
// Request / Response
// =============================================================================

/// One priced cart line. The price is the caller's: promotions and loyalty
/// discounts are applied upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
    /// Unit price in minor units, gross of tax.
    pub unit_price: i64,
}

/// Input for [`SaleEngine::create_sale`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleRequest {
    pub items: Vec<SaleLine>,
    pub payment_method: PaymentMethod,
    /// Amount tendered. Defaults to the order total. Cash sales must cover
    /// the total; the floor is checked before any transaction begins.
    #[serde(default)]
    pub amount_paid: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Till session to stamp onto the order. Fixed at creation.
    #[serde(default)]
    pub pos_session_id: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    /// Cashier recorded on the audit trail.
    #[serde(default)]
    pub cashier_id: Option<String>,
}

/// What the till prints after a successful checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub order_id: String,
    pub order_number: String,
    pub total: i64,
    pub payment_method: PaymentMethod,
    pub amount_paid: i64,
    pub change: i64,
    /// Total units across all lines.
    pub items_count: i64,
}

// =============================================================================
// Engine
// =============================================================================

/// The sale engine.
#[derive(Debug, Clone)]
pub struct SaleEngine {
    pool: SqlitePool,
    config: LedgerConfig,
}

impl SaleEngine {
    /// Creates a new SaleEngine.
    pub fn new(pool: SqlitePool, config: LedgerConfig) -> Self {
        SaleEngine { pool, config }
    }

    /// Creates a completed sale from a priced cart.
    ///
    /// ## Failure Semantics
    /// Any line failing (`InsufficientStock`, missing product, closed
    /// session) rolls back the order insert and every prior stock
    /// adjustment together. Contention is retried a bounded number of
    /// times; everything else surfaces on the first attempt.
    pub async fn create_sale(&self, request: &CreateSaleRequest) -> LedgerResult<SaleReceipt> {
        self.validate(request)?;
        retry_contention(|| self.create_sale_tx(request)).await
    }

    /// Input checks that need no database access. Rejected before any
    /// transaction begins.
    fn validate(&self, request: &CreateSaleRequest) -> LedgerResult<()> {
        validate_line_count("items", request.items.len())?;

        for line in &request.items {
            validate_quantity(line.quantity)?;
            validate_amount("unit_price", line.unit_price)?;
        }

        let total = cart_total(&request.items);
        let amount_paid = request.amount_paid.unwrap_or(total);
        validate_amount("amount_paid", amount_paid)?;
        validate_payment_covers_total(request.payment_method, amount_paid, total)?;

        Ok(())
    }

    async fn create_sale_tx(&self, request: &CreateSaleRequest) -> LedgerResult<SaleReceipt> {
        let tenant_id = &self.config.tenant_id;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // A supplied session must exist and still be open.
        if let Some(session_id) = &request.pos_session_id {
            let session = SessionRepository::get_by_id_tx(&mut tx, tenant_id, session_id)
                .await?
                .ok_or_else(|| CoreError::SessionNotFound(session_id.clone()))?;
            if !session.is_open() {
                return Err(CoreError::AlreadyClosed {
                    session_id: session_id.clone(),
                }
                .into());
            }
        }

        // Resolve every distinct product in sorted id order, so overlapping
        // multi-product transactions always acquire rows in the same order.
        let mut product_ids: Vec<&str> =
            request.items.iter().map(|l| l.product_id.as_str()).collect();
        product_ids.sort_unstable();
        product_ids.dedup();

        let mut products: HashMap<String, Product> = HashMap::new();
        for id in product_ids {
            let product = ProductRepository::get_by_id_tx(&mut tx, tenant_id, id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;
            products.insert(id.to_string(), product);
        }

        let subtotal = cart_total(&request.items);
        let total = subtotal;
        let amount_paid = request.amount_paid.unwrap_or(total);

        // Orders are never deleted, so count+1 yields a fresh number; the
        // surrounding transaction serializes concurrent counters.
        let count = OrderRepository::count_tx(&mut tx, tenant_id).await?;
        let order_number = format!("POS-{:05}", count + 1);

        let order = Order {
            id: new_id(),
            tenant_id: tenant_id.clone(),
            order_number: order_number.clone(),
            status: OrderStatus::Completed,
            payment_method: request.payment_method,
            payment_status: PaymentStatus::Paid,
            subtotal,
            total,
            amount_paid,
            customer_id: request.customer_id.clone(),
            pos_session_id: request.pos_session_id.clone(),
            location_id: request.location_id.clone(),
            void_reason: None,
            created_at: now,
            completed_at: Some(now),
        };
        OrderRepository::insert_tx(&mut tx, &order).await?;

        let mut items_count: i64 = 0;
        for line in &request.items {
            let product = &products[&line.product_id];

            // The guard and the write are one statement; a failing line
            // aborts the whole sale via `?`.
            let change =
                StockLedger::adjust(&mut tx, tenant_id, &line.product_id, -line.quantity, false)
                    .await?;

            let item = OrderItem {
                id: new_id(),
                order_id: order.id.clone(),
                product_id: Some(line.product_id.clone()),
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                subtotal: line.unit_price * line.quantity,
                previous_stock: change.previous,
                new_stock: change.new,
                created_at: now,
            };
            OrderRepository::insert_item_tx(&mut tx, &item).await?;

            if product.track_stock {
                let movement = StockMovement {
                    id: new_id(),
                    tenant_id: tenant_id.clone(),
                    product_id: line.product_id.clone(),
                    kind: MovementKind::Sale,
                    quantity: -line.quantity,
                    previous_stock: change.previous,
                    new_stock: change.new,
                    reference_id: Some(order.id.clone()),
                    reference_type: Some("order".to_string()),
                    notes: None,
                    created_by: request.cashier_id.clone(),
                    location_id: request.location_id.clone(),
                    created_at: now,
                };
                MovementRepository::insert_tx(&mut tx, &movement).await?;
            }

            items_count += line.quantity;
        }

        tx.commit().await.map_err(DbError::from)?;

        info!(
            order_id = %order.id,
            order_number = %order_number,
            total = %total,
            items = request.items.len(),
            "Sale completed"
        );

        Ok(SaleReceipt {
            order_id: order.id,
            order_number,
            total,
            payment_method: request.payment_method,
            amount_paid,
            change: (amount_paid - total).max(0),
            items_count,
        })
    }
}

/// Σ unit_price × quantity over the cart.
fn cart_total(items: &[SaleLine]) -> i64 {
    items.iter().map(|l| l.unit_price * l.quantity).sum()
}
