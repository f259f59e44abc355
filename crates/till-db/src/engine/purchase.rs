//! # Purchase Ingestion Engine
//!
//! Accepts a supplier invoice (product lines + non-inventory extra
//! charges), increments stock per line, appends cost history entries, and
//! supports cancellation that reverses the stock increments.
//!
//! ## Per-line Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line has new_product? ──► create the product first (stock 0)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StockLedger::adjust(+qty, allow_negative)   purchases never floor     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  resolved cost ≠ current cost, or explicit unit_cost?                  │
//! │       └──► CostHistoryLog::record(source = PURCHASE)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  sale_price supplied? ──► base_price moves + price history entry       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Extra charges only contribute to `total_amount`; they never touch stock
//! or cost history. Whether freight should instead be apportioned into
//! per-unit cost is an open question; current behavior keeps charges out.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::engine::{retry_contention, LedgerConfig};
use crate::error::{DbError, LedgerResult};
use crate::repository::cost_history::{CostHistoryLog, NewCostEntry, NewPriceEntry};
use crate::repository::movement::MovementRepository;
use crate::repository::new_id;
use crate::repository::product::ProductRepository;
use crate::repository::purchase::PurchaseRepository;
use crate::repository::stock::StockLedger;
use till_core::validation::{
    validate_amount, validate_line_count, validate_product_name, validate_quantity, validate_sku,
};
use till_core::{
    CoreError, CostSource, MovementKind, Money, Product, Purchase, PurchaseItem, PurchaseStatus,
    StockMovement, ValidationError, AUTO_SKU_PREFIX, EXTRA_LINE_PREFIX,
};

// =============================================================================
// Request / Response
// =============================================================================

/// Payload creating a brand-new product from an invoice line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProductSpec {
    pub name: String,
    /// Falls back to a generated `AUTO-` sku when absent.
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    /// Initial sale price. Defaults to 0 until priced.
    #[serde(default)]
    pub base_price: Option<i64>,
}

/// One invoice line: an existing product reference *or* a new-product
/// payload, plus quantity and the gross invoice price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLine {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub new_product: Option<NewProductSpec>,
    pub quantity: i64,
    /// Gross (tax-inclusive) unit price from the invoice.
    pub purchase_price: i64,
    /// Explicit unit cost override. When present, a cost history entry is
    /// always recorded with this value instead of the resolved invoice
    /// price.
    #[serde(default)]
    pub unit_cost: Option<i64>,
    /// New sale price for the product, applied alongside the ingestion.
    #[serde(default)]
    pub sale_price: Option<i64>,
}

/// A non-product charge on the invoice (freight, handling).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraCharge {
    pub description: String,
    pub amount: i64,
}

/// Input for [`PurchaseEngine::create_purchase`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseRequest {
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Opaque attachment reference (invoice scan).
    #[serde(default)]
    pub invoice_photo: Option<String>,
    pub items: Vec<PurchaseLine>,
    #[serde(default)]
    pub extra_items: Vec<ExtraCharge>,
    #[serde(default)]
    pub actor: Option<String>,
}

/// Input for [`PurchaseEngine::cancel_purchase`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPurchaseRequest {
    pub purchase_id: String,
    #[serde(default)]
    pub reason: Option<String>,
    /// Also append compensating `SYSTEM` cost entries restoring each
    /// product's pre-purchase cost. History is never deleted either way.
    #[serde(default)]
    pub revert_cost: bool,
    #[serde(default)]
    pub actor: Option<String>,
}

/// A purchase with its lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseDetail {
    pub purchase: Purchase,
    pub items: Vec<PurchaseItem>,
}

// =============================================================================
// Engine
// =============================================================================

/// The purchase ingestion engine.
#[derive(Debug, Clone)]
pub struct PurchaseEngine {
    pool: SqlitePool,
    config: LedgerConfig,
}

impl PurchaseEngine {
    /// Creates a new PurchaseEngine.
    pub fn new(pool: SqlitePool, config: LedgerConfig) -> Self {
        PurchaseEngine { pool, config }
    }

    /// Ingests a supplier invoice in one atomic transaction.
    ///
    /// `total_amount = Σ (purchase_price × quantity) + Σ extra.amount`.
    /// Stock increments use `allow_negative = true`: receiving goods never
    /// fails a floor check.
    pub async fn create_purchase(
        &self,
        request: &CreatePurchaseRequest,
    ) -> LedgerResult<PurchaseDetail> {
        self.validate(request)?;
        retry_contention(|| self.create_purchase_tx(request)).await
    }

    fn validate(&self, request: &CreatePurchaseRequest) -> LedgerResult<()> {
        validate_line_count("items", request.items.len())?;

        for line in &request.items {
            validate_quantity(line.quantity)?;
            validate_amount("purchase_price", line.purchase_price)?;
            if let Some(cost) = line.unit_cost {
                validate_amount("unit_cost", cost)?;
            }
            if let Some(price) = line.sale_price {
                validate_amount("sale_price", price)?;
            }

            match (&line.product_id, &line.new_product) {
                (Some(_), None) => {}
                (None, Some(spec)) => {
                    validate_product_name(&spec.name)?;
                    if let Some(sku) = &spec.sku {
                        validate_sku(sku)?;
                    }
                    if let Some(price) = spec.base_price {
                        validate_amount("base_price", price)?;
                    }
                }
                (Some(_), Some(_)) => {
                    return Err(ValidationError::InvalidFormat {
                        field: "items".to_string(),
                        reason: "a line cannot carry both product_id and new_product".to_string(),
                    }
                    .into());
                }
                (None, None) => {
                    return Err(ValidationError::Required {
                        field: "product_id".to_string(),
                    }
                    .into());
                }
            }
        }

        for extra in &request.extra_items {
            if extra.description.trim().is_empty() {
                return Err(ValidationError::Required {
                    field: "extra description".to_string(),
                }
                .into());
            }
            validate_amount("extra amount", extra.amount)?;
        }

        Ok(())
    }

    async fn create_purchase_tx(
        &self,
        request: &CreatePurchaseRequest,
    ) -> LedgerResult<PurchaseDetail> {
        let tenant_id = &self.config.tenant_id;
        let now = Utc::now();

        let total_amount: i64 = request
            .items
            .iter()
            .map(|l| l.purchase_price * l.quantity)
            .sum::<i64>()
            + request.extra_items.iter().map(|e| e.amount).sum::<i64>();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        // Resolve existing products up front, in sorted id order.
        let mut existing_ids: Vec<&str> = request
            .items
            .iter()
            .filter_map(|l| l.product_id.as_deref())
            .collect();
        existing_ids.sort_unstable();
        existing_ids.dedup();

        let mut products: HashMap<String, Product> = HashMap::new();
        for id in existing_ids {
            let product = ProductRepository::get_by_id_tx(&mut tx, tenant_id, id)
                .await?
                .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;
            products.insert(id.to_string(), product);
        }

        let purchase = Purchase {
            id: new_id(),
            tenant_id: tenant_id.clone(),
            supplier_id: request.supplier_id.clone(),
            invoice_number: request
                .invoice_number
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            status: PurchaseStatus::Completed,
            total_amount,
            invoice_photo: request.invoice_photo.clone(),
            notes: request
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            cancel_reason: None,
            created_by: request.actor.clone(),
            purchased_at: now,
            created_at: now,
            updated_at: now,
        };
        PurchaseRepository::insert_tx(&mut tx, &purchase).await?;

        for line in &request.items {
            let product = match (&line.product_id, &line.new_product) {
                (Some(id), _) => products[id].clone(),
                // New product: created first, so its id becomes this line's
                // product_id. Cost starts empty; the history entry below is
                // its first link (previous_cost = NULL).
                (None, Some(spec)) => {
                    let product = Product {
                        id: new_id(),
                        tenant_id: tenant_id.clone(),
                        sku: spec
                            .sku
                            .clone()
                            .unwrap_or_else(|| format!("{}{}", AUTO_SKU_PREFIX, &new_id()[..8])),
                        barcode: spec.barcode.clone(),
                        name: spec.name.trim().to_string(),
                        description: None,
                        base_price: spec.base_price.unwrap_or(0),
                        cost: None,
                        stock: 0,
                        track_stock: true,
                        low_stock_alert: None,
                        active: true,
                        created_at: now,
                        updated_at: now,
                    };
                    ProductRepository::insert_tx(&mut tx, &product).await?;
                    product
                }
                (None, None) => {
                    return Err(ValidationError::Required {
                        field: "product_id".to_string(),
                    }
                    .into())
                }
            };

            let change =
                StockLedger::adjust(&mut tx, tenant_id, &product.id, line.quantity, true).await?;

            let item = PurchaseItem {
                id: new_id(),
                purchase_id: purchase.id.clone(),
                product_id: Some(product.id.clone()),
                product_name: product.name.clone(),
                quantity: line.quantity,
                purchase_price: line.purchase_price,
                previous_stock: Some(change.previous),
                new_stock: Some(change.new),
                created_at: now,
            };
            PurchaseRepository::insert_item_tx(&mut tx, &item).await?;

            if product.track_stock {
                let movement = StockMovement {
                    id: new_id(),
                    tenant_id: tenant_id.clone(),
                    product_id: product.id.clone(),
                    kind: MovementKind::PurchaseIn,
                    quantity: line.quantity,
                    previous_stock: change.previous,
                    new_stock: change.new,
                    reference_id: Some(purchase.id.clone()),
                    reference_type: Some("purchase".to_string()),
                    notes: purchase
                        .invoice_number
                        .as_deref()
                        .map(|n| format!("Invoice {n}")),
                    created_by: request.actor.clone(),
                    location_id: None,
                    created_at: now,
                };
                MovementRepository::insert_tx(&mut tx, &movement).await?;
            }

            self.record_line_cost(&mut tx, &purchase, &product.id, line, request)
                .await?;

            if let Some(sale_price) = line.sale_price {
                let current_price: i64 = sqlx::query_scalar(
                    "SELECT base_price FROM products WHERE id = ?1 AND tenant_id = ?2",
                )
                .bind(&product.id)
                .bind(tenant_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(DbError::from)?;

                if sale_price != current_price {
                    CostHistoryLog::record_price_tx(
                        &mut tx,
                        NewPriceEntry {
                            tenant_id,
                            product_id: &product.id,
                            new_price: sale_price,
                            source: CostSource::Purchase,
                            currency: &self.config.currency,
                            purchase_id: Some(&purchase.id),
                            reason: None,
                            created_by: request.actor.as_deref(),
                        },
                    )
                    .await?;
                }
            }
        }

        for extra in &request.extra_items {
            let item = PurchaseItem {
                id: new_id(),
                purchase_id: purchase.id.clone(),
                product_id: None,
                product_name: format!("{}{}", EXTRA_LINE_PREFIX, extra.description.trim()),
                quantity: 1,
                purchase_price: extra.amount,
                previous_stock: None,
                new_stock: None,
                created_at: now,
            };
            PurchaseRepository::insert_item_tx(&mut tx, &item).await?;
        }

        let items = PurchaseRepository::get_items_tx(&mut tx, &purchase.id).await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            purchase_id = %purchase.id,
            invoice = ?purchase.invoice_number,
            total_amount = %total_amount,
            lines = request.items.len(),
            extras = request.extra_items.len(),
            "Purchase ingested"
        );

        Ok(PurchaseDetail { purchase, items })
    }

    /// Appends a cost history entry for one ingested line when warranted.
    ///
    /// An explicit `unit_cost` always records. Otherwise the invoice price
    /// resolved through the configured basis records only when it differs
    /// from the product's current cost (read fresh, so a second line for
    /// the same product sees the first line's effect).
    async fn record_line_cost(
        &self,
        conn: &mut SqliteConnection,
        purchase: &Purchase,
        product_id: &str,
        line: &PurchaseLine,
        request: &CreatePurchaseRequest,
    ) -> LedgerResult<()> {
        let tenant_id = &self.config.tenant_id;

        let resolved = match line.unit_cost {
            Some(explicit) => explicit,
            None => self
                .config
                .cost_basis
                .resolve(Money::from_minor(line.purchase_price), self.config.vat)
                .minor(),
        };

        let current: Option<i64> =
            sqlx::query_scalar("SELECT cost FROM products WHERE id = ?1 AND tenant_id = ?2")
                .bind(product_id)
                .bind(tenant_id)
                .fetch_one(&mut *conn)
                .await
                .map_err(DbError::from)?;

        if line.unit_cost.is_none() && current == Some(resolved) {
            return Ok(());
        }

        CostHistoryLog::record_tx(
            conn,
            NewCostEntry {
                tenant_id,
                product_id,
                new_cost: resolved,
                source: CostSource::Purchase,
                currency: &self.config.currency,
                purchase_id: Some(&purchase.id),
                supplier_id: purchase.supplier_id.as_deref(),
                invoice_number: purchase.invoice_number.as_deref(),
                reason: None,
                created_by: request.actor.as_deref(),
            },
        )
        .await?;

        Ok(())
    }

    /// Cancels a completed purchase, reversing every line's stock increment.
    ///
    /// Reversal tolerates negative stock - the goods may already have been
    /// sold. Cost history entries written by the purchase are kept; with
    /// `revert_cost` a compensating `SYSTEM` entry restores each product's
    /// pre-purchase cost, but only where this purchase's cost is still the
    /// current one (a later change supersedes the reversal) and the
    /// pre-purchase cost was not empty.
    pub async fn cancel_purchase(&self, request: &CancelPurchaseRequest) -> LedgerResult<Purchase> {
        retry_contention(|| self.cancel_purchase_tx(request)).await
    }

    async fn cancel_purchase_tx(&self, request: &CancelPurchaseRequest) -> LedgerResult<Purchase> {
        let tenant_id = &self.config.tenant_id;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let purchase = PurchaseRepository::get_by_id_tx(&mut tx, tenant_id, &request.purchase_id)
            .await?
            .ok_or_else(|| CoreError::PurchaseNotFound(request.purchase_id.clone()))?;

        let flipped = PurchaseRepository::mark_cancelled_tx(
            &mut tx,
            tenant_id,
            &request.purchase_id,
            request.reason.as_deref(),
            now,
        )
        .await?;

        if !flipped {
            return Err(CoreError::InvalidPurchaseState {
                purchase_id: request.purchase_id.clone(),
                status: format!("{:?}", purchase.status),
            }
            .into());
        }

        let items = PurchaseRepository::get_items_tx(&mut tx, &request.purchase_id).await?;

        for item in &items {
            let Some(product_id) = item.product_id.as_deref() else {
                continue;
            };

            let change =
                StockLedger::adjust(&mut tx, tenant_id, product_id, -item.quantity, true).await?;

            if change.moved() {
                let movement = StockMovement {
                    id: new_id(),
                    tenant_id: tenant_id.clone(),
                    product_id: product_id.to_string(),
                    kind: MovementKind::PurchaseCancel,
                    quantity: -item.quantity,
                    previous_stock: change.previous,
                    new_stock: change.new,
                    reference_id: Some(request.purchase_id.clone()),
                    reference_type: Some("purchase_cancel".to_string()),
                    notes: request.reason.clone(),
                    created_by: request.actor.clone(),
                    location_id: None,
                    created_at: now,
                };
                MovementRepository::insert_tx(&mut tx, &movement).await?;
            }
        }

        if request.revert_cost {
            self.revert_costs(&mut tx, request).await?;
        }

        let cancelled = PurchaseRepository::get_by_id_tx(&mut tx, tenant_id, &request.purchase_id)
            .await?
            .ok_or_else(|| CoreError::PurchaseNotFound(request.purchase_id.clone()))?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            purchase_id = %request.purchase_id,
            lines = items.len(),
            revert_cost = request.revert_cost,
            "Purchase cancelled"
        );

        Ok(cancelled)
    }

    /// Appends compensating cost entries for a cancelled purchase.
    ///
    /// Per product: collapse the purchase's entries into (oldest
    /// previous_cost, newest new_cost); revert only if the newest value is
    /// still the product's current cost.
    async fn revert_costs(
        &self,
        conn: &mut SqliteConnection,
        request: &CancelPurchaseRequest,
    ) -> LedgerResult<()> {
        let tenant_id = &self.config.tenant_id;

        let entries =
            CostHistoryLog::entries_for_purchase_tx(conn, tenant_id, &request.purchase_id).await?;

        // product_id → (pre-purchase cost, last cost this purchase set)
        let mut spans: HashMap<String, (Option<i64>, i64)> = HashMap::new();
        for entry in entries {
            spans
                .entry(entry.product_id.clone())
                .and_modify(|(_, last)| *last = entry.new_cost)
                .or_insert((entry.previous_cost, entry.new_cost));
        }

        for (product_id, (pre_purchase, last_set)) in spans {
            let Some(restore) = pre_purchase else {
                continue;
            };

            let current: Option<i64> =
                sqlx::query_scalar("SELECT cost FROM products WHERE id = ?1 AND tenant_id = ?2")
                    .bind(&product_id)
                    .bind(tenant_id)
                    .fetch_one(&mut *conn)
                    .await
                    .map_err(DbError::from)?;

            if current != Some(last_set) {
                continue;
            }

            CostHistoryLog::record_tx(
                conn,
                NewCostEntry {
                    tenant_id,
                    product_id: &product_id,
                    new_cost: restore,
                    source: CostSource::System,
                    currency: &self.config.currency,
                    purchase_id: Some(&request.purchase_id),
                    supplier_id: None,
                    invoice_number: None,
                    reason: Some("Purchase cancelled"),
                    created_by: request.actor.as_deref(),
                },
            )
            .await?;
        }

        Ok(())
    }
}
