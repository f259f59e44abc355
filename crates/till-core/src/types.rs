//! # Domain Types
//!
//! Core domain types for the retail ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │   CashSession   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  order_number   │   │  opening_amount │       │
//! │  │  stock          │   │  status         │   │  expected_cash  │       │
//! │  │  cost           │   │  total          │   │  difference     │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │                                       │
//! │  ┌─────────────────┐   ┌────────┴────────┐   ┌─────────────────┐       │
//! │  │    Purchase     │   │   OrderItem     │   │ CostHistoryEntry│       │
//! │  │  + PurchaseItem │   │  (snapshots)    │   │  (append-only)  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, order_number, invoice_number) - human-readable
//!
//! ## Snapshot Pattern
//! Order and purchase items denormalize the product name and the
//! before/after stock level at mutation time. Items reference products
//! through a nullable key plus the snapshot, so history survives product
//! deletion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this product belongs to.
    pub tenant_id: String,

    /// Stock Keeping Unit - business identifier, unique per tenant.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Display name shown to cashier and on receipts.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Sale price, gross of tax, in minor units.
    pub base_price: i64,

    /// Current unit cost in minor units. Cached copy of the newest cost
    /// history entry's `new_cost`; refreshed by the Cost History Log only.
    pub cost: Option<i64>,

    /// On-hand quantity. Authoritative only when `track_stock` is set.
    pub stock: i64,

    /// Whether the stock counter is enforced. Non-tracked products sell
    /// without limit and never fail the zero floor.
    pub track_stock: bool,

    /// Threshold for low-stock warnings.
    pub low_stock_alert: Option<i64>,

    /// Whether product is active (soft delete).
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the sale price as Money.
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_minor(self.base_price)
    }

    /// Returns the current cost as Money, if one has ever been recorded.
    #[inline]
    pub fn cost(&self) -> Option<Money> {
        self.cost.map(Money::from_minor)
    }

    /// Checks if the product can cover a sale of `quantity` units.
    pub fn can_sell(&self, quantity: i64) -> bool {
        !self.track_stock || self.stock >= quantity
    }

    /// Checks if the stock level is at or below the low-stock threshold.
    pub fn is_low_stock(&self) -> bool {
        match self.low_stock_alert {
            Some(threshold) => self.track_stock && self.stock <= threshold,
            None => false,
        }
    }
}

// =============================================================================
// Cost & Price History
// =============================================================================

/// Where a cost history entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostSource {
    /// Set by supplier invoice ingestion.
    Purchase,
    /// Set by an operator editing the product.
    Manual,
    /// Compensating entry written by the system (e.g. purchase cancellation).
    System,
}

/// Immutable audit record of a product's unit-cost change.
///
/// Entries are append-only: never mutated, never deleted, even when the
/// purchase that created them is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CostHistoryEntry {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub source: CostSource,
    /// Cost before this entry; None for the first recorded cost.
    pub previous_cost: Option<i64>,
    pub new_cost: i64,
    /// ISO currency code the amounts are denominated in.
    pub currency: String,
    /// Back-reference to the purchase that set this cost. Weak: deleting a
    /// purchase must never delete history.
    pub purchase_id: Option<String>,
    pub supplier_id: Option<String>,
    pub invoice_number: Option<String>,
    pub reason: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Immutable audit record of a product's sale-price change.
/// Same shape as [`CostHistoryEntry`], tracking `base_price` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PriceHistoryEntry {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub source: CostSource,
    pub previous_price: Option<i64>,
    pub new_price: i64,
    pub currency: String,
    pub purchase_id: Option<String>,
    pub reason: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order (Sale)
// =============================================================================

/// The status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Paid and finalized. Orders are born completed; there is no draft.
    Completed,
    /// Reversed by the void engine. Stock restored, record preserved.
    Cancelled,
}

/// Payment settlement state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Voided,
}

/// How an order was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Physical cash. The only method that feeds expected-cash at session
    /// close.
    Cash,
    /// Card payment on an external terminal.
    Card,
    /// Bank transfer.
    Transfer,
}

/// A completed (or later cancelled) sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub tenant_id: String,
    /// Human-legible business number, unique per tenant (`POS-00042`).
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub subtotal: i64,
    pub total: i64,
    /// What the customer handed over. `amount_paid - total` is the change.
    pub amount_paid: i64,
    pub customer_id: Option<String>,
    /// Till session active when the order was created. Fixed at creation;
    /// never reassigned.
    pub pos_session_id: Option<String>,
    pub location_id: Option<String>,
    /// Operator-supplied reason recorded when the order is voided.
    pub void_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Returns the total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total)
    }

    /// Change returned to the customer.
    #[inline]
    pub fn change(&self) -> Money {
        Money::from_minor((self.amount_paid - self.total).max(0))
    }
}

/// A line item in an order.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    /// Nullable: the product may be deleted after the sale; the snapshot
    /// fields below keep the historical view intact.
    pub product_id: Option<String>,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Unit price in minor units at time of sale (frozen).
    pub unit_price: i64,
    /// Line total (unit_price × quantity).
    pub subtotal: i64,
    /// Stock level immediately before the decrement.
    pub previous_stock: i64,
    /// Stock level immediately after the decrement.
    pub new_stock: i64,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash Session
// =============================================================================

/// State of a till session. `Open → Closed` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "OPEN"))]
    Open,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CLOSED"))]
    Closed,
    /// Closed by an admin on the cashier's behalf; requires a note.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "FORCE_CLOSED"))]
    ForceClosed,
}

/// The operating period of one cashier at one location between opening and
/// closing the drawer.
///
/// The aggregate columns (`total_*`, `expected_cash`, `difference`) are
/// computed once at close from the orders stamped with this session's id and
/// stored for audit. `difference` is only present when the cashier counted
/// the drawer (`closing_amount` supplied); positive = surplus, negative =
/// shortage. A mismatch never blocks closing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashSession {
    pub id: String,
    pub tenant_id: String,
    pub location_id: String,
    /// The cashier operating this till.
    pub user_id: String,
    pub status: SessionStatus,
    /// Cash float in the drawer at open.
    pub opening_amount: i64,
    /// Counted cash at close, if the cashier counted.
    pub closing_amount: Option<i64>,
    pub closing_notes: Option<String>,
    pub total_sales: Option<i64>,
    pub total_cash: Option<i64>,
    pub total_card: Option<i64>,
    pub total_transfer: Option<i64>,
    pub total_cancelled: Option<i64>,
    /// opening_amount + cash sales; set at close.
    pub expected_cash: Option<i64>,
    /// closing_amount − expected_cash; set at close when counted.
    pub difference: Option<i64>,
    pub force_closed_by: Option<String>,
    pub force_closed_note: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl CashSession {
    /// Checks whether the session is still accepting orders.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

// =============================================================================
// Purchase (supplier invoice)
// =============================================================================

/// The status of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseStatus {
    Draft,
    Completed,
    /// Stock and (optionally) cost effects reversed. The record and its
    /// cost history entries are preserved.
    Cancelled,
}

/// A supplier invoice ingested into stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Purchase {
    pub id: String,
    pub tenant_id: String,
    pub supplier_id: Option<String>,
    pub invoice_number: Option<String>,
    pub status: PurchaseStatus,
    /// Σ line gross totals + Σ extra charges, in minor units.
    pub total_amount: i64,
    /// Opaque attachment reference (scan of the paper invoice).
    pub invoice_photo: Option<String>,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_by: Option<String>,
    pub purchased_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line on a purchase invoice.
///
/// Two kinds share this table: product lines (stock + cost effects) and
/// extra charges (freight and the like), distinguished by a null
/// `product_id` and the [`crate::EXTRA_LINE_PREFIX`] name prefix. Extra
/// charges only contribute to `total_amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseItem {
    pub id: String,
    pub purchase_id: String,
    pub product_id: Option<String>,
    pub product_name: String,
    pub quantity: i64,
    /// Gross (tax-inclusive) unit price from the invoice.
    pub purchase_price: i64,
    pub previous_stock: Option<i64>,
    pub new_stock: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl PurchaseItem {
    /// Checks whether this line is a non-product extra charge.
    #[inline]
    pub fn is_extra(&self) -> bool {
        self.product_id.is_none() && self.product_name.starts_with(crate::EXTRA_LINE_PREFIX)
    }
}

// =============================================================================
// Stock Movements
// =============================================================================

/// What caused a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    #[cfg_attr(feature = "sqlx", sqlx(rename = "SALE"))]
    Sale,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "VOID"))]
    Void,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PURCHASE_IN"))]
    PurchaseIn,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PURCHASE_CANCEL"))]
    PurchaseCancel,
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ADJUST"))]
    Adjust,
}

/// Append-only audit record of one stock delta.
///
/// Written by the engines next to every ledger adjustment; the stock ledger
/// itself only moves the counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    pub kind: MovementKind,
    /// Signed delta applied (negative for sales).
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    /// Id of the order/purchase that caused this movement.
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub location_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Location
// =============================================================================

/// A physical selling location (store, warehouse).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Location {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64, track: bool) -> Product {
        Product {
            id: "p1".into(),
            tenant_id: "t1".into(),
            sku: "SKU-1".into(),
            barcode: None,
            name: "Test".into(),
            description: None,
            base_price: 1000,
            cost: None,
            stock,
            track_stock: track,
            low_stock_alert: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_sell_tracked() {
        assert!(product(5, true).can_sell(5));
        assert!(!product(5, true).can_sell(6));
    }

    #[test]
    fn test_can_sell_untracked_is_unlimited() {
        assert!(product(0, false).can_sell(1_000_000));
    }

    #[test]
    fn test_low_stock() {
        let mut p = product(3, true);
        p.low_stock_alert = Some(5);
        assert!(p.is_low_stock());

        p.stock = 10;
        assert!(!p.is_low_stock());
    }

    #[test]
    fn test_order_change() {
        let order = Order {
            id: "o1".into(),
            tenant_id: "t1".into(),
            order_number: "POS-00001".into(),
            status: OrderStatus::Completed,
            payment_method: PaymentMethod::Cash,
            payment_status: PaymentStatus::Paid,
            subtotal: 12000,
            total: 12000,
            amount_paid: 15000,
            customer_id: None,
            pos_session_id: None,
            location_id: None,
            void_reason: None,
            created_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        assert_eq!(order.change().minor(), 3000);
    }

    #[test]
    fn test_extra_line_detection() {
        let item = PurchaseItem {
            id: "i1".into(),
            purchase_id: "pu1".into(),
            product_id: None,
            product_name: format!("{}Freight", crate::EXTRA_LINE_PREFIX),
            quantity: 1,
            purchase_price: 5000,
            previous_stock: None,
            new_stock: None,
            created_at: Utc::now(),
        };
        assert!(item.is_extra());
    }

    #[test]
    fn test_status_serde_wire_format() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::ForceClosed).unwrap(),
            "\"FORCE_CLOSED\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Cash).unwrap(),
            "\"CASH\""
        );
        assert_eq!(
            serde_json::to_string(&MovementKind::PurchaseIn).unwrap(),
            "\"PURCHASE_IN\""
        );
    }
}
