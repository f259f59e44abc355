//! Engine scenario tests against an in-memory database.
//!
//! Each test builds a fresh ledger, seeds through the repositories, and
//! drives the engines end to end: checkout, void, till sessions, invoice
//! ingestion and cancellation.

use chrono::Utc;

use crate::engine::inventory::{SetCostRequest, StockAdjustmentRequest};
use crate::engine::purchase::{
    CancelPurchaseRequest, CreatePurchaseRequest, ExtraCharge, NewProductSpec, PurchaseLine,
};
use crate::engine::sale::{CreateSaleRequest, SaleLine};
use crate::engine::session::{CloseSessionRequest, OpenSessionRequest};
use crate::engine::void::VoidRequest;
use crate::engine::{Ledger, LedgerConfig};
use crate::error::ErrorCode;
use crate::pool::{Database, DbConfig};
use crate::repository::new_id;
use till_core::{
    CostBasis, CostSource, Location, OrderStatus, PaymentMethod, PaymentStatus, Product,
    PurchaseStatus, SessionStatus, VatRate,
};

const TENANT: &str = "tenant-1";

async fn ledger() -> Ledger {
    ledger_with(LedgerConfig::new(TENANT).vat(VatRate::from_bps(1900))).await
}

async fn ledger_with(config: LedgerConfig) -> Ledger {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Ledger::new(db, config)
}

async fn seed_location(ledger: &Ledger, name: &str) -> String {
    let location = Location {
        id: new_id(),
        tenant_id: TENANT.to_string(),
        name: name.to_string(),
        active: true,
        created_at: Utc::now(),
    };
    ledger.db().locations().insert(&location).await.unwrap();
    location.id
}

async fn seed_product(ledger: &Ledger, name: &str, stock: i64, track_stock: bool) -> String {
    let now = Utc::now();
    let product = Product {
        id: new_id(),
        tenant_id: TENANT.to_string(),
        sku: format!("SKU-{}", &new_id()[..8]),
        barcode: None,
        name: name.to_string(),
        description: None,
        base_price: 12000,
        cost: None,
        stock,
        track_stock,
        low_stock_alert: None,
        active: true,
        created_at: now,
        updated_at: now,
    };
    ledger.db().products().insert(&product).await.unwrap();
    product.id
}

async fn stock_of(ledger: &Ledger, product_id: &str) -> i64 {
    ledger
        .db()
        .products()
        .get_by_id(TENANT, product_id)
        .await
        .unwrap()
        .unwrap()
        .stock
}

async fn order_count(ledger: &Ledger) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(ledger.db().pool())
        .await
        .unwrap()
}

fn cash_sale(lines: &[(&str, i64, i64)]) -> CreateSaleRequest {
    CreateSaleRequest {
        items: lines
            .iter()
            .map(|(id, qty, price)| SaleLine {
                product_id: id.to_string(),
                quantity: *qty,
                unit_price: *price,
            })
            .collect(),
        payment_method: PaymentMethod::Cash,
        amount_paid: None,
        customer_id: None,
        pos_session_id: None,
        location_id: None,
        cashier_id: Some("cashier-1".to_string()),
    }
}

fn purchase_of(product_id: &str, quantity: i64, gross_price: i64) -> CreatePurchaseRequest {
    CreatePurchaseRequest {
        supplier_id: Some("supplier-1".to_string()),
        invoice_number: Some("F-1001".to_string()),
        notes: None,
        invoice_photo: None,
        items: vec![PurchaseLine {
            product_id: Some(product_id.to_string()),
            new_product: None,
            quantity,
            purchase_price: gross_price,
            unit_cost: None,
            sale_price: None,
        }],
        extra_items: vec![],
        actor: Some("admin-1".to_string()),
    }
}

// =============================================================================
// Sales
// =============================================================================

#[tokio::test]
async fn cash_sale_decrements_stock_and_snapshots_items() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Coca-Cola 330ml", 10, true).await;

    let receipt = ledger
        .sales()
        .create_sale(&cash_sale(&[(&product, 2, 1500)]))
        .await
        .unwrap();

    assert_eq!(receipt.order_number, "POS-00001");
    assert_eq!(receipt.total, 3000);
    assert_eq!(receipt.amount_paid, 3000);
    assert_eq!(receipt.change, 0);
    assert_eq!(receipt.items_count, 2);

    assert_eq!(stock_of(&ledger, &product).await, 8);

    let order = ledger
        .db()
        .orders()
        .get_by_id(TENANT, &receipt.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert!(order.completed_at.is_some());

    let items = ledger.db().orders().get_items(&receipt.order_id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_name, "Coca-Cola 330ml");
    assert_eq!(items[0].previous_stock, 10);
    assert_eq!(items[0].new_stock, 8);

    let movements = ledger
        .db()
        .movements()
        .list_for_reference(TENANT, &receipt.order_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].quantity, -2);
}

#[tokio::test]
async fn sale_returns_change_on_overpayment() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 5, true).await;

    let mut request = cash_sale(&[(&product, 1, 12000)]);
    request.amount_paid = Some(15000);

    let receipt = ledger.sales().create_sale(&request).await.unwrap();
    assert_eq!(receipt.change, 3000);
}

#[tokio::test]
async fn insufficient_stock_names_the_failing_product() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Scarce Item", 3, true).await;

    let err = ledger
        .sales()
        .create_sale(&cash_sale(&[(&product, 5, 1000)]))
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::InsufficientStock);
    let message = err.to_string();
    assert!(message.contains("Scarce Item"), "got: {message}");
    assert!(message.contains("available 3"), "got: {message}");

    assert_eq!(stock_of(&ledger, &product).await, 3);
}

#[tokio::test]
async fn failed_sale_rolls_back_every_line() {
    let ledger = ledger().await;
    let plentiful = seed_product(&ledger, "Plentiful", 10, true).await;
    let scarce = seed_product(&ledger, "Scarce", 1, true).await;

    let err = ledger
        .sales()
        .create_sale(&cash_sale(&[(&plentiful, 2, 1000), (&scarce, 5, 1000)]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InsufficientStock);

    // Atomicity: the first line's decrement is rolled back with the rest.
    assert_eq!(stock_of(&ledger, &plentiful).await, 10);
    assert_eq!(stock_of(&ledger, &scarce).await, 1);
    assert_eq!(order_count(&ledger).await, 0);
}

#[tokio::test]
async fn two_sales_cannot_oversell_the_last_units() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Hot SKU", 3, true).await;

    ledger
        .sales()
        .create_sale(&cash_sale(&[(&product, 2, 1000)]))
        .await
        .unwrap();

    let err = ledger
        .sales()
        .create_sale(&cash_sale(&[(&product, 2, 1000)]))
        .await
        .unwrap_err();

    match err {
        crate::error::LedgerError::Core(till_core::CoreError::InsufficientStock {
            requested,
            available,
            ..
        }) => {
            assert_eq!(requested, 2);
            assert_eq!(available, 1);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // Total decrement never exceeds the 3 units that existed.
    assert_eq!(stock_of(&ledger, &product).await, 1);
}

#[tokio::test]
async fn untracked_product_sells_without_limit() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Service Fee", 0, false).await;

    ledger
        .sales()
        .create_sale(&cash_sale(&[(&product, 50, 1000)]))
        .await
        .unwrap();

    // Counter untouched, and no movement was logged.
    assert_eq!(stock_of(&ledger, &product).await, 0);
    let movements = ledger
        .db()
        .movements()
        .list_for_product(TENANT, &product, 10)
        .await
        .unwrap();
    assert!(movements.is_empty());
}

#[tokio::test]
async fn cash_underpayment_is_rejected_before_any_write() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 5, true).await;

    let mut request = cash_sale(&[(&product, 1, 12000)]);
    request.amount_paid = Some(10000);

    let err = ledger.sales().create_sale(&request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);
    assert_eq!(stock_of(&ledger, &product).await, 5);
    assert_eq!(order_count(&ledger).await, 0);
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let ledger = ledger().await;

    let err = ledger.sales().create_sale(&cash_sale(&[])).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);
}

#[tokio::test]
async fn order_numbers_are_sequential() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 10, true).await;

    let first = ledger
        .sales()
        .create_sale(&cash_sale(&[(&product, 1, 1000)]))
        .await
        .unwrap();
    let second = ledger
        .sales()
        .create_sale(&cash_sale(&[(&product, 1, 1000)]))
        .await
        .unwrap();

    assert_eq!(first.order_number, "POS-00001");
    assert_eq!(second.order_number, "POS-00002");
}

// =============================================================================
// Voids
// =============================================================================

#[tokio::test]
async fn void_restores_stock_exactly_once() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 10, true).await;

    let receipt = ledger
        .sales()
        .create_sale(&cash_sale(&[(&product, 2, 1000)]))
        .await
        .unwrap();
    assert_eq!(stock_of(&ledger, &product).await, 8);

    let request = VoidRequest {
        order_id: receipt.order_id.clone(),
        reason: Some("customer return".to_string()),
        actor: Some("admin-1".to_string()),
    };

    let voided = ledger.voids().void_sale(&request).await.unwrap();
    assert_eq!(voided.status, OrderStatus::Cancelled);
    assert_eq!(voided.payment_status, PaymentStatus::Voided);
    assert_eq!(voided.void_reason.as_deref(), Some("customer return"));
    // Conservation: back to the pre-sale level.
    assert_eq!(stock_of(&ledger, &product).await, 10);

    let err = ledger.voids().void_sale(&request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(stock_of(&ledger, &product).await, 10);

    // The original total survives for reporting.
    let order = ledger
        .db()
        .orders()
        .get_by_id(TENANT, &receipt.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.total, 2000);
}

#[tokio::test]
async fn voiding_a_missing_order_is_not_found() {
    let ledger = ledger().await;

    let err = ledger
        .voids()
        .void_sale(&VoidRequest {
            order_id: "nope".to_string(),
            reason: None,
            actor: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn session_reconciliation_identity() {
    let ledger = ledger().await;
    let location = seed_location(&ledger, "Main Store").await;
    let product = seed_product(&ledger, "Widget", 10, true).await;

    let opened = ledger
        .sessions()
        .open(&OpenSessionRequest {
            location_id: location.clone(),
            user_id: "cashier-1".to_string(),
            opening_amount: 50000,
        })
        .await
        .unwrap();
    assert_eq!(opened.location_name, "Main Store");
    assert_eq!(opened.session.status, SessionStatus::Open);

    let mut sale = cash_sale(&[(&product, 1, 12000)]);
    sale.pos_session_id = Some(opened.session.id.clone());
    let receipt = ledger.sales().create_sale(&sale).await.unwrap();
    assert_eq!(receipt.change, 0);
    assert_eq!(stock_of(&ledger, &product).await, 9);

    // Close without counting: expected cash is computed, difference is not.
    let closed = ledger
        .sessions()
        .close(&CloseSessionRequest {
            session_id: opened.session.id.clone(),
            closing_amount: None,
            closing_notes: None,
            actor: Some("cashier-1".to_string()),
            force: false,
            force_note: None,
        })
        .await
        .unwrap();

    assert_eq!(closed.status, SessionStatus::Closed);
    assert_eq!(closed.total_sales, Some(12000));
    assert_eq!(closed.total_cash, Some(12000));
    assert_eq!(closed.expected_cash, Some(62000));
    assert_eq!(closed.difference, None);
    assert!(closed.closed_at.is_some());
}

#[tokio::test]
async fn session_counts_only_non_cancelled_orders_and_reports_difference() {
    let ledger = ledger().await;
    let location = seed_location(&ledger, "Main Store").await;
    let product = seed_product(&ledger, "Widget", 20, true).await;

    let opened = ledger
        .sessions()
        .open(&OpenSessionRequest {
            location_id: location,
            user_id: "cashier-1".to_string(),
            opening_amount: 10000,
        })
        .await
        .unwrap();

    let mut keep = cash_sale(&[(&product, 1, 12000)]);
    keep.pos_session_id = Some(opened.session.id.clone());
    ledger.sales().create_sale(&keep).await.unwrap();

    let mut voided = cash_sale(&[(&product, 1, 5000)]);
    voided.pos_session_id = Some(opened.session.id.clone());
    let to_void = ledger.sales().create_sale(&voided).await.unwrap();
    ledger
        .voids()
        .void_sale(&VoidRequest {
            order_id: to_void.order_id,
            reason: None,
            actor: None,
        })
        .await
        .unwrap();

    // Drawer counted one thousand short.
    let closed = ledger
        .sessions()
        .close(&CloseSessionRequest {
            session_id: opened.session.id.clone(),
            closing_amount: Some(21000),
            closing_notes: Some("short drawer".to_string()),
            actor: Some("cashier-1".to_string()),
            force: false,
            force_note: None,
        })
        .await
        .unwrap();

    assert_eq!(closed.total_sales, Some(12000));
    assert_eq!(closed.total_cash, Some(12000));
    assert_eq!(closed.total_cancelled, Some(5000));
    assert_eq!(closed.expected_cash, Some(22000));
    assert_eq!(closed.difference, Some(-1000));
}

#[tokio::test]
async fn second_open_session_is_rejected() {
    let ledger = ledger().await;
    let location = seed_location(&ledger, "Main Store").await;

    let opened = ledger
        .sessions()
        .open(&OpenSessionRequest {
            location_id: location.clone(),
            user_id: "cashier-1".to_string(),
            opening_amount: 0,
        })
        .await
        .unwrap();

    let err = ledger
        .sessions()
        .open(&OpenSessionRequest {
            location_id: location.clone(),
            user_id: "cashier-1".to_string(),
            opening_amount: 0,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert!(err.to_string().contains(&opened.session.id));

    // A different cashier opens fine.
    ledger
        .sessions()
        .open(&OpenSessionRequest {
            location_id: location,
            user_id: "cashier-2".to_string(),
            opening_amount: 0,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn closing_twice_is_a_conflict() {
    let ledger = ledger().await;
    let location = seed_location(&ledger, "Main Store").await;

    let opened = ledger
        .sessions()
        .open(&OpenSessionRequest {
            location_id: location,
            user_id: "cashier-1".to_string(),
            opening_amount: 0,
        })
        .await
        .unwrap();

    let request = CloseSessionRequest {
        session_id: opened.session.id,
        closing_amount: None,
        closing_notes: None,
        actor: None,
        force: false,
        force_note: None,
    };
    ledger.sessions().close(&request).await.unwrap();

    let err = ledger.sessions().close(&request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn force_close_requires_a_note() {
    let ledger = ledger().await;
    let location = seed_location(&ledger, "Main Store").await;

    let opened = ledger
        .sessions()
        .open(&OpenSessionRequest {
            location_id: location,
            user_id: "cashier-1".to_string(),
            opening_amount: 0,
        })
        .await
        .unwrap();

    let mut request = CloseSessionRequest {
        session_id: opened.session.id,
        closing_amount: None,
        closing_notes: None,
        actor: Some("admin-1".to_string()),
        force: true,
        force_note: None,
    };

    let err = ledger.sessions().close(&request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);

    request.force_note = Some("cashier left sick".to_string());
    let closed = ledger.sessions().close(&request).await.unwrap();
    assert_eq!(closed.status, SessionStatus::ForceClosed);
    assert_eq!(closed.force_closed_by.as_deref(), Some("admin-1"));
    assert_eq!(closed.force_closed_note.as_deref(), Some("cashier left sick"));
}

#[tokio::test]
async fn sale_against_a_closed_session_is_rejected() {
    let ledger = ledger().await;
    let location = seed_location(&ledger, "Main Store").await;
    let product = seed_product(&ledger, "Widget", 5, true).await;

    let opened = ledger
        .sessions()
        .open(&OpenSessionRequest {
            location_id: location,
            user_id: "cashier-1".to_string(),
            opening_amount: 0,
        })
        .await
        .unwrap();
    ledger
        .sessions()
        .close(&CloseSessionRequest {
            session_id: opened.session.id.clone(),
            closing_amount: None,
            closing_notes: None,
            actor: None,
            force: false,
            force_note: None,
        })
        .await
        .unwrap();

    let mut sale = cash_sale(&[(&product, 1, 1000)]);
    sale.pos_session_id = Some(opened.session.id);
    let err = ledger.sales().create_sale(&sale).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(stock_of(&ledger, &product).await, 5);

    sale.pos_session_id = Some("missing-session".to_string());
    let err = ledger.sales().create_sale(&sale).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);
}

// =============================================================================
// Purchases
// =============================================================================

#[tokio::test]
async fn purchase_increments_stock_and_records_first_cost() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 0, true).await;

    let detail = ledger
        .purchases()
        .create_purchase(&purchase_of(&product, 10, 1190))
        .await
        .unwrap();

    assert_eq!(detail.purchase.status, PurchaseStatus::Completed);
    assert_eq!(detail.purchase.total_amount, 11900);
    assert_eq!(stock_of(&ledger, &product).await, 10);

    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].previous_stock, Some(0));
    assert_eq!(detail.items[0].new_stock, Some(10));

    // Gross basis: the invoice price is recorded as-is, previous cost NULL.
    let history = ledger.db().cost_history().history(TENANT, &product).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].previous_cost, None);
    assert_eq!(history[0].new_cost, 1190);
    assert_eq!(history[0].source, CostSource::Purchase);
    assert_eq!(history[0].purchase_id.as_deref(), Some(detail.purchase.id.as_str()));

    assert_eq!(
        ledger.db().cost_history().current(TENANT, &product).await.unwrap(),
        Some(1190)
    );
    let cached = ledger
        .db()
        .products()
        .get_by_id(TENANT, &product)
        .await
        .unwrap()
        .unwrap()
        .cost;
    assert_eq!(cached, Some(1190));
}

#[tokio::test]
async fn net_cost_basis_strips_vat_before_recording() {
    let config = LedgerConfig::new(TENANT)
        .vat(VatRate::from_bps(1900))
        .cost_basis(CostBasis::Net);
    let ledger = ledger_with(config).await;
    let product = seed_product(&ledger, "Widget", 0, true).await;

    ledger
        .purchases()
        .create_purchase(&purchase_of(&product, 10, 1190))
        .await
        .unwrap();

    assert_eq!(
        ledger.db().cost_history().current(TENANT, &product).await.unwrap(),
        Some(1000)
    );
}

#[tokio::test]
async fn repeat_purchase_at_same_price_skips_entry_unless_explicit() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 0, true).await;

    ledger
        .purchases()
        .create_purchase(&purchase_of(&product, 5, 1190))
        .await
        .unwrap();
    ledger
        .purchases()
        .create_purchase(&purchase_of(&product, 5, 1190))
        .await
        .unwrap();

    let history = ledger.db().cost_history().history(TENANT, &product).await.unwrap();
    assert_eq!(history.len(), 1);

    // An explicit unit cost always lands in the log, unchanged value or not.
    let mut explicit = purchase_of(&product, 5, 1190);
    explicit.items[0].unit_cost = Some(1190);
    ledger.purchases().create_purchase(&explicit).await.unwrap();

    let history = ledger.db().cost_history().history(TENANT, &product).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].previous_cost, Some(1190));
    assert_eq!(history[0].new_cost, 1190);
}

#[tokio::test]
async fn extra_charges_affect_total_only() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 0, true).await;

    let mut request = purchase_of(&product, 10, 1000);
    request.extra_items = vec![ExtraCharge {
        description: "Freight".to_string(),
        amount: 5000,
    }];

    let detail = ledger.purchases().create_purchase(&request).await.unwrap();

    assert_eq!(detail.purchase.total_amount, 15000);
    assert_eq!(stock_of(&ledger, &product).await, 10);

    let extras: Vec<_> = detail.items.iter().filter(|i| i.is_extra()).collect();
    assert_eq!(extras.len(), 1);
    assert_eq!(extras[0].product_name, "[EXTRA] Freight");
    assert_eq!(extras[0].product_id, None);
    assert_eq!(extras[0].previous_stock, None);

    // Freight never becomes product cost.
    let history = ledger.db().cost_history().history(TENANT, &product).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].new_cost, 1000);
}

#[tokio::test]
async fn purchase_line_can_create_a_product() {
    let ledger = ledger().await;

    let request = CreatePurchaseRequest {
        supplier_id: None,
        invoice_number: None,
        notes: None,
        invoice_photo: None,
        items: vec![PurchaseLine {
            product_id: None,
            new_product: Some(NewProductSpec {
                name: "Brand New Snack".to_string(),
                sku: None,
                barcode: None,
                base_price: Some(2000),
            }),
            quantity: 24,
            purchase_price: 1190,
            unit_cost: None,
            sale_price: None,
        }],
        extra_items: vec![],
        actor: None,
    };

    let detail = ledger.purchases().create_purchase(&request).await.unwrap();
    let product_id = detail.items[0].product_id.clone().unwrap();

    let product = ledger
        .db()
        .products()
        .get_by_id(TENANT, &product_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.name, "Brand New Snack");
    assert_eq!(product.stock, 24);
    assert_eq!(product.base_price, 2000);
    assert_eq!(product.cost, Some(1190));
    assert!(product.track_stock);
    assert!(product.sku.starts_with("AUTO-"));

    assert_eq!(detail.items[0].previous_stock, Some(0));
    assert_eq!(detail.items[0].new_stock, Some(24));
}

#[tokio::test]
async fn purchase_can_update_the_sale_price() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 0, true).await;

    let mut request = purchase_of(&product, 10, 1000);
    request.items[0].sale_price = Some(2500);

    ledger.purchases().create_purchase(&request).await.unwrap();

    let updated = ledger
        .db()
        .products()
        .get_by_id(TENANT, &product)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.base_price, 2500);

    let prices = ledger
        .db()
        .cost_history()
        .price_history(TENANT, &product)
        .await
        .unwrap();
    assert_eq!(prices.len(), 1);
    assert_eq!(prices[0].previous_price, Some(12000));
    assert_eq!(prices[0].new_price, 2500);
}

#[tokio::test]
async fn cancelling_a_purchase_reverses_stock_and_keeps_history() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 0, true).await;

    let detail = ledger
        .purchases()
        .create_purchase(&purchase_of(&product, 10, 1190))
        .await
        .unwrap();

    // Most of the received units were already sold.
    ledger
        .sales()
        .create_sale(&cash_sale(&[(&product, 8, 2000)]))
        .await
        .unwrap();
    assert_eq!(stock_of(&ledger, &product).await, 2);

    let request = CancelPurchaseRequest {
        purchase_id: detail.purchase.id.clone(),
        reason: Some("wrong delivery".to_string()),
        revert_cost: false,
        actor: None,
    };
    let cancelled = ledger.purchases().cancel_purchase(&request).await.unwrap();

    assert_eq!(cancelled.status, PurchaseStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason.as_deref(), Some("wrong delivery"));
    // Undoing the receipt tolerates a negative counter.
    assert_eq!(stock_of(&ledger, &product).await, -8);

    // The audit trail survives cancellation.
    let history = ledger.db().cost_history().history(TENANT, &product).await.unwrap();
    assert_eq!(history.len(), 1);

    let err = ledger.purchases().cancel_purchase(&request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    assert_eq!(stock_of(&ledger, &product).await, -8);
}

#[tokio::test]
async fn cancel_with_revert_cost_appends_compensating_entry() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 0, true).await;

    ledger
        .inventory()
        .set_cost(&SetCostRequest {
            product_id: product.clone(),
            new_cost: 500,
            reason: None,
            actor: None,
        })
        .await
        .unwrap();

    let detail = ledger
        .purchases()
        .create_purchase(&purchase_of(&product, 10, 1190))
        .await
        .unwrap();
    assert_eq!(
        ledger.db().cost_history().current(TENANT, &product).await.unwrap(),
        Some(1190)
    );

    ledger
        .purchases()
        .cancel_purchase(&CancelPurchaseRequest {
            purchase_id: detail.purchase.id,
            reason: None,
            revert_cost: true,
            actor: None,
        })
        .await
        .unwrap();

    let history = ledger.db().cost_history().history(TENANT, &product).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].source, CostSource::System);
    assert_eq!(history[0].new_cost, 500);
    assert_eq!(
        ledger.db().cost_history().current(TENANT, &product).await.unwrap(),
        Some(500)
    );
}

#[tokio::test]
async fn revert_cost_skips_products_without_prior_cost() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 0, true).await;

    let detail = ledger
        .purchases()
        .create_purchase(&purchase_of(&product, 10, 1190))
        .await
        .unwrap();

    ledger
        .purchases()
        .cancel_purchase(&CancelPurchaseRequest {
            purchase_id: detail.purchase.id,
            reason: None,
            revert_cost: true,
            actor: None,
        })
        .await
        .unwrap();

    // Nothing to revert to: the purchase wrote the first cost ever.
    let history = ledger.db().cost_history().history(TENANT, &product).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(
        ledger.db().cost_history().current(TENANT, &product).await.unwrap(),
        Some(1190)
    );
}

#[tokio::test]
async fn purchase_line_needs_exactly_one_product_reference() {
    let ledger = ledger().await;

    let request = CreatePurchaseRequest {
        supplier_id: None,
        invoice_number: None,
        notes: None,
        invoice_photo: None,
        items: vec![PurchaseLine {
            product_id: None,
            new_product: None,
            quantity: 1,
            purchase_price: 100,
            unit_cost: None,
            sale_price: None,
        }],
        extra_items: vec![],
        actor: None,
    };

    let err = ledger.purchases().create_purchase(&request).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Validation);
}

// =============================================================================
// Inventory
// =============================================================================

#[tokio::test]
async fn manual_adjustment_respects_the_floor() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 0, true).await;

    let change = ledger
        .inventory()
        .adjust_stock(&StockAdjustmentRequest {
            product_id: product.clone(),
            delta: 5,
            reason: Some("initial count".to_string()),
            actor: Some("admin-1".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(change.previous, 0);
    assert_eq!(change.new, 5);

    let err = ledger
        .inventory()
        .adjust_stock(&StockAdjustmentRequest {
            product_id: product.clone(),
            delta: -10,
            reason: None,
            actor: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InsufficientStock);
    assert_eq!(stock_of(&ledger, &product).await, 5);

    let movements = ledger
        .db()
        .movements()
        .list_for_product(TENANT, &product, 10)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
}

#[tokio::test]
async fn manual_cost_edit_dedups_unchanged_values() {
    let ledger = ledger().await;
    let product = seed_product(&ledger, "Widget", 0, true).await;

    let first = ledger
        .inventory()
        .set_cost(&SetCostRequest {
            product_id: product.clone(),
            new_cost: 800,
            reason: Some("invoice check".to_string()),
            actor: None,
        })
        .await
        .unwrap();
    assert!(first.is_some());
    assert_eq!(first.unwrap().previous_cost, None);

    let second = ledger
        .inventory()
        .set_cost(&SetCostRequest {
            product_id: product.clone(),
            new_cost: 800,
            reason: None,
            actor: None,
        })
        .await
        .unwrap();
    assert!(second.is_none());

    let history = ledger.db().cost_history().history(TENANT, &product).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].source, CostSource::Manual);
}
