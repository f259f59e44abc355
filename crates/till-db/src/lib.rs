//! # till-db: Database Layer and Engines for the Till Retail Ledger
//!
//! This crate provides SQLite persistence and every transaction boundary of
//! the system.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Till Data Flow                                 │
//! │                                                                         │
//! │  Caller (POS shell, admin API - not in this repo)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │    engine     │   │  repository    │   │  migrations  │   │   │
//! │  │   │ SaleEngine    │──►│ StockLedger    │   │  (embedded)  │   │   │
//! │  │   │ VoidEngine    │   │ CostHistoryLog │   │ 001_init.sql │   │   │
//! │  │   │ SessionMgr    │   │ Order/Session/ │   │ 002_idx.sql  │   │   │
//! │  │   │ PurchaseEng.  │   │ Purchase/...   │   │              │   │   │
//! │  │   └───────┬───────┘   └───────┬────────┘   └──────────────┘   │   │
//! │  │           │     one transaction per engine call               │   │
//! │  └───────────┼───────────────────┼────────────────────────────────┘   │
//! │              ▼                   ▼                                     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite (WAL mode)                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - DbError and the engine-boundary LedgerError
//! - [`repository`] - Per-aggregate repositories + the stock ledger
//! - [`engine`] - Sale/void/session/purchase/inventory engines
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig, Ledger, LedgerConfig};
//! use till_core::VatRate;
//!
//! let db = Database::new(DbConfig::new("path/to/till.db")).await?;
//! let ledger = Ledger::new(db, LedgerConfig::new(tenant_id).vat(VatRate::from_bps(1900)));
//!
//! let receipt = ledger.sales().create_sale(&request).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, ErrorCode, LedgerError, LedgerResult};
pub use pool::{Database, DbConfig};

// Engine re-exports for convenience
pub use engine::{
    Inventory, Ledger, LedgerConfig, PurchaseEngine, SaleEngine, SessionManager, VoidEngine,
};

// Repository re-exports for convenience
pub use repository::cost_history::CostHistoryLog;
pub use repository::location::LocationRepository;
pub use repository::movement::MovementRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::session::SessionRepository;
pub use repository::stock::{StockChange, StockLedger};
