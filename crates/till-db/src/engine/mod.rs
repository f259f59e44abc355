//! # Transactional Engines
//!
//! The engines are the write boundary of the retail ledger. Each public
//! engine method is one serializable unit of work: it validates its input,
//! opens one transaction, composes repository writes and stock-ledger
//! adjustments inside it, and either commits everything or nothing.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Engine Layout                                   │
//! │                                                                         │
//! │   SaleEngine        create_sale         cart → order + stock decrement │
//! │   VoidEngine        void_sale           order → cancelled + restock    │
//! │   SessionManager    open / close        till state machine             │
//! │   PurchaseEngine    create / cancel     invoice → stock + cost history │
//! │   Inventory         adjust / set_cost   manual operator corrections    │
//! │                                                                         │
//! │   All stock writes go through StockLedger::adjust; all cost writes     │
//! │   through CostHistoryLog::record_tx. Engines never touch the columns.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Contention
//! Concurrent calls touching the same rows serialize on SQLite's write
//! lock. When the bounded busy timeout expires the transaction fails as
//! [`Contention`](crate::ErrorCode::Contention); [`retry_contention`] rolls
//! the whole unit of work again a bounded number of times with backoff.
//! Conflicts (already voided/closed) are never retried.

pub mod inventory;
pub mod purchase;
pub mod sale;
pub mod session;
pub mod void;

#[cfg(test)]
mod tests;

pub use inventory::Inventory;
pub use purchase::PurchaseEngine;
pub use sale::SaleEngine;
pub use session::SessionManager;
pub use void::VoidEngine;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::LedgerResult;
use crate::pool::Database;
use till_core::{CostBasis, VatRate};

// =============================================================================
// Configuration
// =============================================================================

/// Per-tenant configuration handed to every engine at construction.
///
/// Nothing here is a compiled-in constant: two tenants with different tax
/// regimes (or cost conventions) are served by the same process with two
/// configs.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Tenant all operations are scoped to.
    pub tenant_id: String,

    /// VAT rate used for the gross/net conversion at purchase entry.
    pub vat: VatRate,

    /// Whether purchase costs are recorded gross (as invoiced) or net.
    pub cost_basis: CostBasis,

    /// ISO currency code stamped onto cost/price history rows.
    pub currency: String,
}

impl LedgerConfig {
    /// Creates a configuration for a tenant with zero VAT, gross cost
    /// recording and CLP currency.
    pub fn new(tenant_id: impl Into<String>) -> Self {
        LedgerConfig {
            tenant_id: tenant_id.into(),
            vat: VatRate::zero(),
            cost_basis: CostBasis::Gross,
            currency: "CLP".to_string(),
        }
    }

    /// Sets the VAT rate.
    pub fn vat(mut self, vat: VatRate) -> Self {
        self.vat = vat;
        self
    }

    /// Sets the cost recording basis.
    pub fn cost_basis(mut self, basis: CostBasis) -> Self {
        self.cost_basis = basis;
        self
    }

    /// Sets the currency code.
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

// =============================================================================
// Ledger Facade
// =============================================================================

/// Entry point bundling the database with one tenant's configuration.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./till.db")).await?;
/// let ledger = Ledger::new(db, LedgerConfig::new(tenant_id).vat(VatRate::from_bps(1900)));
///
/// let receipt = ledger.sales().create_sale(&request).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Database,
    config: LedgerConfig,
}

impl Ledger {
    /// Creates a new ledger facade.
    pub fn new(db: Database, config: LedgerConfig) -> Self {
        Ledger { db, config }
    }

    /// Returns the underlying database handle (repositories, read paths).
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Returns the tenant configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Returns the sale engine.
    pub fn sales(&self) -> SaleEngine {
        SaleEngine::new(self.db.pool().clone(), self.config.clone())
    }

    /// Returns the void engine.
    pub fn voids(&self) -> VoidEngine {
        VoidEngine::new(self.db.pool().clone(), self.config.clone())
    }

    /// Returns the cash session manager.
    pub fn sessions(&self) -> SessionManager {
        SessionManager::new(self.db.pool().clone(), self.config.clone())
    }

    /// Returns the purchase ingestion engine.
    pub fn purchases(&self) -> PurchaseEngine {
        PurchaseEngine::new(self.db.pool().clone(), self.config.clone())
    }

    /// Returns the manual inventory service.
    pub fn inventory(&self) -> Inventory {
        Inventory::new(self.db.pool().clone(), self.config.clone())
    }
}

// =============================================================================
// Contention Retry
// =============================================================================

/// Attempts per unit of work before contention is surfaced to the caller.
pub(crate) const MAX_TX_ATTEMPTS: u32 = 3;

/// Base backoff between attempts; grows linearly.
pub(crate) const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Re-runs a whole unit of work while it fails with a retryable contention
/// error.
///
/// This is the only automatic retry in the system, and it lives at the
/// transaction-wrapper level: business logic inside `op` never loops on its
/// own. State-machine conflicts and validation failures pass through on the
/// first attempt.
pub(crate) async fn retry_contention<T, Fut>(mut op: impl FnMut() -> Fut) -> LedgerResult<T>
where
    Fut: Future<Output = LedgerResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Err(err) if err.is_contention() && attempt + 1 < MAX_TX_ATTEMPTS => {
                attempt += 1;
                warn!(attempt, error = %err, "Transaction contention, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            result => return result,
        }
    }
}
