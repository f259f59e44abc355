//! # Cash Session Manager
//!
//! State machine for a till: `NONE → OPEN → CLOSED` per cashier.
//!
//! ## Reconciliation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  close(session)                                                         │
//! │                                                                         │
//! │  orders stamped with this session (reference fixed at sale time)       │
//! │       │                                                                 │
//! │       ├── non-cancelled ──► total_sales, total_cash/card/transfer      │
//! │       └── cancelled     ──► total_cancelled                            │
//! │                                                                         │
//! │  expected_cash = opening_amount + total_cash                           │
//! │  difference    = closing_amount − expected_cash   (only if counted)    │
//! │                                                                         │
//! │  difference is advisory: a shortage never blocks the close.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::engine::{retry_contention, LedgerConfig};
use crate::error::{DbError, LedgerResult};
use crate::repository::location::LocationRepository;
use crate::repository::new_id;
use crate::repository::order::OrderRepository;
use crate::repository::session::{SessionClose, SessionCloseTotals, SessionRepository};
use till_core::validation::validate_amount;
use till_core::{CashSession, CoreError, SessionStatus, ValidationError};

// =============================================================================
// Request / Response
// =============================================================================

/// Input for [`SessionManager::open`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    pub location_id: String,
    /// The cashier opening the drawer.
    pub user_id: String,
    /// Cash float counted into the drawer.
    #[serde(default)]
    pub opening_amount: i64,
}

/// A freshly opened session plus the resolved location name for the till
/// header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenedSession {
    pub session: CashSession,
    pub location_name: String,
}

/// Input for [`SessionManager::close`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSessionRequest {
    pub session_id: String,
    /// Counted cash. When absent, no difference is computed.
    #[serde(default)]
    pub closing_amount: Option<i64>,
    #[serde(default)]
    pub closing_notes: Option<String>,
    /// Operator performing the close.
    #[serde(default)]
    pub actor: Option<String>,
    /// Admin closing another cashier's drawer. Requires `force_note`.
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub force_note: Option<String>,
}

// =============================================================================
// Engine
// =============================================================================

/// The cash session manager.
#[derive(Debug, Clone)]
pub struct SessionManager {
    pool: SqlitePool,
    config: LedgerConfig,
}

impl SessionManager {
    /// Creates a new SessionManager.
    pub fn new(pool: SqlitePool, config: LedgerConfig) -> Self {
        SessionManager { pool, config }
    }

    /// Opens a till session for a cashier at a location.
    ///
    /// Fails with `SessionAlreadyOpen` (naming the open session) if the
    /// cashier has an unclosed drawer anywhere. The check runs inside the
    /// transaction; a partial unique index on open sessions backstops it
    /// against races.
    pub async fn open(&self, request: &OpenSessionRequest) -> LedgerResult<OpenedSession> {
        validate_amount("opening_amount", request.opening_amount)?;
        retry_contention(|| self.open_tx(request)).await
    }

    async fn open_tx(&self, request: &OpenSessionRequest) -> LedgerResult<OpenedSession> {
        let tenant_id = &self.config.tenant_id;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let location = LocationRepository::get_active_tx(&mut tx, tenant_id, &request.location_id)
            .await?
            .ok_or_else(|| CoreError::LocationNotFound(request.location_id.clone()))?;

        if let Some(existing) =
            SessionRepository::find_open_for_user_tx(&mut tx, tenant_id, &request.user_id).await?
        {
            return Err(CoreError::SessionAlreadyOpen {
                session_id: existing.id,
            }
            .into());
        }

        let session = CashSession {
            id: new_id(),
            tenant_id: tenant_id.clone(),
            location_id: request.location_id.clone(),
            user_id: request.user_id.clone(),
            status: SessionStatus::Open,
            opening_amount: request.opening_amount,
            closing_amount: None,
            closing_notes: None,
            total_sales: None,
            total_cash: None,
            total_card: None,
            total_transfer: None,
            total_cancelled: None,
            expected_cash: None,
            difference: None,
            force_closed_by: None,
            force_closed_note: None,
            opened_at: now,
            closed_at: None,
        };
        SessionRepository::insert_tx(&mut tx, &session).await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            session_id = %session.id,
            user_id = %request.user_id,
            location = %location.name,
            opening_amount = %request.opening_amount,
            "Session opened"
        );

        Ok(OpenedSession {
            session,
            location_name: location.name,
        })
    }

    /// Closes a session and returns it with the computed reconciliation.
    ///
    /// Only orders whose `pos_session_id` equals this session count; the
    /// reference is fixed when the order is created and never reassigned.
    /// Cancelled orders are excluded from the sales totals and reported
    /// separately.
    pub async fn close(&self, request: &CloseSessionRequest) -> LedgerResult<CashSession> {
        if let Some(counted) = request.closing_amount {
            validate_amount("closing_amount", counted)?;
        }
        if request.force && request.force_note.as_deref().map_or(true, |n| n.trim().is_empty()) {
            return Err(ValidationError::Required {
                field: "force_note".to_string(),
            }
            .into());
        }
        retry_contention(|| self.close_tx(request)).await
    }

    async fn close_tx(&self, request: &CloseSessionRequest) -> LedgerResult<CashSession> {
        let tenant_id = &self.config.tenant_id;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let session = SessionRepository::get_by_id_tx(&mut tx, tenant_id, &request.session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(request.session_id.clone()))?;
        if !session.is_open() {
            return Err(CoreError::AlreadyClosed {
                session_id: request.session_id.clone(),
            }
            .into());
        }

        let orders =
            OrderRepository::session_order_totals_tx(&mut tx, tenant_id, &request.session_id)
                .await?;

        let mut totals = SessionCloseTotals::default();
        for (total, method, status) in &orders {
            if status == "CANCELLED" {
                totals.total_cancelled += total;
                continue;
            }
            totals.total_sales += total;
            match method.as_str() {
                "CASH" => totals.total_cash += total,
                "CARD" => totals.total_card += total,
                "TRANSFER" => totals.total_transfer += total,
                _ => {}
            }
        }
        totals.expected_cash = session.opening_amount + totals.total_cash;
        totals.difference = request.closing_amount.map(|c| c - totals.expected_cash);

        let status = if request.force {
            SessionStatus::ForceClosed
        } else {
            SessionStatus::Closed
        };

        let flipped = SessionRepository::close_tx(
            &mut tx,
            tenant_id,
            &request.session_id,
            SessionClose {
                status,
                closing_amount: request.closing_amount,
                closing_notes: request.closing_notes.as_deref(),
                totals,
                force_closed_by: if request.force {
                    request.actor.as_deref()
                } else {
                    None
                },
                force_closed_note: if request.force {
                    request.force_note.as_deref()
                } else {
                    None
                },
                closed_at: now,
            },
        )
        .await?;

        if !flipped {
            return Err(CoreError::AlreadyClosed {
                session_id: request.session_id.clone(),
            }
            .into());
        }

        let closed = SessionRepository::get_by_id_tx(&mut tx, tenant_id, &request.session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(request.session_id.clone()))?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            session_id = %request.session_id,
            total_sales = %totals.total_sales,
            expected_cash = %totals.expected_cash,
            difference = ?totals.difference,
            forced = request.force,
            "Session closed"
        );

        Ok(closed)
    }

    /// Returns a cashier's open session, if any. Read-only convenience for
    /// the till header.
    pub async fn active_for_user(&self, user_id: &str) -> LedgerResult<Option<CashSession>> {
        let repo = SessionRepository::new(self.pool.clone());
        Ok(repo
            .find_open_for_user(&self.config.tenant_id, user_id)
            .await?)
    }
}
