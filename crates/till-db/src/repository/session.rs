//! # Session Repository
//!
//! Database operations for till sessions.
//!
//! The one-open-session-per-cashier invariant is backed by a partial unique
//! index on `(tenant_id, user_id) WHERE status = 'OPEN'`; the engine-level
//! check exists for a friendly error, the index makes it race-proof.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::CashSession;

const SESSION_COLUMNS: &str = "id, tenant_id, location_id, user_id, status, \
     opening_amount, closing_amount, closing_notes, total_sales, total_cash, \
     total_card, total_transfer, total_cancelled, expected_cash, difference, \
     force_closed_by, force_closed_note, opened_at, closed_at";

/// Aggregates written onto the session row at close.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionCloseTotals {
    pub total_sales: i64,
    pub total_cash: i64,
    pub total_card: i64,
    pub total_transfer: i64,
    pub total_cancelled: i64,
    pub expected_cash: i64,
    pub difference: Option<i64>,
}

/// Everything the close transition writes, bundled so the update stays one
/// statement.
#[derive(Debug, Clone)]
pub struct SessionClose<'a> {
    pub status: till_core::SessionStatus,
    pub closing_amount: Option<i64>,
    pub closing_notes: Option<&'a str>,
    pub totals: SessionCloseTotals,
    pub force_closed_by: Option<&'a str>,
    pub force_closed_note: Option<&'a str>,
    pub closed_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for session database operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Gets a session by ID.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<CashSession>> {
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM pos_sessions WHERE id = ?1 AND tenant_id = ?2");
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Finds a cashier's open session, if any.
    pub async fn find_open_for_user(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> DbResult<Option<CashSession>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_open_for_user_tx(&mut conn, tenant_id, user_id).await
    }

    /// Finds a cashier's open session inside the caller's transaction.
    pub async fn find_open_for_user_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        user_id: &str,
    ) -> DbResult<Option<CashSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM pos_sessions \
             WHERE tenant_id = ?1 AND user_id = ?2 AND status = 'OPEN'"
        );
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(tenant_id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(session)
    }

    /// Fetches a session inside the caller's transaction.
    pub async fn get_by_id_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
    ) -> DbResult<Option<CashSession>> {
        let sql =
            format!("SELECT {SESSION_COLUMNS} FROM pos_sessions WHERE id = ?1 AND tenant_id = ?2");
        let session = sqlx::query_as::<_, CashSession>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(session)
    }

    /// Inserts a new session inside the caller's transaction.
    pub async fn insert_tx(conn: &mut SqliteConnection, session: &CashSession) -> DbResult<()> {
        debug!(id = %session.id, user_id = %session.user_id, "Inserting session");

        sqlx::query(
            r#"
            INSERT INTO pos_sessions (
                id, tenant_id, location_id, user_id, status, opening_amount,
                closing_amount, closing_notes, total_sales, total_cash,
                total_card, total_transfer, total_cancelled, expected_cash,
                difference, force_closed_by, force_closed_note, opened_at,
                closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                      ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
        )
        .bind(&session.id)
        .bind(&session.tenant_id)
        .bind(&session.location_id)
        .bind(&session.user_id)
        .bind(session.status)
        .bind(session.opening_amount)
        .bind(session.closing_amount)
        .bind(&session.closing_notes)
        .bind(session.total_sales)
        .bind(session.total_cash)
        .bind(session.total_card)
        .bind(session.total_transfer)
        .bind(session.total_cancelled)
        .bind(session.expected_cash)
        .bind(session.difference)
        .bind(&session.force_closed_by)
        .bind(&session.force_closed_note)
        .bind(session.opened_at)
        .bind(session.closed_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Closes an open session, inside the caller's transaction.
    ///
    /// Guarded on `status = 'OPEN'`; the returned flag is false when another
    /// close won the race (or the session was already closed).
    pub async fn close_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
        close: SessionClose<'_>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE pos_sessions SET
                status = ?3,
                closing_amount = ?4,
                closing_notes = ?5,
                total_sales = ?6,
                total_cash = ?7,
                total_card = ?8,
                total_transfer = ?9,
                total_cancelled = ?10,
                expected_cash = ?11,
                difference = ?12,
                force_closed_by = ?13,
                force_closed_note = ?14,
                closed_at = ?15
            WHERE id = ?1 AND tenant_id = ?2 AND status = 'OPEN'
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(close.status)
        .bind(close.closing_amount)
        .bind(close.closing_notes)
        .bind(close.totals.total_sales)
        .bind(close.totals.total_cash)
        .bind(close.totals.total_card)
        .bind(close.totals.total_transfer)
        .bind(close.totals.total_cancelled)
        .bind(close.totals.expected_cash)
        .bind(close.totals.difference)
        .bind(close.force_closed_by)
        .bind(close.force_closed_note)
        .bind(close.closed_at)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists a cashier's sessions, newest first.
    pub async fn list_for_user(
        &self,
        tenant_id: &str,
        user_id: &str,
        limit: u32,
    ) -> DbResult<Vec<CashSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM pos_sessions \
             WHERE tenant_id = ?1 AND user_id = ?2 ORDER BY opened_at DESC LIMIT ?3"
        );
        let sessions = sqlx::query_as::<_, CashSession>(&sql)
            .bind(tenant_id)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(sessions)
    }
}
