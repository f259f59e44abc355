//! # Location Repository
//!
//! Minimal store/warehouse lookup. Locations are managed elsewhere; the
//! ledger only needs to validate them when opening a till session and to
//! resolve names for receipts.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use till_core::Location;

const LOCATION_COLUMNS: &str = "id, tenant_id, name, active, created_at";

/// Repository for location lookups.
#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
}

impl LocationRepository {
    /// Creates a new LocationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LocationRepository { pool }
    }

    /// Gets a location by ID.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Location>> {
        let sql =
            format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1 AND tenant_id = ?2");
        let location = sqlx::query_as::<_, Location>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(location)
    }

    /// Fetches an *active* location inside the caller's transaction.
    pub async fn get_active_tx(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
    ) -> DbResult<Option<Location>> {
        let sql = format!(
            "SELECT {LOCATION_COLUMNS} FROM locations \
             WHERE id = ?1 AND tenant_id = ?2 AND active = 1"
        );
        let location = sqlx::query_as::<_, Location>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(location)
    }

    /// Inserts a location.
    pub async fn insert(&self, location: &Location) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO locations (id, tenant_id, name, active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&location.id)
        .bind(&location.tenant_id)
        .bind(&location.name)
        .bind(location.active)
        .bind(location.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
