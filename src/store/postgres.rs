use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::repository::{RegistrationFilter, RegistrationStore, StoreError, UnitOfWork};
use crate::domain::event_info::{EventInfo, EventStatus};
use crate::domain::registration::Registration;

// ============================================================================
// Postgres Store
// ============================================================================
//
// Tables (see migrations/0001_initial.sql):
// - events:          JSONB document + status/organization/version columns
// - registrations:   JSONB document (orders embedded) + version column +
//                    partial unique index on (event_id, user_id) for
//                    non-cancelled rows
// - outbox_messages: lifecycle events, written in the same transaction
//
// Writes are conditional on the version the document was loaded at: an
// insert expects no row, an update expects `version = $loaded`. Zero rows
// affected means another writer got there first.
//
// ============================================================================

const SCHEMA: &str = include_str!("../../migrations/0001_initial.sql");

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "Connected to Postgres");
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }

    fn registration_from_row(row: &PgRow) -> Result<Registration, StoreError> {
        let Json(mut registration) = row.try_get::<Json<Registration>, _>("doc")?;
        registration.set_version(row.try_get("version")?);
        Ok(registration)
    }

    async fn fetch_registration(
        &self,
        query: QueryBuilder<'_, Postgres>,
    ) -> Result<Option<Registration>, StoreError> {
        let mut query = query;
        let row = query.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::registration_from_row).transpose()
    }
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation(db.message().to_string());
        }
    }
    StoreError::Database(err)
}

/// A conditional write that touched no row lost the race for `expected`
fn ensure_written(
    rows_affected: u64,
    entity: &'static str,
    id: Uuid,
    expected: i64,
) -> Result<(), StoreError> {
    if rows_affected == 0 {
        return Err(StoreError::Conflict { entity, id, expected });
    }
    Ok(())
}

#[async_trait]
impl RegistrationStore for PgStore {
    async fn load_event(&self, event_id: Uuid) -> Result<Option<EventInfo>, StoreError> {
        let row = sqlx::query("SELECT doc, version FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| -> Result<EventInfo, StoreError> {
            let Json(mut event) = r.try_get::<Json<EventInfo>, _>("doc")?;
            event.set_version(r.try_get("version")?);
            Ok(event)
        })
        .transpose()
    }

    async fn load_registration(
        &self,
        registration_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        let mut query = QueryBuilder::new("SELECT doc, version FROM registrations WHERE id = ");
        query.push_bind(registration_id);
        self.fetch_registration(query).await
    }

    async fn find_active_registration(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        let mut query = QueryBuilder::new("SELECT doc, version FROM registrations WHERE event_id = ");
        query
            .push_bind(event_id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" AND status <> 'Cancelled'");
        self.fetch_registration(query).await
    }

    async fn find_registration_by_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Registration>, StoreError> {
        let needle = serde_json::json!([{ "id": order_id }]);
        let mut query = QueryBuilder::new("SELECT doc, version FROM registrations WHERE doc -> 'orders' @> ");
        query.push_bind(Json(needle));
        self.fetch_registration(query).await
    }

    async fn count_registrations(&self, event_id: Uuid) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn list_registrations(
        &self,
        filter: &RegistrationFilter,
    ) -> Result<Vec<Registration>, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT r.doc, r.version FROM registrations r JOIN events e ON e.id = r.event_id WHERE TRUE",
        );
        if let Some(event_id) = filter.event_id {
            query.push(" AND r.event_id = ").push_bind(event_id);
        }
        if let Some(user_id) = filter.user_id {
            query.push(" AND r.user_id = ").push_bind(user_id);
        }
        if let Some(organization_id) = filter.organization_id {
            query.push(" AND e.organization_id = ").push_bind(organization_id);
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<String> = filter.statuses.iter().map(|s| s.to_string()).collect();
            query.push(" AND r.status = ANY(").push_bind(statuses).push(")");
        }
        query.push(" ORDER BY r.id");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::registration_from_row).collect()
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for event in unit.events() {
            let query = if event.version() == 0 {
                sqlx::query(
                    "INSERT INTO events (id, organization_id, status, doc, version, updated_at)
                     VALUES ($1, $2, $3, $4, $5 + 1, now())
                     ON CONFLICT (id) DO NOTHING",
                )
            } else {
                sqlx::query(
                    "UPDATE events
                     SET organization_id = $2, status = $3, doc = $4,
                         version = $5 + 1, updated_at = now()
                     WHERE id = $1 AND version = $5",
                )
            };
            let written = query
                .bind(event.id)
                .bind(event.organization_id)
                .bind(event.status.to_string())
                .bind(Json(event))
                .bind(event.version())
                .execute(&mut *tx)
                .await
                .map_err(map_write_error)?;
            ensure_written(written.rows_affected(), "Event", event.id, event.version())?;
        }

        for (event_id, status) in unit.event_statuses() {
            let written = sqlx::query(
                "UPDATE events
                 SET status = $2, doc = jsonb_set(doc, '{status}', $3),
                     version = version + 1, updated_at = now()
                 WHERE id = $1",
            )
            .bind(event_id)
            .bind(status.to_string())
            .bind(Json(status))
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
            if written.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "Event",
                    id: *event_id,
                });
            }
        }

        for registration in unit.registrations() {
            let query = if registration.version() == 0 {
                sqlx::query(
                    "INSERT INTO registrations (id, event_id, user_id, status, doc, version, updated_at)
                     VALUES ($1, $2, $3, $4, $5, $6 + 1, now())
                     ON CONFLICT (id) DO NOTHING",
                )
            } else {
                sqlx::query(
                    "UPDATE registrations
                     SET event_id = $2, user_id = $3, status = $4, doc = $5,
                         version = $6 + 1, updated_at = now()
                     WHERE id = $1 AND version = $6",
                )
            };
            let written = query
                .bind(registration.id)
                .bind(registration.event_id)
                .bind(registration.user_id)
                .bind(registration.status().as_str())
                .bind(Json(registration))
                .bind(registration.version())
                .execute(&mut *tx)
                .await
                .map_err(map_write_error)?;
            ensure_written(
                written.rows_affected(),
                "Registration",
                registration.id,
                registration.version(),
            )?;
        }

        for envelope in unit.outbox() {
            sqlx::query(
                "INSERT INTO outbox_messages (
                    id, aggregate_id, aggregate_type, event_type, event_version,
                    payload, causation_id, correlation_id, user_id, created_at
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(envelope.event_id)
            .bind(envelope.aggregate_id)
            .bind(&envelope.aggregate_type)
            .bind(&envelope.event_type)
            .bind(envelope.event_version)
            .bind(Json(&envelope.event_data))
            .bind(envelope.causation_id)
            .bind(envelope.correlation_id)
            .bind(envelope.user_id)
            .bind(envelope.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;
        }

        tx.commit().await.map_err(map_write_error)?;

        tracing::info!(
            correlation_id = %unit.correlation_id(),
            events = unit.events().len(),
            registrations = unit.registrations().len(),
            outbox = unit.outbox().len(),
            "Committed unit of work"
        );
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Queries against a live database are exercised by deployments with
// DATABASE_URL set; these tests cover the pieces that need no connection.
//
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_declares_partial_unique_index() {
        assert!(SCHEMA.contains("CREATE UNIQUE INDEX IF NOT EXISTS registrations_active_event_user_idx"));
        assert!(SCHEMA.contains("WHERE status <> 'Cancelled'"));
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS outbox_messages"));
    }

    #[test]
    fn test_schema_versions_documents() {
        assert_eq!(SCHEMA.matches("BIGINT NOT NULL").count(), 2);
        assert!(SCHEMA.contains("optimistic concurrency"));
    }

    #[test]
    fn test_untouched_row_is_a_conflict() {
        let id = Uuid::now_v7();
        assert!(ensure_written(1, "Registration", id, 3).is_ok());
        assert!(matches!(
            ensure_written(0, "Registration", id, 3),
            Err(StoreError::Conflict { entity: "Registration", expected: 3, .. })
        ));
    }

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        let err = map_write_error(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }
}
