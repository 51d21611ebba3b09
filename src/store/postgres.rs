//! PostgreSQL record store.
//!
//! Tables live in the `kg_integration` schema and are created by the
//! embedded migrations under `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{MetadataStore, SpaceStore};
use crate::config::DatabaseConfig;
use crate::error::{is_unique_violation, GatewayError, GatewayResult};
use crate::models::{
    MetadataRecord, NewMetadataRecord, NewSpaceRecord, SpaceRecord, SpaceStatus, SyncDirection,
};

const SPACE_COLUMNS: &str = "name, creator, created_at, status, scope";
const METADATA_COLUMNS: &str = "id, metadata_id, kg_instance_id, dataset_id, direction, uploaded_at";

#[derive(Debug, FromRow)]
struct SpaceRow {
    name: String,
    creator: String,
    created_at: DateTime<Utc>,
    status: String,
    scope: String,
}

impl TryFrom<SpaceRow> for SpaceRecord {
    type Error = GatewayError;

    fn try_from(row: SpaceRow) -> Result<Self, Self::Error> {
        Ok(SpaceRecord {
            name: row.name,
            creator: row.creator,
            created_at: row.created_at,
            status: row.status.parse()?,
            scope: row.scope.parse()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct MetadataRow {
    id: Uuid,
    metadata_id: Uuid,
    kg_instance_id: Uuid,
    dataset_id: Uuid,
    direction: String,
    uploaded_at: DateTime<Utc>,
}

impl TryFrom<MetadataRow> for MetadataRecord {
    type Error = GatewayError;

    fn try_from(row: MetadataRow) -> Result<Self, Self::Error> {
        Ok(MetadataRecord {
            id: row.id,
            reference_id: row.metadata_id,
            kg_instance_id: row.kg_instance_id,
            dataset_id: row.dataset_id,
            direction: row.direction.parse()?,
            synced_at: row.uploaded_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> GatewayResult<Vec<T>>
where
    T: TryFrom<R, Error = GatewayError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> GatewayResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| GatewayError::NotAvailable(format!("database connection failed: {e}")))?;
        info!(max_connections = config.max_connections, "Database pool created");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> GatewayResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::Database(format!("migration failed: {e}")))?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SpaceStore for PostgresStore {
    async fn insert(&self, space: NewSpaceRecord) -> GatewayResult<SpaceRecord> {
        let sql = format!(
            "INSERT INTO kg_integration.spaces (name, creator, created_at, status, scope) \
             VALUES ($1, $2, NOW(), $3, $4) RETURNING {SPACE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SpaceRow>(&sql)
            .bind(&space.name)
            .bind(&space.creator)
            .bind(SpaceStatus::Pending.as_str())
            .bind(space.scope.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    GatewayError::SpaceAlreadyExists
                } else {
                    GatewayError::from(e)
                }
            })?;
        debug!(space = %space.name, "Space record inserted");
        row.try_into()
    }

    async fn get(&self, name: &str) -> GatewayResult<SpaceRecord> {
        let sql = format!("SELECT {SPACE_COLUMNS} FROM kg_integration.spaces WHERE name = $1");
        sqlx::query_as::<_, SpaceRow>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::NotFound)?
            .try_into()
    }

    async fn delete(&self, name: &str) -> GatewayResult<()> {
        let result = sqlx::query("DELETE FROM kg_integration.spaces WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::NotFound);
        }
        Ok(())
    }

    async fn list_by_names(&self, names: &[String]) -> GatewayResult<Vec<SpaceRecord>> {
        let sql = format!(
            "SELECT {SPACE_COLUMNS} FROM kg_integration.spaces WHERE name = ANY($1) ORDER BY name"
        );
        let rows = sqlx::query_as::<_, SpaceRow>(&sql)
            .bind(names)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn update_status(&self, name: &str, status: SpaceStatus) -> GatewayResult<()> {
        let result = sqlx::query("UPDATE kg_integration.spaces SET status = $2 WHERE name = $1")
            .bind(name)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::NotFound);
        }
        Ok(())
    }

    async fn list_reconcilable(&self, pending_before: DateTime<Utc>) -> GatewayResult<Vec<SpaceRecord>> {
        let sql = format!(
            "SELECT {SPACE_COLUMNS} FROM kg_integration.spaces \
             WHERE status = $1 OR (status = $2 AND created_at < $3) \
             ORDER BY created_at"
        );
        let rows = sqlx::query_as::<_, SpaceRow>(&sql)
            .bind(SpaceStatus::Failed.as_str())
            .bind(SpaceStatus::Pending.as_str())
            .bind(pending_before)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn ping(&self) -> GatewayResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn upsert(&self, record: NewMetadataRecord) -> GatewayResult<MetadataRecord> {
        // Conflicts on metadata_id refresh the sync fields; a clash on
        // kg_instance_id is a unique violation.
        let sql = format!(
            "INSERT INTO kg_integration.metadata \
             (id, metadata_id, kg_instance_id, dataset_id, direction, uploaded_at) \
             VALUES ($1, $2, $3, $4, $5, NOW()) \
             ON CONFLICT (metadata_id) DO UPDATE \
             SET direction = EXCLUDED.direction, uploaded_at = NOW() \
             RETURNING {METADATA_COLUMNS}"
        );
        let reference_id = record.reference_id;
        let row = sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(record.reference_id)
            .bind(record.kg_instance_id)
            .bind(record.dataset_id)
            .bind(record.direction.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    GatewayError::MetadataAlreadyExists
                } else {
                    GatewayError::from(e)
                }
            })?;
        debug!(metadata_id = %reference_id, "Metadata record upserted");
        row.try_into()
    }

    async fn get_by_reference_id(&self, reference_id: Uuid) -> GatewayResult<MetadataRecord> {
        let sql = format!("SELECT {METADATA_COLUMNS} FROM kg_integration.metadata WHERE metadata_id = $1");
        sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(reference_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::NotFound)?
            .try_into()
    }

    async fn get_by_kg_instance_id(&self, kg_instance_id: Uuid) -> GatewayResult<MetadataRecord> {
        let sql = format!("SELECT {METADATA_COLUMNS} FROM kg_integration.metadata WHERE kg_instance_id = $1");
        sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(kg_instance_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::NotFound)?
            .try_into()
    }

    async fn list_by_reference_ids(&self, reference_ids: &[Uuid]) -> GatewayResult<Vec<MetadataRecord>> {
        let sql = format!(
            "SELECT {METADATA_COLUMNS} FROM kg_integration.metadata WHERE metadata_id = ANY($1)"
        );
        let rows = sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(reference_ids)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn list_by_dataset(&self, dataset_id: Uuid) -> GatewayResult<Vec<MetadataRecord>> {
        let sql = format!(
            "SELECT {METADATA_COLUMNS} FROM kg_integration.metadata \
             WHERE dataset_id = $1 ORDER BY uploaded_at"
        );
        let rows = sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(dataset_id)
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    async fn update_direction(
        &self,
        reference_id: Uuid,
        direction: SyncDirection,
    ) -> GatewayResult<MetadataRecord> {
        let sql = format!(
            "UPDATE kg_integration.metadata SET direction = $2, uploaded_at = NOW() \
             WHERE metadata_id = $1 RETURNING {METADATA_COLUMNS}"
        );
        sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(reference_id)
            .bind(direction.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::NotFound)?
            .try_into()
    }

    async fn delete_by_kg_instance_id(&self, kg_instance_id: Uuid) -> GatewayResult<()> {
        let result = sqlx::query("DELETE FROM kg_integration.metadata WHERE kg_instance_id = $1")
            .bind(kg_instance_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::NotFound);
        }
        Ok(())
    }
}
