use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, types::Json, PgPool, Row};

use crate::model::{Entity, Id};
use crate::store::traits::{Repository, Store};

/// Document store on PostgreSQL: one table per collection, each row holding
/// the record's identifier and its JSON document.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }
}

fn entity_from_row<E: Entity>(row: PgRow) -> Result<E> {
    let id: Id = row.try_get("id").context("Failed to read record id")?;
    let document: serde_json::Value = row
        .try_get("document")
        .context("Failed to read record document")?;
    let mut entity: E = serde_json::from_value(document)
        .with_context(|| format!("Failed to deserialize {} document", E::ENTITY_NAME))?;
    entity.set_id(id);
    entity.normalize();
    Ok(entity)
}

#[async_trait::async_trait]
impl<E: Entity> Repository<E> for PostgresStore {
    async fn insert(&self, mut entity: E) -> Result<E> {
        let id: Id = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence($1, 'id'))")
            .bind(E::COLLECTION)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to allocate {} id", E::ENTITY_NAME))?;
        entity.set_id(id);

        let sql = format!("INSERT INTO {} (id, document) VALUES ($1, $2)", E::COLLECTION);
        sqlx::query(&sql)
            .bind(id)
            .bind(Json(&entity))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert {}", E::ENTITY_NAME))?;

        Ok(entity)
    }

    async fn save(&self, entity: E) -> Result<E> {
        let id = entity
            .id()
            .with_context(|| format!("Cannot save {} without an id", E::ENTITY_NAME))?;

        let sql = format!(
            r#"
            INSERT INTO {} (id, document)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET
                document = EXCLUDED.document,
                updated_at = NOW()
            "#,
            E::COLLECTION
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(Json(&entity))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to save {}", E::ENTITY_NAME))?;

        Ok(entity)
    }

    async fn find_by_id(&self, id: Id) -> Result<Option<E>> {
        let sql = format!("SELECT id, document FROM {} WHERE id = $1", E::COLLECTION);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch {}", E::ENTITY_NAME))?;

        let Some(row) = row else {
            return Ok(None);
        };

        entity_from_row(row).map(Some)
    }

    async fn find_all(&self) -> Result<Vec<E>> {
        let sql = format!("SELECT id, document FROM {} ORDER BY id", E::COLLECTION);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list {}", E::ENTITY_NAME))?;

        rows.into_iter().map(entity_from_row).collect()
    }

    async fn exists_by_id(&self, id: Id) -> Result<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", E::COLLECTION);
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to check {} existence", E::ENTITY_NAME))?;
        Ok(exists)
    }

    async fn delete_by_id(&self, id: Id) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", E::COLLECTION);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete {}", E::ENTITY_NAME))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", E::COLLECTION);
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", E::ENTITY_NAME))?;
        Ok(count.max(0) as u64)
    }
}

impl Store for PostgresStore {}
