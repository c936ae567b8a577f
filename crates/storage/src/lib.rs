use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use shared::protocol::DocumentFields;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use uuid::Uuid;

const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// One document of a collection, with its fields kept as an opaque JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub collection: String,
    pub document_id: String,
    pub fields: DocumentFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every pooled connection to an in-memory url opens its own empty database.
        let pool_options = if database_url.starts_with(MEMORY_DATABASE_URL) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;

        let storage = Self { pool };
        storage.ensure_documents_table().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_documents_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection   TEXT NOT NULL,
                document_id  TEXT NOT NULL,
                fields_json  TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL,
                PRIMARY KEY (collection, document_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure documents table exists")?;
        Ok(())
    }

    /// Documents in insertion order. A full replace keeps a document's position.
    pub async fn list_documents(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT collection, document_id, fields_json, created_at, updated_at
            FROM documents
            WHERE collection = ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list documents of collection '{collection}'"))?;

        rows.iter().map(document_from_row).collect()
    }

    pub async fn get_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<StoredDocument>> {
        let row = sqlx::query(
            r#"
            SELECT collection, document_id, fields_json, created_at, updated_at
            FROM documents
            WHERE collection = ? AND document_id = ?
            "#,
        )
        .bind(collection)
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load document '{collection}/{document_id}'"))?;

        row.as_ref().map(document_from_row).transpose()
    }

    /// Inserts a document under a freshly generated id and returns that id.
    pub async fn create_document(&self, collection: &str, fields: &DocumentFields) -> Result<String> {
        let document_id = Uuid::new_v4().simple().to_string();
        let fields_json = serde_json::to_string(fields)?;
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO documents (collection, document_id, fields_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(&document_id)
        .bind(fields_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to create document in collection '{collection}'"))?;
        Ok(document_id)
    }

    /// Replaces every field of the document, creating it when it does not exist yet.
    pub async fn set_document(
        &self,
        collection: &str,
        document_id: &str,
        fields: &DocumentFields,
    ) -> Result<()> {
        if document_id.trim().is_empty() {
            return Err(anyhow!("document id must not be empty"));
        }
        let fields_json = serde_json::to_string(fields)?;
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO documents (collection, document_id, fields_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (collection, document_id) DO UPDATE SET
                fields_json = excluded.fields_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(document_id)
        .bind(fields_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write document '{collection}/{document_id}'"))?;
        Ok(())
    }

    /// Returns whether a document was actually removed.
    pub async fn delete_document(&self, collection: &str, document_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND document_id = ?")
            .bind(collection)
            .bind(document_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete document '{collection}/{document_id}'"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn document_from_row(row: &SqliteRow) -> Result<StoredDocument> {
    let fields_json: String = row.try_get("fields_json")?;
    let fields: DocumentFields =
        serde_json::from_str(&fields_json).context("stored document fields are not a JSON object")?;
    Ok(StoredDocument {
        collection: row.try_get("collection")?,
        document_id: row.try_get("document_id")?,
        fields,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with(MEMORY_DATABASE_URL) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
