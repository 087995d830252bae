use crate::location::StoreLocation;
use async_trait::async_trait;
use jiff::Timestamp;
use keyhole_core::error::{Result, StorageError};
use keyhole_core::repository::{PrefixRecord, ReadRepository, Repository, StoredRecord, UriRecord};
use keyhole_core::{CipherToken, Prefix};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const SCHEMA: &str = include_str!("../ddl/sqlite/schema.sql");

/// SQLite implementation of the repository contract.
///
/// The pool holds a single connection: SQLite serializes writers anyway, and
/// an in-memory database only lives as long as its connection, so that
/// connection is never recycled. File stores run in WAL mode with foreign keys
/// enforced, which makes deleting a prefix cascade to its URI rows.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Creates a repository from an existing pool whose schema is already in place.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if missing) the store at `location` and applies the schema.
    pub async fn open(location: &StoreLocation) -> Result<Self> {
        let options = match location {
            StoreLocation::InMemory => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StorageError::Unavailable(e.to_string()))?,
            StoreLocation::Path(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StorageError::Unavailable(format!(
                            "cannot create directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
            }
        }
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Unavailable(format!("cannot open {location}: {e}")))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(map_sqlx_error)?;

        info!(location = %location, "opened sqlite store");
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert_prefix(&self, prefix: &Prefix) -> std::result::Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO prefix (prefix) VALUES (?)")
            .bind(prefix.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn cipher_of(&self, id: i64) -> Result<Option<Option<String>>> {
        let row = sqlx::query("SELECT cipher FROM uris WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| row.try_get::<Option<String>, _>("cipher"))
            .transpose()
            .map_err(map_sqlx_error)
    }
}

fn parse_created(seconds: Option<i64>) -> Result<Option<Timestamp>> {
    seconds
        .map(|value| {
            Timestamp::from_second(value).map_err(|e| {
                StorageError::InvalidData(format!("invalid created timestamp '{}': {e}", value))
            })
        })
        .transpose()
}

fn parse_prefix(raw: String) -> Result<Prefix> {
    Prefix::new(&raw)
        .map_err(|e| StorageError::InvalidData(format!("invalid stored prefix '{raw}': {e}")))
}

fn uri_record_from_row(row: &SqliteRow) -> Result<UriRecord> {
    let cipher: Option<String> = row.try_get("cipher").map_err(map_sqlx_error)?;
    Ok(UriRecord {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        prefix_id: row.try_get("prefix_id").map_err(map_sqlx_error)?,
        uri: row.try_get("uri").map_err(map_sqlx_error)?,
        cipher: cipher.map(CipherToken::new),
        created: parse_created(row.try_get("created").map_err(map_sqlx_error)?)?,
    })
}

fn stored_record_from_row(row: &SqliteRow) -> Result<StoredRecord> {
    let cipher: Option<String> = row.try_get("cipher").map_err(map_sqlx_error)?;
    Ok(StoredRecord {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        prefix: parse_prefix(row.try_get("prefix").map_err(map_sqlx_error)?)?,
        uri: row.try_get("uri").map_err(map_sqlx_error)?,
        cipher: cipher.map(CipherToken::new),
        created: parse_created(row.try_get("created").map_err(map_sqlx_error)?)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_foreign_key_violation)
}

/// The row a write on `uris` tried to store.
struct UriWrite<'a> {
    id: Option<i64>,
    prefix_id: i64,
    uri: &'a str,
    cipher: Option<&'a CipherToken>,
}

/// Maps a failed write on `uris` to the constraint it broke.
fn map_uri_write_error(err: sqlx::Error, write: &UriWrite<'_>) -> StorageError {
    if is_foreign_key_violation(&err) {
        return StorageError::NotFound(format!("prefix {}", write.prefix_id));
    }
    if !is_unique_violation(&err) {
        return map_sqlx_error(err);
    }

    let column = err
        .as_database_error()
        .map(|db| db.message().to_string())
        .unwrap_or_default();

    match (write.id, write.cipher) {
        (Some(id), _) if column.contains("uris.id") => StorageError::DuplicateId(id),
        (_, Some(token)) if column.contains("uris.cipher") => {
            StorageError::DuplicateCipher(token.to_string())
        }
        _ => StorageError::DuplicateUri(write.uri.to_string()),
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for SqliteRepository {
    async fn find_prefix(&self, prefix: &Prefix) -> Result<Option<PrefixRecord>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM prefix WHERE prefix = ?")
            .bind(prefix.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(id.map(|id| PrefixRecord {
            id,
            prefix: prefix.clone(),
        }))
    }

    async fn find_by_uri(&self, prefix_id: i64, uri: &str) -> Result<Option<UriRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, prefix_id, uri, cipher, created
            FROM uris
            WHERE prefix_id = ?
              AND uri = ?
            LIMIT 1
            "#,
        )
        .bind(prefix_id)
        .bind(uri)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(uri_record_from_row).transpose()
    }

    async fn find_by_cipher(
        &self,
        prefix: &Prefix,
        token: &CipherToken,
    ) -> Result<Option<String>> {
        let uri: Option<String> = sqlx::query_scalar(
            r#"
            SELECT u.uri
            FROM uris u
            JOIN prefix p ON p.id = u.prefix_id
            WHERE p.prefix = ?
              AND u.cipher = ?
            LIMIT 1
            "#,
        )
        .bind(prefix.as_str())
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(uri)
    }

    async fn records(&self) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, p.prefix, u.uri, u.cipher, u.created
            FROM uris u
            JOIN prefix p ON p.id = u.prefix_id
            ORDER BY u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(stored_record_from_row).collect()
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn ensure_prefix(&self, prefix: &Prefix) -> Result<PrefixRecord> {
        if let Some(existing) = self.find_prefix(prefix).await? {
            return Ok(existing);
        }

        match self.insert_prefix(prefix).await {
            Ok(id) => {
                info!(prefix = %prefix, prefix_id = id, "registered prefix");
                Ok(PrefixRecord {
                    id,
                    prefix: prefix.clone(),
                })
            }
            Err(err) if is_unique_violation(&err) => {
                warn!(prefix = %prefix, "prefix registered concurrently, re-reading");
                self.find_prefix(prefix).await?.ok_or_else(|| {
                    StorageError::InvalidData(format!(
                        "prefix {prefix} conflicted on insert but cannot be read back"
                    ))
                })
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn insert(&self, prefix_id: i64, uri: &str, created: Timestamp) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO uris (prefix_id, uri, cipher, created)
            VALUES (?, ?, NULL, ?)
            "#,
        )
        .bind(prefix_id)
        .bind(uri)
        .bind(created.as_second())
        .execute(&self.pool)
        .await
        .map_err(|err| {
            map_uri_write_error(
                err,
                &UriWrite {
                    id: None,
                    prefix_id,
                    uri,
                    cipher: None,
                },
            )
        })?;

        let id = result.last_insert_rowid();
        debug!(id, prefix_id, "inserted uri record");
        Ok(id)
    }

    async fn set_cipher(&self, id: i64, token: &CipherToken) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE uris
            SET cipher = ?
            WHERE id = ?
              AND (cipher IS NULL OR cipher = ?)
            "#,
        )
        .bind(token.as_str())
        .bind(id)
        .bind(token.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StorageError::DuplicateCipher(token.to_string())
            } else {
                map_sqlx_error(err)
            }
        })?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.cipher_of(id).await? {
            None => Err(StorageError::NotFound(format!("uri record {id}"))),
            Some(existing) => Err(StorageError::InvalidData(format!(
                "uri record {id} already holds cipher {}",
                existing.unwrap_or_default()
            ))),
        }
    }

    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64> {
        let result = sqlx::query("DELETE FROM uris WHERE created < ?")
            .bind(cutoff.as_second())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn import(&self, record: StoredRecord) -> Result<()> {
        let prefix = self.ensure_prefix(&record.prefix).await?;

        sqlx::query(
            r#"
            INSERT INTO uris (id, prefix_id, uri, cipher, created)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id)
        .bind(prefix.id)
        .bind(&record.uri)
        .bind(record.cipher.as_ref().map(CipherToken::as_str))
        .bind(record.created.map(|ts| ts.as_second()))
        .execute(&self.pool)
        .await
        .map_err(|err| {
            map_uri_write_error(
                err,
                &UriWrite {
                    id: Some(record.id),
                    prefix_id: prefix.id,
                    uri: &record.uri,
                    cipher: record.cipher.as_ref(),
                },
            )
        })?;

        Ok(())
    }
}
