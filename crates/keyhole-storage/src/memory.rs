use async_trait::async_trait;
use jiff::Timestamp;
use keyhole_core::error::{Result, StorageError};
use keyhole_core::repository::{PrefixRecord, ReadRepository, Repository, StoredRecord, UriRecord};
use keyhole_core::{CipherToken, Prefix};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    prefixes: HashMap<Prefix, i64>,
    prefix_names: HashMap<i64, Prefix>,
    last_prefix_id: i64,
    rows: BTreeMap<i64, UriRecord>,
    by_uri: HashMap<(i64, String), i64>,
    by_cipher: HashMap<CipherToken, i64>,
    last_row_id: i64,
}

impl State {
    fn ensure_prefix(&mut self, prefix: &Prefix) -> PrefixRecord {
        if let Some(id) = self.prefixes.get(prefix) {
            return PrefixRecord {
                id: *id,
                prefix: prefix.clone(),
            };
        }

        self.last_prefix_id += 1;
        let id = self.last_prefix_id;
        self.prefixes.insert(prefix.clone(), id);
        self.prefix_names.insert(id, prefix.clone());
        PrefixRecord {
            id,
            prefix: prefix.clone(),
        }
    }

    fn check_prefix(&self, prefix_id: i64) -> Result<()> {
        if self.prefix_names.contains_key(&prefix_id) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!("prefix {prefix_id}")))
        }
    }
}

/// Drops the sub-second part, matching the whole seconds SQLite stores.
fn whole_seconds(ts: Timestamp) -> Timestamp {
    Timestamp::from_second(ts.as_second()).unwrap_or(ts)
}

/// In-memory implementation of the repository contract.
///
/// All indexes sit behind one lock so that the uniqueness rules (one row per
/// prefix and URI, one row per cipher token) hold across them. Row ids only
/// ever grow, even across deletions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryRepository {
    /// Creates a new, empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn find_prefix(&self, prefix: &Prefix) -> Result<Option<PrefixRecord>> {
        let state = self.state.read();
        Ok(state.prefixes.get(prefix).map(|id| PrefixRecord {
            id: *id,
            prefix: prefix.clone(),
        }))
    }

    async fn find_by_uri(&self, prefix_id: i64, uri: &str) -> Result<Option<UriRecord>> {
        let state = self.state.read();
        let Some(id) = state.by_uri.get(&(prefix_id, uri.to_string())) else {
            return Ok(None);
        };
        Ok(state.rows.get(id).cloned())
    }

    async fn find_by_cipher(
        &self,
        prefix: &Prefix,
        token: &CipherToken,
    ) -> Result<Option<String>> {
        let state = self.state.read();
        let Some(prefix_id) = state.prefixes.get(prefix) else {
            return Ok(None);
        };

        Ok(state
            .by_cipher
            .get(token)
            .and_then(|id| state.rows.get(id))
            .filter(|row| row.prefix_id == *prefix_id)
            .map(|row| row.uri.clone()))
    }

    async fn records(&self) -> Result<Vec<StoredRecord>> {
        let state = self.state.read();
        state
            .rows
            .values()
            .map(|row| {
                let prefix = state.prefix_names.get(&row.prefix_id).ok_or_else(|| {
                    StorageError::InvalidData(format!(
                        "uri record {} points at missing prefix {}",
                        row.id, row.prefix_id
                    ))
                })?;
                Ok(StoredRecord {
                    id: row.id,
                    prefix: prefix.clone(),
                    uri: row.uri.clone(),
                    cipher: row.cipher.clone(),
                    created: row.created,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn ensure_prefix(&self, prefix: &Prefix) -> Result<PrefixRecord> {
        Ok(self.state.write().ensure_prefix(prefix))
    }

    async fn insert(&self, prefix_id: i64, uri: &str, created: Timestamp) -> Result<i64> {
        let mut state = self.state.write();
        state.check_prefix(prefix_id)?;

        let key = (prefix_id, uri.to_string());
        if state.by_uri.contains_key(&key) {
            return Err(StorageError::DuplicateUri(uri.to_string()));
        }

        state.last_row_id += 1;
        let id = state.last_row_id;
        state.by_uri.insert(key, id);
        state.rows.insert(
            id,
            UriRecord {
                id,
                prefix_id,
                uri: uri.to_string(),
                cipher: None,
                created: Some(whole_seconds(created)),
            },
        );

        debug!(id, prefix_id, "inserted uri record");
        Ok(id)
    }

    async fn set_cipher(&self, id: i64, token: &CipherToken) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        if let Some(owner) = state.by_cipher.get(token) {
            return if *owner == id {
                Ok(())
            } else {
                Err(StorageError::DuplicateCipher(token.to_string()))
            };
        }

        let Some(row) = state.rows.get_mut(&id) else {
            return Err(StorageError::NotFound(format!("uri record {id}")));
        };
        if let Some(existing) = &row.cipher {
            return Err(StorageError::InvalidData(format!(
                "uri record {id} already holds cipher {existing}"
            )));
        }

        row.cipher = Some(token.clone());
        state.by_cipher.insert(token.clone(), id);
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64> {
        let cutoff = whole_seconds(cutoff);
        let mut state = self.state.write();

        let expired: Vec<i64> = state
            .rows
            .values()
            .filter(|row| row.created.is_some_and(|created| created < cutoff))
            .map(|row| row.id)
            .collect();

        for id in &expired {
            if let Some(row) = state.rows.remove(id) {
                state.by_uri.remove(&(row.prefix_id, row.uri));
                if let Some(token) = row.cipher {
                    state.by_cipher.remove(&token);
                }
            }
        }

        Ok(expired.len() as u64)
    }

    async fn import(&self, record: StoredRecord) -> Result<()> {
        let mut state = self.state.write();
        let prefix = state.ensure_prefix(&record.prefix);

        if state.rows.contains_key(&record.id) {
            return Err(StorageError::DuplicateId(record.id));
        }
        let key = (prefix.id, record.uri.clone());
        if state.by_uri.contains_key(&key) {
            return Err(StorageError::DuplicateUri(record.uri));
        }
        if let Some(token) = &record.cipher {
            if state.by_cipher.contains_key(token) {
                return Err(StorageError::DuplicateCipher(token.to_string()));
            }
            state.by_cipher.insert(token.clone(), record.id);
        }

        state.by_uri.insert(key, record.id);
        state.last_row_id = state.last_row_id.max(record.id);
        state.rows.insert(
            record.id,
            UriRecord {
                id: record.id,
                prefix_id: prefix.id,
                uri: record.uri,
                cipher: record.cipher,
                created: record.created.map(whole_seconds),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;

    fn prefix(value: &str) -> Prefix {
        Prefix::new(value).unwrap()
    }

    #[tokio::test]
    async fn insert_and_find() {
        let repo = InMemoryRepository::new();
        let p = repo.ensure_prefix(&prefix("https://a.test")).await.unwrap();
        let id = repo.insert(p.id, "https://long.test", Timestamp::now()).await.unwrap();

        let record = repo.find_by_uri(p.id, "https://long.test").await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert!(record.cipher.is_none());
    }

    #[tokio::test]
    async fn insert_requires_known_prefix() {
        let repo = InMemoryRepository::new();
        let err = repo.insert(9, "https://long.test", Timestamp::now()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn insert_conflict() {
        let repo = InMemoryRepository::new();
        let p = repo.ensure_prefix(&prefix("https://a.test")).await.unwrap();
        repo.insert(p.id, "https://long.test", Timestamp::now()).await.unwrap();

        let err = repo
            .insert(p.id, "https://long.test", Timestamp::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateUri(_)));
    }

    #[tokio::test]
    async fn cipher_is_unique_and_written_once() {
        let repo = InMemoryRepository::new();
        let p = repo.ensure_prefix(&prefix("https://a.test")).await.unwrap();
        let one = repo.insert(p.id, "https://one.test", Timestamp::now()).await.unwrap();
        let two = repo.insert(p.id, "https://two.test", Timestamp::now()).await.unwrap();

        repo.set_cipher(one, &CipherToken::new("ab")).await.unwrap();
        repo.set_cipher(one, &CipherToken::new("ab")).await.unwrap();

        assert!(matches!(
            repo.set_cipher(two, &CipherToken::new("ab")).await,
            Err(StorageError::DuplicateCipher(_))
        ));
        assert!(matches!(
            repo.set_cipher(one, &CipherToken::new("cd")).await,
            Err(StorageError::InvalidData(_))
        ));
        assert!(matches!(
            repo.set_cipher(99, &CipherToken::new("ef")).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn find_by_cipher_respects_prefix() {
        let repo = InMemoryRepository::new();
        let a = repo.ensure_prefix(&prefix("https://a.test")).await.unwrap();
        repo.ensure_prefix(&prefix("https://b.test")).await.unwrap();
        let id = repo.insert(a.id, "https://long.test", Timestamp::now()).await.unwrap();
        repo.set_cipher(id, &CipherToken::new("xy")).await.unwrap();

        let token = CipherToken::new("xy");
        assert_eq!(
            repo.find_by_cipher(&prefix("https://a.test"), &token).await.unwrap(),
            Some("https://long.test".to_string())
        );
        assert!(repo
            .find_by_cipher(&prefix("https://b.test"), &token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn pruning_frees_uri_and_cipher_but_not_ids() {
        let repo = InMemoryRepository::new();
        let p = repo.ensure_prefix(&prefix("https://a.test")).await.unwrap();
        let old = Timestamp::now() - SignedDuration::from_hours(1);

        let first = repo.insert(p.id, "https://long.test", old).await.unwrap();
        repo.set_cipher(first, &CipherToken::new("xy")).await.unwrap();

        assert_eq!(repo.delete_older_than(Timestamp::now()).await.unwrap(), 1);
        assert!(repo
            .find_by_cipher(&prefix("https://a.test"), &CipherToken::new("xy"))
            .await
            .unwrap()
            .is_none());

        let second = repo.insert(p.id, "https://long.test", Timestamp::now()).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn import_keeps_ids_and_bumps_sequence() {
        let repo = InMemoryRepository::new();
        let record = StoredRecord {
            id: 10,
            prefix: prefix("https://a.test"),
            uri: "https://long.test".to_string(),
            cipher: Some(CipherToken::new("xy")),
            created: None,
        };
        repo.import(record.clone()).await.unwrap();
        assert_eq!(repo.records().await.unwrap(), vec![record.clone()]);

        assert!(matches!(
            repo.import(record).await,
            Err(StorageError::DuplicateId(10))
        ));

        let p = repo.ensure_prefix(&prefix("https://a.test")).await.unwrap();
        let next = repo.insert(p.id, "https://other.test", Timestamp::now()).await.unwrap();
        assert_eq!(next, 11);
    }

    #[tokio::test]
    async fn records_without_timestamp_survive_pruning() {
        let repo = InMemoryRepository::new();
        repo.import(StoredRecord {
            id: 1,
            prefix: prefix("https://a.test"),
            uri: "https://long.test".to_string(),
            cipher: None,
            created: None,
        })
        .await
        .unwrap();

        assert_eq!(repo.delete_older_than(Timestamp::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pruning_compares_whole_seconds() {
        let repo = InMemoryRepository::new();
        let p = repo.ensure_prefix(&prefix("https://a.test")).await.unwrap();
        let second = Timestamp::from_second(1_000).unwrap();

        repo.insert(p.id, "https://long.test", second + SignedDuration::from_millis(100))
            .await
            .unwrap();

        assert_eq!(
            repo.delete_older_than(second + SignedDuration::from_millis(900))
                .await
                .unwrap(),
            0
        );
        assert_eq!(repo.records().await.unwrap()[0].created, Some(second));
    }
}
