use keyhole_core::error::{Result, StorageError};
use keyhole_core::repository::{ReadRepository, Repository};
use tracing::{debug, info};

/// Outcome of a [`transfer`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Records written to the target.
    pub copied: u64,
    /// Records the target already held under the same id.
    pub skipped: u64,
}

/// Copies every record from `source` into `target`.
///
/// Row ids, cipher tokens and creation times are carried over unchanged, so
/// every short URL issued against `source` resolves the same way against
/// `target`. A record the target already holds under the same id is skipped,
/// with its cipher filled in if the target copy lacks one. A record that
/// clashes with a different target row aborts the run.
pub async fn transfer<S, T>(source: &S, target: &T) -> Result<TransferReport>
where
    S: ReadRepository + ?Sized,
    T: Repository + ?Sized,
{
    let mut report = TransferReport::default();

    for record in source.records().await? {
        let prefix = target.ensure_prefix(&record.prefix).await?;

        match target.find_by_uri(prefix.id, &record.uri).await? {
            Some(existing) if existing.id == record.id => {
                if let (None, Some(token)) = (&existing.cipher, &record.cipher) {
                    target.set_cipher(existing.id, token).await?;
                }
                debug!(id = record.id, "record already present in target");
                report.skipped += 1;
            }
            Some(existing) => {
                return Err(StorageError::DuplicateUri(format!(
                    "{} (source id {}, target id {})",
                    record.uri, record.id, existing.id
                )));
            }
            None => {
                target.import(record).await?;
                report.copied += 1;
            }
        }
    }

    info!(
        copied = report.copied,
        skipped = report.skipped,
        "transferred uri records"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;
    use jiff::Timestamp;
    use keyhole_core::{CipherToken, Prefix};

    async fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        let p = repo
            .ensure_prefix(&Prefix::new("https://a.test").unwrap())
            .await
            .unwrap();
        let one = repo.insert(p.id, "https://one.test", Timestamp::now()).await.unwrap();
        repo.set_cipher(one, &CipherToken::new("ab")).await.unwrap();
        repo.insert(p.id, "https://two.test", Timestamp::now()).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn copies_everything_into_empty_target() {
        let source = seeded().await;
        let target = InMemoryRepository::new();

        let report = transfer(&source, &target).await.unwrap();

        assert_eq!(report, TransferReport { copied: 2, skipped: 0 });
        assert_eq!(source.records().await.unwrap(), target.records().await.unwrap());
    }

    #[tokio::test]
    async fn second_run_skips() {
        let source = seeded().await;
        let target = InMemoryRepository::new();

        transfer(&source, &target).await.unwrap();
        let report = transfer(&source, &target).await.unwrap();

        assert_eq!(report, TransferReport { copied: 0, skipped: 2 });
    }

    #[tokio::test]
    async fn fills_missing_cipher_in_target() {
        let source = seeded().await;
        let target = InMemoryRepository::new();
        transfer(&source, &target).await.unwrap();

        let p = source
            .ensure_prefix(&Prefix::new("https://a.test").unwrap())
            .await
            .unwrap();
        let two = source.find_by_uri(p.id, "https://two.test").await.unwrap().unwrap();
        source.set_cipher(two.id, &CipherToken::new("cd")).await.unwrap();

        transfer(&source, &target).await.unwrap();
        assert_eq!(source.records().await.unwrap(), target.records().await.unwrap());
    }

    #[tokio::test]
    async fn conflicting_target_row_aborts() {
        let source = seeded().await;
        let target = InMemoryRepository::new();
        let p = target
            .ensure_prefix(&Prefix::new("https://a.test").unwrap())
            .await
            .unwrap();
        target.insert(p.id, "https://placeholder.test", Timestamp::now()).await.unwrap();
        target.insert(p.id, "https://one.test", Timestamp::now()).await.unwrap();

        let err = transfer(&source, &target).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateUri(_)));
    }

    #[tokio::test]
    async fn id_taken_by_other_uri_aborts() {
        let source = seeded().await;
        let target = InMemoryRepository::new();
        let p = target
            .ensure_prefix(&Prefix::new("https://a.test").unwrap())
            .await
            .unwrap();
        target.insert(p.id, "https://other.test", Timestamp::now()).await.unwrap();

        let err = transfer(&source, &target).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateId(1)));
    }
}
