//! Durable ledger storage.
//!
//! One snapshot file per watched account at
//! `{state_dir}/posts-{account}.json`, holding the full batch last fetched
//! for that account as a JSON array. The snapshot is the comparison baseline
//! across cycles and restarts; it is always a whole batch, never a merge.

use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;

use crate::source::Post;
use crate::store::error::{StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    dir: PathBuf,
}

impl FileLedgerStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: state_dir.into(),
        }
    }

    fn snapshot_path(&self, account: &str) -> PathBuf {
        self.dir.join(format!("posts-{}.json", sanitize(account)))
    }

    /// Load the last snapshot for `account`, or `None` if there is none yet.
    pub async fn load(&self, account: &str) -> StorageResult<Option<Vec<Post>>> {
        let path = self.snapshot_path(account);

        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::file_io(&path, e)),
        };

        let posts: Vec<Post> = serde_json::from_str(&contents)
            .map_err(|e| StorageError::file_deserialization(&path, e.to_string()))?;
        Ok(Some(posts))
    }

    /// Overwrite the snapshot for `account` with `posts`.
    pub async fn store(&self, account: &str, posts: &[Post]) -> StorageResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::file_io(&self.dir, e))?;

        let json = serde_json::to_string_pretty(posts)
            .map_err(|e| StorageError::serialization(e.to_string()))?;

        let path = self.snapshot_path(account);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|e| StorageError::file_io(&temp_path, e))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StorageError::file_io(&path, e))?;

        Ok(())
    }
}

/// Derive a deterministic file-name fragment from an account handle.
///
/// A leading '@' is stripped and anything outside `[a-z0-9_-]` becomes '_',
/// so the same account always maps to the same file.
fn sanitize(account: &str) -> String {
    account
        .trim_start_matches('@')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn post(id: &str, timestamp: i64) -> Post {
        Post {
            id: id.to_string(),
            username: "someaccount".to_string(),
            text: format!("post {id}"),
            timestamp,
            is_reply: false,
            is_retweet: false,
            is_quote: false,
            media: Vec::new(),
            urls: Vec::new(),
            permanent_url: format!("https://x.com/someaccount/status/{id}"),
            retweeted: None,
            quoted: None,
        }
    }

    #[tokio::test]
    async fn store_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = FileLedgerStore::new(tmp.path());

        let batch = vec![post("2", 200), post("1", 100)];
        store.store("someaccount", &batch).await.unwrap();

        let loaded = store.load("someaccount").await.unwrap().unwrap();
        assert_eq!(loaded, batch);
    }

    #[tokio::test]
    async fn load_unknown_account_is_absent() {
        let tmp = TempDir::new().unwrap();
        let store = FileLedgerStore::new(tmp.path());
        assert!(store.load("someaccount").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = FileLedgerStore::new(tmp.path());

        std::fs::write(tmp.path().join("posts-someaccount.json"), "not json").unwrap();

        let result = store.load("someaccount").await;
        assert!(matches!(
            result,
            Err(StorageError::FileDeserialization { .. })
        ));
    }

    #[tokio::test]
    async fn handle_with_at_sign_maps_to_same_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = FileLedgerStore::new(tmp.path());

        store.store("@SomeAccount", &[post("1", 100)]).await.unwrap();
        let loaded = store.load("someaccount").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn accounts_get_separate_snapshots() {
        let tmp = TempDir::new().unwrap();
        let store = FileLedgerStore::new(tmp.path());

        store.store("alpha", &[post("1", 100)]).await.unwrap();
        store.store("beta", &[post("2", 200)]).await.unwrap();

        assert_eq!(store.load("alpha").await.unwrap().unwrap()[0].id, "1");
        assert_eq!(store.load("beta").await.unwrap().unwrap()[0].id, "2");
    }

    #[tokio::test]
    async fn store_overwrites_whole_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = FileLedgerStore::new(tmp.path());

        store
            .store("someaccount", &[post("1", 100), post("2", 200)])
            .await
            .unwrap();
        store.store("someaccount", &[post("3", 300)]).await.unwrap();

        let loaded = store.load("someaccount").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "3");
    }
}
