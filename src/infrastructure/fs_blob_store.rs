// Filesystem blob store implementation
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;

use crate::application::blob_store::BlobStore;
use crate::error::Result;

/// Flat-directory blob store for persisted images. Writes go to a `.tmp`
/// sibling first and are renamed into place, so a name returned to the
/// caller never refers to a partially written file.
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Create the storage directory and probe that it is writable. A
    /// failure here is the one fatal startup condition of the relay.
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let probe = dir.join(".write_test");
        fs::write(&probe, b"test").await?;
        fs::remove_file(&probe).await?;

        Ok(Self { dir })
    }

    fn checked_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsafe blob name: {name:?}"),
            )
            .into());
        }
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<u64> {
        // Temp names carry a per-write sequence number: two persists racing
        // on the same target name must each land, last rename wins.
        static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

        let path = self.checked_path(name)?;
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!("{name}.{seq}.tmp"));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;

        Ok(bytes.len() as u64)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            // Skip dotfiles and any interrupted temp write.
            if name.starts_with('.') || name.ends_with(".tmp") {
                continue;
            }
            names.push(name);
        }
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    async fn delete_all(&self) -> Result<()> {
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            fs::remove_file(entry.path()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;

    #[tokio::test]
    async fn test_write_returns_stored_size_and_list_sees_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).await.unwrap();

        let size = store.write("100_a.jpg", b"abcdef").await.unwrap();
        assert_eq!(size, 6);

        assert_eq!(store.list().await.unwrap(), vec!["100_a.jpg"]);
        assert_eq!(std::fs::read(dir.path().join("100_a.jpg")).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_list_is_newest_first_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).await.unwrap();
        store.write("100_a.jpg", b"x").await.unwrap();
        store.write("300_c.jpg", b"x").await.unwrap();
        store.write("200_b.jpg", b"x").await.unwrap();

        assert_eq!(
            store.list().await.unwrap(),
            vec!["300_c.jpg", "200_b.jpg", "100_a.jpg"]
        );
    }

    #[tokio::test]
    async fn test_racing_writes_of_the_same_name_each_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FsBlobStore::new(dir.path()).await.unwrap());

        for round in 0..200 {
            let a = {
                let store = store.clone();
                tokio::spawn(async move { store.write("100_shot.jpg", b"aaaa").await })
            };
            let b = {
                let store = store.clone();
                tokio::spawn(async move { store.write("100_shot.jpg", b"bbbbbb").await })
            };
            a.await
                .unwrap()
                .unwrap_or_else(|e| panic!("round {round} writer A: {e}"));
            b.await
                .unwrap()
                .unwrap_or_else(|e| panic!("round {round} writer B: {e}"));
        }

        // Whichever rename landed last owns the name; the content is one
        // writer's bytes, never an interleaving, and no temp files linger.
        let bytes = std::fs::read(dir.path().join("100_shot.jpg")).unwrap();
        assert!(bytes == b"aaaa" || bytes == b"bbbbbb");
        assert_eq!(store.list().await.unwrap(), vec!["100_shot.jpg"]);
        let leftovers: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "stray temp files: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_delete_all_empties_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).await.unwrap();
        store.write("a.jpg", b"x").await.unwrap();
        store.write("b.jpg", b"x").await.unwrap();

        store.delete_all().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsafe_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path()).await.unwrap();

        for name in ["../escape.jpg", "a/b.jpg", "a\\b.jpg", ""] {
            let err = store.write(name, b"x").await.unwrap_err();
            assert!(matches!(err, RelayError::Storage(_)), "{name:?}");
        }
    }

    #[tokio::test]
    async fn test_new_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("data").join("images");
        FsBlobStore::new(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
