//! Per-agent file storage.
//!
//! Each agent gets a private directory `{base}/{agent_name}` under the
//! session directory and, separately, under the instance directory. Paths
//! handed to a `Storage` are relative to that root and may not leave it.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use switchboard_core::error::{Result, SwitchboardError};

/// Storage handle given to agents through their session context.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    async fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|e| SwitchboardError::Serialization(e.to_string()))
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// File names directly under `dir`, sorted. A missing directory is empty.
    async fn list(&self, dir: &str) -> Result<Vec<String>>;

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn delete(&self, path: &str) -> Result<()>;
}

/// `Storage` backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(base_dir: &Path, agent_name: &str) -> Self {
        Self {
            root: base_dir.join(agent_name),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `path` onto the root. Absolute paths and `..` are rejected so
    /// the result always stays inside the root, whether or not it exists.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(SwitchboardError::PathEscape(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::read(full).await?)
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(full, data).await?;
        Ok(())
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let full = self.resolve(dir)?;
        let mut entries = match tokio::fs::read_dir(&full).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(full).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        tokio::fs::remove_file(full).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_roundtrip_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), "list");

        storage.write("lists/groceries.json", b"[\"milk\"]").await.unwrap();
        assert!(dir.path().join("list").join("lists").join("groceries.json").exists());
        assert_eq!(
            storage.read_to_string("lists/groceries.json").await.unwrap(),
            "[\"milk\"]"
        );
        assert!(storage.exists("lists/groceries.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_sorted_and_missing_dir_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), "list");
        assert!(storage.list("lists").await.unwrap().is_empty());

        storage.write("lists/b.json", b"{}").await.unwrap();
        storage.write("lists/a.json", b"{}").await.unwrap();
        assert_eq!(storage.list("lists").await.unwrap(), vec!["a.json", "b.json"]);
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), "list");
        storage.write("token.json", b"{}").await.unwrap();
        storage.delete("token.json").await.unwrap();
        assert!(!storage.exists("token.json").await.unwrap());
        assert!(matches!(
            storage.delete("token.json").await,
            Err(SwitchboardError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), "list");
        for bad in ["../other/secret.json", "/etc/passwd", "a/../../b"] {
            let err = storage.write(bad, b"x").await.unwrap_err();
            assert!(matches!(err, SwitchboardError::PathEscape(_)), "{bad}");
        }
        assert!(!dir.path().join("other").exists());
    }
}
