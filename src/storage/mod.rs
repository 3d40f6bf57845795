// src/storage/mod.rs
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::utils::error::StorageError;

pub const FILTERED_PAGES_DIR: &str = "filtered-pages";
pub const EXTRACTED_DATA_DIR: &str = "extracted-data";

/// Which pipeline output an artifact holds; decides its directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    FilteredPages,
    ExtractedData,
}

impl ArtifactKind {
    pub fn directory(self) -> &'static str {
        match self {
            Self::FilteredPages => FILTERED_PAGES_DIR,
            Self::ExtractedData => EXTRACTED_DATA_DIR,
        }
    }
}

/// Identity of one pipeline invocation. Every artifact the run writes is named after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId {
    id: Uuid,
    started_at: DateTime<Utc>,
}

impl RunId {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    /// `<YYYYmmdd_HHMMSS>_<uuid>`: sortable by time, unique across concurrent runs.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.started_at.format("%Y%m%d_%H%M%S"), self.id.simple())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl Serialize for RunId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Writes pipeline artifacts under a base directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a new ArtifactStore, creating the base and artifact directories if needed
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        for kind in [ArtifactKind::FilteredPages, ArtifactKind::ExtractedData] {
            let dir = base_path.join(kind.directory());
            std::fs::create_dir_all(&dir)
                .map_err(|source| StorageError::CreateDirectory { path: dir, source })?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn artifact_path(&self, kind: ArtifactKind, run: &RunId, extension: &str) -> PathBuf {
        self.base_dir
            .join(kind.directory())
            .join(format!("{}.{}", run.file_stem(), extension))
    }

    /// Publishes `contents` as the run's artifact of `kind`.
    ///
    /// The bytes go to a hidden temporary file in the target directory which is
    /// renamed into place once fully written, so readers never see a partial file.
    /// An existing artifact is never replaced.
    pub async fn publish(
        &self,
        kind: ArtifactKind,
        run: &RunId,
        extension: &str,
        contents: &[u8],
    ) -> Result<PathBuf, StorageError> {
        let target = self.artifact_path(kind, run, extension);
        let dir = self.base_dir.join(kind.directory());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| StorageError::CreateDirectory { path: dir.clone(), source })?;

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(StorageError::FileExists(target));
        }

        let temp = dir.join(format!(".{}.{}.tmp", run.file_stem(), extension));
        if let Err(e) = write_new_file(&temp, contents).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e);
        }

        if let Err(source) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::WriteFile { path: target, source });
        }

        tracing::info!("Saved {:?} artifact to {}", kind, target.display());
        Ok(target)
    }

    /// Publishes `value` pretty-printed as the run's `.json` artifact of `kind`.
    pub async fn publish_json<T: Serialize + ?Sized>(
        &self,
        kind: ArtifactKind,
        run: &RunId,
        value: &T,
    ) -> Result<PathBuf, StorageError> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        self.publish(kind, run, "json", json.as_bytes()).await
    }
}

async fn write_new_file(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let write_err = |source| StorageError::WriteFile {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(write_err)?;
    file.write_all(contents).await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    Ok(())
}

/// Moves `src` into `dest_dir`, keeping its file name and adding a numeric suffix
/// on collision. Tries `rename` first and falls back to copy + delete across devices.
pub async fn relocate(src: &Path, dest_dir: &Path) -> Result<PathBuf, StorageError> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|source| StorageError::CreateDirectory {
            path: dest_dir.to_path_buf(),
            source,
        })?;

    let dest = free_destination(src, dest_dir).await;
    let move_err = |source| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dest.clone(),
        source,
    };

    if tokio::fs::rename(src, &dest).await.is_err() {
        tokio::fs::copy(src, &dest).await.map_err(move_err)?;
        tokio::fs::remove_file(src).await.map_err(move_err)?;
    }

    tracing::debug!("Moved {} to {}", src.display(), dest.display());
    Ok(dest)
}

async fn free_destination(src: &Path, dest_dir: &Path) -> PathBuf {
    let file_name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let candidate = dest_dir.join(&file_name);
    if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        return candidate;
    }

    let (stem, ext) = match file_name.rfind('.') {
        Some(dot) if dot > 0 => (&file_name[..dot], &file_name[dot..]),
        _ => (file_name.as_str(), ""),
    };
    let mut counter = 1u32;
    loop {
        let candidate = dest_dir.join(format!("{}_{}{}", stem, counter, ext));
        if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_creates_artifact_directories() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("out")).unwrap();
        assert!(store.base_dir().join(FILTERED_PAGES_DIR).is_dir());
        assert!(store.base_dir().join(EXTRACTED_DATA_DIR).is_dir());
    }

    #[test]
    fn run_ids_produce_distinct_stems() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        assert_ne!(a.file_stem(), b.file_stem());
        assert!(a.file_stem().starts_with(&a.started_at.format("%Y%m%d_%H%M%S").to_string()));
    }

    #[tokio::test]
    async fn publish_writes_file_and_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let run = RunId::new();

        let path = store
            .publish(ArtifactKind::FilteredPages, &run, "txt", b"page text")
            .await
            .unwrap();

        assert_eq!(path, store.artifact_path(ArtifactKind::FilteredPages, &run, "txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"page text");
        let entries: Vec<_> = std::fs::read_dir(dir.path().join(FILTERED_PAGES_DIR))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn publish_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let run = RunId::new();

        store
            .publish(ArtifactKind::ExtractedData, &run, "json", b"{}")
            .await
            .unwrap();
        let second = store
            .publish(ArtifactKind::ExtractedData, &run, "json", b"{\"a\":1}")
            .await;

        assert!(matches!(second, Err(StorageError::FileExists(_))));
        let kept = std::fs::read_to_string(store.artifact_path(ArtifactKind::ExtractedData, &run, "json")).unwrap();
        assert_eq!(kept, "{}");
    }

    #[tokio::test]
    async fn publish_json_is_pretty_printed() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let value = serde_json::json!({"balance_sheet": {"total_assets": 1000}});

        let path = store
            .publish_json(ArtifactKind::ExtractedData, &RunId::new(), &value)
            .await
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n  \"balance_sheet\""));
        assert_eq!(serde_json::from_str::<serde_json::Value>(&written).unwrap(), value);
    }

    #[tokio::test]
    async fn relocate_moves_and_suffixes_collisions() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("completed");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("report.pdf"), b"older").unwrap();
        let src = dir.path().join("report.pdf");
        std::fs::write(&src, b"newer").unwrap();

        let moved = relocate(&src, &dest).await.unwrap();

        assert_eq!(moved, dest.join("report_1.pdf"));
        assert!(!src.exists());
        assert_eq!(std::fs::read(&moved).unwrap(), b"newer");
        assert_eq!(std::fs::read(dest.join("report.pdf")).unwrap(), b"older");
    }
}
