pub mod naming;

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

/// Filesystem primitives the reconciliation engine needs.
#[async_trait::async_trait]
pub trait FileStore: Send + Sync {
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Writes `content` to `path`, replacing any previous content.
    async fn write_text(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Removes a file. A file that is already gone is not an error.
    async fn delete(&self, path: &Path) -> io::Result<()>;

    /// Files directly inside `dir` with the given extension, sorted.
    async fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl FileStore for LocalFileStore {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        fs::try_exists(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    async fn write_text(&self, path: &Path, content: &str) -> io::Result<()> {
        fs::write(path, content).await?;
        debug!(path = %path.display(), "Wrote artifact");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted artifact");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_files(&self, dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
        let dir = dir.to_path_buf();
        let extension = extension.trim_start_matches('.').to_string();

        tokio::task::spawn_blocking(move || {
            if !dir.is_dir() {
                return Ok(Vec::new());
            }

            let mut files = Vec::new();
            for entry in walkdir::WalkDir::new(&dir).min_depth(1).max_depth(1) {
                let entry = entry.map_err(io::Error::other)?;
                let matches = entry.file_type().is_file()
                    && entry
                        .path()
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension.as_str()));
                if matches {
                    files.push(entry.into_path());
                }
            }
            files.sort();
            Ok(files)
        })
        .await
        .map_err(io::Error::other)?
    }
}
