//! Real filesystem provider.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::FileIo;
use crate::error::SandbankError;

/// [`FileIo`] over the real filesystem, rooted at a base directory.
pub struct DiskFileIo {
    base: PathBuf,
}

impl DiskFileIo {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base.join(path)
    }
}

fn io_error(operation: &str, path: &Path, error: std::io::Error) -> SandbankError {
    SandbankError::Io(format!("{operation} {}: {error}", path.display()))
}

#[async_trait]
impl FileIo for DiskFileIo {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SandbankError> {
        let path = self.resolve(path);
        match fs::read(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(io_error("failed to read", &path, error)),
        }
    }

    async fn write(&self, path: &str, contents: &[u8]) -> Result<(), SandbankError> {
        let path = self.resolve(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|error| io_error("failed to create directory", parent, error))?;
        }
        fs::write(&path, contents)
            .await
            .map_err(|error| io_error("failed to write", &path, error))
    }

    async fn delete_file(&self, path: &str) -> Result<(), SandbankError> {
        let path = self.resolve(path);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error("failed to delete", &path, error)),
        }
    }

    async fn create_directory(&self, path: &str) -> Result<(), SandbankError> {
        let path = self.resolve(path);
        fs::create_dir_all(&path)
            .await
            .map_err(|error| io_error("failed to create directory", &path, error))
    }

    async fn delete_directory(&self, path: &str) -> Result<(), SandbankError> {
        let path = self.resolve(path);
        match fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error("failed to delete directory", &path, error)),
        }
    }

    async fn directory_exists(&self, path: &str) -> Result<bool, SandbankError> {
        let path = self.resolve(path);
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(io_error("failed to stat", &path, error)),
        }
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>, SandbankError> {
        self.list_entries(path, false).await
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, SandbankError> {
        self.list_entries(path, true).await
    }
}

impl DiskFileIo {
    async fn list_entries(
        &self,
        path: &str,
        directories: bool,
    ) -> Result<Vec<String>, SandbankError> {
        let path = self.resolve(path);
        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(io_error("failed to list", &path, error)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|error| io_error("failed to list", &path, error))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|error| io_error("failed to stat", &entry.path(), error))?;
            if file_type.is_dir() == directories {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }
}
