//! Durable storage abstraction.
//!
//! The store talks to disk through the [`FileIo`] trait so the same engine
//! can run over the real filesystem ([`DiskFileIo`]) or an in-memory mock
//! ([`MemoryFileIo`]) in tests. The trait deals in bytes, not text, since
//! obfuscated file contents are generally not valid UTF-8.

use async_trait::async_trait;

use crate::error::SandbankError;

pub(crate) mod controller;
mod disk;
mod memory;

pub use disk::DiskFileIo;
pub use memory::MemoryFileIo;

/// An implementation of durable file access.
///
/// Paths are relative, `/`-separated, and rooted wherever the provider
/// decides (for [`DiskFileIo`], a base directory).
#[async_trait]
pub trait FileIo: Send + Sync {
    /// Read a file's contents, or `None` if it doesn't exist.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SandbankError>;

    /// Write a file, creating it (and its parent directory) as needed.
    async fn write(&self, path: &str, contents: &[u8]) -> Result<(), SandbankError>;

    /// Delete a file. Deleting a missing file is not an error.
    async fn delete_file(&self, path: &str) -> Result<(), SandbankError>;

    async fn create_directory(&self, path: &str) -> Result<(), SandbankError>;

    /// Delete a directory and everything under it. Deleting a missing
    /// directory is not an error.
    async fn delete_directory(&self, path: &str) -> Result<(), SandbankError>;

    async fn directory_exists(&self, path: &str) -> Result<bool, SandbankError>;

    /// Names of the files directly inside a directory.
    async fn list_files(&self, path: &str) -> Result<Vec<String>, SandbankError>;

    /// Names of the directories directly inside a directory.
    async fn list_directories(&self, path: &str) -> Result<Vec<String>, SandbankError>;
}
