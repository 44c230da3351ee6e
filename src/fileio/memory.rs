//! In-memory mock provider for tests.

use async_trait::async_trait;
use dashmap::DashMap;

use super::FileIo;
use crate::error::SandbankError;

/// [`FileIo`] backed by maps instead of a disk. Behaves like the real
/// provider (implicit parent directories on write, idempotent deletes) so
/// engine tests can run against it unchanged.
pub struct MemoryFileIo {
    files: DashMap<String, Vec<u8>>,
    directories: DashMap<String, ()>,
}

impl MemoryFileIo {
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            directories: DashMap::new(),
        }
    }

    /// Number of files currently stored.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Drop all files and directories.
    pub fn clear(&self) {
        self.files.clear();
        self.directories.clear();
    }

    fn ensure_parents(&self, path: &str) {
        let mut current = String::new();
        let parts: Vec<&str> = path.split('/').collect();
        for part in &parts[..parts.len().saturating_sub(1)] {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            self.directories.insert(current.clone(), ());
        }
    }
}

impl Default for MemoryFileIo {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// The name directly under `prefix`, if `path` is directly inside it.
fn child_of<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = if prefix.is_empty() {
        path
    } else {
        path.strip_prefix(prefix)?.strip_prefix('/')?
    };
    (!rest.is_empty() && !rest.contains('/')).then_some(rest)
}

fn is_under(path: &str, prefix: &str) -> bool {
    prefix.is_empty() || path == prefix || path.starts_with(&format!("{prefix}/"))
}

#[async_trait]
impl FileIo for MemoryFileIo {
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, SandbankError> {
        Ok(self.files.get(&normalize(path)).map(|entry| entry.clone()))
    }

    async fn write(&self, path: &str, contents: &[u8]) -> Result<(), SandbankError> {
        let path = normalize(path);
        self.ensure_parents(&path);
        self.files.insert(path, contents.to_vec());
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<(), SandbankError> {
        self.files.remove(&normalize(path));
        Ok(())
    }

    async fn create_directory(&self, path: &str) -> Result<(), SandbankError> {
        let path = normalize(path);
        if !path.is_empty() {
            self.ensure_parents(&path);
            self.directories.insert(path, ());
        }
        Ok(())
    }

    async fn delete_directory(&self, path: &str) -> Result<(), SandbankError> {
        let prefix = normalize(path);
        self.directories.retain(|dir, ()| !is_under(dir, &prefix));
        self.files.retain(|file, _| !is_under(file, &prefix));
        Ok(())
    }

    async fn directory_exists(&self, path: &str) -> Result<bool, SandbankError> {
        let path = normalize(path);
        Ok(path.is_empty() || self.directories.contains_key(&path))
    }

    async fn list_files(&self, path: &str) -> Result<Vec<String>, SandbankError> {
        let prefix = normalize(path);
        Ok(self
            .files
            .iter()
            .filter_map(|entry| child_of(entry.key(), &prefix).map(str::to_string))
            .collect())
    }

    async fn list_directories(&self, path: &str) -> Result<Vec<String>, SandbankError> {
        let prefix = normalize(path);
        Ok(self
            .directories
            .iter()
            .filter_map(|entry| child_of(entry.key(), &prefix).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_provider_is_empty() {
        let io = MemoryFileIo::new();
        assert!(io.is_empty());
        assert_eq!(io.file_count(), 0);
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let io = MemoryFileIo::new();

        io.write("sandbank/players/doc1", b"data").await.unwrap();

        assert!(io.directory_exists("sandbank").await.unwrap());
        assert!(io.directory_exists("sandbank/players").await.unwrap());
        assert_eq!(io.read("sandbank/players/doc1").await.unwrap().unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_write_overwrites() {
        let io = MemoryFileIo::new();

        io.write("f", b"one").await.unwrap();
        io.write("f", b"two").await.unwrap();

        assert_eq!(io.read("f").await.unwrap().unwrap(), b"two");
        assert_eq!(io.file_count(), 1);
    }

    #[tokio::test]
    async fn test_list_files_is_not_recursive() {
        let io = MemoryFileIo::new();

        io.write("db/coll/a", b"1").await.unwrap();
        io.write("db/coll/b", b"2").await.unwrap();
        io.write("db/coll/nested/c", b"3").await.unwrap();

        let mut files = io.list_files("db/coll").await.unwrap();
        files.sort();
        assert_eq!(files, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_list_directories() {
        let io = MemoryFileIo::new();

        io.create_directory("db/one").await.unwrap();
        io.create_directory("db/two").await.unwrap();
        io.write("db/file", b"x").await.unwrap();

        let mut dirs = io.list_directories("db").await.unwrap();
        dirs.sort();
        assert_eq!(dirs, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_directory_is_recursive() {
        let io = MemoryFileIo::new();

        io.write("db/coll/a", b"1").await.unwrap();
        io.write("db/coll/b", b"2").await.unwrap();
        io.write("db/other/c", b"3").await.unwrap();

        io.delete_directory("db/coll").await.unwrap();

        assert!(io.read("db/coll/a").await.unwrap().is_none());
        assert!(!io.directory_exists("db/coll").await.unwrap());
        assert!(io.read("db/other/c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let io = MemoryFileIo::new();
        io.delete_file("missing").await.unwrap();
        io.delete_directory("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_path_normalization() {
        let io = MemoryFileIo::new();

        io.write("db//coll/doc", b"x").await.unwrap();
        assert_eq!(io.read("db/coll/doc").await.unwrap().unwrap(), b"x");
        assert!(io.directory_exists("/db/coll").await.unwrap());
    }

    #[tokio::test]
    async fn test_root_always_exists() {
        let io = MemoryFileIo::new();
        assert!(io.directory_exists("").await.unwrap());
        assert!(io.directory_exists("/").await.unwrap());
    }
}
