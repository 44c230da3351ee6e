// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The file controller: on-disk layout, merge-on-save, per-collection
//! write locking and bounded retries on top of a [`FileIo`] provider.
//!
//! Layout:
//!
//! ```text
//! <root>/<collection>/definition    collection name + document type label
//! <root>/<collection>/<uid>         one (possibly obfuscated) JSON file per document
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::collection::CollectionDefinition;
use crate::config::SandbankConfig;
use crate::document::Document;
use crate::error::SandbankError;
use crate::obfuscation;
use crate::retry::{retry, RetryConfig};
use crate::schema::TypeMetadata;
use crate::serialize;

const DEFINITION_FILE: &str = "definition";

pub(crate) struct FileController {
    io: Arc<dyn super::FileIo>,
    root: String,
    merge_json: bool,
    obfuscate: bool,
    indent: bool,
    /// One lock per collection so disk traffic for different collections
    /// proceeds in parallel while writes to the same collection's files are
    /// serialized.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileController {
    pub fn new(io: Arc<dyn super::FileIo>, config: &SandbankConfig) -> Self {
        Self {
            io,
            root: config.database_name.clone(),
            merge_json: config.merge_json,
            obfuscate: config.obfuscate_files,
            indent: config.indent_json,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, collection: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn collection_path(&self, collection: &str) -> String {
        format!("{}/{collection}", self.root)
    }

    fn definition_path(&self, collection: &str) -> String {
        format!("{}/{collection}/{DEFINITION_FILE}", self.root)
    }

    fn document_path(&self, collection: &str, uid: &str) -> String {
        format!("{}/{collection}/{uid}", self.root)
    }

    /// Create the root directory if it doesn't exist yet.
    pub async fn ensure_filesystem_setup(&self) -> Result<(), SandbankError> {
        let this = self;
        retry("ensure_filesystem_setup", &RetryConfig::structural(), move || {
            this.ensure_setup_attempt()
        })
        .await
    }

    async fn ensure_setup_attempt(&self) -> Result<(), SandbankError> {
        if !self.io.directory_exists(&self.root).await? {
            self.io.create_directory(&self.root).await?;
        }
        Ok(())
    }

    /// Save one document, merging with whatever is already on disk.
    ///
    /// With merging enabled, fields the current document knows about take
    /// its current values; fields present on disk but unknown to the
    /// current type are preserved verbatim. This stops data being wiped by
    /// things like renaming a field.
    pub async fn save_document(&self, document: &Document) -> Result<(), SandbankError> {
        let path = self.document_path(&document.collection, &document.uid);
        let lock = self.lock_for(&document.collection);

        let this = self;
        let path = path.as_str();
        let lock = lock.as_ref();
        retry("save_document", &RetryConfig::document(), move || {
            this.save_document_attempt(document, path, lock)
        })
        .await
    }

    async fn save_document_attempt(
        &self,
        document: &Document,
        path: &str,
        lock: &Mutex<()>,
    ) -> Result<(), SandbankError> {
        let _guard = lock.lock().await;

        let existing = if self.merge_json {
            match self.io.read(path).await? {
                Some(contents) => Some(decode_contents(contents)?),
                None => None,
            }
        } else {
            None
        };

        let current = document.saved_value()?;
        let final_value = match existing {
            Some(text) => {
                let mut merged = serialize::parse(&text)?;
                merge_saved_fields(&mut merged, &current);
                merged
            }
            None => current,
        };

        let text = serialize::render(&final_value, self.indent)?;
        let contents = if self.obfuscate {
            obfuscation::obfuscate(&text)
        } else {
            text.into_bytes()
        };

        self.io.write(path, &contents).await
    }

    /// Best-effort file deletion for a removed document.
    pub async fn delete_document(&self, collection: &str, uid: &str) -> Result<(), SandbankError> {
        let path = self.document_path(collection, uid);
        let lock = self.lock_for(collection);

        let this = self;
        let path = path.as_str();
        let lock = lock.as_ref();
        retry("delete_document", &RetryConfig::structural(), move || {
            this.delete_file_attempt(path, lock)
        })
        .await
    }

    async fn delete_file_attempt(&self, path: &str, lock: &Mutex<()>) -> Result<(), SandbankError> {
        let _guard = lock.lock().await;
        self.io.delete_file(path).await
    }

    /// Names of every collection present on disk.
    pub async fn list_collection_names(&self) -> Result<Vec<String>, SandbankError> {
        let io = self.io.as_ref();
        let root = self.root.as_str();
        retry("list_collection_names", &RetryConfig::structural(), move || {
            io.list_directories(root)
        })
        .await
    }

    /// Load and validate a collection's definition file.
    pub async fn load_collection_definition(
        &self,
        collection: &str,
    ) -> Result<CollectionDefinition, SandbankError> {
        let path = self.definition_path(collection);
        let lock = self.lock_for(collection);

        let this = self;
        let path_ref = path.as_str();
        let lock = lock.as_ref();
        let contents = retry("load_collection_definition", &RetryConfig::structural(), move || {
            this.read_attempt(path_ref, lock)
        })
        .await?;

        let Some(contents) = contents else {
            return Err(SandbankError::Corruption {
                collection: collection.to_string(),
                message: format!("no {DEFINITION_FILE} file found in the collection directory"),
            });
        };

        let text = decode_contents(contents)?;
        let definition: CollectionDefinition =
            serde_json::from_str(&text).map_err(|error| SandbankError::Corruption {
                collection: collection.to_string(),
                message: format!("failed to deserialize {DEFINITION_FILE}: {error}"),
            })?;

        if definition.collection_name != collection {
            return Err(SandbankError::Corruption {
                collection: collection.to_string(),
                message: format!(
                    "the collection name in the {DEFINITION_FILE} differs from the name of \
                     the directory ({collection} vs {})",
                    definition.collection_name
                ),
            });
        }

        Ok(definition)
    }

    async fn read_attempt(
        &self,
        path: &str,
        lock: &Mutex<()>,
    ) -> Result<Option<Vec<u8>>, SandbankError> {
        let _guard = lock.lock().await;
        self.io.read(path).await
    }

    /// Write a collection's definition file, creating its directory first.
    pub async fn save_collection_definition(
        &self,
        definition: &CollectionDefinition,
    ) -> Result<(), SandbankError> {
        let directory = self.collection_path(&definition.collection_name);
        let path = self.definition_path(&definition.collection_name);
        let lock = self.lock_for(&definition.collection_name);
        let text = serialize::render(&serde_json::to_value(definition)?, self.indent)?;

        let this = self;
        let directory = directory.as_str();
        let path = path.as_str();
        let text = text.as_str();
        let lock = lock.as_ref();
        retry("save_collection_definition", &RetryConfig::structural(), move || {
            this.save_definition_attempt(directory, path, text, lock)
        })
        .await
    }

    async fn save_definition_attempt(
        &self,
        directory: &str,
        path: &str,
        text: &str,
        lock: &Mutex<()>,
    ) -> Result<(), SandbankError> {
        let _guard = lock.lock().await;
        if !self.io.directory_exists(directory).await? {
            self.io.create_directory(directory).await?;
        }
        self.io.write(path, text.as_bytes()).await
    }

    /// Load every document in a collection, hydrating instances through the
    /// resolved type metadata.
    pub async fn load_all_documents(
        &self,
        definition: &CollectionDefinition,
        metadata: &Arc<TypeMetadata>,
    ) -> Result<Vec<Document>, SandbankError> {
        let collection = &definition.collection_name;
        let directory = self.collection_path(collection);
        let lock = self.lock_for(collection);
        let _guard = lock.lock().await;

        let io = self.io.as_ref();
        let directory_ref = directory.as_str();
        let files = retry("list_documents", &RetryConfig::structural(), move || {
            io.list_files(directory_ref)
        })
        .await?;

        let mut documents = Vec::new();

        for file in files.into_iter().filter(|name| name != DEFINITION_FILE) {
            let path = format!("{directory}/{file}");
            let path_ref = path.as_str();
            let contents = retry("load_document", &RetryConfig::structural(), move || {
                io.read(path_ref)
            })
            .await?;

            // The file was listed a moment ago; missing now means something
            // else is mutating the directory underneath us.
            let Some(contents) = contents else {
                return Err(SandbankError::Corruption {
                    collection: collection.clone(),
                    message: format!("document file \"{file}\" disappeared during load"),
                });
            };

            let text = decode_contents(contents)?;
            let saved = serialize::parse(&text).map_err(|error| SandbankError::Corruption {
                collection: collection.clone(),
                message: format!("failed loading document \"{file}\" - invalid JSON: {error}"),
            })?;

            let data = metadata.instance_from(&saved).map_err(|error| {
                SandbankError::Corruption {
                    collection: collection.clone(),
                    message: format!("failed loading document \"{file}\": {error}"),
                }
            })?;

            let uid = metadata.uid_of(data.as_ref())?;
            if uid != file {
                return Err(SandbankError::Corruption {
                    collection: collection.clone(),
                    message: format!(
                        "failed loading document \"{file}\": the filename does not match \
                         the identifier ({file} vs {uid})"
                    ),
                });
            }

            documents.push(Document::from_loaded(uid, collection, metadata.clone(), data));
        }

        Ok(documents)
    }

    /// Delete every collection directory. The caller is expected to hold
    /// the engine write lock so directories aren't deleted mid-write.
    pub async fn wipe_filesystem(&self) -> Result<(), SandbankError> {
        let collections = self
            .list_collection_names()
            .await
            .map_err(|error| SandbankError::Io(format!("failed to wipe filesystem: {error}")))?;

        for collection in collections {
            let path = self.collection_path(&collection);
            let lock = self.lock_for(&collection);

            let this = self;
            let path_ref = path.as_str();
            let lock_ref = lock.as_ref();
            retry("wipe_collection", &RetryConfig::structural(), move || {
                this.delete_directory_attempt(path_ref, lock_ref)
            })
            .await
            .map_err(|error| SandbankError::Io(format!("failed to wipe filesystem: {error}")))?;
        }

        Ok(())
    }

    async fn delete_directory_attempt(
        &self,
        path: &str,
        lock: &Mutex<()>,
    ) -> Result<(), SandbankError> {
        let _guard = lock.lock().await;
        self.io.delete_directory(path).await
    }
}

/// File bytes to text, unobfuscating when the sentinel is present.
fn decode_contents(contents: Vec<u8>) -> Result<String, SandbankError> {
    if obfuscation::looks_obfuscated(&contents) {
        obfuscation::unobfuscate(&contents)
    } else {
        String::from_utf8(contents)
            .map_err(|error| SandbankError::Io(format!("file is not valid UTF-8: {error}")))
    }
}

/// Overlay the current document's fields onto the stored JSON object. The
/// current value wins for every field the document knows about; stored
/// fields the document doesn't know about stay as they are.
fn merge_saved_fields(stored: &mut serde_json::Value, current: &serde_json::Value) {
    if let (Some(stored), Some(current)) = (stored.as_object_mut(), current.as_object()) {
        for (name, value) in current {
            stored.insert(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileio::{FileIo, MemoryFileIo};
    use crate::pool::ObjectPool;
    use crate::schema::{MetadataCache, Persistable};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Serialize, Deserialize, Default)]
    struct Doc {
        uid: String,
        health: i32,
    }

    impl Persistable for Doc {
        fn uid(&self) -> &str { &self.uid }
        fn set_uid(&mut self, uid: String) { self.uid = uid; }
    }

    struct Fixture {
        io: Arc<MemoryFileIo>,
        controller: FileController,
        metadata: Arc<TypeMetadata>,
        pool: ObjectPool,
    }

    fn fixture(configure: impl FnOnce(&mut SandbankConfig)) -> Fixture {
        let mut config = SandbankConfig::default();
        configure(&mut config);

        let io = Arc::new(MemoryFileIo::new());
        let controller = FileController::new(io.clone(), &config);
        let metadata = MetadataCache::new().metadata_for::<Doc>().unwrap();

        Fixture { io, controller, metadata, pool: ObjectPool::new() }
    }

    fn document(fixture: &Fixture, uid: &str, health: i32) -> Document {
        let mut instance = Doc { uid: uid.into(), health };
        Document::from_instance(&mut instance, fixture.metadata.clone(), &fixture.pool, "docs")
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_writes_document_json() {
        let f = fixture(|_| {});

        f.controller.save_document(&document(&f, "d1", 5)).await.unwrap();

        let stored = f.io.read("sandbank/docs/d1").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(value, json!({"uid": "d1", "health": 5}));
    }

    #[tokio::test]
    async fn test_save_merges_unknown_fields() {
        let f = fixture(|_| {});

        // A previous version of the type stored an extra field.
        f.io.write(
            "sandbank/docs/d1",
            br#"{"uid": "d1", "health": 1, "legacy_name": "keep me"}"#,
        )
        .await
        .unwrap();

        f.controller.save_document(&document(&f, "d1", 42)).await.unwrap();

        let stored = f.io.read("sandbank/docs/d1").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(value["health"], 42);
        assert_eq!(value["legacy_name"], "keep me");
    }

    #[tokio::test]
    async fn test_save_without_merge_discards_unknown_fields() {
        let f = fixture(|config| config.merge_json = false);

        f.io.write(
            "sandbank/docs/d1",
            br#"{"uid": "d1", "health": 1, "legacy_name": "gone"}"#,
        )
        .await
        .unwrap();

        f.controller.save_document(&document(&f, "d1", 42)).await.unwrap();

        let stored = f.io.read("sandbank/docs/d1").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(value["health"], 42);
        assert!(value.get("legacy_name").is_none());
    }

    #[tokio::test]
    async fn test_save_obfuscated_and_load_back() {
        let f = fixture(|config| config.obfuscate_files = true);

        f.controller.save_document(&document(&f, "d1", 9)).await.unwrap();

        let stored = f.io.read("sandbank/docs/d1").await.unwrap().unwrap();
        assert!(obfuscation::looks_obfuscated(&stored));

        // Saving again merges through the obfuscation layer.
        f.controller.save_document(&document(&f, "d1", 10)).await.unwrap();

        let definition = CollectionDefinition {
            collection_name: "docs".into(),
            document_type: Doc::type_label().into(),
        };
        let loaded = f.controller.load_all_documents(&definition, &f.metadata).await.unwrap();
        assert_eq!(loaded.len(), 1);
        let data = loaded[0].data.downcast_ref::<Doc>().unwrap();
        assert_eq!(data.health, 10);
    }

    #[tokio::test]
    async fn test_definition_round_trip() {
        let f = fixture(|_| {});
        let definition = CollectionDefinition {
            collection_name: "docs".into(),
            document_type: Doc::type_label().into(),
        };

        f.controller.save_collection_definition(&definition).await.unwrap();
        assert!(f.io.directory_exists("sandbank/docs").await.unwrap());

        let loaded = f.controller.load_collection_definition("docs").await.unwrap();
        assert_eq!(loaded, definition);

        let names = f.controller.list_collection_names().await.unwrap();
        assert_eq!(names, vec!["docs".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_definition_is_corruption() {
        let f = fixture(|_| {});
        f.io.create_directory("sandbank/orphan").await.unwrap();

        let err = f.controller.load_collection_definition("orphan").await.unwrap_err();
        assert!(matches!(err, SandbankError::Corruption { .. }));
    }

    #[tokio::test]
    async fn test_mismatched_definition_name_is_corruption() {
        let f = fixture(|_| {});
        f.io.write(
            "sandbank/docs/definition",
            br#"{"collection_name": "something_else", "document_type": "t"}"#,
        )
        .await
        .unwrap();

        let err = f.controller.load_collection_definition("docs").await.unwrap_err();
        assert!(matches!(err, SandbankError::Corruption { .. }));
    }

    #[tokio::test]
    async fn test_filename_uid_mismatch_is_corruption() {
        let f = fixture(|_| {});
        f.io.write("sandbank/docs/wrong-name", br#"{"uid": "d1", "health": 1}"#)
            .await
            .unwrap();

        let definition = CollectionDefinition {
            collection_name: "docs".into(),
            document_type: Doc::type_label().into(),
        };
        let err = f.controller.load_all_documents(&definition, &f.metadata).await.unwrap_err();
        assert!(matches!(err, SandbankError::Corruption { .. }));
    }

    #[tokio::test]
    async fn test_load_skips_definition_file() {
        let f = fixture(|_| {});
        let definition = CollectionDefinition {
            collection_name: "docs".into(),
            document_type: Doc::type_label().into(),
        };
        f.controller.save_collection_definition(&definition).await.unwrap();
        f.controller.save_document(&document(&f, "d1", 1)).await.unwrap();

        let loaded = f.controller.load_all_documents(&definition, &f.metadata).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].uid, "d1");
    }

    #[tokio::test]
    async fn test_delete_document() {
        let f = fixture(|_| {});
        f.controller.save_document(&document(&f, "d1", 1)).await.unwrap();

        f.controller.delete_document("docs", "d1").await.unwrap();
        assert!(f.io.read("sandbank/docs/d1").await.unwrap().is_none());

        // Deleting a missing document is not an error.
        f.controller.delete_document("docs", "d1").await.unwrap();
    }

    #[tokio::test]
    async fn test_wipe_filesystem() {
        let f = fixture(|_| {});
        let definition = CollectionDefinition {
            collection_name: "docs".into(),
            document_type: Doc::type_label().into(),
        };
        f.controller.save_collection_definition(&definition).await.unwrap();
        f.controller.save_document(&document(&f, "d1", 1)).await.unwrap();

        f.controller.wipe_filesystem().await.unwrap();

        assert!(f.controller.list_collection_names().await.unwrap().is_empty());
        assert!(f.io.read("sandbank/docs/d1").await.unwrap().is_none());
    }
}
