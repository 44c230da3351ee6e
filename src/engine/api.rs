// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The public API facade.
//!
//! Every operation lazily initialises the engine, so the very first call
//! on a fresh store blocks while existing data loads from disk; everything
//! after that only touches memory and returns immediately. Durability
//! happens in the background (see the write-back scheduler).

use std::sync::Arc;

use tracing::{error, info};

use crate::collection::Collection;
use crate::document::Document;
use crate::error::SandbankError;
use crate::metrics;
use crate::schema::Persistable;
use crate::serialize;
use crate::stale::StaleEntry;

use super::types::{WriteFailure, WriteFailureKind};
use super::{Engine, Sandbank};

impl Sandbank {
    /// Initialise the store.
    ///
    /// You don't have to call this yourself - the store does it for you on
    /// your first request. You may want to call it manually at server start
    /// if your database is big, to avoid the first request stalling while
    /// everything loads. Calling it any number of times, from any number of
    /// tasks, is safe; the store is only initialised once.
    ///
    /// Collections on disk are resolved against registered document types,
    /// so call [`register_type`](Self::register_type) for each of your
    /// types first (an insert registers its type as a side effect, but only
    /// after initialisation has already happened).
    pub async fn initialise(&self) -> Result<(), SandbankError> {
        self.engine.initialise().await
    }

    /// Gracefully shut the store down, flushing everything outstanding.
    ///
    /// Call this when your server is shutting down if recently-changed data
    /// matters to you. Operations ongoing at the time `shutdown` is called
    /// are not guaranteed to be written. The store can be used again
    /// afterwards; the next operation re-initialises it.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
    }

    /// Register a document type so collections stored on disk can be
    /// resolved at initialisation. Idempotent.
    pub fn register_type<T: Persistable>(&self) -> Result<(), SandbankError> {
        let metadata = self.engine.registry.metadata_for::<T>()?;
        self.engine.pool.register_type(&metadata);
        Ok(())
    }

    /// Insert a document. The document has its identifier assigned (and
    /// written back into `document`) if it is empty.
    ///
    /// Re-inserting an identifier replaces the stored document: the last
    /// insert wins, in memory immediately and on disk eventually.
    pub async fn insert<T: Persistable>(
        &self,
        collection: &str,
        document: &mut T,
    ) -> Result<(), SandbankError> {
        self.engine.ensure_initialised().await?;
        self.engine.insert_document(collection, document).await
    }

    /// Insert multiple documents. Each has its identifier assigned if
    /// empty.
    pub async fn insert_many<'a, T, I>(
        &self,
        collection: &str,
        documents: I,
    ) -> Result<(), SandbankError>
    where
        T: Persistable,
        I: IntoIterator<Item = &'a mut T>,
    {
        self.engine.ensure_initialised().await?;
        for document in documents {
            self.engine.insert_document(collection, document).await?;
        }
        Ok(())
    }

    /// Fetch the first document for which `predicate` returns true, as a
    /// private copy the caller may freely mutate.
    pub async fn select_one<T: Persistable>(
        &self,
        collection: &str,
        predicate: impl Fn(&T) -> bool,
    ) -> Result<Option<T>, SandbankError> {
        self.engine.ensure_initialised().await?;

        let Some(collection) = self.engine.typed_collection::<T>(collection)? else {
            return Ok(None);
        };

        for entry in collection.documents.iter() {
            if let Some(data) = entry.value().data.downcast_ref::<T>() {
                if predicate(data) {
                    return Ok(Some(self.engine.clone_out(data)?));
                }
            }
        }

        Ok(None)
    }

    /// The same as [`select_one`](Self::select_one) except faster, since
    /// the document is looked up by identifier.
    pub async fn select_one_by_id<T: Persistable>(
        &self,
        collection: &str,
        uid: &str,
    ) -> Result<Option<T>, SandbankError> {
        self.engine.ensure_initialised().await?;

        let Some(collection) = self.engine.typed_collection::<T>(collection)? else {
            return Ok(None);
        };

        let Some(document) = collection.documents.get(uid).map(|entry| entry.clone()) else {
            return Ok(None);
        };

        let Some(data) = document.data.downcast_ref::<T>() else {
            return Ok(None);
        };
        Ok(Some(self.engine.clone_out(data)?))
    }

    /// Fetch every document for which `predicate` returns true, as private
    /// copies the caller may freely mutate.
    pub async fn select<T: Persistable>(
        &self,
        collection: &str,
        predicate: impl Fn(&T) -> bool,
    ) -> Result<Vec<T>, SandbankError> {
        self.engine.ensure_initialised().await?;

        let Some(collection) = self.engine.typed_collection::<T>(collection)? else {
            return Ok(Vec::new());
        };

        let mut output = Vec::new();
        for entry in collection.documents.iter() {
            if let Some(data) = entry.value().data.downcast_ref::<T>() {
                if predicate(data) {
                    output.push(self.engine.clone_out(data)?);
                }
            }
        }

        Ok(output)
    }

    /// Like [`select`](Self::select), but returns shared handles aliasing
    /// the cached instances instead of copies - no per-document clone, so
    /// it is much faster for large result sets.
    ///
    /// The cache never mutates an instance it has handed out (updates
    /// always install a fresh instance), so the returned handles are stable
    /// snapshots. The flip side: a handle may grow stale if another caller
    /// inserts a newer version, and if your type has interior-mutable
    /// fields, mutations through them are visible to every other holder -
    /// including the cache itself. Treat the results as read-only.
    pub async fn select_unsafe_references<T: Persistable>(
        &self,
        collection: &str,
        predicate: impl Fn(&T) -> bool,
    ) -> Result<Vec<Arc<T>>, SandbankError> {
        self.engine.ensure_initialised().await?;

        let Some(collection) = self.engine.typed_collection::<T>(collection)? else {
            return Ok(Vec::new());
        };

        let mut output = Vec::new();
        for entry in collection.documents.iter() {
            if let Ok(data) = entry.value().data.clone().downcast::<T>() {
                if predicate(&data) {
                    output.push(data);
                }
            }
        }

        Ok(output)
    }

    /// Delete every document for which `predicate` returns true.
    ///
    /// Documents leave the in-memory collection immediately; the matching
    /// files are deleted in the background with bounded retries, after
    /// which a failure is logged and reported to the write-failure hook.
    pub async fn delete<T: Persistable>(
        &self,
        collection: &str,
        predicate: impl Fn(&T) -> bool,
    ) -> Result<(), SandbankError> {
        self.engine.ensure_initialised().await?;

        let Some(typed) = self.engine.typed_collection::<T>(collection)? else {
            return Ok(());
        };

        let mut uids_to_delete = Vec::new();
        for entry in typed.documents.iter() {
            if let Some(data) = entry.value().data.downcast_ref::<T>() {
                if predicate(data) {
                    uids_to_delete.push(entry.key().clone());
                }
            }
        }

        for uid in uids_to_delete {
            typed.documents.remove(&uid);
            self.engine.schedule_file_delete(collection, &uid);
        }

        Ok(())
    }

    /// The same as [`delete`](Self::delete) except faster, since the
    /// document is looked up by identifier.
    pub async fn delete_by_id<T: Persistable>(
        &self,
        collection: &str,
        uid: &str,
    ) -> Result<(), SandbankError> {
        self.engine.ensure_initialised().await?;

        let Some(typed) = self.engine.typed_collection::<T>(collection)? else {
            return Ok(());
        };

        typed.documents.remove(uid);
        self.engine.schedule_file_delete(collection, uid);

        Ok(())
    }

    /// Whether any document matches `predicate`.
    pub async fn any<T: Persistable>(
        &self,
        collection: &str,
        predicate: impl Fn(&T) -> bool,
    ) -> Result<bool, SandbankError> {
        self.engine.ensure_initialised().await?;

        let Some(collection) = self.engine.typed_collection::<T>(collection)? else {
            return Ok(false);
        };

        for entry in collection.documents.iter() {
            if let Some(data) = entry.value().data.downcast_ref::<T>() {
                if predicate(data) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Whether a document with this identifier exists.
    pub async fn any_by_id(&self, collection: &str, uid: &str) -> Result<bool, SandbankError> {
        self.engine.ensure_initialised().await?;

        let Some(collection) = self.engine.collections.get(collection).map(|c| c.clone()) else {
            return Ok(false);
        };
        Ok(collection.documents.contains_key(uid))
    }

    /// Delete everything, forever: all in-memory state and all files.
    pub async fn wipe_all_data(&self) -> Result<(), SandbankError> {
        self.engine.ensure_initialised().await?;

        self.engine.wipe_data_state();

        // Hold the write lock so collection directories aren't deleted
        // while a write-back pass is touching them.
        let _guard = self.engine.write_lock.lock().await;
        self.engine.files.wipe_filesystem().await
    }

    /// Force a full write of all stale documents, blocking until the pass
    /// completes. Individual document failures follow the usual
    /// fire-and-forget policy (logged, counted, hook).
    pub async fn force_full_write(&self) -> Result<(), SandbankError> {
        self.engine.ensure_initialised().await?;
        self.engine.force_full_write().await;
        Ok(())
    }

    /// Copy the saveable fields from one instance to another. Useful for
    /// hydrating a live game object from a freshly-loaded document.
    pub fn copy_saved_fields<T: Persistable>(
        source: &T,
        destination: &mut T,
    ) -> Result<(), SandbankError> {
        destination.apply_saved(&serialize::saved_value(source)?)
    }
}

impl Engine {
    pub(super) async fn insert_document<T: Persistable>(
        &self,
        collection: &str,
        source: &mut T,
    ) -> Result<(), SandbankError> {
        let metadata = self.registry.metadata_for::<T>()?;
        self.pool.register_type(&metadata);

        let target = self.collection_for_insert(collection, metadata.type_label).await?;

        let document = Arc::new(Document::from_instance(
            source,
            metadata,
            &self.pool,
            collection,
        )?);
        let uid = document.uid.clone();

        target.insert_document(document)?;
        self.stale.push(StaleEntry {
            collection: collection.to_string(),
            uid,
        });

        Ok(())
    }

    /// Look up a collection, creating it (and persisting its definition)
    /// when it doesn't exist yet. Creation is serialized so two concurrent
    /// first-inserts can't race.
    async fn collection_for_insert(
        &self,
        name: &str,
        type_label: &str,
    ) -> Result<Arc<Collection>, SandbankError> {
        if let Some(existing) = self.collections.get(name) {
            return Ok(existing.clone());
        }

        let _guard = self.collection_create_lock.lock().await;
        if let Some(existing) = self.collections.get(name) {
            return Ok(existing.clone());
        }

        info!(collection = %name, "creating new collection");

        let collection = Arc::new(Collection::new(name.to_string(), type_label.to_string()));
        self.files.save_collection_definition(&collection.definition()).await?;
        self.collections.insert(name.to_string(), collection.clone());

        Ok(collection)
    }

    /// A collection by name, checked against the caller's document type.
    pub(super) fn typed_collection<T: Persistable>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<Collection>>, SandbankError> {
        let Some(collection) = self.collections.get(name).map(|entry| entry.clone()) else {
            return Ok(None);
        };

        if collection.document_type != T::type_label() {
            return Err(SandbankError::Schema(format!(
                "collection \"{name}\" holds documents of type {}, not {}",
                collection.document_type,
                T::type_label()
            )));
        }

        Ok(Some(collection))
    }

    /// Materialize a caller-visible copy of a cached instance, built from
    /// a pooled instance.
    pub(super) fn clone_out<T: Persistable>(&self, source: &T) -> Result<T, SandbankError> {
        let mut instance = self.pool.acquire_as::<T>();
        instance.apply_saved(&serialize::saved_value(source)?)?;
        Ok(instance)
    }

    /// Fire-and-forget file deletion with bounded retries.
    pub(super) fn schedule_file_delete(&self, collection: &str, uid: &str) {
        let files = self.files.clone();
        let hook = self.write_failure_hook.read().clone();
        let collection = collection.to_string();
        let uid = uid.to_string();

        tokio::spawn(async move {
            match files.delete_document(&collection, &uid).await {
                Ok(()) => metrics::record_document_delete("success"),
                Err(delete_error) => {
                    metrics::record_document_delete("dropped");
                    error!(
                        collection = %collection,
                        uid = %uid,
                        error = %delete_error,
                        "failed to delete document file after retries"
                    );
                    if let Some(hook) = hook {
                        hook(WriteFailure {
                            collection,
                            uid,
                            kind: WriteFailureKind::Delete,
                            message: delete_error.to_string(),
                        });
                    }
                }
            }
        });
    }
}
