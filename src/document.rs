//! The document data structure.
//!
//! A [`Document`] pairs a stable identifier with a type-erased, privately
//! owned data instance. The cached instance is always a copy of whatever
//! the caller handed in, built from a pooled instance, so callers can keep
//! mutating their own object without corrupting the cache. Updates replace
//! the whole document; a cached instance is never mutated in place.

use std::any::Any;
use std::sync::Arc;

use crate::error::SandbankError;
use crate::pool::ObjectPool;
use crate::schema::{BoxedInstance, Persistable, TypeMetadata};

pub(crate) struct Document {
    pub uid: String,
    /// Name of the collection this document belongs to.
    pub collection: String,
    pub metadata: Arc<TypeMetadata>,
    pub data: Arc<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("uid", &self.uid)
            .field("collection", &self.collection)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Build a document from a caller-supplied instance.
    ///
    /// Assigns a fresh identifier when the instance has none (writing it
    /// back into the caller's object), then snapshots the saveable fields
    /// into a pooled instance owned by the cache.
    pub fn from_instance<T: Persistable>(
        source: &mut T,
        metadata: Arc<TypeMetadata>,
        pool: &ObjectPool,
        collection: &str,
    ) -> Result<Self, SandbankError> {
        if source.uid().is_empty() {
            source.set_uid(generate_uid());
        }
        let uid = source.uid().to_string();

        let mut copy = pool.acquire_as::<T>();
        copy.apply_saved(&serde_json::to_value(&*source)?)?;
        copy.set_uid(uid.clone());

        let data: Arc<dyn Any + Send + Sync> = Arc::new(copy);

        Ok(Self {
            uid,
            collection: collection.to_string(),
            metadata,
            data,
        })
    }

    /// Wrap an instance loaded from disk. No copy is made and the document
    /// is not considered stale.
    pub fn from_loaded(
        uid: String,
        collection: &str,
        metadata: Arc<TypeMetadata>,
        data: BoxedInstance,
    ) -> Self {
        Self {
            uid,
            collection: collection.to_string(),
            metadata,
            data: Arc::from(data),
        }
    }

    /// The JSON object of this document's saveable fields.
    pub fn saved_value(&self) -> Result<serde_json::Value, SandbankError> {
        self.metadata.saved_value(self.data.as_ref())
    }
}

/// A random 32-character identifier for documents inserted without one.
pub(crate) fn generate_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MetadataCache;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Default)]
    struct Item {
        uid: String,
        score: u32,
    }

    impl Persistable for Item {
        fn uid(&self) -> &str { &self.uid }
        fn set_uid(&mut self, uid: String) { self.uid = uid; }
    }

    fn metadata() -> Arc<TypeMetadata> {
        MetadataCache::new().metadata_for::<Item>().unwrap()
    }

    #[test]
    fn test_generated_uid_shape() {
        let uid = generate_uid();

        assert_eq!(uid.len(), 32);
        assert!(uid.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(uid, generate_uid());
    }

    #[test]
    fn test_empty_uid_is_assigned_and_written_back() {
        let pool = ObjectPool::new();
        let mut item = Item { uid: String::new(), score: 3 };

        let document = Document::from_instance(&mut item, metadata(), &pool, "items").unwrap();

        assert_eq!(item.uid.len(), 32);
        assert_eq!(document.uid, item.uid);
    }

    #[test]
    fn test_existing_uid_is_kept() {
        let pool = ObjectPool::new();
        let mut item = Item { uid: "my-id".into(), score: 1 };

        let document = Document::from_instance(&mut item, metadata(), &pool, "items").unwrap();

        assert_eq!(document.uid, "my-id");
        assert_eq!(item.uid, "my-id");
    }

    #[test]
    fn test_cached_data_is_a_private_copy() {
        let pool = ObjectPool::new();
        let mut item = Item { uid: "a".into(), score: 10 };

        let document = Document::from_instance(&mut item, metadata(), &pool, "items").unwrap();

        // Mutating the caller's instance doesn't touch the cached copy.
        item.score = 999;
        let cached = document.data.downcast_ref::<Item>().unwrap();
        assert_eq!(cached.score, 10);
    }

    #[test]
    fn test_saved_value_contains_fields() {
        let pool = ObjectPool::new();
        let mut item = Item { uid: "b".into(), score: 42 };

        let document = Document::from_instance(&mut item, metadata(), &pool, "items").unwrap();
        let value = document.saved_value().unwrap();

        assert_eq!(value["uid"], "b");
        assert_eq!(value["score"], 42);
    }
}
