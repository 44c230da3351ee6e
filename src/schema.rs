// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document type metadata.
//!
//! The store needs to enumerate and access the saveable fields of arbitrary
//! document types. Rust has no runtime reflection, so the field set is
//! derived from each type's serde view instead: everything a type
//! serializes is persistence-eligible, and `#[serde(skip)]` excludes a
//! field from persistence. The per-type bookkeeping (field names,
//! construct/serialize/deserialize entry points, identifier accessors) is
//! computed once per type and cached in the [`MetadataCache`] for the
//! lifetime of the process.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::SandbankError;

/// A type-erased document instance.
pub(crate) type BoxedInstance = Box<dyn Any + Send + Sync>;

/// A document type the store can persist.
///
/// Implementors need a stable identifier field (by convention called `uid`)
/// that is part of the type's serde view; a type whose identifier field is
/// skipped from serialization cannot be used as a document type.
///
/// # Example
///
/// ```
/// use sandbank::Persistable;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Default)]
/// struct PlayerData {
///     uid: String,
///     health: f32,
///     name: String,
/// }
///
/// impl Persistable for PlayerData {
///     fn uid(&self) -> &str { &self.uid }
///     fn set_uid(&mut self, uid: String) { self.uid = uid; }
/// }
/// ```
pub trait Persistable: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    /// Name of the designated identifier field in the serialized view.
    const UID_FIELD: &'static str = "uid";

    /// The document's identifier. Empty means "not yet assigned"; the store
    /// assigns one on insert.
    fn uid(&self) -> &str;

    /// Write an identifier back into the instance.
    fn set_uid(&mut self, uid: String);

    /// Stable label identifying this type in collection definitions on
    /// disk. Defaults to the Rust type path; override it if you want stored
    /// data to survive renaming or moving the type.
    fn type_label() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Overwrite this instance's saveable fields with the values in
    /// `saved`, leaving fields absent from `saved` at their current values.
    ///
    /// The default implementation rebuilds the instance through its JSON
    /// view, which resets `#[serde(skip)]` fields to their defaults.
    /// Override it if the type carries runtime-only state that hydration
    /// must preserve.
    fn apply_saved(&mut self, saved: &Value) -> Result<(), SandbankError> {
        let mut view = serde_json::to_value(&*self)?;
        if let (Some(fields), Some(incoming)) = (view.as_object_mut(), saved.as_object()) {
            for (name, value) in incoming {
                if fields.contains_key(name) {
                    fields.insert(name.clone(), value.clone());
                }
            }
        }
        *self = serde_json::from_value(view)?;
        Ok(())
    }
}

/// Everything the store knows about one document type: its label, its
/// persistence-eligible field names, and monomorphized entry points for
/// constructing, serializing and deserializing instances behind type
/// erasure.
#[derive(Debug)]
pub struct TypeMetadata {
    pub type_label: &'static str,
    pub type_id: TypeId,
    pub uid_field: &'static str,
    /// Persistence-eligible field names, from the serde view of a default
    /// instance.
    pub saved_fields: Vec<String>,
    construct: fn() -> BoxedInstance,
    to_saved: fn(&(dyn Any + Send + Sync)) -> Result<Value, SandbankError>,
    from_saved: fn(&Value) -> Result<BoxedInstance, SandbankError>,
    uid_of: fn(&(dyn Any + Send + Sync)) -> Result<String, SandbankError>,
}

impl TypeMetadata {
    fn build<T: Persistable>() -> Result<Self, SandbankError> {
        let sample = serde_json::to_value(T::default())?;
        let Some(fields) = sample.as_object() else {
            return Err(SandbankError::Schema(format!(
                "document type {} does not serialize to a JSON object",
                T::type_label()
            )));
        };

        Ok(Self {
            type_label: T::type_label(),
            type_id: TypeId::of::<T>(),
            uid_field: T::UID_FIELD,
            saved_fields: fields.keys().cloned().collect(),
            construct: construct_impl::<T>,
            to_saved: to_saved_impl::<T>,
            from_saved: from_saved_impl::<T>,
            uid_of: uid_of_impl::<T>,
        })
    }

    /// Whether the designated identifier field is part of the saved view.
    #[must_use]
    pub fn has_uid_field(&self) -> bool {
        self.saved_fields.iter().any(|field| field == self.uid_field)
    }

    /// Build a fresh default instance.
    pub(crate) fn construct(&self) -> BoxedInstance {
        (self.construct)()
    }

    /// The JSON object holding an instance's saveable fields.
    pub(crate) fn saved_value(
        &self,
        data: &(dyn Any + Send + Sync),
    ) -> Result<Value, SandbankError> {
        (self.to_saved)(data)
    }

    /// Rebuild an instance from a stored JSON object. Unrecognised fields
    /// are ignored; missing fields keep their default values.
    pub(crate) fn instance_from(&self, saved: &Value) -> Result<BoxedInstance, SandbankError> {
        (self.from_saved)(saved)
    }

    pub(crate) fn uid_of(&self, data: &(dyn Any + Send + Sync)) -> Result<String, SandbankError> {
        (self.uid_of)(data)
    }
}

fn construct_impl<T: Persistable>() -> BoxedInstance {
    Box::new(T::default())
}

fn to_saved_impl<T: Persistable>(
    data: &(dyn Any + Send + Sync),
) -> Result<Value, SandbankError> {
    let instance = downcast::<T>(data)?;
    Ok(serde_json::to_value(instance)?)
}

fn from_saved_impl<T: Persistable>(saved: &Value) -> Result<BoxedInstance, SandbankError> {
    let mut instance = T::default();
    instance.apply_saved(saved)?;
    Ok(Box::new(instance))
}

fn uid_of_impl<T: Persistable>(
    data: &(dyn Any + Send + Sync),
) -> Result<String, SandbankError> {
    Ok(downcast::<T>(data)?.uid().to_string())
}

fn downcast<T: Persistable>(data: &(dyn Any + Send + Sync)) -> Result<&T, SandbankError> {
    data.downcast_ref::<T>().ok_or_else(|| {
        SandbankError::Schema(format!("instance is not of type {}", T::type_label()))
    })
}

/// One-time-per-type metadata cache, keyed by type label. No eviction;
/// entries live for the process lifetime.
pub(crate) struct MetadataCache {
    entries: DashMap<&'static str, Arc<TypeMetadata>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Metadata for `T`, building and caching it on first use.
    ///
    /// Fails when the type's serialized view is not a JSON object, when its
    /// identifier field is missing from that view, or when another type has
    /// already claimed the same label.
    pub fn metadata_for<T: Persistable>(&self) -> Result<Arc<TypeMetadata>, SandbankError> {
        if let Some(existing) = self.entries.get(T::type_label()) {
            if existing.type_id != TypeId::of::<T>() {
                return Err(SandbankError::Schema(format!(
                    "type label \"{}\" is already registered by a different type",
                    T::type_label()
                )));
            }
            return Ok(existing.clone());
        }

        let metadata = TypeMetadata::build::<T>()?;

        if !metadata.has_uid_field() {
            return Err(SandbankError::Schema(format!(
                "cannot handle a document type without a \"{}\" field - make sure {} has one \
                 and that it is not skipped from serialization",
                T::UID_FIELD,
                T::type_label()
            )));
        }

        let metadata = Arc::new(metadata);
        self.entries.insert(T::type_label(), metadata.clone());
        Ok(metadata)
    }

    /// The persistence-eligible field names of `T`, whether or not the type
    /// is a valid document type. Only valid types are cached.
    pub fn saved_fields<T: Persistable>(&self) -> Result<Vec<String>, SandbankError> {
        if let Some(existing) = self.entries.get(T::type_label()) {
            return Ok(existing.saved_fields.clone());
        }
        Ok(TypeMetadata::build::<T>()?.saved_fields)
    }

    /// Resolve a type label stored in a collection definition.
    pub fn resolve(&self, label: &str) -> Option<Arc<TypeMetadata>> {
        self.entries.get(label).map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Default)]
    struct WithUid {
        uid: String,
        health: i32,
    }

    impl Persistable for WithUid {
        fn uid(&self) -> &str { &self.uid }
        fn set_uid(&mut self, uid: String) { self.uid = uid; }
    }

    #[derive(Serialize, Deserialize, Default)]
    struct WithoutUid {
        name: String,
    }

    impl Persistable for WithoutUid {
        fn uid(&self) -> &str { "" }
        fn set_uid(&mut self, _uid: String) {}
    }

    #[derive(Serialize, Deserialize, Default)]
    struct SkippedRuntimeState {
        uid: String,
        health: i32,
        #[serde(skip)]
        dirty: bool,
    }

    impl Persistable for SkippedRuntimeState {
        fn uid(&self) -> &str { &self.uid }
        fn set_uid(&mut self, uid: String) { self.uid = uid; }
    }

    #[test]
    fn test_metadata_lists_saved_fields() {
        let cache = MetadataCache::new();
        let metadata = cache.metadata_for::<WithUid>().unwrap();

        assert!(metadata.saved_fields.contains(&"uid".to_string()));
        assert!(metadata.saved_fields.contains(&"health".to_string()));
        assert_eq!(metadata.saved_fields.len(), 2);
    }

    #[test]
    fn test_skipped_fields_are_not_eligible() {
        let cache = MetadataCache::new();
        let fields = cache.saved_fields::<SkippedRuntimeState>().unwrap();

        assert!(!fields.contains(&"dirty".to_string()));
    }

    #[test]
    fn test_type_without_uid_is_rejected() {
        let cache = MetadataCache::new();

        let err = cache.metadata_for::<WithoutUid>().unwrap_err();
        assert!(matches!(err, SandbankError::Schema(_)));

        // The field list is still available, just never cached.
        let fields = cache.saved_fields::<WithoutUid>().unwrap();
        assert_eq!(fields, vec!["name".to_string()]);
        assert!(cache.resolve(WithoutUid::type_label()).is_none());
    }

    #[test]
    fn test_metadata_is_cached_once() {
        let cache = MetadataCache::new();
        let first = cache.metadata_for::<WithUid>().unwrap();
        let second = cache.metadata_for::<WithUid>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_resolve_by_label() {
        let cache = MetadataCache::new();
        cache.metadata_for::<WithUid>().unwrap();

        let resolved = cache.resolve(WithUid::type_label()).unwrap();
        assert_eq!(resolved.type_id, TypeId::of::<WithUid>());
        assert!(cache.resolve("no.such.type").is_none());
    }

    #[test]
    fn test_apply_saved_copies_known_fields() {
        let source = WithUid { uid: "abc".into(), health: 77 };
        let saved = serde_json::to_value(&source).unwrap();

        let mut destination = WithUid::default();
        destination.apply_saved(&saved).unwrap();

        assert_eq!(destination.uid, "abc");
        assert_eq!(destination.health, 77);
    }

    #[test]
    fn test_apply_saved_ignores_unknown_and_keeps_missing() {
        let saved = serde_json::json!({"health": 12, "mana": 99});

        let mut destination = WithUid { uid: "keep-me".into(), health: 0 };
        destination.apply_saved(&saved).unwrap();

        // Unknown field dropped, missing field untouched.
        assert_eq!(destination.health, 12);
        assert_eq!(destination.uid, "keep-me");
    }

    #[test]
    fn test_instance_from_tolerates_missing_fields() {
        let cache = MetadataCache::new();
        let metadata = cache.metadata_for::<WithUid>().unwrap();

        let boxed = metadata.instance_from(&serde_json::json!({"uid": "only-uid"})).unwrap();
        let instance = boxed.downcast_ref::<WithUid>().unwrap();

        assert_eq!(instance.uid, "only-uid");
        assert_eq!(instance.health, 0);
    }

    #[test]
    fn test_saved_value_round_trip() {
        let cache = MetadataCache::new();
        let metadata = cache.metadata_for::<WithUid>().unwrap();

        let instance = WithUid { uid: "x1".into(), health: 5 };
        let erased: BoxedInstance = Box::new(instance);

        let value = metadata.saved_value(erased.as_ref()).unwrap();
        assert_eq!(value["uid"], "x1");
        assert_eq!(value["health"], 5);
        assert_eq!(metadata.uid_of(erased.as_ref()).unwrap(), "x1");
    }
}
