//! Named, type-homogeneous sets of documents.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::SandbankError;

pub(crate) struct Collection {
    pub name: String,
    /// Serialized label of the one document type this collection holds.
    pub document_type: String,
    pub documents: DashMap<String, Arc<Document>>,
}

impl Collection {
    pub fn new(name: String, document_type: String) -> Self {
        Self {
            name,
            document_type,
            documents: DashMap::new(),
        }
    }

    /// Insert (or replace) a document. This is the only insertion path
    /// since it enforces that the document's type matches the collection.
    pub fn insert_document(&self, document: Arc<Document>) -> Result<(), SandbankError> {
        if document.metadata.type_label != self.document_type {
            return Err(SandbankError::Schema(format!(
                "cannot insert a document of type {} into collection \"{}\" which expects type {}",
                document.metadata.type_label, self.name, self.document_type
            )));
        }

        self.documents.insert(document.uid.clone(), document);
        Ok(())
    }

    pub fn definition(&self) -> CollectionDefinition {
        CollectionDefinition {
            collection_name: self.name.clone(),
            document_type: self.document_type.clone(),
        }
    }
}

/// The serde shape of a collection's on-disk `definition` file. The type is
/// stored as a string label and resolved against registered types when the
/// collection is loaded back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CollectionDefinition {
    pub collection_name: String,
    pub document_type: String,
}
