// JSON file document store - Offline backend holding documents in memory
use crate::application::document_store::{
    DocumentFilter, DocumentPage, DocumentStore, PageCursor, StoreError, StoredDocument,
};
use crate::domain::document::RawDailyDocument;
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::RwLock;

/// Accepted file layouts: a bare array or `{ "documents": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentFile {
    Bare(Vec<RawDailyDocument>),
    Wrapped { documents: Vec<RawDailyDocument> },
}

pub struct JsonDocumentStore {
    documents: RwLock<Vec<StoredDocument>>,
}

impl JsonDocumentStore {
    pub fn from_documents(documents: Vec<RawDailyDocument>) -> Self {
        let store = Self {
            documents: RwLock::new(Vec::with_capacity(documents.len())),
        };
        for document in documents {
            store.insert(document);
        }
        store
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read document file {}", path.display()))?;
        let documents = match serde_json::from_str::<DocumentFile>(&raw)
            .with_context(|| format!("Failed to parse document file {}", path.display()))?
        {
            DocumentFile::Bare(documents) => documents,
            DocumentFile::Wrapped { documents } => documents,
        };

        tracing::info!("Loaded {} documents from {}", documents.len(), path.display());
        Ok(Self::from_documents(documents))
    }

    pub fn insert(&self, document: RawDailyDocument) {
        let mut documents = self.write();
        let name = format!("{}_{}_{:06}", document.tag_id, document.day, documents.len());
        documents.push(StoredDocument { name, document });
        // Store order: day descending, then name descending
        documents.sort_by(|a, b| {
            b.document
                .day
                .cmp(&a.document.day)
                .then_with(|| b.name.cmp(&a.name))
        });
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<StoredDocument>> {
        self.documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<StoredDocument>> {
        self.documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Whether `stored` comes strictly after `cursor` in store order.
fn is_after(stored: &StoredDocument, cursor: &PageCursor) -> bool {
    (stored.document.day.as_str(), stored.name.as_str())
        < (cursor.day.as_str(), cursor.document.as_str())
}

#[async_trait]
impl DocumentStore for JsonDocumentStore {
    async fn list_tag_ids(&self) -> Result<Vec<String>, StoreError> {
        let tags: BTreeSet<String> = self
            .read()
            .iter()
            .map(|stored| stored.document.tag_id.clone())
            .filter(|tag| !tag.is_empty())
            .collect();
        Ok(tags.into_iter().collect())
    }

    async fn fetch_documents(
        &self,
        filter: &DocumentFilter,
        cursor: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<DocumentPage, StoreError> {
        if page_size == 0 {
            return Err(StoreError::InvalidPageSize);
        }

        let page: Vec<StoredDocument> = self
            .read()
            .iter()
            .filter(|stored| filter.matches(&stored.document))
            .filter(|stored| cursor.is_none_or(|c| is_after(stored, c)))
            .take(page_size)
            .cloned()
            .collect();

        Ok(DocumentPage::from_stored(page, page_size))
    }
}
