//! Document providers.
//!
//! The renderer never fetches content itself; it asks a [`DocumentProvider`].
//! [`JsonDocumentStore`] serves documents from a directory of JSON files,
//! which is how local development data is laid out.

use std::{fs, path::Path};

use async_trait::async_trait;
use pagewright_core::{CoreError, Document, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

/// What the renderer asks a provider for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentQuery {
    /// One entity of a stream-backed feature.
    Entity {
        feature: String,
        entity_id: String,
        locale: String,
    },
    /// The document for a static page.
    Static { feature: String, locale: String },
    /// Lookup by decoded URL slug.
    Slug { slug: String },
}

/// Source of content documents.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Fetch the document answering `query`, or `None` when there is none.
    async fn get(&self, query: &DocumentQuery) -> Result<Option<Document>>;

    /// All documents belonging to `feature`, in a stable order.
    async fn list(&self, feature: &str) -> Result<Vec<Document>>;
}

/// In-memory document store, optionally loaded from a directory.
#[derive(Debug, Clone, Default)]
pub struct JsonDocumentStore {
    documents: Vec<Document>,
}

impl JsonDocumentStore {
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Load every `*.json` file in `dir`.
    ///
    /// A file holds either one document object or an array of them. Files are
    /// read in file-name order. A missing directory yields an empty store.
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            warn!(dir = %dir.display(), "documents directory not found");
            return Ok(Self::default());
        }

        let mut files: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut documents = Vec::new();
        for path in &files {
            let content = fs::read_to_string(path)?;
            match serde_json::from_str(&content)? {
                Value::Array(items) => {
                    documents.extend(items.into_iter().map(Document::new));
                }
                value @ Value::Object(_) => documents.push(Document::new(value)),
                _ => {
                    return Err(CoreError::config(format!(
                        "{} must contain a JSON object or array",
                        path.display()
                    )));
                }
            }
            debug!(path = %path.display(), "loaded documents");
        }

        info!(
            dir = %dir.display(),
            files = files.len(),
            documents = documents.len(),
            "loaded document store"
        );
        Ok(Self { documents })
    }

    /// Add a document.
    pub fn insert(&mut self, document: Document) {
        self.documents.push(document);
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn find(&self, query: &DocumentQuery) -> Option<&Document> {
        self.documents.iter().find(|doc| match query {
            DocumentQuery::Entity {
                feature,
                entity_id,
                locale,
            } => {
                doc.feature() == Some(feature.as_str())
                    && doc.id() == Some(entity_id.as_str())
                    && locale_matches(doc, locale)
            }
            DocumentQuery::Static { feature, locale } => {
                doc.feature() == Some(feature.as_str()) && locale_matches(doc, locale)
            }
            DocumentQuery::Slug { slug } => doc.slug() == Some(slug.as_str()),
        })
    }
}

/// Documents without a locale match every locale.
fn locale_matches(doc: &Document, locale: &str) -> bool {
    doc.locale().is_none_or(|l| l == locale)
}

#[async_trait]
impl DocumentProvider for JsonDocumentStore {
    async fn get(&self, query: &DocumentQuery) -> Result<Option<Document>> {
        Ok(self.find(query).cloned())
    }

    async fn list(&self, feature: &str) -> Result<Vec<Document>> {
        Ok(self
            .documents
            .iter()
            .filter(|doc| doc.feature() == Some(feature))
            .cloned()
            .collect())
    }
}
