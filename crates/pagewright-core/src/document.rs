//! Content documents fed to templates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A content document: an arbitrary JSON object plus a few well-known fields.
///
/// Well-known fields are `id`, `locale`, `slug` and the feature name stored
/// under `__.name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Value);

impl Document {
    /// Wrap a JSON value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// An empty document, used to evaluate `getPath` on static templates.
    #[must_use]
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    /// Minimal document for a static page of `feature` in `locale`.
    #[must_use]
    pub fn for_static_page(feature: &str, locale: &str) -> Self {
        Self(serde_json::json!({
            "locale": locale,
            "__": { "name": feature },
        }))
    }

    /// Look up a top-level field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Entity identifier.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    /// Document locale.
    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        self.get_str("locale").filter(|l| !l.is_empty())
    }

    /// URL slug.
    #[must_use]
    pub fn slug(&self) -> Option<&str> {
        self.get_str("slug").filter(|s| !s.is_empty())
    }

    /// Feature (template config name) this document belongs to.
    #[must_use]
    pub fn feature(&self) -> Option<&str> {
        self.get("__")
            .and_then(|meta| meta.get("name"))
            .and_then(Value::as_str)
    }

    /// Borrow the underlying JSON.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the underlying JSON.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
