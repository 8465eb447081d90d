//! Head configuration declared by templates.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Contents of a page's `<head>` as declared by `getHeadConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadConfig {
    /// Page title.
    #[serde(default)]
    pub title: Option<String>,

    /// Character set.
    #[serde(default)]
    pub charset: Option<String>,

    /// Viewport meta content.
    #[serde(default)]
    pub viewport: Option<String>,

    /// Value of the `lang` attribute on `<html>`.
    #[serde(default)]
    pub lang: Option<String>,

    /// Additional tags.
    #[serde(default)]
    pub tags: Vec<Tag>,

    /// Raw markup appended to the head verbatim.
    #[serde(default)]
    pub other: Option<String>,
}

impl HeadConfig {
    /// Create an empty head config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the language.
    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Append a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Set the raw trailing markup.
    #[must_use]
    pub fn with_other(mut self, other: impl Into<String>) -> Self {
        self.other = Some(other.into());
        self
    }
}

/// A single head tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    /// Element name.
    #[serde(rename = "type")]
    pub tag_type: TagType,

    /// Attributes in declaration order.
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
}

impl Tag {
    /// Create a tag without attributes.
    #[must_use]
    pub fn new(tag_type: TagType) -> Self {
        Self {
            tag_type,
            attributes: IndexMap::new(),
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Supported head element types.
///
/// Anything else deserializes to [`TagType::Unknown`] and is skipped at render time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagType {
    Base,
    Link,
    Style,
    Meta,
    Script,
    Noscript,
    Template,
    Unknown(String),
}

impl TagType {
    /// Parse an element name.
    pub fn parse(name: &str) -> Self {
        match name {
            "base" => Self::Base,
            "link" => Self::Link,
            "style" => Self::Style,
            "meta" => Self::Meta,
            "script" => Self::Script,
            "noscript" => Self::Noscript,
            "template" => Self::Template,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Element name as written in markup.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Base => "base",
            Self::Link => "link",
            Self::Style => "style",
            Self::Meta => "meta",
            Self::Script => "script",
            Self::Noscript => "noscript",
            Self::Template => "template",
            Self::Unknown(name) => name,
        }
    }

    /// Void elements render without a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Base | Self::Link | Self::Meta)
    }
}

impl Serialize for TagType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TagType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::parse(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_head_config() {
        let head: HeadConfig = serde_json::from_value(serde_json::json!({
            "title": "Store",
            "tags": [
                { "type": "meta", "attributes": { "name": "description", "content": "x" } },
                { "type": "marquee", "attributes": {} }
            ]
        }))
        .expect("deserialize");

        assert_eq!(head.title.as_deref(), Some("Store"));
        assert_eq!(head.tags.len(), 2);
        assert_eq!(head.tags[0].tag_type, TagType::Meta);
        assert_eq!(
            head.tags[1].tag_type,
            TagType::Unknown("marquee".to_string())
        );
    }

    #[test]
    fn test_attribute_order_preserved() {
        let tag = Tag::new(TagType::Link)
            .attr("rel", "icon")
            .attr("href", "/favicon.ico");
        let keys: Vec<_> = tag.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["rel", "href"]);
    }

    #[test]
    fn test_void_tags() {
        assert!(TagType::Base.is_void());
        assert!(TagType::Link.is_void());
        assert!(TagType::Meta.is_void());
        assert!(!TagType::Script.is_void());
        assert!(!TagType::Unknown("x".into()).is_void());
    }
}
