//! Rendering of `HeadConfig` into head markup.

use pagewright_core::{Document, HeadConfig, Tag, TagType};
use tracing::warn;

/// Title used when the head config declares none.
pub const DEFAULT_TITLE: &str = "Yext Pages Site";

pub const DEFAULT_CHARSET: &str = "UTF-8";

pub const DEFAULT_VIEWPORT: &str = "width=device-width, initial-scale=1";

pub const DEFAULT_LANG: &str = "en";

/// Resolve the page language: head config, then document locale, then `en`.
#[must_use]
pub fn get_lang(head: Option<&HeadConfig>, document: Option<&Document>) -> String {
    head.and_then(|h| h.lang.as_deref())
        .filter(|lang| !lang.is_empty())
        .or_else(|| document.and_then(Document::locale))
        .unwrap_or(DEFAULT_LANG)
        .to_string()
}

/// Render a head config to markup.
///
/// Output is one element per line; whitespace-only lines are dropped.
#[must_use]
pub fn render_head_config(head: &HeadConfig) -> String {
    let title = head.title.as_deref().unwrap_or(DEFAULT_TITLE);
    let charset = head.charset.as_deref().unwrap_or(DEFAULT_CHARSET);
    let viewport = head.viewport.as_deref().unwrap_or(DEFAULT_VIEWPORT);

    let mut lines = vec![
        format!("<title>{}</title>", escape_text(title)),
        format!(r#"<meta charset="{}">"#, escape_attr(charset)),
        format!(
            r#"<meta name="viewport" content="{}">"#,
            escape_attr(viewport)
        ),
    ];
    lines.extend(head.tags.iter().filter_map(render_tag));
    if let Some(ref other) = head.other {
        lines.push(other.clone());
    }

    lines
        .iter()
        .flat_map(|chunk| chunk.lines())
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a single tag, or `None` for unsupported types.
fn render_tag(tag: &Tag) -> Option<String> {
    if let TagType::Unknown(ref name) = tag.tag_type {
        warn!(tag_type = %name, "unsupported head tag type, skipping");
        return None;
    }

    let name = tag.tag_type.as_str();
    let attrs: String = tag
        .attributes
        .iter()
        .map(|(key, value)| format!(r#" {key}="{}""#, escape_attr(value)))
        .collect();

    Some(if tag.tag_type.is_void() {
        format!("<{name}{attrs} />")
    } else {
        format!("<{name}{attrs}></{name}>")
    })
}

/// Escape a value for use inside a double-quoted attribute.
#[must_use]
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
