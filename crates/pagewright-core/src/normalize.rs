//! Normalization of raw template modules into validated descriptors.

use serde_json::Value;
use tracing::debug;

use crate::{
    error::{CoreError, Result},
    template::{RawModule, RenderExport, TemplateConfig, TemplateDescriptor},
};

/// Turn a raw module loaded from `path` into a validated descriptor.
///
/// `strip_fingerprint` is used for compiled bundle paths of the form
/// `name.HASH.ext`; the hash segment is removed from the derived names.
pub fn normalize(raw: RawModule, path: &str, strip_fingerprint: bool) -> Result<TemplateDescriptor> {
    let (filename, template_name) = split_filename(path, strip_fingerprint);
    let config = merge_config(raw.config, &template_name, path)?;

    if config.name.trim().is_empty() {
        return Err(CoreError::ConfigNameMissing {
            path: path.to_string(),
        });
    }
    if config.stream_id.is_some() && config.stream.is_some() {
        return Err(CoreError::AmbiguousStreamConfig {
            path: path.to_string(),
        });
    }
    let Some(get_path) = raw.get_path else {
        return Err(CoreError::MissingGetPath {
            path: path.to_string(),
        });
    };
    let export = match (raw.render, raw.default) {
        (Some(render), _) => RenderExport::Document(render),
        (None, Some(default)) => RenderExport::Component(default),
        (None, None) => {
            return Err(CoreError::NoRenderableExport {
                path: path.to_string(),
            });
        }
    };

    debug!(path, name = %config.name, "normalized template");

    Ok(TemplateDescriptor {
        path: path.to_string(),
        filename,
        template_name,
        config,
        get_path,
        get_head_config: raw.get_head_config,
        get_redirects: raw.get_redirects,
        transform_props: raw.transform_props,
        export,
    })
}

/// Derive `(filename, template_name)` from a path.
///
/// With `strip_fingerprint`, `dir/name.HASH.ext` yields `("name.ext", "name")`.
/// Names without a hash segment are returned unchanged.
pub fn split_filename(path: &str, strip_fingerprint: bool) -> (String, String) {
    let filename = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (filename, None),
    };

    let stem = if strip_fingerprint {
        stem.rsplit_once('.').map_or(stem, |(name, _hash)| name)
    } else {
        stem
    };

    let filename = match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    };
    (filename, stem.to_string())
}

/// Overlay the declared config on a base whose name is the template name.
fn merge_config(declared: Option<Value>, template_name: &str, path: &str) -> Result<TemplateConfig> {
    let mut fields = match declared {
        None | Some(Value::Null) => serde_json::Map::new(),
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            return Err(CoreError::invalid_config(
                path,
                format!("expected an object, found {}", json_kind(&other)),
            ));
        }
    };

    if matches!(fields.get("name"), None | Some(Value::Null)) {
        fields.insert("name".to_string(), Value::from(template_name));
    }

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| CoreError::invalid_config(path, e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Check that a `getPath` result is a legal relative output path.
pub fn validate_get_path_value(value: &str, template_path: &str) -> Result<()> {
    let invalid = |reason: &str| Err(CoreError::invalid_get_path(template_path, value, reason));

    if value.trim().is_empty() {
        return invalid("path is empty");
    }
    if value.starts_with('/') {
        return invalid("path must be relative and must not start with '/'");
    }
    if value.contains('\\') {
        return invalid("path must use '/' separators");
    }
    if value.split('/').any(|segment| segment == "..") {
        return invalid("path must not contain '..' segments");
    }
    Ok(())
}
