//! Page assembly.
//!
//! Wraps the markup produced by a template's default export in a base
//! document: head tags, language, stylesheet links and the hydration
//! bootstrap. Asset URLs are emitted relative to a placeholder token that is
//! replaced once the final request path is known.

use std::sync::Arc;

use pagewright_core::{
    HeadConfig, Manifest, RenderMode, TemplateDescriptor, TemplateRenderProps,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    assets::walk_asset_graph,
    head::{escape_attr, get_lang, render_head_config},
    template::{Template, TemplateContext, TemplateError},
};

/// Placeholder emitted in front of asset URLs.
///
/// The number of `../` needed depends on the request path, which behind a
/// reverse proxy is only known at request time.
pub const RELATIVE_PREFIX_TOKEN: &str = "%%RELATIVE_PREFIX_TO_ROOT%%";

/// HTML assembly errors.
#[derive(Debug, Error)]
pub enum HtmlError {
    /// Base document interpolation failed.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// The base document has no `<head>` to inject into.
    #[error("base document {document:?} has no <head> tag")]
    HeadTagMissing { document: String },

    /// A custom base document was combined with a template-level head config.
    #[error(
        "template {path} exports getHeadConfig, which cannot be combined with a custom base document"
    )]
    ConflictingHeadCustomization { path: String },

    /// Props could not be serialized for hydration.
    #[error("failed to serialize page props: {0}")]
    Props(#[from] serde_json::Error),
}

/// Result type for HTML assembly.
pub type Result<T> = std::result::Result<T, HtmlError>;

/// Document every page is wrapped in.
#[derive(Debug, Clone)]
pub enum BaseDocument {
    /// Built-in document; receives the rendered head config.
    Default(Template),
    /// Site-supplied document; owns its head, so templates may not declare one.
    Custom(Template),
}

impl BaseDocument {
    fn template(&self) -> &Template {
        match self {
            Self::Default(t) | Self::Custom(t) => t,
        }
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

/// Assembles final HTML documents.
#[derive(Debug, Clone)]
pub struct PageAssembler {
    manifest: Arc<Manifest>,
    mode: RenderMode,
    base: BaseDocument,
}

impl PageAssembler {
    /// Create an assembler using the built-in base document.
    #[must_use]
    pub fn new(manifest: Arc<Manifest>, mode: RenderMode) -> Self {
        Self {
            manifest,
            mode,
            base: BaseDocument::Default(Template::default_base_document()),
        }
    }

    /// Use a site-supplied base document instead of the built-in one.
    #[must_use]
    pub fn with_custom_base_document(mut self, source: impl Into<String>) -> Self {
        self.base = BaseDocument::Custom(Template::new("custom", source));
        self
    }

    #[must_use]
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn base_document(&self) -> &BaseDocument {
        &self.base
    }

    /// Reject a template-level head config when the site owns the head.
    pub fn check_head_customization(&self, descriptor: &TemplateDescriptor) -> Result<()> {
        if self.base.is_custom() && descriptor.has_head_config() {
            return Err(HtmlError::ConflictingHeadCustomization {
                path: descriptor.path().to_string(),
            });
        }
        Ok(())
    }

    /// Wrap `body` in the base document.
    ///
    /// The result still contains [`RELATIVE_PREFIX_TOKEN`]; see
    /// [`substitute_relative_prefix`].
    pub fn assemble(
        &self,
        descriptor: &TemplateDescriptor,
        props: &TemplateRenderProps,
        head: Option<&HeadConfig>,
        body: &str,
    ) -> Result<String> {
        self.check_head_customization(descriptor)?;

        let lang = get_lang(head, Some(&props.document));
        let ctx = TemplateContext::new()
            .with_var("lang", lang)
            .with_var("content", body);
        // Find the head in the raw document; page content may contain `<head>` text.
        let template = self.base.template();
        let Some(at) = head_open_end(template.content()) else {
            return Err(HtmlError::HeadTagMissing {
                document: template.name().to_string(),
            });
        };
        let (before, after) = template.content().split_at(at);
        let before = Template::new(template.name(), before).render(&ctx)?;
        let after = Template::new(template.name(), after).render(&ctx)?;

        let mut injection = Vec::new();
        if !self.base.is_custom() {
            injection.push(render_head_config(head.unwrap_or(&HeadConfig::default())));
        }
        let stylesheets = self.stylesheet_tags(descriptor);
        if !stylesheets.is_empty() {
            injection.push(stylesheets);
        }
        if let Some(script) = self.hydration_script(descriptor, props)? {
            injection.push(script);
        }

        debug!(
            template = %descriptor.name(),
            path = %props.path,
            "assembled page"
        );
        Ok(format!("{before}\n{}{after}", injection.join("\n")))
    }

    /// `<link rel="stylesheet">` tags for the template's transitive CSS.
    ///
    /// Empty in development, where the dev server injects styles itself.
    #[must_use]
    pub fn stylesheet_tags(&self, descriptor: &TemplateDescriptor) -> String {
        if !self.mode.is_production() {
            return String::new();
        }

        let root = &self.manifest.project_filepaths.templates_root;
        let Some((chunk, _)) = self.manifest.chunk_for(root, descriptor.template_name()) else {
            debug!(template = %descriptor.template_name(), "no manifest chunk for template");
            return String::new();
        };

        walk_asset_graph(chunk, &self.manifest.bundler_manifest)
            .iter()
            .map(|file| {
                format!(
                    r#"<link rel="stylesheet" href="{RELATIVE_PREFIX_TOKEN}{}">"#,
                    escape_attr(file)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Module script that hydrates the page on the client, if enabled.
    pub fn hydration_script(
        &self,
        descriptor: &TemplateDescriptor,
        props: &TemplateRenderProps,
    ) -> Result<Option<String>> {
        if !descriptor.config().hydrate {
            return Ok(None);
        }

        let Some((client, component)) = self.hydration_urls(descriptor) else {
            return Ok(None);
        };
        let page_props = serialize_props(props)?;

        Ok(Some(format!(
            r#"<script type="module">
    import {{default as Component}} from "{component}";
    import {{render}} from "{client}";
    render({{ Page: Component, pageProps: {page_props} }});
</script>"#
        )))
    }

    fn hydration_urls(&self, descriptor: &TemplateDescriptor) -> Option<(String, String)> {
        let paths = &self.manifest.project_filepaths;

        if !self.mode.is_production() {
            return Some((
                root_absolute(&paths.client_render_template),
                root_absolute(descriptor.path()),
            ));
        }

        let Some(client) = self.manifest.client_render_entry() else {
            warn!(
                entry = %paths.client_render_template,
                "client render entry missing from manifest, skipping hydration"
            );
            return None;
        };
        let Some((_, component)) = self
            .manifest
            .chunk_for(&paths.hydration_templates_root, descriptor.template_name())
        else {
            warn!(
                template = %descriptor.template_name(),
                "hydration entry missing from manifest, skipping hydration"
            );
            return None;
        };

        Some((
            format!("{RELATIVE_PREFIX_TOKEN}{}", client.file),
            format!("{RELATIVE_PREFIX_TOKEN}{}", component.file),
        ))
    }
}

fn root_absolute(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Serialize props for embedding in a script; `<` is escaped so the payload
/// cannot close the surrounding element.
fn serialize_props(props: &TemplateRenderProps) -> Result<String> {
    Ok(serde_json::to_string(props)?.replace('<', "\\u003c"))
}

/// Insert `injection` right after the opening `<head>` tag.
pub fn inject_into_head(html: &str, injection: &str, document: &str) -> Result<String> {
    let Some(at) = head_open_end(html) else {
        return Err(HtmlError::HeadTagMissing {
            document: document.to_string(),
        });
    };

    let mut out = String::with_capacity(html.len() + injection.len() + 1);
    out.push_str(&html[..at]);
    out.push('\n');
    out.push_str(injection);
    out.push_str(&html[at..]);
    Ok(out)
}

/// Byte offset just past the `>` of the first `<head>` or `<head ...>` tag.
fn head_open_end(html: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(i) = html[from..].find("<head") {
        let start = from + i + "<head".len();
        let rest = &html[start..];
        match rest.chars().next() {
            Some('>') => return Some(start + 1),
            Some(c) if c.is_ascii_whitespace() => return rest.find('>').map(|j| start + j + 1),
            _ => from = start,
        }
    }
    None
}

/// Relative path from an output path back to the site root.
///
/// `index.html` gives `./`, `stores/madrid/index.html` gives `../../`.
/// A trailing slash names a directory, so `/stores/madrid/` is also two deep.
#[must_use]
pub fn relative_prefix_to_root(path: &str) -> String {
    let depth = path
        .trim_start_matches('/')
        .split('/')
        .count()
        .saturating_sub(1);
    if depth == 0 {
        "./".to_string()
    } else {
        "../".repeat(depth)
    }
}

/// Replace every [`RELATIVE_PREFIX_TOKEN`] with the prefix for `request_path`.
#[must_use]
pub fn substitute_relative_prefix(html: &str, request_path: &str) -> String {
    html.replace(RELATIVE_PREFIX_TOKEN, &relative_prefix_to_root(request_path))
}
