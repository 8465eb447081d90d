//! Template modules and their validated descriptors.

use std::{fmt, future::Future, pin::Pin, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{config::RenderMode, document::Document, head::HeadConfig};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Source path a redirect points from.
pub type RedirectSource = String;

pub type GetPathFn = Arc<dyn Fn(&TemplateProps) -> String + Send + Sync>;

pub type HeadConfigFn = Arc<dyn Fn(&TemplateRenderProps) -> HeadConfig + Send + Sync>;

pub type RedirectsFn = Arc<dyn Fn(&TemplateRenderProps) -> Vec<RedirectSource> + Send + Sync>;

pub type TransformPropsFn =
    Arc<dyn Fn(TemplateProps) -> BoxFuture<Result<TemplateProps, BoxError>> + Send + Sync>;

/// Produces markup: a full document for `render`, page body for `default`.
pub type RenderFn = Arc<dyn Fn(&TemplateRenderProps) -> String + Send + Sync>;

/// Props handed to `getPath` and `transformProps`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateProps {
    pub document: Document,
    #[serde(rename = "__meta")]
    pub meta: PropsMeta,
}

/// Render metadata visible to templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PropsMeta {
    pub mode: RenderMode,
}

impl TemplateProps {
    #[must_use]
    pub fn new(document: Document, mode: RenderMode) -> Self {
        Self {
            document,
            meta: PropsMeta { mode },
        }
    }

    /// Attach the computed path, producing the props used for rendering.
    #[must_use]
    pub fn into_render_props(
        self,
        path: impl Into<String>,
        relative_prefix_to_root: impl Into<String>,
    ) -> TemplateRenderProps {
        TemplateRenderProps {
            document: self.document,
            meta: self.meta,
            path: path.into(),
            relative_prefix_to_root: relative_prefix_to_root.into(),
        }
    }
}

/// Props handed to `getHeadConfig`, `getRedirects`, `render` and `default`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRenderProps {
    pub document: Document,
    #[serde(rename = "__meta")]
    pub meta: PropsMeta,
    pub path: String,
    pub relative_prefix_to_root: String,
}

/// Validated template configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    /// Feature name. Defaults to the template file name.
    pub name: String,

    /// Whether the page is hydrated on the client.
    #[serde(default)]
    pub hydrate: bool,

    /// Identifier of an externally defined stream.
    #[serde(default)]
    pub stream_id: Option<String>,

    /// Inline stream definition.
    #[serde(default)]
    pub stream: Option<StreamSpec>,

    /// Document fields holding links to alternate language versions.
    #[serde(default)]
    pub alternate_language_fields: Vec<String>,
}

impl TemplateConfig {
    /// Entity templates are backed by a stream; the rest are static.
    #[must_use]
    pub fn template_type(&self) -> TemplateType {
        if self.stream_id.is_some() || self.stream.is_some() {
            TemplateType::Entity
        } else {
            TemplateType::Static
        }
    }
}

/// Whether a template renders one page per entity or a single static page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateType {
    Entity,
    Static,
}

/// Inline stream definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSpec {
    #[serde(rename = "$id")]
    pub id: String,

    #[serde(default)]
    pub filter: StreamFilter,

    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default)]
    pub localization: StreamLocalization,

    #[serde(default)]
    pub transform: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFilter {
    #[serde(default)]
    pub entity_types: Vec<String>,
    #[serde(default)]
    pub saved_filter_ids: Vec<String>,
    #[serde(default)]
    pub entity_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamLocalization {
    #[serde(default)]
    pub locales: Vec<String>,
    #[serde(default)]
    pub primary: bool,
}

/// A template module as handed over by a module loader.
///
/// Every export is optional here; [`crate::normalize::normalize`] decides
/// whether the combination is usable.
#[derive(Clone, Default)]
pub struct RawModule {
    /// Declared config, untrusted JSON.
    pub config: Option<serde_json::Value>,
    pub get_path: Option<GetPathFn>,
    pub get_head_config: Option<HeadConfigFn>,
    pub get_redirects: Option<RedirectsFn>,
    pub transform_props: Option<TransformPropsFn>,
    pub render: Option<RenderFn>,
    pub default: Option<RenderFn>,
}

impl RawModule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_get_path<F>(mut self, f: F) -> Self
    where
        F: Fn(&TemplateProps) -> String + Send + Sync + 'static,
    {
        self.get_path = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_head_config<F>(mut self, f: F) -> Self
    where
        F: Fn(&TemplateRenderProps) -> HeadConfig + Send + Sync + 'static,
    {
        self.get_head_config = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_redirects<F>(mut self, f: F) -> Self
    where
        F: Fn(&TemplateRenderProps) -> Vec<RedirectSource> + Send + Sync + 'static,
    {
        self.get_redirects = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_transform_props<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(TemplateProps) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TemplateProps, BoxError>> + Send + 'static,
    {
        self.transform_props = Some(Arc::new(
            move |props: TemplateProps| -> BoxFuture<Result<TemplateProps, BoxError>> {
                Box::pin(f(props))
            },
        ));
        self
    }

    #[must_use]
    pub fn with_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&TemplateRenderProps) -> String + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_default<F>(mut self, f: F) -> Self
    where
        F: Fn(&TemplateRenderProps) -> String + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for RawModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawModule")
            .field("config", &self.config)
            .field("get_path", &self.get_path.is_some())
            .field("get_head_config", &self.get_head_config.is_some())
            .field("get_redirects", &self.get_redirects.is_some())
            .field("transform_props", &self.transform_props.is_some())
            .field("render", &self.render.is_some())
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// Which export produces a page's markup.
#[derive(Clone)]
pub enum RenderExport {
    /// `render`: returns the complete document, used verbatim.
    Document(RenderFn),
    /// `default`: returns body markup that is wrapped by the page assembler.
    Component(RenderFn),
}

/// Canonical, validated representation of one template module.
///
/// Built by [`crate::normalize::normalize`] and immutable afterwards.
#[derive(Clone)]
pub struct TemplateDescriptor {
    pub(crate) path: String,
    pub(crate) filename: String,
    pub(crate) template_name: String,
    pub(crate) config: TemplateConfig,
    pub(crate) get_path: GetPathFn,
    pub(crate) get_head_config: Option<HeadConfigFn>,
    pub(crate) get_redirects: Option<RedirectsFn>,
    pub(crate) transform_props: Option<TransformPropsFn>,
    pub(crate) export: RenderExport,
}

impl TemplateDescriptor {
    /// Source or bundle path the module was loaded from.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    #[must_use]
    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Feature name, shorthand for `config().name`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn template_type(&self) -> TemplateType {
        self.config.template_type()
    }

    #[must_use]
    pub fn has_head_config(&self) -> bool {
        self.get_head_config.is_some()
    }

    /// Run `getPath`. The value is not validated here.
    #[must_use]
    pub fn get_path(&self, props: &TemplateProps) -> String {
        (self.get_path)(props)
    }

    #[must_use]
    pub fn head_config(&self, props: &TemplateRenderProps) -> Option<HeadConfig> {
        self.get_head_config.as_ref().map(|f| f(props))
    }

    #[must_use]
    pub fn redirects(&self, props: &TemplateRenderProps) -> Vec<RedirectSource> {
        self.get_redirects
            .as_ref()
            .map(|f| f(props))
            .unwrap_or_default()
    }

    /// Apply `transformProps`, or return the props unchanged.
    pub async fn transform_props(&self, props: TemplateProps) -> Result<TemplateProps, BoxError> {
        match self.transform_props {
            Some(ref f) => f(props).await,
            None => Ok(props),
        }
    }

    #[must_use]
    pub fn export(&self) -> &RenderExport {
        &self.export
    }
}

impl fmt::Debug for TemplateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateDescriptor")
            .field("path", &self.path)
            .field("filename", &self.filename)
            .field("template_name", &self.template_name)
            .field("config", &self.config)
            .field("get_head_config", &self.get_head_config.is_some())
            .field("get_redirects", &self.get_redirects.is_some())
            .field("transform_props", &self.transform_props.is_some())
            .field(
                "export",
                &match self.export {
                    RenderExport::Document(_) => "render",
                    RenderExport::Component(_) => "default",
                },
            )
            .finish()
    }
}
