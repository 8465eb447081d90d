//! Render orchestration.
//!
//! Drives one page from route query to finished HTML:
//! resolve the template, load its document, apply `transformProps`, render,
//! then collect redirects.

use std::{fmt, sync::Arc};

use pagewright_core::{
    CoreError, Document, RenderExport, TemplateDescriptor, TemplateProps, TemplateType,
    template::BoxError, validate_get_path_value,
};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::{
    data::{DocumentProvider, DocumentQuery},
    html::{HtmlError, PageAssembler, relative_prefix_to_root, substitute_relative_prefix},
    resolver::{ModuleLoader, RouteQuery, RouteResolver, SlugMatch},
};

/// Render errors.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No candidate template satisfied the route.
    #[error("no template matches {query}")]
    TemplateNotFound { query: String },

    /// The document provider had nothing for the route.
    #[error("document not found: {query}")]
    DocumentNotFound { query: String },

    /// The template's `transformProps` failed.
    #[error("transformProps failed in template {path}: {source}")]
    TransformFailed {
        path: String,
        #[source]
        source: BoxError,
    },

    /// Template loading or validation error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// HTML assembly error.
    #[error(transparent)]
    Html(#[from] HtmlError),
}

impl RenderError {
    /// Whether the error should surface as a 404 rather than a 500.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TemplateNotFound { .. } | Self::DocumentNotFound { .. }
        )
    }
}

/// Result type for rendering.
pub type Result<T> = std::result::Result<T, RenderError>;

/// A finished page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPage {
    /// Output path relative to the site root.
    pub path: String,
    /// Complete HTML.
    pub content: String,
    /// Source paths that should redirect here.
    pub redirects: Vec<String>,
}

/// Steps of a single render, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Resolving,
    Loading,
    Transforming,
    Rendering,
    Done,
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolving => "resolving",
            Self::Loading => "loading",
            Self::Transforming => "transforming",
            Self::Rendering => "rendering",
            Self::Done => "done",
        })
    }
}

fn failed<T>(state: RenderState, result: Result<T>) -> Result<T> {
    result.inspect_err(|e| warn!(state = %state, error = %e, "render failed"))
}

/// Renders pages from route queries or resolved descriptors.
pub struct PageRenderer<L> {
    resolver: RouteResolver<L>,
    provider: Arc<dyn DocumentProvider>,
    assembler: PageAssembler,
    default_locale: String,
}

impl<L: ModuleLoader> PageRenderer<L> {
    #[must_use]
    pub fn new(
        resolver: RouteResolver<L>,
        provider: Arc<dyn DocumentProvider>,
        assembler: PageAssembler,
    ) -> Self {
        Self {
            resolver,
            provider,
            assembler,
            default_locale: "en".to_string(),
        }
    }

    /// Locale used when a route does not carry one.
    #[must_use]
    pub fn with_default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &RouteResolver<L> {
        &self.resolver
    }

    #[must_use]
    pub fn provider(&self) -> &dyn DocumentProvider {
        self.provider.as_ref()
    }

    #[must_use]
    pub fn assembler(&self) -> &PageAssembler {
        &self.assembler
    }

    #[must_use]
    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Resolve `query` against `candidates`, load its document and render it.
    ///
    /// Asset prefixes are relative to the path the route was requested at:
    /// the slug or static path itself. Feature routes carry no URL and use
    /// the `getPath` output.
    pub async fn render_route(
        &self,
        query: &RouteQuery,
        candidates: &[String],
        locale: Option<&str>,
    ) -> Result<RenderedPage> {
        let request_path = request_path(query);
        self.route(query, candidates, locale, request_path.as_deref()).await
    }

    /// Like [`Self::render_route`], for a page served at `request_path`,
    /// e.g. behind a reverse proxy that mounts the site under a prefix.
    pub async fn render_route_at(
        &self,
        query: &RouteQuery,
        candidates: &[String],
        locale: Option<&str>,
        request_path: &str,
    ) -> Result<RenderedPage> {
        self.route(query, candidates, locale, Some(request_path)).await
    }

    async fn route(
        &self,
        query: &RouteQuery,
        candidates: &[String],
        locale: Option<&str>,
        request_path: Option<&str>,
    ) -> Result<RenderedPage> {
        let locale = locale.unwrap_or(&self.default_locale);
        trace!(state = %RenderState::Resolving, ?query, locale, ?request_path, "render route");

        let (descriptor, document) = match query {
            RouteQuery::Slug(slug) => {
                let found = failed(
                    RenderState::Resolving,
                    self.resolver
                        .by_slug(slug, candidates, self.provider.as_ref())
                        .await
                        .map_err(RenderError::from),
                )?;
                match found {
                    Some(SlugMatch::Document {
                        descriptor,
                        document,
                    }) => (descriptor, document),
                    Some(SlugMatch::StaticPath(descriptor)) => {
                        let document = failed(
                            RenderState::Loading,
                            self.load_document(&descriptor, None, locale).await,
                        )?;
                        (descriptor, document)
                    }
                    None => return Err(not_found(query)),
                }
            }
            RouteQuery::Feature { entity_id, .. } => {
                let descriptor = self.resolve(query, candidates).await?;
                let document = failed(
                    RenderState::Loading,
                    self.load_document(&descriptor, entity_id.as_deref(), locale)
                        .await,
                )?;
                (descriptor, document)
            }
            RouteQuery::StaticPath(_) => {
                let descriptor = self.resolve(query, candidates).await?;
                let document = failed(
                    RenderState::Loading,
                    self.load_document(&descriptor, None, locale).await,
                )?;
                (descriptor, document)
            }
        };

        self.render_at(&descriptor, document, request_path).await
    }

    async fn resolve(
        &self,
        query: &RouteQuery,
        candidates: &[String],
    ) -> Result<Arc<TemplateDescriptor>> {
        let found = failed(
            RenderState::Resolving,
            self.resolver
                .resolve(query, candidates, self.provider.as_ref())
                .await
                .map_err(RenderError::from),
        )?;
        found.ok_or_else(|| not_found(query))
    }

    /// Fetch the document a descriptor renders.
    ///
    /// Static templates fall back to a minimal document when the provider has
    /// none; entity templates require an entity id and a stored document.
    pub async fn load_document(
        &self,
        descriptor: &TemplateDescriptor,
        entity_id: Option<&str>,
        locale: &str,
    ) -> Result<Document> {
        trace!(state = %RenderState::Loading, template = %descriptor.name(), "load document");

        match descriptor.template_type() {
            TemplateType::Entity => {
                let Some(entity_id) = entity_id else {
                    return Err(RenderError::DocumentNotFound {
                        query: format!("feature {} without an entity id", descriptor.name()),
                    });
                };
                let query = DocumentQuery::Entity {
                    feature: descriptor.name().to_string(),
                    entity_id: entity_id.to_string(),
                    locale: locale.to_string(),
                };
                self.provider
                    .get(&query)
                    .await?
                    .ok_or_else(|| RenderError::DocumentNotFound {
                        query: format!("{query:?}"),
                    })
            }
            TemplateType::Static => {
                let query = DocumentQuery::Static {
                    feature: descriptor.name().to_string(),
                    locale: locale.to_string(),
                };
                Ok(self
                    .provider
                    .get(&query)
                    .await?
                    .unwrap_or_else(|| Document::for_static_page(descriptor.name(), locale)))
            }
        }
    }

    /// Render `document` with `descriptor`, as served from its `getPath`
    /// output. This is how the builder writes pages.
    pub async fn render(
        &self,
        descriptor: &TemplateDescriptor,
        document: Document,
    ) -> Result<RenderedPage> {
        self.render_at(descriptor, document, None).await
    }

    async fn render_at(
        &self,
        descriptor: &TemplateDescriptor,
        document: Document,
        request_path: Option<&str>,
    ) -> Result<RenderedPage> {
        let props = TemplateProps::new(document, self.assembler.mode());

        trace!(state = %RenderState::Transforming, template = %descriptor.name(), "transform props");
        let props = failed(
            RenderState::Transforming,
            descriptor
                .transform_props(props)
                .await
                .map_err(|source| RenderError::TransformFailed {
                    path: descriptor.path().to_string(),
                    source,
                }),
        )?;

        trace!(state = %RenderState::Rendering, template = %descriptor.name(), "render");
        let page = failed(
            RenderState::Rendering,
            self.render_props(descriptor, props, request_path),
        )?;

        debug!(
            state = %RenderState::Done,
            template = %descriptor.name(),
            path = %page.path,
            redirects = page.redirects.len(),
            "rendered page"
        );
        Ok(page)
    }

    fn render_props(
        &self,
        descriptor: &TemplateDescriptor,
        props: TemplateProps,
        request_path: Option<&str>,
    ) -> Result<RenderedPage> {
        let path = descriptor.get_path(&props);
        validate_get_path_value(&path, descriptor.path())?;

        let request_path = request_path.unwrap_or(&path);
        let prefix = relative_prefix_to_root(request_path);
        let props = props.into_render_props(path.clone(), prefix);

        let html = match descriptor.export() {
            RenderExport::Document(render) => render(&props),
            RenderExport::Component(component) => {
                self.assembler.check_head_customization(descriptor)?;
                let head = descriptor.head_config(&props);
                let body = component(&props);
                self.assembler
                    .assemble(descriptor, &props, head.as_ref(), &body)?
            }
        };

        let redirects = descriptor.redirects(&props);
        let content = substitute_relative_prefix(&html, request_path);

        Ok(RenderedPage {
            path,
            content,
            redirects,
        })
    }
}

impl<L> fmt::Debug for PageRenderer<L>
where
    L: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRenderer")
            .field("resolver", &self.resolver)
            .field("assembler", &self.assembler)
            .field("default_locale", &self.default_locale)
            .finish_non_exhaustive()
    }
}

/// URL a route was requested at, when the query carries one.
fn request_path(query: &RouteQuery) -> Option<String> {
    match query {
        RouteQuery::Slug(slug) => Some(format!(
            "/{}",
            percent_decode_str(slug)
                .decode_utf8_lossy()
                .trim_start_matches('/')
        )),
        RouteQuery::StaticPath(path) => Some(path.clone()),
        RouteQuery::Feature { .. } => None,
    }
}

fn not_found(query: &RouteQuery) -> RenderError {
    let err = RenderError::TemplateNotFound {
        query: format!("{query:?}"),
    };
    info!(state = %RenderState::Resolving, error = %err, "no matching template");
    err
}
