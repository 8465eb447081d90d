//! Route resolution.
//!
//! A route is resolved by walking an ordered list of candidate template paths,
//! loading and normalizing each one, and returning the first descriptor that
//! satisfies the query. Normalized descriptors are memoized in a
//! [`DescriptorCache`] that callers own and may share between resolvers.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use pagewright_core::{
    CoreError, Document, RawModule, RenderMode, Result, TemplateDescriptor, TemplateProps,
    TemplateType, normalize, validate_get_path_value,
};
use percent_encoding::percent_decode_str;
use tracing::{debug, trace};

use crate::data::{DocumentProvider, DocumentQuery};

/// Loads raw template modules by path.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, path: &str) -> Result<RawModule>;
}

/// Builds a fresh module on each load.
pub type ModuleFactory = Arc<dyn Fn() -> RawModule + Send + Sync>;

/// In-process module table keyed by template path.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: IndexMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module factory under `path`, replacing any previous one.
    pub fn register<F>(&mut self, path: impl Into<String>, factory: F)
    where
        F: Fn() -> RawModule + Send + Sync + 'static,
    {
        self.modules.insert(path.into(), Arc::new(factory));
    }

    #[must_use]
    pub fn with_module<F>(mut self, path: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> RawModule + Send + Sync + 'static,
    {
        self.register(path, factory);
        self
    }

    /// Registered paths in registration order, usable as route candidates.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("paths", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl ModuleLoader for ModuleRegistry {
    async fn load(&self, path: &str) -> Result<RawModule> {
        self.modules
            .get(path)
            .map(|factory| factory())
            .ok_or_else(|| CoreError::ModuleNotFound(path.to_string()))
    }
}

/// Path to descriptor memo table.
///
/// Entries are keyed by path and fingerprint stripping, since the setting
/// changes the derived names. Clones share the same entries. Writes are
/// idempotent, so concurrent resolvers may race on the same key.
#[derive(Debug, Clone, Default)]
pub struct DescriptorCache {
    entries: Arc<DashMap<(String, bool), Arc<TemplateDescriptor>>>,
}

impl DescriptorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, path: &str, strip_fingerprint: bool) -> Option<Arc<TemplateDescriptor>> {
        self.entries
            .get(&(path.to_string(), strip_fingerprint))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert(&self, descriptor: Arc<TemplateDescriptor>, strip_fingerprint: bool) {
        self.entries
            .insert((descriptor.path().to_string(), strip_fingerprint), descriptor);
    }

    /// Drop every entry for `path`, e.g. after its source changed.
    pub fn invalidate(&self, path: &str) -> bool {
        let mut removed = false;
        for strip in [false, true] {
            removed |= self.entries.remove(&(path.to_string(), strip)).is_some();
        }
        if removed {
            debug!(path, "invalidated template descriptor");
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// How a route selects its template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteQuery {
    /// By template config name. `entity_id` selects the document to render.
    Feature {
        name: String,
        entity_id: Option<String>,
    },
    /// By the output path of a static template.
    StaticPath(String),
    /// By URL slug, possibly percent-encoded.
    Slug(String),
}

/// Result of a slug lookup.
#[derive(Debug, Clone)]
pub enum SlugMatch {
    /// A document carries the slug; `descriptor` renders its feature.
    Document {
        descriptor: Arc<TemplateDescriptor>,
        document: Document,
    },
    /// No document matched, but a static template produces the path.
    StaticPath(Arc<TemplateDescriptor>),
}

impl SlugMatch {
    #[must_use]
    pub fn descriptor(&self) -> &Arc<TemplateDescriptor> {
        match self {
            Self::Document { descriptor, .. } | Self::StaticPath(descriptor) => descriptor,
        }
    }
}

/// Finds the template for a route.
#[derive(Debug, Clone)]
pub struct RouteResolver<L> {
    loader: L,
    cache: DescriptorCache,
    strip_fingerprint: bool,
    mode: RenderMode,
}

impl<L: ModuleLoader> RouteResolver<L> {
    #[must_use]
    pub fn new(loader: L, cache: DescriptorCache) -> Self {
        Self {
            loader,
            cache,
            strip_fingerprint: false,
            mode: RenderMode::default(),
        }
    }

    /// Strip build fingerprints from loaded paths (`name.HASH.js`).
    #[must_use]
    pub fn with_strip_fingerprint(mut self, strip: bool) -> Self {
        self.strip_fingerprint = strip;
        self
    }

    /// Mode reported to `getPath` during static path matching.
    #[must_use]
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &DescriptorCache {
        &self.cache
    }

    #[must_use]
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Load and normalize `path`, going through the cache.
    pub async fn descriptor(&self, path: &str) -> Result<Arc<TemplateDescriptor>> {
        if let Some(descriptor) = self.cache.get(path, self.strip_fingerprint) {
            trace!(path, "descriptor cache hit");
            return Ok(descriptor);
        }

        let raw = self.loader.load(path).await?;
        let descriptor = Arc::new(normalize(raw, path, self.strip_fingerprint)?);
        self.cache
            .insert(Arc::clone(&descriptor), self.strip_fingerprint);
        Ok(descriptor)
    }

    /// First candidate whose descriptor satisfies `predicate`.
    pub async fn find<P>(
        &self,
        candidates: &[String],
        predicate: P,
    ) -> Result<Option<Arc<TemplateDescriptor>>>
    where
        P: Fn(&TemplateDescriptor) -> bool,
    {
        for path in candidates {
            let descriptor = self.descriptor(path).await?;
            if predicate(&descriptor) {
                return Ok(Some(descriptor));
            }
        }
        Ok(None)
    }

    /// Template whose config name is `name`.
    pub async fn by_feature(
        &self,
        name: &str,
        candidates: &[String],
    ) -> Result<Option<Arc<TemplateDescriptor>>> {
        let found = self.find(candidates, |d| d.name() == name).await?;
        debug!(feature = name, found = found.is_some(), "resolved by feature");
        Ok(found)
    }

    /// Static template whose `getPath` output is `path`.
    ///
    /// Every candidate is checked; two templates producing the same path is an
    /// error rather than a first-match win.
    pub async fn by_static_path(
        &self,
        path: &str,
        candidates: &[String],
    ) -> Result<Option<Arc<TemplateDescriptor>>> {
        let wanted = path.trim_start_matches('/');
        let mut found: Option<Arc<TemplateDescriptor>> = None;

        for candidate in candidates {
            let descriptor = self.descriptor(candidate).await?;
            if descriptor.template_type() != TemplateType::Static {
                continue;
            }

            let static_path = self.static_path(&descriptor)?;
            if static_path != wanted {
                continue;
            }

            if let Some(ref first) = found {
                return Err(CoreError::DuplicateStaticPath {
                    static_path,
                    first: first.path().to_string(),
                    second: descriptor.path().to_string(),
                });
            }
            found = Some(descriptor);
        }

        debug!(path = wanted, found = found.is_some(), "resolved by static path");
        Ok(found)
    }

    /// Output path of a static template, evaluated against an empty document.
    pub fn static_path(&self, descriptor: &TemplateDescriptor) -> Result<String> {
        let props = TemplateProps::new(Document::empty(), self.mode);
        let path = descriptor.get_path(&props);
        validate_get_path_value(&path, descriptor.path())?;
        Ok(path)
    }

    /// Resolve a slug: a document with that slug first, then a static page.
    pub async fn by_slug(
        &self,
        slug: &str,
        candidates: &[String],
        provider: &dyn DocumentProvider,
    ) -> Result<Option<SlugMatch>> {
        let decoded = percent_decode_str(slug).decode_utf8_lossy();
        let decoded = decoded.trim_start_matches('/');

        let query = DocumentQuery::Slug {
            slug: decoded.to_string(),
        };
        if let Some(document) = provider.get(&query).await? {
            match document.feature() {
                Some(feature) => {
                    if let Some(descriptor) = self.by_feature(feature, candidates).await? {
                        debug!(slug = decoded, feature, "resolved slug to document");
                        return Ok(Some(SlugMatch::Document {
                            descriptor,
                            document,
                        }));
                    }
                }
                None => debug!(slug = decoded, "slug document has no feature name"),
            }
        }

        Ok(self
            .by_static_path(decoded, candidates)
            .await?
            .map(SlugMatch::StaticPath))
    }

    /// Dispatch on the query shape. `Ok(None)` means no template matched.
    pub async fn resolve(
        &self,
        query: &RouteQuery,
        candidates: &[String],
        provider: &dyn DocumentProvider,
    ) -> Result<Option<Arc<TemplateDescriptor>>> {
        match query {
            RouteQuery::Feature { name, .. } => self.by_feature(name, candidates).await,
            RouteQuery::StaticPath(path) => self.by_static_path(path, candidates).await,
            RouteQuery::Slug(slug) => Ok(self
                .by_slug(slug, candidates, provider)
                .await?
                .map(|m| Arc::clone(m.descriptor()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::data::JsonDocumentStore;

    fn static_module(name: &str, path: &'static str) -> RawModule {
        RawModule::new()
            .with_config(json!({ "name": name }))
            .with_get_path(move |_| path.to_string())
            .with_default(|_| String::new())
    }

    fn entity_module(name: &str) -> RawModule {
        RawModule::new()
            .with_config(json!({ "name": name, "streamId": "locations" }))
            .with_get_path(|props| {
                props
                    .document
                    .slug()
                    .unwrap_or("unknown")
                    .to_string()
            })
            .with_default(|_| String::new())
    }

    fn registry() -> ModuleRegistry {
        ModuleRegistry::new()
            .with_module("src/templates/location.tsx", || entity_module("location"))
            .with_module("src/templates/about.tsx", || static_module("about", "about.html"))
            .with_module("src/templates/index.tsx", || static_module("index", "index.html"))
    }

    fn resolver(registry: ModuleRegistry) -> (RouteResolver<ModuleRegistry>, Vec<String>) {
        let candidates = registry.paths();
        (RouteResolver::new(registry, DescriptorCache::new()), candidates)
    }

    #[tokio::test]
    async fn test_by_feature() {
        let (resolver, candidates) = resolver(registry());
        let found = resolver
            .by_feature("about", &candidates)
            .await
            .unwrap()
            .expect("descriptor");
        assert_eq!(found.path(), "src/templates/about.tsx");

        assert!(
            resolver
                .by_feature("missing", &candidates)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_by_static_path_skips_entity_templates() {
        let (resolver, candidates) = resolver(registry());
        let found = resolver
            .by_static_path("/index.html", &candidates)
            .await
            .unwrap()
            .expect("descriptor");
        assert_eq!(found.name(), "index");

        // The entity template's getPath yields "unknown" on an empty document.
        assert!(
            resolver
                .by_static_path("unknown", &candidates)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_duplicate_static_path_is_reported() {
        let registry = registry().with_module("src/templates/home.tsx", || {
            static_module("home", "index.html")
        });
        let (resolver, candidates) = resolver(registry);

        let err = resolver
            .by_static_path("index.html", &candidates)
            .await
            .unwrap_err();
        match err {
            CoreError::DuplicateStaticPath {
                static_path,
                first,
                second,
            } => {
                assert_eq!(static_path, "index.html");
                assert_eq!(first, "src/templates/index.tsx");
                assert_eq!(second, "src/templates/home.tsx");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_static_path_value() {
        let registry = ModuleRegistry::new()
            .with_module("src/templates/bad.tsx", || static_module("bad", "../escape.html"));
        let (resolver, candidates) = resolver(registry);

        let err = resolver
            .by_static_path("escape.html", &candidates)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidGetPathValue { .. }));
        assert_eq!(err.template_path(), Some("src/templates/bad.tsx"));
    }

    #[tokio::test]
    async fn test_normalization_error_propagates() {
        let registry = ModuleRegistry::new().with_module("src/templates/broken.tsx", || {
            RawModule::new().with_default(|_| String::new())
        });
        let (resolver, candidates) = resolver(registry);

        let err = resolver.by_feature("broken", &candidates).await.unwrap_err();
        assert!(matches!(err, CoreError::MissingGetPath { .. }));
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_module() {
        let (resolver, _) = resolver(registry());
        let err = resolver
            .by_feature("x", &["src/templates/nope.tsx".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ModuleNotFound(ref p) if p == "src/templates/nope.tsx"));
    }

    #[tokio::test]
    async fn test_cache_reuses_and_invalidates() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let registry = ModuleRegistry::new().with_module("src/templates/about.tsx", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            static_module("about", "about.html")
        });
        let (resolver, _) = resolver(registry);

        let first = resolver.descriptor("src/templates/about.tsx").await.unwrap();
        let second = resolver.descriptor("src/templates/about.tsx").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        assert!(resolver.cache().invalidate("src/templates/about.tsx"));
        let third = resolver.descriptor("src/templates/about.tsx").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        resolver.cache().clear();
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_shared_cache() {
        let cache = DescriptorCache::new();
        let a = RouteResolver::new(registry(), cache.clone());
        let b = RouteResolver::new(registry(), cache.clone());

        let first = a.descriptor("src/templates/about.tsx").await.unwrap();
        let second = b.descriptor("src/templates/about.tsx").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_shared_cache_separates_fingerprint_settings() {
        let bundle = "assets/server/location.a1b2.js";
        let registry = || {
            ModuleRegistry::new().with_module(bundle, || {
                RawModule::new()
                    .with_get_path(|_| "index.html".to_string())
                    .with_default(|_| String::new())
            })
        };
        let cache = DescriptorCache::new();
        let stripped = RouteResolver::new(registry(), cache.clone()).with_strip_fingerprint(true);
        let raw = RouteResolver::new(registry(), cache.clone());

        let first = stripped.descriptor(bundle).await.unwrap();
        let second = raw.descriptor(bundle).await.unwrap();
        assert_eq!(first.template_name(), "location");
        assert_eq!(second.template_name(), "location.a1b2");
        assert_eq!(cache.len(), 2);

        let again = stripped.descriptor(bundle).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        assert!(cache.invalidate(bundle));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_by_slug_prefers_document() {
        let registry = registry().with_module("src/templates/shadow.tsx", || {
            static_module("shadow", "stores/madrid")
        });
        let (resolver, candidates) = resolver(registry);
        let store = JsonDocumentStore::new(vec![Document::new(json!({
            "id": "1", "slug": "stores/madrid", "__": { "name": "location" }
        }))]);

        let found = resolver
            .by_slug("stores/madrid", &candidates, &store)
            .await
            .unwrap()
            .expect("match");
        match found {
            SlugMatch::Document {
                descriptor,
                document,
            } => {
                assert_eq!(descriptor.name(), "location");
                assert_eq!(document.id(), Some("1"));
            }
            SlugMatch::StaticPath(_) => panic!("static path won over slug"),
        }
    }

    #[tokio::test]
    async fn test_by_slug_decodes_and_falls_back() {
        let (resolver, candidates) = resolver(registry());
        let store = JsonDocumentStore::new(vec![Document::new(json!({
            "slug": "café", "__": { "name": "location" }
        }))]);

        let found = resolver
            .by_slug("caf%C3%A9", &candidates, &store)
            .await
            .unwrap()
            .expect("match");
        assert!(matches!(found, SlugMatch::Document { .. }));

        let fallback = resolver
            .by_slug("%2Fabout.html", &candidates, &store)
            .await
            .unwrap()
            .expect("match");
        assert!(matches!(fallback, SlugMatch::StaticPath(ref d) if d.name() == "about"));

        assert!(
            resolver
                .by_slug("nothing", &candidates, &store)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_resolve_dispatch() {
        let (resolver, candidates) = resolver(registry());
        let store = JsonDocumentStore::default();

        let feature = RouteQuery::Feature {
            name: "location".into(),
            entity_id: Some("1".into()),
        };
        let found = resolver
            .resolve(&feature, &candidates, &store)
            .await
            .unwrap()
            .expect("descriptor");
        assert_eq!(found.template_type(), TemplateType::Entity);

        let by_path = RouteQuery::StaticPath("about.html".into());
        assert!(
            resolver
                .resolve(&by_path, &candidates, &store)
                .await
                .unwrap()
                .is_some()
        );

        let miss = RouteQuery::Slug("missing".into());
        assert!(
            resolver
                .resolve(&miss, &candidates, &store)
                .await
                .unwrap()
                .is_none()
        );
    }
}
