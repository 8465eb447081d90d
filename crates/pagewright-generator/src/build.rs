//! Build orchestration.
//!
//! Renders every page a set of templates produces and writes the results to
//! the output directory.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use indexmap::IndexMap;
use pagewright_core::{CoreError, Manifest, SiteConfig, TemplateType};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    data::JsonDocumentStore,
    html::PageAssembler,
    render::{PageRenderer, RenderError, RenderedPage},
    resolver::{DescriptorCache, ModuleLoader, RouteResolver},
};

/// Name of the redirects file written next to the pages.
pub const REDIRECTS_FILE: &str = "_redirects";

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration, manifest or template error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Page render error.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Two pages would be written to the same file.
    #[error("output path {path:?} is produced by both {first} and {second}")]
    DuplicateOutputPath {
        path: String,
        first: String,
        second: String,
    },
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Build statistics.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Number of pages generated.
    pub pages: usize,

    /// Number of redirect rules written.
    pub redirects: usize,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// Site builder that renders and writes every page.
#[derive(Debug)]
pub struct Builder<L> {
    renderer: PageRenderer<L>,
    output_dir: PathBuf,
}

impl<L: ModuleLoader> Builder<L> {
    /// Create a new builder.
    #[must_use]
    pub fn new(renderer: PageRenderer<L>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            renderer,
            output_dir: output_dir.into(),
        }
    }

    /// Wire a builder from site configuration.
    ///
    /// Paths in `config` are resolved against `root`. A missing manifest is
    /// tolerated so sites without client assets still build.
    pub fn from_config(config: &SiteConfig, root: &Path, loader: L) -> Result<Self> {
        let mode = config.build.mode;

        let manifest_path = root.join(&config.build.manifest_path);
        let manifest = if manifest_path.exists() {
            Manifest::load(&manifest_path)?
        } else {
            warn!(path = %manifest_path.display(), "manifest not found, building without assets");
            Manifest::default()
        };

        let documents = JsonDocumentStore::load(&root.join(&config.build.documents_dir))?;

        let mut assembler = PageAssembler::new(Arc::new(manifest), mode);
        if let Some(base) = config.read_base_document(root)? {
            assembler = assembler.with_custom_base_document(base);
        }

        let resolver = RouteResolver::new(loader, DescriptorCache::new())
            .with_mode(mode)
            .with_strip_fingerprint(mode.is_production());
        let renderer = PageRenderer::new(resolver, Arc::new(documents), assembler)
            .with_default_locale(config.site.default_locale.clone());

        Ok(Self::new(renderer, root.join(&config.build.output_dir)))
    }

    #[must_use]
    pub fn renderer(&self) -> &PageRenderer<L> {
        &self.renderer
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Execute the full build for `candidates`.
    pub async fn build(&self, candidates: &[String]) -> Result<BuildStats> {
        let start = Instant::now();
        let mut stats = BuildStats::default();

        info!(
            output = %self.output_dir.display(),
            templates = candidates.len(),
            "starting build"
        );

        // 1. Clean output directory
        self.clean_output()?;

        // 2. Render every page
        let pages = self.render_pages(candidates).await?;

        // 3. Write pages
        stats.pages = self.write_pages(&pages)?;

        // 4. Write redirects
        stats.redirects = self.write_redirects(&pages)?;

        stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            pages = stats.pages,
            redirects = stats.redirects,
            duration_ms = stats.duration_ms,
            "build complete"
        );

        Ok(stats)
    }

    /// Clean the output directory.
    fn clean_output(&self) -> Result<()> {
        if self.output_dir.exists() {
            debug!(dir = %self.output_dir.display(), "cleaning output directory");
            fs::remove_dir_all(&self.output_dir)?;
        }
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Render all pages, keyed by output path. The value records the template
    /// that produced the page.
    async fn render_pages(
        &self,
        candidates: &[String],
    ) -> Result<IndexMap<String, (String, RenderedPage)>> {
        let mut pages: IndexMap<String, (String, RenderedPage)> = IndexMap::new();
        let locale = self.renderer.default_locale();

        for candidate in candidates {
            let descriptor = self.renderer.resolver().descriptor(candidate).await?;

            let documents = match descriptor.template_type() {
                TemplateType::Entity => {
                    let documents = self.renderer.provider().list(descriptor.name()).await?;
                    if documents.is_empty() {
                        info!(template = %descriptor.name(), "no documents for entity template");
                    }
                    documents
                }
                TemplateType::Static => {
                    vec![self.renderer.load_document(&descriptor, None, locale).await?]
                }
            };

            for document in documents {
                let page = self.renderer.render(&descriptor, document).await?;
                if let Some((first, _)) = pages.get(&page.path) {
                    return Err(BuildError::DuplicateOutputPath {
                        path: page.path,
                        first: first.clone(),
                        second: descriptor.path().to_string(),
                    });
                }
                pages.insert(page.path.clone(), (descriptor.path().to_string(), page));
            }
        }

        Ok(pages)
    }

    /// Write pages in parallel.
    fn write_pages(&self, pages: &IndexMap<String, (String, RenderedPage)>) -> Result<usize> {
        info!(count = pages.len(), "writing pages");

        let output_dir = &self.output_dir;
        let pages: Vec<&RenderedPage> = pages.values().map(|(_, page)| page).collect();
        pages.par_iter().try_for_each(|page| {
            let output_path = output_dir.join(&page.path);
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&output_path, &page.content)?;

            debug!(path = %output_path.display(), "wrote page");
            Ok::<_, std::io::Error>(())
        })?;

        Ok(pages.len())
    }

    /// Write one `source /target 301` line per redirect.
    fn write_redirects(&self, pages: &IndexMap<String, (String, RenderedPage)>) -> Result<usize> {
        let rules: Vec<String> = pages
            .values()
            .flat_map(|(_, page)| {
                page.redirects.iter().map(move |source| {
                    format!("/{} /{} 301", source.trim_start_matches('/'), page.path)
                })
            })
            .collect();

        let output_path = self.output_dir.join(REDIRECTS_FILE);
        let mut content = rules.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&output_path, content)?;

        info!(path = %output_path.display(), count = rules.len(), "generated redirects");
        Ok(rules.len())
    }
}
