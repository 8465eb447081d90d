//! Pagewright Generator Library
//!
//! Template resolution and page rendering for Pagewright.
//!
//! # Modules
//!
//! - [`resolver`] - Route resolution over candidate templates, with a shared descriptor cache
//! - [`data`] - Document providers and the JSON document store
//! - [`assets`] - Transitive stylesheet discovery over the bundler manifest
//! - [`head`] - Head config rendering and page language resolution
//! - [`template`] - Base document interpolation
//! - [`html`] - Page assembly, hydration and relative asset paths
//! - [`render`] - Render orchestration from route to finished page
//! - [`build`] - Build orchestration

pub mod assets;
pub mod build;
pub mod data;
pub mod head;
pub mod html;
pub mod render;
pub mod resolver;
pub mod template;

pub use assets::walk_asset_graph;
pub use build::{BuildError, BuildStats, Builder};
pub use data::{DocumentProvider, DocumentQuery, JsonDocumentStore};
pub use head::{get_lang, render_head_config};
pub use html::{
    HtmlError, PageAssembler, RELATIVE_PREFIX_TOKEN, relative_prefix_to_root,
    substitute_relative_prefix,
};
pub use render::{PageRenderer, RenderError, RenderedPage};
pub use resolver::{
    DescriptorCache, ModuleLoader, ModuleRegistry, RouteQuery, RouteResolver, SlugMatch,
};
pub use template::{Template, TemplateContext};
