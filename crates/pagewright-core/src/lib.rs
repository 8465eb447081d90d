//! Pagewright Core Library
//!
//! Core types, template normalization, configuration and error handling for
//! the Pagewright page renderer.

pub mod config;
pub mod document;
pub mod error;
pub mod head;
pub mod manifest;
pub mod normalize;
pub mod template;

pub use config::{RenderMode, SiteConfig};
pub use document::Document;
pub use error::{CoreError, Result};
pub use head::{HeadConfig, Tag, TagType};
pub use manifest::{BundlerManifest, Manifest, ManifestEntry, ProjectFilepaths};
pub use normalize::{normalize, split_filename, validate_get_path_value};
pub use template::{
    RawModule, RenderExport, TemplateConfig, TemplateDescriptor, TemplateProps,
    TemplateRenderProps, TemplateType,
};
