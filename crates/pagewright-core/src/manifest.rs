//! Build manifest produced by the bundler.

use std::{collections::HashMap, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// One node of the bundler's asset dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Output file for this chunk.
    pub file: String,

    /// Whether the chunk is an entry point.
    #[serde(default)]
    pub is_entry: bool,

    /// Chunk names this chunk imports.
    #[serde(default)]
    pub imports: Vec<String>,

    /// Stylesheets emitted for this chunk.
    #[serde(default)]
    pub css: Vec<String>,
}

/// Chunk name to entry. May contain cycles and shared imports.
pub type BundlerManifest = IndexMap<String, ManifestEntry>;

/// Project layout the bundler was run with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFilepaths {
    /// Directory holding template sources.
    #[serde(default = "default_templates_root")]
    pub templates_root: String,

    /// Client render entry that hydrates pages.
    #[serde(default = "default_client_render_template")]
    pub client_render_template: String,

    /// Directory holding the generated per-template hydration entries.
    #[serde(default = "default_hydration_templates_root")]
    pub hydration_templates_root: String,
}

fn default_templates_root() -> String {
    "src/templates".to_string()
}

fn default_client_render_template() -> String {
    "src/templates/_client.tsx".to_string()
}

fn default_hydration_templates_root() -> String {
    ".temp/hydration_templates".to_string()
}

impl Default for ProjectFilepaths {
    fn default() -> Self {
        Self {
            templates_root: default_templates_root(),
            client_render_template: default_client_render_template(),
            hydration_templates_root: default_hydration_templates_root(),
        }
    }
}

/// Everything the build tool hands over to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Feature name to compiled server bundle.
    #[serde(default)]
    pub bundle_paths: HashMap<String, String>,

    /// Asset dependency graph.
    #[serde(default)]
    pub bundler_manifest: BundlerManifest,

    /// Project layout.
    #[serde(default)]
    pub project_filepaths: ProjectFilepaths,
}

impl Manifest {
    /// Load a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::manifest(path, e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| CoreError::manifest(path, e.to_string()))
    }

    /// Find the chunk under `root` whose file stem is `template_name`.
    ///
    /// `src/templates/location.tsx` is found by `("src/templates", "location")`.
    #[must_use]
    pub fn chunk_for(&self, root: &str, template_name: &str) -> Option<(&str, &ManifestEntry)> {
        let root = root.trim_end_matches('/');
        self.bundler_manifest
            .iter()
            .find(|(key, _)| {
                key.strip_prefix(root)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .is_some_and(|file| {
                        !file.contains('/') && file_stem(file) == template_name
                    })
            })
            .map(|(key, entry)| (key.as_str(), entry))
    }

    /// Entry for the client render template.
    #[must_use]
    pub fn client_render_entry(&self) -> Option<&ManifestEntry> {
        self.bundler_manifest
            .get(&self.project_filepaths.client_render_template)
    }
}

fn file_stem(file: &str) -> &str {
    file.rsplit_once('.').map_or(file, |(stem, _)| stem)
}
