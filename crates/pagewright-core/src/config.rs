//! Site configuration management.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Main configuration structure for Pagewright.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site-wide settings.
    #[serde(default)]
    pub site: SiteSettings,

    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,
}

/// Site-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSettings {
    /// Locale used when neither the head config nor the document declares one.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Optional custom base document wrapping every page.
    ///
    /// When set, templates may not declare `getHeadConfig`.
    #[serde(default)]
    pub base_document: Option<PathBuf>,
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Output directory for generated pages.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Path to the build manifest produced by the bundler.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Directory holding JSON documents.
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,

    /// Render mode.
    #[serde(default)]
    pub mode: RenderMode,
}

/// Whether pages are rendered for the dev server or for a production build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Dev server: source paths, no stylesheet links.
    Development,
    /// Production build: compiled assets from the manifest.
    #[default]
    Production,
}

impl RenderMode {
    /// Whether this is a production render.
    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_output_dir() -> String {
    "sites-rendered".to_string()
}

fn default_manifest_path() -> String {
    ".temp/manifest.json".to_string()
}

fn default_documents_dir() -> String {
    "localData".to_string()
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            base_document: None,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            manifest_path: default_manifest_path(),
            documents_dir: default_documents_dir(),
            mode: RenderMode::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: SiteConfig = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `PAGEWRIGHT__SECTION__KEY` environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("PAGEWRIGHT").separator("__"))
            .build()?;

        let config: SiteConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.site.default_locale.trim().is_empty() {
            return Err(CoreError::config("site.default_locale cannot be empty"));
        }

        if self.build.output_dir.trim().is_empty() {
            return Err(CoreError::config("build.output_dir cannot be empty"));
        }

        if let Some(ref doc) = self.site.base_document {
            if !doc.exists() {
                tracing::warn!(path = %doc.display(), "site.base_document does not exist yet");
            }
        }

        Ok(())
    }

    /// Read the custom base document, if one is configured.
    ///
    /// Relative paths are resolved against `root`.
    pub fn read_base_document(&self, root: &Path) -> Result<Option<String>> {
        match self.site.base_document {
            Some(ref path) => Ok(Some(std::fs::read_to_string(root.join(path))?)),
            None => Ok(None),
        }
    }
}
