//! Template loading and validation.
//!
//! Each template kind is parsed into its typed builder template when first
//! read and re-parsed only when the file changes. A template that fails
//! validation is never cached.

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use crate::builders::TemplateError;
use crate::builders::rule_engine::PROXY_NAMES_MARKER;
use crate::builders::{JsonTemplate, RuleTemplate, UriTemplate};
use crate::storage::CacheSet;

/// Locations of the template files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePaths {
    pub rule_engine: PathBuf,
    pub uri: PathBuf,
    pub json: PathBuf,
    /// Directory holding per-user rule-engine templates.
    pub custom_dir: PathBuf,
}

/// Record of a custom template that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateFallback {
    pub requested: String,
    pub reason: String,
}

/// Cached, validated access to all templates.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    paths: TemplatePaths,
    caches: Arc<CacheSet>,
}

impl TemplateStore {
    pub fn new(paths: TemplatePaths, caches: Arc<CacheSet>) -> Self {
        Self { paths, caches }
    }

    pub fn paths(&self) -> &TemplatePaths {
        &self.paths
    }

    /// The base rule-engine template.
    pub fn rule_engine(&self) -> Result<Arc<RuleTemplate>, TemplateError> {
        self.load_rule_engine(&self.paths.rule_engine)
    }

    pub fn uri(&self) -> Result<Arc<UriTemplate>, TemplateError> {
        self.caches.uri_templates.get(&self.paths.uri, UriTemplate::parse)
    }

    pub fn json(&self) -> Result<Arc<JsonTemplate>, TemplateError> {
        self.caches.json_templates.get(&self.paths.json, JsonTemplate::parse)
    }

    /// A custom rule-engine template by bare file name.
    pub fn custom_rule_engine(&self, name: &str) -> Result<Arc<RuleTemplate>, TemplateError> {
        let path = self.custom_path(name)?;
        self.load_rule_engine(&path)
    }

    /// The template a user should get: their custom one if it loads and
    /// validates, else the base template plus a fallback record.
    pub fn rule_engine_for(
        &self,
        custom: Option<&str>,
    ) -> Result<(Arc<RuleTemplate>, Option<TemplateFallback>), TemplateError> {
        let Some(name) = custom else {
            return Ok((self.rule_engine()?, None));
        };

        match self.custom_rule_engine(name) {
            Ok(template) => Ok((template, None)),
            Err(err) => {
                tracing::warn!(
                    template = %name,
                    error = %err,
                    "Custom template unusable, falling back to the default template"
                );
                let fallback = TemplateFallback {
                    requested: name.to_string(),
                    reason: err.to_string(),
                };
                Ok((self.rule_engine()?, Some(fallback)))
            }
        }
    }

    fn load_rule_engine(&self, path: &Path) -> Result<Arc<RuleTemplate>, TemplateError> {
        // runs once per file change, not per request
        self.caches.rule_templates.get(path, |content| {
            let template = RuleTemplate::parse(content)?;
            if !template.has_names_marker() {
                tracing::warn!(
                    path = %path.display(),
                    marker = PROXY_NAMES_MARKER,
                    "Rule-engine template has no proxy name marker; proxy groups will not list generated proxies"
                );
            }
            Ok(template)
        })
    }

    fn custom_path(&self, name: &str) -> Result<PathBuf, TemplateError> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !plain {
            return Err(TemplateError::Invalid(format!(
                "custom template name '{name}' is not a plain file name"
            )));
        }
        Ok(self.paths.custom_dir.join(name))
    }
}
