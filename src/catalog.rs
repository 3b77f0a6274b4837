//! Model descriptors and sampling settings
//!
//! The orchestrator only ever asks two questions of the surrounding
//! application: "which model is the default?" and "how should it sample?".
//! Both are traits so the application can answer from its own model list;
//! [`ConfiguredCatalog`] and [`ConfiguredSampling`] answer from
//! [`ServiceConfig`](crate::config::ServiceConfig).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::{ModelsConfig, SamplingConfig};

/// Everything the pipeline needs to know about one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Stable identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Weights file (local) or API model file (remote), relative to `dir_path`
    pub filename: String,
    /// Directory containing `filename`
    #[serde(default)]
    pub dir_path: PathBuf,
    /// Remote API model
    #[serde(default)]
    pub is_online: bool,
    /// Remote API model with a user-supplied OpenAI-compatible base URL
    #[serde(default)]
    pub is_compatible_api: bool,
    /// Built-in completions URL for well-known remote providers
    #[serde(default)]
    pub url: String,
}

impl ModelDescriptor {
    /// `<dir_path>/<filename>`
    pub fn file_path(&self) -> PathBuf {
        self.dir_path.join(&self.filename)
    }

    /// Name for log lines; falls back to the id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Source of the active model configuration
pub trait ModelCatalog: Send + Sync {
    /// The model new work should run against, if any
    fn default_model(&self) -> Option<ModelDescriptor>;
}

/// Per-model decoding parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub top_k: i32,
    pub top_p: f64,
    pub min_p: f64,
    pub temperature: f64,
    pub prompt_batch_size: i32,
    pub repeat_penalty: f64,
    pub repeat_penalty_tokens: i32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            top_k: 40,
            top_p: 0.9,
            min_p: 0.0,
            temperature: 0.7,
            prompt_batch_size: 128,
            repeat_penalty: 1.18,
            repeat_penalty_tokens: 64,
        }
    }
}

/// Lookup of sampling parameters for a model
pub trait SamplingSettings: Send + Sync {
    fn sampling_for(&self, model: &ModelDescriptor) -> SamplingParams;
}

/// Catalog backed by the `[models]` configuration section
#[derive(Debug, Clone, Default)]
pub struct ConfiguredCatalog {
    default: Option<String>,
    entries: Vec<ModelDescriptor>,
}

impl ConfiguredCatalog {
    pub fn new(default: Option<String>, entries: Vec<ModelDescriptor>) -> Self {
        Self { default, entries }
    }

    /// Entries with an empty `dir_path` inherit `models.dir`.
    pub fn from_config(config: &ModelsConfig) -> Self {
        let entries = config
            .entries
            .iter()
            .cloned()
            .map(|mut entry| {
                if entry.dir_path.as_os_str().is_empty() {
                    entry.dir_path = config.dir.clone();
                }
                entry
            })
            .collect();
        Self::new(config.default.clone(), entries)
    }

    pub fn entries(&self) -> &[ModelDescriptor] {
        &self.entries
    }
}

impl ModelCatalog for ConfiguredCatalog {
    fn default_model(&self) -> Option<ModelDescriptor> {
        let wanted = self.default.as_deref()?;
        self.entries
            .iter()
            .find(|m| m.id == wanted || m.name == wanted)
            .filter(|m| !m.filename.is_empty())
            .cloned()
    }
}

/// Sampling settings backed by the `[sampling]` configuration section
#[derive(Debug, Clone, Default)]
pub struct ConfiguredSampling {
    defaults: SamplingParams,
    overrides: HashMap<String, SamplingParams>,
}

impl ConfiguredSampling {
    /// Override keys match model ids or names case-insensitively.
    pub fn new(defaults: SamplingParams, overrides: HashMap<String, SamplingParams>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(key, params)| (key.to_lowercase(), params))
            .collect();
        Self { defaults, overrides }
    }

    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(config.defaults, config.models.clone())
    }
}

impl SamplingSettings for ConfiguredSampling {
    fn sampling_for(&self, model: &ModelDescriptor) -> SamplingParams {
        self.overrides
            .get(&model.id.to_lowercase())
            .or_else(|| self.overrides.get(&model.name.to_lowercase()))
            .copied()
            .unwrap_or(self.defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, filename: &str) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            name: format!("{} name", id),
            filename: filename.to_string(),
            dir_path: PathBuf::new(),
            is_online: false,
            is_compatible_api: false,
            url: String::new(),
        }
    }

    #[test]
    fn test_default_model_by_id_or_name() {
        let catalog = ConfiguredCatalog::new(
            Some("orca".into()),
            vec![descriptor("llama", "llama.gguf"), descriptor("orca", "orca.gguf")],
        );
        assert_eq!(catalog.default_model().unwrap().filename, "orca.gguf");

        let catalog = ConfiguredCatalog::new(
            Some("llama name".into()),
            vec![descriptor("llama", "llama.gguf")],
        );
        assert_eq!(catalog.default_model().unwrap().id, "llama");
    }

    #[test]
    fn test_default_model_missing_or_without_file() {
        let catalog = ConfiguredCatalog::new(None, vec![descriptor("llama", "llama.gguf")]);
        assert!(catalog.default_model().is_none());

        let catalog = ConfiguredCatalog::new(Some("llama".into()), vec![descriptor("llama", "")]);
        assert!(catalog.default_model().is_none());
    }

    #[test]
    fn test_entries_inherit_models_dir() {
        let explicit = ModelDescriptor {
            dir_path: PathBuf::from("/opt/api"),
            ..descriptor("openai", "openai.rmodel")
        };
        let config = ModelsConfig {
            dir: PathBuf::from("/srv/models"),
            default: Some("llama".into()),
            entries: vec![descriptor("llama", "llama.gguf"), explicit],
        };
        let catalog = ConfiguredCatalog::from_config(&config);
        let dirs: Vec<_> = catalog.entries().iter().map(|m| m.dir_path.clone()).collect();
        assert_eq!(
            dirs,
            vec![PathBuf::from("/srv/models"), PathBuf::from("/opt/api")]
        );
        assert_eq!(
            catalog.default_model().unwrap().file_path(),
            PathBuf::from("/srv/models/llama.gguf")
        );
    }

    #[test]
    fn test_sampling_overrides() {
        let mut overrides = HashMap::new();
        overrides.insert(
            "Orca".to_string(),
            SamplingParams {
                top_k: 5,
                ..SamplingParams::default()
            },
        );
        let sampling = ConfiguredSampling::new(SamplingParams::default(), overrides);

        assert_eq!(sampling.sampling_for(&descriptor("orca", "o.gguf")).top_k, 5);
        assert_eq!(sampling.sampling_for(&descriptor("llama", "l.gguf")).top_k, 40);
    }
}
