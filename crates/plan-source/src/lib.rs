pub mod doctor;
mod hosted;
mod replay;

pub use hosted::HostedSource;
pub use replay::ReplaySource;

use plan_proto::{Category, RawResponse};
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0} model not configured")]
    NotConfigured(Category),
    #[error("missing api key for model {0}")]
    MissingApiKey(String),
    #[error("source returned http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed source response: {0}")]
    Decode(String),
    #[error("read {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

/// Model to run, with its credentials already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub model_id: String,
    pub api_key: Option<String>,
}

/// Per-request knobs forwarded untouched to every source.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InferParams {
    pub confidence: Option<f64>,
    pub overlap: Option<f64>,
}

/// An upstream detector. Calls block on I/O; run them off the async executor.
pub trait DetectionSource: Send + Sync {
    fn name(&self) -> &str;

    fn infer(&self, image: &[u8], model: &ModelRef, params: &InferParams) -> Result<RawResponse, SourceError>;
}

// ----- Config -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Hosted,
    Replay,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub api_key: Option<String>,
    /// Name of an env var holding the key; used when `api_key` is unset.
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    pub replay_dir: Option<String>,
    #[serde(default)]
    pub models: ModelTable,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelTable {
    pub room: Option<ModelConfig>,
    pub wall: Option<ModelConfig>,
    pub opening: Option<ModelConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    /// Full id; overrides `project`/`version`.
    pub model_id: Option<String>,
    pub project: Option<String>,
    pub version: Option<String>,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    /// Class allow-list applied to this model's output.
    pub classes: Option<Vec<String>>,
}

fn default_api_url() -> String { "https://detect.roboflow.com".into() }
fn default_timeout_s() -> u64 { 60 }

/// Door/window models also emit rooms and walls; keep only the openings.
pub fn default_opening_classes() -> Vec<String> {
    ["door", "window", "Door", "Window"].iter().map(|s| s.to_string()).collect()
}

impl ModelTable {
    pub fn get(&self, category: Category) -> Option<&ModelConfig> {
        match category {
            Category::Room => self.room.as_ref(),
            Category::Wall => self.wall.as_ref(),
            Category::Opening => self.opening.as_ref(),
        }
    }
}

impl ModelConfig {
    /// `"{project}/{version}"`, or `model_id` when given. `None` when incomplete.
    pub fn model_id(&self) -> Option<String> {
        if let Some(id) = self.model_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return Some(id.to_string());
        }
        let project = self.project.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let version = self.version.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(format!("{}/{}", project, version))
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s.max(1))
    }

    /// Model for a category with the model key, falling back to the source key.
    pub fn model_ref(&self, category: Category) -> Option<ModelRef> {
        let m = self.models.get(category)?;
        let model_id = m.model_id()?;
        let api_key = resolve_key(m.api_key.as_deref(), m.api_key_env.as_deref())
            .or_else(|| resolve_key(self.api_key.as_deref(), self.api_key_env.as_deref()));
        Some(ModelRef { model_id, api_key })
    }

    /// Class filter for a category; openings default to door/window.
    pub fn classes(&self, category: Category) -> Option<Vec<String>> {
        let explicit = self.models.get(category).and_then(|m| m.classes.clone());
        match (explicit, category) {
            (Some(c), _) => Some(c),
            (None, Category::Opening) => Some(default_opening_classes()),
            (None, _) => None,
        }
    }
}

fn resolve_key(key: Option<&str>, env: Option<&str>) -> Option<String> {
    key.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| env.and_then(|name| std::env::var(name).ok()).filter(|k| !k.trim().is_empty()))
}

pub fn build_source(cfg: &SourceConfig) -> anyhow::Result<Arc<dyn DetectionSource>> {
    match cfg.kind {
        SourceKind::Hosted => {
            info!("source: hosted {}", cfg.api_url);
            Ok(Arc::new(HostedSource::new(&cfg.api_url, cfg.timeout())))
        }
        SourceKind::Replay => {
            let dir = cfg.replay_dir.as_deref().filter(|d| !d.is_empty());
            let dir = dir.ok_or_else(|| anyhow::anyhow!("replay source needs replay_dir"))?;
            info!("source: replay {}", dir);
            Ok(Arc::new(ReplaySource::new(dir)))
        }
    }
}
