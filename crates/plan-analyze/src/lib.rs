pub mod config;
pub mod doctor;
mod pipeline;
mod result;

pub use config::{AnalysisSettings, AnalyzerConfig, CategoryPlan, ModelBinding};
pub use result::AnalysisResult;

use plan_proto::Category;
use plan_source::{DetectionSource, InferParams};
use plan_vision::{Frame, PreparedImage};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    time::Instant,
};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::pipeline::CategoryJob;

pub const DEADLINE_EXCEEDED: &str = "analysis deadline exceeded";

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: PreparedImage,
    pub scale: Option<f64>,
    pub params: InferParams,
    /// Categories to run. [`AnalysisRequest::new`] selects all of them.
    pub categories: Vec<Category>,
}

impl AnalysisRequest {
    pub fn new(image: PreparedImage) -> Self {
        Self { image, scale: None, params: InferParams::default(), categories: Category::ALL.to_vec() }
    }
}

/// Runs one pipeline per requested category and gathers the outcome.
pub struct Analyzer {
    cfg: Arc<AnalyzerConfig>,
    primary: Arc<dyn DetectionSource>,
    secondary: Option<Arc<dyn DetectionSource>>,
}

impl Analyzer {
    pub fn new(cfg: AnalyzerConfig, primary: Arc<dyn DetectionSource>, secondary: Option<Arc<dyn DetectionSource>>) -> Self {
        Self { cfg: Arc::new(cfg), primary, secondary }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.cfg
    }

    /// Never fails as a whole: a category whose pipeline fails lands in `errors`
    /// and is left out of `per_category`.
    pub async fn analyze(&self, req: AnalysisRequest) -> AnalysisResult {
        let start = Instant::now();
        let frame = Frame::new(req.image.width, req.image.height, req.scale);
        let categories: BTreeSet<Category> = req.categories.iter().copied().collect();
        if categories.is_empty() {
            warn!("analyze: no categories requested");
        }

        let mut per_category = BTreeMap::new();
        let mut errors = BTreeMap::new();
        let mut pending = BTreeSet::new();
        let mut set = JoinSet::new();

        for category in categories {
            let plan = self.cfg.plan(category).cloned().unwrap_or_default();
            let Some(primary_model) = plan.primary else {
                errors.insert(category, plan_source::SourceError::NotConfigured(category).to_string());
                continue;
            };
            let secondary = match (&self.secondary, plan.secondary) {
                (Some(src), Some(model)) => Some((src.clone(), model)),
                _ => None,
            };
            let job = CategoryJob {
                category,
                frame,
                image: req.image.bytes.clone(),
                params: req.params,
                iou_threshold: self.cfg.iou_threshold,
                converter: self.cfg.converter,
                primary: (self.primary.clone(), primary_model),
                secondary,
            };
            pending.insert(category);
            set.spawn_blocking(move || (category, job.run_guarded()));
        }

        let drain = async {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((category, Ok(dets))) => {
                        info!("analyze: {} -> {} detections", category, dets.len());
                        pending.remove(&category);
                        per_category.insert(category, dets);
                    }
                    Ok((category, Err(msg))) => {
                        warn!("analyze: {} failed: {}", category, msg);
                        pending.remove(&category);
                        errors.insert(category, msg);
                    }
                    Err(e) => warn!("analyze: worker join failed: {}", e),
                }
            }
        };

        let timed_out = match self.cfg.deadline {
            Some(d) => tokio::time::timeout(d, drain).await.is_err(),
            None => {
                drain.await;
                false
            }
        };
        // blocking workers can't be aborted: abandoned ones run on until their source
        // call returns, and the runtime waits for them at shutdown unless the caller
        // shuts down in the background
        set.abort_all();

        for category in pending {
            let msg = if timed_out { DEADLINE_EXCEEDED } else { "pipeline did not complete" };
            warn!("analyze: {} abandoned: {}", category, msg);
            errors.insert(category, msg.to_string());
        }

        AnalysisResult::new(frame, per_category, errors, start.elapsed())
    }
}
