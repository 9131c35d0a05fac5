use bytes::Bytes;
use plan_proto::Category;
use plan_source::{DetectionSource, InferParams};
use plan_vision::{fuse, normalize, Detection, Frame, NormalizeOptions, SourceTag, UnitConverter};
use std::{panic::AssertUnwindSafe, sync::Arc};
use tracing::debug;

use crate::config::ModelBinding;

/// One category's work: primary source, optional secondary source, fusion.
pub(crate) struct CategoryJob {
    pub category: Category,
    pub frame: Frame,
    pub image: Bytes,
    pub params: InferParams,
    pub iou_threshold: f64,
    pub converter: UnitConverter,
    pub primary: (Arc<dyn DetectionSource>, ModelBinding),
    pub secondary: Option<(Arc<dyn DetectionSource>, ModelBinding)>,
}

impl CategoryJob {
    /// [`run`](Self::run) with a panicking source reported as an ordinary failure.
    pub fn run_guarded(&self) -> Result<Vec<Detection>, String> {
        match std::panic::catch_unwind(AssertUnwindSafe(|| self.run())) {
            Ok(r) => r,
            Err(panic) => {
                let what = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                Err(format!("{} pipeline panicked: {}", self.category, what))
            }
        }
    }

    pub fn run(&self) -> Result<Vec<Detection>, String> {
        let primary = self.detect(&self.primary, SourceTag::Primary).map_err(|e| e.to_string())?;

        let Some(secondary) = &self.secondary else { return Ok(primary); };
        let secondary = self
            .detect(secondary, SourceTag::Secondary)
            .map_err(|e| format!("secondary source: {}", e))?;

        debug!(
            "analyze: fusing {} primary={} secondary={}",
            self.category, primary.len(), secondary.len()
        );
        Ok(fuse(primary, secondary, self.iou_threshold))
    }

    fn detect(
        &self,
        (source, binding): &(Arc<dyn DetectionSource>, ModelBinding),
        tag: SourceTag,
    ) -> Result<Vec<Detection>, plan_source::SourceError> {
        let raw = source.infer(&self.image, &binding.model, &self.params)?;
        debug!(
            "analyze: {} {} model {} returned {} raw predictions",
            self.category, source.name(), binding.model.model_id, raw.predictions.len()
        );
        let opts = NormalizeOptions::new(self.category)
            .with_classes(binding.classes.clone())
            .with_source(tag)
            .with_converter(self.converter);
        Ok(normalize(&raw, &self.frame, &opts))
    }
}
