use plan_proto::RawResponse;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{DetectionSource, InferParams, ModelRef, SourceError};

/// Serves recorded responses from `{dir}/{model id with '/' as '_'}.json`.
///
/// The image and thresholds are ignored.
pub struct ReplaySource {
    dir: PathBuf,
}

impl ReplaySource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, model_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", model_id.replace('/', "_")))
    }
}

impl DetectionSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn infer(&self, _image: &[u8], model: &ModelRef, _params: &InferParams) -> Result<RawResponse, SourceError> {
        let path = self.path_for(&model.model_id);
        let data = std::fs::read(&path).map_err(|source| SourceError::Io { path: path.clone(), source })?;
        let raw = RawResponse::from_slice(&data)
            .map_err(|e| SourceError::Decode(format!("{}: {}", path.display(), e)))?;
        debug!("source: replayed {} predictions from {}", raw.predictions.len(), path.display());
        Ok(raw)
    }
}
