use base64::{engine::general_purpose::STANDARD, Engine as _};
use plan_proto::RawResponse;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::{DetectionSource, InferParams, ModelRef, SourceError};

/// Hosted inference endpoint (`POST {api_url}/{model_id}` with a base64 image body).
pub struct HostedSource {
    api_url: String,
    agent: ureq::Agent,
}

impl HostedSource {
    pub fn new(api_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { api_url: api_url.trim_end_matches('/').to_string(), agent }
    }

    pub fn endpoint(&self, model_id: &str) -> String {
        format!("{}/{}", self.api_url, model_id.trim_matches('/'))
    }

    /// Query pairs for a call; the key itself is never logged.
    fn query(api_key: &str, params: &InferParams) -> Vec<(&'static str, String)> {
        let mut q = vec![("api_key", api_key.to_string())];
        if let Some(c) = params.confidence { q.push(("confidence", c.to_string())); }
        if let Some(o) = params.overlap { q.push(("overlap", o.to_string())); }
        q
    }
}

impl DetectionSource for HostedSource {
    fn name(&self) -> &str {
        "hosted"
    }

    fn infer(&self, image: &[u8], model: &ModelRef, params: &InferParams) -> Result<RawResponse, SourceError> {
        let key = model
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::MissingApiKey(model.model_id.clone()))?;

        let url = self.endpoint(&model.model_id);
        let mut req = self.agent.post(&url).set("Content-Type", "application/x-www-form-urlencoded");
        for (k, v) in Self::query(key, params) {
            req = req.query(k, &v);
        }

        let start = Instant::now();
        let resp = match req.send_string(&STANDARD.encode(image)) {
            Ok(r) => r,
            Err(ureq::Error::Status(status, r)) => {
                let body = r.into_string().unwrap_or_default();
                warn!("source: {} returned http {}", url, status);
                return Err(SourceError::Http { status, body });
            }
            Err(e) => return Err(SourceError::Transport(e.to_string())),
        };

        let v: serde_json::Value = resp.into_json().map_err(|e| SourceError::Decode(e.to_string()))?;
        let raw = RawResponse::from_value(&v);
        debug!(
            "source: {} -> {} predictions in {}ms",
            model.model_id,
            raw.predictions.len(),
            start.elapsed().as_millis()
        );
        Ok(raw)
    }
}
