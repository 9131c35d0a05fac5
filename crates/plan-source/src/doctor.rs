use anyhow::Result;
use plan_proto::Category;
use std::path::Path;
use tracing::warn;

use crate::{SourceConfig, SourceKind};

pub fn check_source(label: &str, cfg: &SourceConfig) -> Result<()> {
    match cfg.kind {
        SourceKind::Hosted => {
            anyhow::ensure!(
                cfg.api_url.starts_with("https://") || cfg.api_url.starts_with("http://"),
                "{}.api_url must be http(s): {}", label, cfg.api_url
            );
            anyhow::ensure!(cfg.timeout_s >= 1, "{}.timeout_s must be >= 1", label);
        }
        SourceKind::Replay => {
            let dir = cfg.replay_dir.as_deref().unwrap_or_default();
            anyhow::ensure!(!dir.is_empty(), "{}.replay_dir missing", label);
            anyhow::ensure!(Path::new(dir).is_dir(), "{}.replay_dir is not a dir: {}", label, dir);
        }
    }
    Ok(())
}

/// Categories lacking a usable model. Hosted models without a key are reported too.
pub fn unconfigured_models(label: &str, cfg: &SourceConfig) -> Vec<Category> {
    let mut out = Vec::new();
    for c in Category::ALL {
        match cfg.model_ref(c) {
            None => {
                warn!("doctor: {} has no {} model", label, c);
                out.push(c);
            }
            Some(m) if cfg.kind == SourceKind::Hosted && m.api_key.is_none() => {
                warn!("doctor: {} {} model {} has no api key", label, c, m.model_id);
                out.push(c);
            }
            Some(_) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosted_url_must_be_http() {
        let c: SourceConfig = toml::from_str(r#"api_url = "ftp://x""#).unwrap();
        assert!(check_source("source", &c).is_err());
        let c: SourceConfig = toml::from_str("").unwrap();
        assert!(check_source("source", &c).is_ok());
    }

    #[test]
    fn replay_dir_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let ok = format!("kind = \"replay\"\nreplay_dir = {:?}", dir.path().to_str().unwrap());
        assert!(check_source("secondary", &toml::from_str(&ok).unwrap()).is_ok());
        let missing = "kind = \"replay\"\nreplay_dir = \"/definitely/not/here\"";
        assert!(check_source("secondary", &toml::from_str(missing).unwrap()).is_err());
    }

    #[test]
    fn keyless_hosted_models_count_as_unconfigured() {
        let c: SourceConfig = toml::from_str(r#"
            [models.room]
            model_id = "r/1"
            api_key = "k"
            [models.wall]
            model_id = "w/1"
        "#).unwrap();
        assert_eq!(unconfigured_models("source", &c), vec![Category::Wall, Category::Opening]);
    }
}
