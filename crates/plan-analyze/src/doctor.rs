use anyhow::Result;

use crate::config::AnalysisSettings;

pub fn check_settings(s: &AnalysisSettings) -> Result<()> {
    anyhow::ensure!(s.iou_threshold > 0.0 && s.iou_threshold <= 1.0, "analysis.iou_threshold should be in (0, 1]");
    anyhow::ensure!(s.reference_dpi.is_finite() && s.reference_dpi > 0.0, "analysis.reference_dpi must be positive");
    anyhow::ensure!(s.max_dimension >= 64, "analysis.max_dimension too small; set >= 64");
    if let Some(ms) = s.deadline_ms {
        anyhow::ensure!(ms >= 100, "analysis.deadline_ms too small; set >= 100 or remove it");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        assert!(check_settings(&AnalysisSettings::default()).is_ok());
    }

    #[test]
    fn out_of_range() {
        let bad = [
            AnalysisSettings { iou_threshold: 0.0, ..Default::default() },
            AnalysisSettings { iou_threshold: 1.5, ..Default::default() },
            AnalysisSettings { reference_dpi: -96.0, ..Default::default() },
            AnalysisSettings { max_dimension: 10, ..Default::default() },
            AnalysisSettings { deadline_ms: Some(5), ..Default::default() },
        ];
        for s in bad {
            assert!(check_settings(&s).is_err(), "{:?}", s);
        }
    }
}
