use plan_proto::Category;
use plan_source::{ModelRef, SourceConfig};
use plan_vision::{image_prep::DEFAULT_MAX_DIMENSION, UnitConverter, DEFAULT_IOU_THRESHOLD, REFERENCE_DPI};
use serde::Deserialize;
use std::{collections::BTreeMap, time::Duration};

/// `[analysis]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default = "default_iou")]
    pub iou_threshold: f64,
    #[serde(default = "default_dpi")]
    pub reference_dpi: f64,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    pub deadline_ms: Option<u64>,
}

fn default_iou() -> f64 { DEFAULT_IOU_THRESHOLD }
fn default_dpi() -> f64 { REFERENCE_DPI }
fn default_max_dimension() -> u32 { DEFAULT_MAX_DIMENSION }

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            iou_threshold: default_iou(),
            reference_dpi: default_dpi(),
            max_dimension: default_max_dimension(),
            deadline_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelBinding {
    pub model: ModelRef,
    pub classes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryPlan {
    pub primary: Option<ModelBinding>,
    pub secondary: Option<ModelBinding>,
}

/// Everything an [`Analyzer`](crate::Analyzer) needs, fixed at construction.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub plans: BTreeMap<Category, CategoryPlan>,
    pub iou_threshold: f64,
    pub converter: UnitConverter,
    pub max_dimension: u32,
    pub deadline: Option<Duration>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::from_settings(&AnalysisSettings::default())
    }
}

impl AnalyzerConfig {
    pub fn from_settings(s: &AnalysisSettings) -> Self {
        Self {
            plans: BTreeMap::new(),
            iou_threshold: s.iou_threshold,
            converter: UnitConverter::new(s.reference_dpi),
            max_dimension: s.max_dimension,
            deadline: s.deadline_ms.map(Duration::from_millis),
        }
    }

    pub fn from_sources(primary: &SourceConfig, secondary: Option<&SourceConfig>, s: &AnalysisSettings) -> Self {
        let mut cfg = Self::from_settings(s);
        for c in Category::ALL {
            let binding = |src: &SourceConfig| src.model_ref(c).map(|model| ModelBinding { model, classes: src.classes(c) });
            cfg.plans.insert(c, CategoryPlan { primary: binding(primary), secondary: secondary.and_then(binding) });
        }
        cfg
    }

    pub fn with_plan(mut self, category: Category, plan: CategoryPlan) -> Self {
        self.plans.insert(category, plan);
        self
    }

    pub fn plan(&self, category: Category) -> Option<&CategoryPlan> {
        self.plans.get(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plans_from_sources() {
        let primary: SourceConfig = toml::from_str(r#"
            api_key = "k"
            [models.room]
            model_id = "rooms/1"
            [models.opening]
            model_id = "doors/4"
        "#).unwrap();
        let secondary: SourceConfig = toml::from_str(r#"
            kind = "replay"
            replay_dir = "/tmp"
            [models.opening]
            model_id = "local-doors/1"
            classes = ["door"]
        "#).unwrap();
        let cfg = AnalyzerConfig::from_sources(&primary, Some(&secondary), &AnalysisSettings::default());

        let room = cfg.plan(Category::Room).unwrap();
        assert_eq!(room.primary.as_ref().unwrap().model.model_id, "rooms/1");
        assert!(room.secondary.is_none());
        assert!(cfg.plan(Category::Wall).unwrap().primary.is_none());

        let opening = cfg.plan(Category::Opening).unwrap();
        assert_eq!(opening.primary.as_ref().unwrap().classes.as_ref().unwrap().len(), 4);
        assert_eq!(opening.secondary.as_ref().unwrap().classes, Some(vec!["door".to_string()]));
        assert_eq!(cfg.iou_threshold, 0.4);
        assert_eq!(cfg.converter.reference_dpi, 96.0);
        assert!(cfg.deadline.is_none());
        assert_eq!(cfg.max_dimension, 1536);
    }

    #[test]
    fn settings_carry_into_config() {
        let s: AnalysisSettings = toml::from_str("max_dimension = 800\ndeadline_ms = 2500\nreference_dpi = 72.0").unwrap();
        let cfg = AnalyzerConfig::from_settings(&s);
        assert_eq!(cfg.max_dimension, 800);
        assert_eq!(cfg.deadline, Some(Duration::from_millis(2500)));
        assert_eq!(cfg.converter.reference_dpi, 72.0);
        assert_eq!(cfg.iou_threshold, 0.4);
    }
}
