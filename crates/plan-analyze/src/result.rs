use plan_proto::Category;
use plan_vision::{Detection, Frame};
use serde::{Serialize, Serializer};
use std::{collections::BTreeMap, time::Duration};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Outcome of one analysis. Built once, read-only afterwards.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    image: Frame,
    per_category: BTreeMap<Category, Vec<Detection>>,
    errors: BTreeMap<Category, String>,
    timing: Duration,
    analyzed_at: OffsetDateTime,
}

impl AnalysisResult {
    pub fn new(
        image: Frame,
        per_category: BTreeMap<Category, Vec<Detection>>,
        errors: BTreeMap<Category, String>,
        timing: Duration,
    ) -> Self {
        Self { image, per_category, errors, timing, analyzed_at: OffsetDateTime::now_utc() }
    }

    pub fn image(&self) -> &Frame { &self.image }
    pub fn per_category(&self) -> &BTreeMap<Category, Vec<Detection>> { &self.per_category }
    pub fn errors(&self) -> &BTreeMap<Category, String> { &self.errors }
    pub fn timing(&self) -> Duration { self.timing }
    pub fn analyzed_at(&self) -> OffsetDateTime { self.analyzed_at }

    pub fn detections(&self, category: Category) -> Option<&[Detection]> {
        self.per_category.get(&category).map(Vec::as_slice)
    }

    pub fn error(&self, category: Category) -> Option<&str> {
        self.errors.get(&category).map(String::as_str)
    }
}

#[derive(Serialize)]
struct ImageSize {
    width: u32,
    height: u32,
}

#[derive(Serialize)]
struct Report<'a> {
    image: ImageSize,
    scale: Option<f64>,
    predictions: &'a BTreeMap<Category, Vec<Detection>>,
    errors: &'a BTreeMap<Category, String>,
    timing_ms: u64,
    analyzed_at: String,
}

impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let analyzed_at = self.analyzed_at.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        Report {
            image: ImageSize { width: self.image.width, height: self.image.height },
            scale: self.image.scale,
            predictions: &self.per_category,
            errors: &self.errors,
            timing_ms: self.timing.as_millis() as u64,
            analyzed_at,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn report_shape() {
        let mut errors = BTreeMap::new();
        errors.insert(Category::Wall, "wall model not configured".to_string());
        let mut per = BTreeMap::new();
        per.insert(Category::Room, Vec::new());
        let r = AnalysisResult::new(Frame::new(640, 480, Some(0.25)), per, errors, Duration::from_millis(1234));

        let v: Value = serde_json::to_value(&r).unwrap();
        assert_eq!(v["image"]["width"], 640);
        assert_eq!(v["image"]["height"], 480);
        assert_eq!(v["scale"], 0.25);
        assert!(v["predictions"]["room"].as_array().unwrap().is_empty());
        assert!(v["predictions"].get("wall").is_none());
        assert_eq!(v["errors"]["wall"], "wall model not configured");
        assert_eq!(v["timing_ms"], 1234);
        assert!(v["analyzed_at"].as_str().unwrap().ends_with('Z'));
    }
}
