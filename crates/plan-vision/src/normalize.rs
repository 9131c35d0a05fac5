use plan_proto::{RawPrediction, RawResponse};
use tracing::debug;
use uuid::Uuid;

use crate::classify::{Semantics, WallKind};
use crate::geometry::{bbox_to_polygon, normalize_point, polygon_area, polygon_perimeter, Measure, UnitConverter};
use crate::{BBox, Category, Detection, Display, Frame, Metrics, Point, SourceTag};

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub category: Category,
    pub semantics: Semantics,
    /// Exact class names to keep; `None` keeps everything.
    pub classes: Option<Vec<String>>,
    pub source: SourceTag,
    pub converter: UnitConverter,
}

impl NormalizeOptions {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            semantics: Semantics::for_category(category),
            classes: None,
            source: SourceTag::Primary,
            converter: UnitConverter::default(),
        }
    }

    pub fn with_semantics(mut self, semantics: Semantics) -> Self {
        self.semantics = semantics;
        self
    }

    pub fn with_classes(mut self, classes: Option<Vec<String>>) -> Self {
        self.classes = classes.filter(|c| !c.is_empty());
        self
    }

    pub fn with_source(mut self, source: SourceTag) -> Self {
        self.source = source;
        self
    }

    pub fn with_converter(mut self, converter: UnitConverter) -> Self {
        self.converter = converter;
        self
    }
}

/// Turns one source response into canonical detections, in source order.
///
/// Items are independent: one with unusable geometry is dropped without affecting the rest.
pub fn normalize(raw: &RawResponse, frame: &Frame, opts: &NormalizeOptions) -> Vec<Detection> {
    let mut out = Vec::with_capacity(raw.predictions.len());
    let mut filtered = 0usize;
    let mut dropped = 0usize;

    for p in &raw.predictions {
        let label = p.class.as_deref().unwrap_or("unknown");
        if let Some(keep) = &opts.classes {
            if !keep.iter().any(|k| k == label) {
                filtered += 1;
                continue;
            }
        }
        match normalize_one(p, label, frame, opts) {
            Some(d) => out.push(d),
            None => dropped += 1,
        }
    }

    debug!(
        "normalize: {} {:?} kept={} filtered={} dropped={}",
        opts.category, opts.source, out.len(), filtered, dropped
    );
    out
}

fn normalize_one(p: &RawPrediction, label: &str, frame: &Frame, opts: &NormalizeOptions) -> Option<Detection> {
    let (w, h) = (frame.width, frame.height);

    let bbox = p.bbox.map(|b| BBox::new(b.x, b.y, b.width, b.height));

    // polygon wins for the mask when it's usable; the box is still reported
    let polygon: Option<Vec<Point>> = p
        .points
        .as_ref()
        .map(|pts| pts.iter().map(|q| Point::new(q.x, q.y)).collect::<Vec<_>>())
        .filter(|pts| pts.len() >= 3);

    let mask = match (&polygon, &bbox) {
        (Some(poly), _) => poly.clone(),
        (None, Some(b)) => bbox_to_polygon(b.x, b.y, b.w, b.h),
        (None, None) => {
            debug!("normalize: dropping {:?} without usable geometry", label);
            return None;
        }
    };
    let mask_norm: Vec<Point> = mask.iter().map(|q| normalize_point(*q, w, h)).collect();
    let points_norm = polygon
        .as_ref()
        .map(|poly| poly.iter().map(|q| normalize_point(*q, w, h)).collect());

    let metrics = Metrics { area_px2: polygon_area(&mask), perimeter_px: polygon_perimeter(&mask) };

    let semantics = opts.semantics.resolve(label);
    let class_name = match semantics {
        Semantics::Wall => WallKind::from_label(label).class_name().to_string(),
        _ => label.to_string(),
    };

    let bounds = bbox.or_else(|| BBox::from_extents(&mask)).unwrap_or(BBox::new(0.0, 0.0, 0.0, 0.0));
    let display = match frame.usable_scale() {
        Some(scale) => display_for(semantics, &metrics, &bounds, scale, &opts.converter, label),
        None => Display::default(),
    };

    Some(Detection {
        id: Uuid::new_v4(),
        class_name,
        confidence: p.confidence.clamp(0.0, 1.0),
        category: opts.category,
        bbox,
        bbox_norm: bbox.map(|b| b.normalized(w, h)),
        points: polygon,
        points_norm,
        mask,
        mask_norm,
        metrics,
        display,
        source_tag: opts.source,
    })
}

fn display_for(
    semantics: Semantics,
    metrics: &Metrics,
    bounds: &BBox,
    scale: f64,
    conv: &UnitConverter,
    label: &str,
) -> Display {
    let area = conv.to_real(metrics.area_px2, Some(scale), Measure::Area);
    let perimeter = conv.to_real(metrics.perimeter_px, Some(scale), Measure::Linear);
    match semantics {
        Semantics::Room => {
            debug!(
                "normalize: room {:?} area_px2={:.2} perimeter_px={:.2} scale={} px_per_ft={:.2} -> {:.2} sqft {:.2} ft",
                label, metrics.area_px2, metrics.perimeter_px, scale, scale * conv.reference_dpi, area, perimeter
            );
            Display { area_sqft: Some(area), perimeter_ft: Some(perimeter), ..Display::default() }
        }
        // inner and outer faces are not measured separately; both carry the centerline perimeter
        Semantics::Wall => Display {
            area_sqft: Some(area),
            perimeter_ft: Some(perimeter),
            inner_perimeter: Some(perimeter),
            outer_perimeter: Some(perimeter),
            ..Display::default()
        },
        Semantics::Opening => Display {
            width: Some(conv.to_real(bounds.w, Some(scale), Measure::Linear)),
            height: Some(conv.to_real(bounds.h, Some(scale), Measure::Linear)),
            ..Display::default()
        },
        Semantics::Generic => Display { area_sqft: Some(area), perimeter_ft: Some(perimeter), ..Display::default() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn raw(v: serde_json::Value) -> RawResponse {
        RawResponse::from_value(&v)
    }

    #[test]
    fn box_item_gets_rectangular_mask() {
        let r = raw(json!({"predictions": [
            {"class": "door", "confidence": 0.7, "x": 50, "y": 40, "width": 20, "height": 10}
        ]}));
        let out = normalize(&r, &Frame::new(100, 80, None), &NormalizeOptions::new(Category::Opening));
        assert_eq!(out.len(), 1);
        let d = &out[0];
        assert_eq!(d.mask.len(), 4);
        assert_eq!(d.mask[0], Point::new(40.0, 35.0));
        assert_eq!(d.mask_norm[2], Point::new(0.6, 0.5625));
        assert_eq!(d.bbox_norm, Some(BBox::new(0.5, 0.5, 0.2, 0.125)));
        assert!(d.points.is_none());
        assert_relative_eq!(d.metrics.area_px2, 200.0);
        assert_relative_eq!(d.metrics.perimeter_px, 60.0);
        assert!(d.display.is_empty());
        assert_eq!(d.category, Category::Opening);
        assert_eq!(d.source_tag, SourceTag::Primary);
    }

    #[test]
    fn polygon_takes_precedence_but_box_is_kept() {
        let r = raw(json!({"predictions": [{
            "class": "room", "confidence": 0.9,
            "x": 5, "y": 5, "width": 100, "height": 100,
            "points": [{"x": 0, "y": 0}, {"x": 10, "y": 0}, {"x": 10, "y": 10}, {"x": 0, "y": 10}]
        }]}));
        let out = normalize(&r, &Frame::new(20, 20, None), &NormalizeOptions::new(Category::Room));
        let d = &out[0];
        assert_relative_eq!(d.metrics.area_px2, 100.0);
        assert_eq!(d.bbox, Some(BBox::new(5.0, 5.0, 100.0, 100.0)));
        assert_eq!(d.points.as_ref().map(Vec::len), Some(4));
        assert_eq!(d.points_norm.as_ref().map(|p| p[2]), Some(Point::new(0.5, 0.5)));
    }

    #[test]
    fn unusable_geometry_is_dropped_not_fatal() {
        let r = raw(json!({"predictions": [
            {"class": "room", "confidence": 0.9, "points": [{"x": 0, "y": 0}, {"x": 1}, {"y": 1}]},
            {"class": "room", "confidence": 0.9},
            {"class": "room", "confidence": 0.8, "points": [{"x": 0, "y": 0}, {"x": 4, "y": 0}, {"x": 4, "y": 4}, {"bad": 1}]}
        ]}));
        let out = normalize(&r, &Frame::new(10, 10, None), &NormalizeOptions::new(Category::Room));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].mask.len(), 3);
        assert_relative_eq!(out[0].metrics.area_px2, 8.0);
    }

    #[test]
    fn class_filter_is_exact() {
        let r = raw(json!({"predictions": [
            {"class": "door", "confidence": 0.5, "x": 1, "y": 1, "width": 1, "height": 1},
            {"class": "room", "confidence": 0.5, "x": 1, "y": 1, "width": 1, "height": 1},
            {"class": "Window", "confidence": 0.5, "x": 1, "y": 1, "width": 1, "height": 1}
        ]}));
        let opts = NormalizeOptions::new(Category::Opening)
            .with_classes(Some(vec!["door".into(), "Window".into()]));
        let out = normalize(&r, &Frame::new(10, 10, None), &opts);
        let names: Vec<_> = out.iter().map(|d| d.class_name.as_str()).collect();
        assert_eq!(names, ["door", "Window"]);

        // an empty allow-list filters nothing
        let opts = NormalizeOptions::new(Category::Opening).with_classes(Some(vec![]));
        assert_eq!(normalize(&r, &Frame::new(10, 10, None), &opts).len(), 3);
    }

    #[test]
    fn room_display_at_quarter_inch_scale() {
        // 800 x 720 = 576000 px2 at 24 px/ft is 1000 sqft
        let r = raw(json!({"predictions": [{
            "class": "room", "confidence": 0.95,
            "points": [{"x": 100, "y": 100}, {"x": 900, "y": 100}, {"x": 900, "y": 820}, {"x": 100, "y": 820}]
        }]}));
        let out = normalize(&r, &Frame::new(1000, 1000, Some(0.25)), &NormalizeOptions::new(Category::Room));
        let d = &out[0];
        assert_relative_eq!(d.metrics.area_px2, 576_000.0);
        assert_relative_eq!(d.display.area_sqft.unwrap(), 1000.0, epsilon = 1e-9);
        assert_relative_eq!(d.display.perimeter_ft.unwrap(), 3040.0 / 24.0, epsilon = 1e-9);
        assert!(d.display.width.is_none());
    }

    #[test]
    fn walls_are_canonicalized_with_legacy_perimeters() {
        let r = raw(json!({"predictions": [
            {"class": "External Wall", "confidence": 0.9, "x": 50, "y": 50, "width": 48, "height": 24},
            {"class": "wall", "confidence": 0.9, "x": 50, "y": 50, "width": 48, "height": 24}
        ]}));
        let out = normalize(&r, &Frame::new(100, 100, Some(0.25)), &NormalizeOptions::new(Category::Wall));
        assert_eq!(out[0].class_name, "exterior_wall");
        assert_eq!(out[1].class_name, "interior_wall");
        let disp = out[0].display;
        assert_relative_eq!(disp.perimeter_ft.unwrap(), 6.0);
        assert_eq!(disp.inner_perimeter, disp.perimeter_ft);
        assert_eq!(disp.outer_perimeter, disp.perimeter_ft);
        assert_relative_eq!(disp.area_sqft.unwrap(), 2.0);
    }

    #[test]
    fn opening_display_uses_box_size() {
        let r = raw(json!({"predictions": [
            {"class": "window", "confidence": 0.6, "x": 50, "y": 50, "width": 72, "height": 12}
        ]}));
        let out = normalize(&r, &Frame::new(100, 100, Some(0.25)), &NormalizeOptions::new(Category::Opening));
        assert_relative_eq!(out[0].display.width.unwrap(), 3.0);
        assert_relative_eq!(out[0].display.height.unwrap(), 0.5);
        assert!(out[0].display.area_sqft.is_none());
    }

    #[test]
    fn generic_semantics_fall_back_to_label() {
        let r = raw(json!({"predictions": [
            {"class": "interior wall", "confidence": 0.6, "x": 50, "y": 50, "width": 24, "height": 24},
            {"class": "stair", "confidence": 0.6, "x": 50, "y": 50, "width": 24, "height": 24}
        ]}));
        let opts = NormalizeOptions::new(Category::Room).with_semantics(Semantics::Generic);
        let out = normalize(&r, &Frame::new(100, 100, Some(0.25)), &opts);
        assert_eq!(out[0].class_name, "interior_wall");
        assert!(out[0].display.inner_perimeter.is_some());
        assert_eq!(out[1].class_name, "stair");
        assert_relative_eq!(out[1].display.area_sqft.unwrap(), 1.0);
        assert!(out[1].display.inner_perimeter.is_none());
    }

    #[test]
    fn ids_are_fresh_and_confidence_clamped() {
        let r = raw(json!({"predictions": [
            {"class": "door", "confidence": 1.7, "x": 1, "y": 1, "width": 1, "height": 1},
            {"class": "door", "confidence": -0.2, "x": 1, "y": 1, "width": 1, "height": 1}
        ]}));
        let opts = NormalizeOptions::new(Category::Opening).with_source(SourceTag::Secondary);
        let out = normalize(&r, &Frame::new(10, 10, None), &opts);
        assert_ne!(out[0].id, out[1].id);
        assert_eq!(out[0].confidence, 1.0);
        assert_eq!(out[1].confidence, 0.0);
        assert!(out.iter().all(|d| d.source_tag == SourceTag::Secondary));
    }

    #[test]
    fn missing_class_is_unknown() {
        let r = raw(json!({"predictions": [{"confidence": 0.3, "x": 1, "y": 1, "width": 1, "height": 1}]}));
        let out = normalize(&r, &Frame::new(10, 10, None), &NormalizeOptions::new(Category::Room));
        assert_eq!(out[0].class_name, "unknown");
    }
}
