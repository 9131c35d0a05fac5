mod iou;
pub mod classify;
pub mod fusion;
pub mod geometry;
pub mod image_prep;
pub mod normalize;

pub use classify::{Semantics, WallKind};
pub use fusion::{fuse, DEFAULT_IOU_THRESHOLD};
pub use geometry::{Measure, UnitConverter, REFERENCE_DPI};
pub use image_prep::{prepare_image, ImageError, PreparedImage};
pub use iou::iou;
pub use normalize::{normalize, NormalizeOptions};
pub use plan_proto::Category;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned box, center based (`x`,`y` is the center).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Tightest box around `points`; `None` for an empty slice.
    pub fn from_extents(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Some(Self { x: (x0 + x1) / 2.0, y: (y0 + y1) / 2.0, w: x1 - x0, h: y1 - y0 })
    }

    /// (left, top, right, bottom)
    pub fn corners(&self) -> (f64, f64, f64, f64) {
        (self.x - self.w / 2.0, self.y - self.h / 2.0, self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn normalized(&self, width: u32, height: u32) -> Self {
        let (fw, fh) = (width as f64, height as f64);
        if width == 0 || height == 0 {
            return Self { x: 0.0, y: 0.0, w: 0.0, h: 0.0 };
        }
        Self { x: self.x / fw, y: self.y / fh, w: self.w / fw, h: self.h / fh }
    }
}

/// The image actually sent for detection, after any resize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub scale: Option<f64>,
}

impl Frame {
    pub fn new(width: u32, height: u32, scale: Option<f64>) -> Self {
        Self { width, height, scale }
    }

    /// Scale usable for unit conversion: present, finite and positive.
    pub fn usable_scale(&self) -> Option<f64> {
        self.scale.filter(|s| s.is_finite() && *s > 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    #[default]
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub area_px2: f64,
    pub perimeter_px: f64,
}

/// Real-unit figures; which fields are set depends on the detection's semantics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Display {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_sqft: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perimeter_ft: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_perimeter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outer_perimeter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Display {
    pub fn is_empty(&self) -> bool {
        *self == Display::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: Uuid,
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox_norm: Option<BBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<Point>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_norm: Option<Vec<Point>>,
    pub mask: Vec<Point>,
    pub mask_norm: Vec<Point>,
    pub metrics: Metrics,
    pub display: Display,
    #[serde(default)]
    pub source_tag: SourceTag,
}

impl Detection {
    /// Box used for overlap tests: the source box when there is one, else the mask extents.
    pub fn bounds(&self) -> BBox {
        self.bbox
            .or_else(|| BBox::from_extents(&self.mask))
            .unwrap_or(BBox { x: 0.0, y: 0.0, w: 0.0, h: 0.0 })
    }
}
