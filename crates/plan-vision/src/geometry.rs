//! Pure polygon measurements and pixel to real-unit conversion.
//!
//! Nothing here fails: degenerate input yields zero rather than an error.

use serde::{Deserialize, Serialize};

use crate::Point;

/// Resolution drawings are assumed to be rendered at (pixels per inch).
///
/// This is a fixed assumption, not something detected per image: results are only
/// as accurate as the upload actually matching it.
pub const REFERENCE_DPI: f64 = 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Linear,
    Area,
}

/// Shoelace area. Orientation independent; `0.0` below three points.
pub fn polygon_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        acc += a.x * b.y - b.x * a.y;
    }
    acc.abs() / 2.0
}

/// Closed perimeter (last point joins the first). `0.0` below two points.
pub fn polygon_perimeter(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| points[i].distance_to(&points[(i + 1) % n])).sum()
}

/// Rectangle for a center based box, clockwise from top-left (image coordinates, y down).
pub fn bbox_to_polygon(cx: f64, cy: f64, w: f64, h: f64) -> Vec<Point> {
    let (hw, hh) = (w / 2.0, h / 2.0);
    vec![
        Point::new(cx - hw, cy - hh),
        Point::new(cx + hw, cy - hh),
        Point::new(cx + hw, cy + hh),
        Point::new(cx - hw, cy + hh),
    ]
}

/// Pixel point to `[0,1]` frame coordinates. A zero dimension maps to the origin.
pub fn normalize_point(p: Point, width: u32, height: u32) -> Point {
    if width == 0 || height == 0 {
        return Point::new(0.0, 0.0);
    }
    Point::new(
        (p.x / width as f64).clamp(0.0, 1.0),
        (p.y / height as f64).clamp(0.0, 1.0),
    )
}

/// Converts pixel measurements to feet / square feet for a drawing scale.
///
/// `scale` is drawing inches per real foot (0.25 for 1/4" = 1'), so one foot spans
/// `scale * reference_dpi` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitConverter {
    pub reference_dpi: f64,
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self { reference_dpi: REFERENCE_DPI }
    }
}

impl UnitConverter {
    pub fn new(reference_dpi: f64) -> Self {
        Self { reference_dpi }
    }

    /// Identity when `scale` is missing or not positive: the pixel value is reported as is.
    pub fn to_real(&self, value: f64, scale: Option<f64>, kind: Measure) -> f64 {
        let Some(scale) = scale.filter(|s| *s > 0.0) else { return value; };
        let pixels_per_foot = scale * self.reference_dpi;
        if pixels_per_foot <= 0.0 {
            return value;
        }
        let feet_per_pixel = 1.0 / pixels_per_foot;
        match kind {
            Measure::Area => value * feet_per_pixel * feet_per_pixel,
            Measure::Linear => value * feet_per_pixel,
        }
    }
}

/// [`UnitConverter::to_real`] at [`REFERENCE_DPI`].
pub fn pixels_to_real(value: f64, scale: Option<f64>, kind: Measure) -> f64 {
    UnitConverter::default().to_real(value, scale, kind)
}
