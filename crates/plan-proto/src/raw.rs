use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Center-based box as reported by detection sources, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
}

/// One prediction item, already stripped of anything we can't use.
///
/// `points` is `None` when the item carried no `points` list at all and
/// `Some` (possibly shorter than the source list) when it did. Entries
/// without numeric `x`/`y` are dropped and counted in `skipped_points`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    pub class: Option<String>,
    pub confidence: f64,
    pub bbox: Option<RawBox>,
    pub points: Option<Vec<RawPoint>>,
    #[serde(default)]
    pub skipped_points: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    pub predictions: Vec<RawPrediction>,
}

impl RawResponse {
    pub fn from_slice(data: &[u8]) -> serde_json::Result<Self> {
        let v: Value = serde_json::from_slice(data)?;
        Ok(Self::from_value(&v))
    }

    /// Accepts `{"predictions": [...]}` or `{"data": {"predictions": [...]}}`.
    /// Items that are not JSON objects are skipped.
    pub fn from_value(v: &Value) -> Self {
        let list = v
            .get("predictions")
            .and_then(Value::as_array)
            .filter(|a| !a.is_empty())
            .or_else(|| v.get("data").and_then(|d| d.get("predictions")).and_then(Value::as_array));

        let predictions = list
            .map(|items| items.iter().filter_map(RawPrediction::from_value).collect())
            .unwrap_or_default();
        Self { predictions }
    }
}

impl RawPrediction {
    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;

        let class = obj
            .get("class")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| obj.get("label").and_then(Value::as_str))
            .map(str::to_string);

        let confidence = obj.get("confidence").and_then(number).unwrap_or(0.0);

        let bbox = match (
            obj.get("x").and_then(number),
            obj.get("y").and_then(number),
            obj.get("width").and_then(number),
            obj.get("height").and_then(number),
        ) {
            (Some(x), Some(y), Some(width), Some(height)) => Some(RawBox { x, y, width, height }),
            _ => None,
        };

        let mut skipped_points = 0;
        let points = obj.get("points").and_then(Value::as_array).map(|pts| {
            let mut out = Vec::with_capacity(pts.len());
            for p in pts {
                match (p.get("x").and_then(number), p.get("y").and_then(number)) {
                    (Some(x), Some(y)) => out.push(RawPoint { x, y }),
                    _ => skipped_points += 1,
                }
            }
            out
        });

        Some(Self { class, confidence, bbox, points, skipped_points })
    }
}

// Sources are inconsistent about numbers vs numeric strings.
fn number(v: &Value) -> Option<f64> {
    let f = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    f.filter(|f| f.is_finite())
}
