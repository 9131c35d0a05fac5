use tracing::debug;

use crate::{iou, BBox, Detection};

pub const DEFAULT_IOU_THRESHOLD: f64 = 0.4;

/// Merges two detection lists for the same category, collapsing overlapping pairs.
///
/// Greedy, in secondary order: each secondary detection is paired with the unconsumed
/// primary it overlaps most. A pair above `iou_threshold` keeps only the more
/// confident of the two (ties keep the primary). Output is every secondary-driven
/// pick in secondary order, then the untouched primaries in primary order.
pub fn fuse(primary: Vec<Detection>, secondary: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    if secondary.is_empty() {
        return primary;
    }
    if primary.is_empty() {
        return secondary;
    }

    let bounds: Vec<BBox> = primary.iter().map(Detection::bounds).collect();
    let mut pool: Vec<Option<Detection>> = primary.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(pool.len() + secondary.len());
    let (mut matched, mut kept_secondary) = (0usize, 0usize);

    for s in secondary {
        let sb = s.bounds();
        let mut best_i = None;
        let mut best_iou = 0.0;
        for (i, slot) in pool.iter().enumerate() {
            if slot.is_none() { continue; }
            let v = iou(&sb, &bounds[i]);
            if v > best_iou {
                best_iou = v;
                best_i = Some(i);
            }
        }

        match best_i.filter(|_| best_iou > iou_threshold).and_then(|i| pool[i].take()) {
            Some(p) => {
                matched += 1;
                if s.confidence > p.confidence {
                    kept_secondary += 1;
                    out.push(s);
                } else {
                    out.push(p);
                }
            }
            None => out.push(s),
        }
    }

    let unmatched_primary = pool.iter().filter(|p| p.is_some()).count();
    out.extend(pool.into_iter().flatten());

    debug!(
        "fusion: matched={} kept_secondary={} unmatched_primary={} total={}",
        matched, kept_secondary, unmatched_primary, out.len()
    );
    out
}
