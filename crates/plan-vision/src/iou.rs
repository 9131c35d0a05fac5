use crate::BBox;

/// Intersection over union of two center-based boxes; `0.0` when both are empty.
pub fn iou(a: &BBox, b: &BBox) -> f64 {
    let (al, at, ar, ab) = a.corners();
    let (bl, bt, br, bb) = b.corners();

    let iw = (ar.min(br) - al.max(bl)).max(0.0);
    let ih = (ab.min(bb) - at.max(bt)).max(0.0);
    let inter = iw * ih;
    let union = a.area() + b.area() - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identical_boxes() {
        let b = BBox::new(10.0, 10.0, 4.0, 2.0);
        assert_relative_eq!(iou(&b, &b), 1.0);
    }

    #[test]
    fn disjoint_and_touching() {
        let a = BBox::new(0.0, 0.0, 2.0, 2.0);
        assert_eq!(iou(&a, &BBox::new(10.0, 10.0, 2.0, 2.0)), 0.0);
        assert_eq!(iou(&a, &BBox::new(2.0, 0.0, 2.0, 2.0)), 0.0);
    }

    #[test]
    fn half_shifted() {
        // overlap 1x2 = 2, union 4 + 4 - 2 = 6
        let a = BBox::new(0.0, 0.0, 2.0, 2.0);
        let b = BBox::new(1.0, 0.0, 2.0, 2.0);
        assert_relative_eq!(iou(&a, &b), 2.0 / 6.0);
    }

    #[test]
    fn zero_area_boxes() {
        let p = BBox::new(3.0, 3.0, 0.0, 0.0);
        assert_eq!(iou(&p, &p), 0.0);
    }
}
