use kurbo::{BezPath, Point, Rect};
use lottie_data::model::BezierPath;

/// True for rectangles with no area, including inverted and NaN ones.
pub fn is_empty_rect(rect: Rect) -> bool {
    !(rect.width() > 0.0 && rect.height() > 0.0)
}

/// Grows `acc` to cover `next`. Empty rectangles are the identity on both sides.
pub fn union_bounds(acc: Rect, next: Rect) -> Rect {
    match (is_empty_rect(acc), is_empty_rect(next)) {
        (_, true) => acc,
        (true, false) => next,
        (false, false) => acc.union(next),
    }
}

pub fn to_bez_path(path: &BezierPath) -> BezPath {
    let mut bp = BezPath::new();
    let vertices = &path.vertices;
    if vertices.is_empty() {
        return bp;
    }

    let point = |v: [f32; 2]| Point::new(v[0] as f64, v[1] as f64);
    let tangent = |list: &[[f32; 2]], i: usize| list.get(i).copied().unwrap_or([0.0, 0.0]);

    bp.move_to(point(vertices[0]));
    for i in 0..vertices.len() {
        let next = (i + 1) % vertices.len();
        if next == 0 && !path.closed {
            break;
        }
        let p0 = vertices[i];
        let p1 = vertices[next];
        let out = tangent(&path.out_tangents, i);
        let inc = tangent(&path.in_tangents, next);
        bp.curve_to(
            point([p0[0] + out[0], p0[1] + out[1]]),
            point([p1[0] + inc[0], p1[1] + inc[1]]),
            point(p1),
        );
    }
    if path.closed {
        bp.close_path();
    }
    bp
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape as _;

    #[test]
    fn test_union_skips_empty() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 5.0, 30.0, 40.0);
        assert_eq!(union_bounds(Rect::ZERO, a), a);
        assert_eq!(union_bounds(a, Rect::ZERO), a);
        assert_eq!(union_bounds(a, Rect::new(50.0, 50.0, 50.0, 90.0)), a);
        assert_eq!(union_bounds(a, b), Rect::new(0.0, 0.0, 30.0, 40.0));
    }

    #[test]
    fn test_rect_path_bounds() {
        let path = to_bez_path(&BezierPath::rect(5.0, 10.0, 20.0, 30.0));
        assert_eq!(path.bounding_box(), Rect::new(5.0, 10.0, 25.0, 40.0));
        assert!(to_bez_path(&BezierPath::default()).elements().is_empty());
    }
}
