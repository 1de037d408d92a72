//! 拾取：在像素容差内找出距离最近的实体。

use cadvision_core::document::{Arc, Entity, EntityId, Shape};
use cadvision_core::geometry::{Point2, bulge_to_arc, point_on_circle};

/// 默认拾取半径（像素），随缩放换算为世界单位。
pub const DEFAULT_PICK_TOLERANCE_PX: f64 = 12.0;

/// 按逆绘制顺序遍历，返回容差内距离最小的实体；距离相同时后绘制者优先。
pub fn pick<'a, I>(point: Point2, entities: I, tolerance: f64) -> Option<EntityId>
where
    I: DoubleEndedIterator<Item = &'a (EntityId, Entity)>,
{
    let limit = tolerance.max(0.0).powi(2);
    let mut best: Option<(EntityId, f64)> = None;
    for (id, entity) in entities.rev() {
        let Some(distance) = distance_squared(entity, point) else {
            continue;
        };
        if distance > limit {
            continue;
        }
        if best.is_none_or(|(_, current)| distance < current) {
            best = Some((*id, distance));
        }
    }
    best.map(|(id, _)| id)
}

/// 点到实体几何的平方距离。几何不完整的实体返回 `None`，由调用方跳过。
pub fn distance_squared(entity: &Entity, point: Point2) -> Option<f64> {
    if !entity.is_well_formed() {
        return None;
    }
    let distance = match &entity.shape {
        Shape::Line(line) => segment_distance_squared(point, line.start, line.end),
        Shape::Circle(circle) => ring_distance_squared(point, circle.center, circle.radius),
        Shape::Arc(arc) => arc_distance_squared(point, arc),
        Shape::Polyline(polyline) => polyline
            .segments()
            .map(|(start, end, bulge)| match bulge_to_arc(start, end, bulge) {
                Some(arc) => ring_distance_squared(point, arc.center, arc.radius),
                None => segment_distance_squared(point, start, end),
            })
            .fold(f64::INFINITY, f64::min),
    };
    distance.is_finite().then_some(distance)
}

/// 点到线段的平方距离（投影参数钳制在 [0, 1]）。
pub fn segment_distance_squared(point: Point2, start: Point2, end: Point2) -> f64 {
    let p = point.as_vec2();
    let a = start.as_vec2();
    let ab = end.as_vec2() - a;
    let length_squared = ab.length_squared();
    if length_squared <= f64::EPSILON {
        return p.distance_squared(a);
    }
    let t = ((p - a).dot(ab) / length_squared).clamp(0.0, 1.0);
    p.distance_squared(a + ab * t)
}

/// 点到圆周（而非圆盘）的平方距离。
///
/// 凸度圆弧也用这一公式，不限制在弧的角度范围内，因此延长圆周附近的点同样会被拾取。
pub fn ring_distance_squared(point: Point2, center: Point2, radius: f64) -> f64 {
    let delta = point.distance(center) - radius;
    delta * delta
}

/// 角度落在圆弧范围内时取圆周距离，否则取到较近端点的距离。
fn arc_distance_squared(point: Point2, arc: &Arc) -> f64 {
    let offset = point.as_vec2() - arc.center.as_vec2();
    let start = arc.start_angle.to_radians();
    let span = normalized_span(arc.start_angle, arc.end_angle).to_radians();
    let angle = offset.y.atan2(offset.x);
    if offset.length_squared() > 0.0 && (angle - start).rem_euclid(std::f64::consts::TAU) <= span {
        return ring_distance_squared(point, arc.center, arc.radius);
    }
    let first = point_on_circle(arc.center, arc.radius, start);
    let last = point_on_circle(arc.center, arc.radius, start + span);
    point
        .distance_squared(first)
        .min(point.distance_squared(last))
}

/// 起止角（度）之间的逆时针张角，取值 (0, 360]。
pub(crate) fn normalized_span(start_deg: f64, end_deg: f64) -> f64 {
    let span = (end_deg - start_deg).rem_euclid(360.0);
    if span <= f64::EPSILON { 360.0 } else { span }
}

#[cfg(test)]
mod tests {
    use cadvision_core::document::{Drawing, PolylineKind, PolylineVertex};

    use super::*;

    fn semicircle_drawing() -> (Drawing, EntityId) {
        let mut drawing = Drawing::new();
        let id = drawing.add_polyline(
            PolylineKind::Lightweight,
            [
                PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 1.0),
                PolylineVertex::new(Point2::new(10.0, 0.0)),
            ],
            "A",
        );
        (drawing, id)
    }

    #[test]
    fn bulge_arc_is_clickable_at_zero_tolerance() {
        let (drawing, id) = semicircle_drawing();
        assert_eq!(pick(Point2::new(5.0, 5.0), drawing.entities(), 0.0), Some(id));
        assert_eq!(pick(Point2::new(5.0, -5.0), drawing.entities(), 0.0), Some(id));
        assert_eq!(pick(Point2::new(5.0, 0.0), drawing.entities(), 1.0), None);
    }

    #[test]
    fn line_distance_uses_clamped_projection() {
        let start = Point2::new(0.0, 0.0);
        let end = Point2::new(10.0, 0.0);
        assert!((segment_distance_squared(Point2::new(5.0, 3.0), start, end) - 9.0).abs() < 1e-12);
        assert!((segment_distance_squared(Point2::new(-3.0, 4.0), start, end) - 25.0).abs() < 1e-12);
        assert!((segment_distance_squared(Point2::new(1.0, 1.0), start, start) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn circle_is_a_ring_not_a_disk() {
        let mut drawing = Drawing::new();
        let id = drawing.add_circle(Point2::new(0.0, 0.0), 10.0, "A");
        assert_eq!(pick(Point2::new(0.0, 0.0), drawing.entities(), 1.0), None);
        assert_eq!(pick(Point2::new(0.0, 10.5), drawing.entities(), 1.0), Some(id));
    }

    #[test]
    fn nearest_wins_and_topmost_breaks_ties() {
        let mut drawing = Drawing::new();
        let bottom = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "A");
        let top = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "B");
        let far = drawing.add_line(Point2::new(0.0, 2.0), Point2::new(10.0, 2.0), "C");

        assert_eq!(pick(Point2::new(5.0, 0.5), drawing.entities(), 3.0), Some(top));
        assert_eq!(pick(Point2::new(5.0, 1.8), drawing.entities(), 3.0), Some(far));
        assert_ne!(pick(Point2::new(5.0, 0.1), drawing.entities(), 3.0), Some(bottom));
        assert_eq!(pick(Point2::new(50.0, 50.0), drawing.entities(), 3.0), None);
    }

    #[test]
    fn arc_entity_respects_its_span() {
        let mut drawing = Drawing::new();
        let id = drawing.add_entity(Entity::arc(Point2::new(0.0, 0.0), 10.0, 0.0, 90.0, "A"));
        assert_eq!(pick(Point2::new(7.07, 7.07), drawing.entities(), 0.5), Some(id));
        // 延长圆周上但在张角之外
        assert_eq!(pick(Point2::new(-10.0, 0.0), drawing.entities(), 0.5), None);
        assert_eq!(pick(Point2::new(10.2, -0.2), drawing.entities(), 0.5), Some(id));
    }

    #[test]
    fn wrapped_arc_span_is_normalised() {
        assert!((normalized_span(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((normalized_span(0.0, 360.0) - 360.0).abs() < 1e-9);
        assert!((normalized_span(90.0, 45.0) - 315.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_entities_are_skipped() {
        let mut drawing = Drawing::new();
        drawing.add_polyline(
            PolylineKind::Heavy,
            [PolylineVertex::new(Point2::new(0.0, 0.0))],
            "A",
        );
        let ok = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "A");
        assert_eq!(pick(Point2::new(0.0, 0.0), drawing.entities(), 1.0), Some(ok));
    }
}
