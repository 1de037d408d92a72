pub mod color;

pub mod geometry {
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 凸度绝对值小于该阈值时按直线段处理。
    pub const BULGE_EPSILON: f64 = 1e-9;

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn distance_squared(self, other: Point2) -> f64 {
            self.0.distance_squared(other.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算图纸/实体范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        /// 图纸为空时使用的半边长。
        pub const FALLBACK_HALF_EXTENT: f64 = 50.0;

        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        /// 以原点为中心的 ±50 单位方框。
        #[inline]
        pub fn fallback() -> Self {
            let half = Self::FALLBACK_HALF_EXTENT;
            Self::new(Point2::new(-half, -half), Point2::new(half, half))
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let center = (self.min.as_vec2() + self.max.as_vec2()) * 0.5;
            Point2::from_vec(center)
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }
    }

    /// 由多段线顶点凸度还原的圆弧。渲染器与拾取共用这一份推导。
    ///
    /// 角度均为弧度；`sweep` 为带符号的包含角（`4·atan(bulge)`），
    /// 正值表示逆时针。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct BulgeArc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub sweep: f64,
    }

    impl BulgeArc {
        #[inline]
        pub fn is_counter_clockwise(&self) -> bool {
            self.sweep > 0.0
        }

        /// 按包含角取弧上的点，`t` 取值 0..=1。
        pub fn point_at(&self, t: f64) -> Point2 {
            let angle = self.start_angle + self.sweep * t;
            point_on_circle(self.center, self.radius, angle)
        }

        /// 将圆弧的端点与经过的象限点并入包围盒。
        pub fn include_in(&self, bounds: &mut Bounds2D) {
            bounds.include_point(self.point_at(0.0));
            bounds.include_point(self.point_at(1.0));
            let (start, end) = if self.sweep >= 0.0 {
                (self.start_angle, self.start_angle + self.sweep)
            } else {
                (self.start_angle + self.sweep, self.start_angle)
            };
            const QUADRANTS: [f64; 4] = [0.0, FRAC_PI_2, PI, FRAC_PI_2 * 3.0];
            for base in QUADRANTS {
                let mut candidate = base;
                while candidate < start {
                    candidate += TAU;
                }
                while candidate - TAU >= start {
                    candidate -= TAU;
                }
                if candidate <= end {
                    bounds.include_point(point_on_circle(self.center, self.radius, candidate));
                }
            }
        }
    }

    /// 从弦两端点与凸度推导圆弧。凸度为 0 或弦长退化时返回 `None`（直线段）。
    ///
    /// 弦长 `L`，弓高偏移 `h = (L/2)·(1−b²)/(2b)`，半径 `r = (L/2)·(1+b²)/(2|b|)`，
    /// 圆心位于弦中点沿左法线方向偏移 `h` 处。
    pub fn bulge_to_arc(start: Point2, end: Point2, bulge: f64) -> Option<BulgeArc> {
        if !bulge.is_finite() || bulge.abs() <= BULGE_EPSILON {
            return None;
        }
        let chord = end.as_vec2() - start.as_vec2();
        let length = chord.length();
        if length <= f64::EPSILON {
            return None;
        }
        let half = length / 2.0;
        let offset = half * (1.0 - bulge * bulge) / (2.0 * bulge);
        let radius = half * (1.0 + bulge * bulge) / (2.0 * bulge.abs());
        let normal = DVec2::new(-chord.y, chord.x) / length;
        let midpoint = (start.as_vec2() + end.as_vec2()) * 0.5;
        let center = midpoint + normal * offset;

        let start_dir = start.as_vec2() - center;
        let end_dir = end.as_vec2() - center;
        Some(BulgeArc {
            center: Point2::from_vec(center),
            radius,
            start_angle: start_dir.y.atan2(start_dir.x),
            end_angle: end_dir.y.atan2(end_dir.x),
            sweep: 4.0 * bulge.atan(),
        })
    }

    #[inline]
    pub fn point_on_circle(center: Point2, radius: f64, angle: f64) -> Point2 {
        center.translate(Vector2::new(radius * angle.cos(), radius * angle.sin()))
    }

}

pub mod document {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::color::ColorSource;
    use crate::geometry::{Bounds2D, Point2, Vector2, bulge_to_arc};

    /// 用户绘制实体所在的图层。
    pub const USER_DRAWING_LAYER: &str = "User Drawing";

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl fmt::Display for EntityId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        /// ACI 颜色索引；超出 1..=255 时视为借道存放的真彩色。
        pub color: Option<i32>,
        pub true_color: Option<u32>,
        /// DXF 中颜色索引为负表示图层关闭。仅作记录，实体照常绘制与拾取。
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                color: None,
                true_color: None,
                is_visible: true,
            }
        }

        #[inline]
        pub fn color_source(&self) -> ColorSource {
            ColorSource {
                index: self.color,
                true_color: self.true_color,
            }
        }
    }

    /// 对外暴露的实体类型标签，与交换格式中的类型名一一对应。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum EntityKind {
        Line,
        Circle,
        Arc,
        LwPolyline,
        Polyline,
        Rectangle,
    }

    impl EntityKind {
        pub fn as_str(self) -> &'static str {
            match self {
                EntityKind::Line => "LINE",
                EntityKind::Circle => "CIRCLE",
                EntityKind::Arc => "ARC",
                EntityKind::LwPolyline => "LWPOLYLINE",
                EntityKind::Polyline => "POLYLINE",
                EntityKind::Rectangle => "RECTANGLE",
            }
        }

        pub fn from_name(name: &str) -> Option<Self> {
            match name.trim().to_ascii_uppercase().as_str() {
                "LINE" => Some(EntityKind::Line),
                "CIRCLE" => Some(EntityKind::Circle),
                "ARC" => Some(EntityKind::Arc),
                "LWPOLYLINE" => Some(EntityKind::LwPolyline),
                "POLYLINE" => Some(EntityKind::Polyline),
                "RECTANGLE" => Some(EntityKind::Rectangle),
                _ => None,
            }
        }
    }

    impl fmt::Display for EntityKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
    }

    /// 圆弧实体，角度以度为单位，逆时针为正方向。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum PolylineKind {
        Lightweight,
        Heavy,
        Rectangle,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        /// 作用于本顶点到下一个顶点的线段。
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub kind: PolylineKind,
        pub vertices: Vec<PolylineVertex>,
    }

    impl Polyline {
        /// 首尾顶点 XY 完全重合即视为闭合。
        pub fn is_closed(&self) -> bool {
            match (self.vertices.first(), self.vertices.last()) {
                (Some(first), Some(last)) if self.vertices.len() >= 2 => {
                    first.position.x() == last.position.x()
                        && first.position.y() == last.position.y()
                }
                _ => false,
            }
        }

        /// 依次返回相邻顶点构成的线段（起点、终点、凸度）。
        pub fn segments(&self) -> impl Iterator<Item = (Point2, Point2, f64)> + '_ {
            self.vertices
                .windows(2)
                .map(|pair| (pair[0].position, pair[1].position, pair[0].bulge))
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Shape {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Polyline(Polyline),
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Entity {
        pub layer: String,
        pub color: Option<i32>,
        pub true_color: Option<u32>,
        pub shape: Shape,
    }

    impl Entity {
        pub fn new(shape: Shape, layer: impl Into<String>) -> Self {
            Self {
                layer: layer.into(),
                color: None,
                true_color: None,
                shape,
            }
        }

        pub fn line(start: Point2, end: Point2, layer: impl Into<String>) -> Self {
            Self::new(Shape::Line(Line { start, end }), layer)
        }

        pub fn circle(center: Point2, radius: f64, layer: impl Into<String>) -> Self {
            Self::new(Shape::Circle(Circle { center, radius }), layer)
        }

        pub fn arc(
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> Self {
            Self::new(
                Shape::Arc(Arc {
                    center,
                    radius,
                    start_angle,
                    end_angle,
                }),
                layer,
            )
        }

        pub fn polyline<I>(kind: PolylineKind, vertices: I, layer: impl Into<String>) -> Self
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            Self::new(
                Shape::Polyline(Polyline {
                    kind,
                    vertices: vertices.into_iter().collect(),
                }),
                layer,
            )
        }

        #[inline]
        pub fn with_color(mut self, color: i32) -> Self {
            self.color = Some(color);
            self
        }

        #[inline]
        pub fn with_true_color(mut self, true_color: u32) -> Self {
            self.true_color = Some(true_color);
            self
        }

        pub fn kind(&self) -> EntityKind {
            match &self.shape {
                Shape::Line(_) => EntityKind::Line,
                Shape::Circle(_) => EntityKind::Circle,
                Shape::Arc(_) => EntityKind::Arc,
                Shape::Polyline(polyline) => match polyline.kind {
                    PolylineKind::Lightweight => EntityKind::LwPolyline,
                    PolylineKind::Heavy => EntityKind::Polyline,
                    PolylineKind::Rectangle => EntityKind::Rectangle,
                },
            }
        }

        #[inline]
        pub fn layer_name(&self) -> &str {
            &self.layer
        }

        #[inline]
        pub fn color_source(&self) -> ColorSource {
            ColorSource {
                index: self.color,
                true_color: self.true_color,
            }
        }

        /// 几何字段是否满足类型要求（多段线至少两个顶点、半径非负且有限）。
        pub fn is_well_formed(&self) -> bool {
            match &self.shape {
                Shape::Line(_) => true,
                Shape::Circle(circle) => circle.radius.is_finite() && circle.radius >= 0.0,
                Shape::Arc(arc) => {
                    arc.radius.is_finite()
                        && arc.radius >= 0.0
                        && arc.start_angle.is_finite()
                        && arc.end_angle.is_finite()
                }
                Shape::Polyline(polyline) => polyline.vertices.len() >= 2,
            }
        }

        /// 选中单个实体时显示控制柄的定义点。
        pub fn defining_points(&self) -> Vec<Point2> {
            match &self.shape {
                Shape::Line(line) => vec![line.start, line.end],
                Shape::Circle(circle) => vec![circle.center],
                Shape::Arc(arc) => vec![arc.center],
                Shape::Polyline(polyline) => {
                    polyline.vertices.iter().map(|vertex| vertex.position).collect()
                }
            }
        }

        /// 圆与圆弧按圆心 ± 半径估算；多段线额外包含凸度圆弧的外凸部分。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match &self.shape {
                Shape::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                Shape::Circle(Circle { center, radius })
                | Shape::Arc(Arc { center, radius, .. }) => {
                    let radius = radius.abs();
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                Shape::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(vertex.position);
                    }
                    for (start, end, bulge) in polyline.segments() {
                        if let Some(arc) = bulge_to_arc(start, end, bulge) {
                            arc.include_in(&mut bounds);
                        }
                    }
                }
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        /// 平移实体的所有坐标，用于导入时的重定心。
        pub fn translate(&mut self, offset: Vector2) {
            match &mut self.shape {
                Shape::Line(line) => {
                    line.start = line.start.translate(offset);
                    line.end = line.end.translate(offset);
                }
                Shape::Circle(circle) => circle.center = circle.center.translate(offset),
                Shape::Arc(arc) => arc.center = arc.center.translate(offset),
                Shape::Polyline(polyline) => {
                    for vertex in &mut polyline.vertices {
                        vertex.position = vertex.position.translate(offset);
                    }
                }
            }
        }
    }

    /// 图纸：实体按绘制顺序排列，图层按插入顺序保存且不重复。
    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Drawing {
        layers: Vec<Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Drawing {
        pub fn new() -> Self {
            Self::default()
        }

        /// 画布清空后的初始图纸：无实体，仅包含用户绘图图层。
        pub fn with_user_layer() -> Self {
            let mut drawing = Self::new();
            drawing.ensure_layer(USER_DRAWING_LAYER);
            drawing
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) -> &mut Layer {
            let key = name.as_ref();
            let index = match self.layers.iter().position(|layer| layer.name == key) {
                Some(index) => index,
                None => {
                    self.layers.push(Layer::new(key));
                    self.layers.len() - 1
                }
            };
            &mut self.layers[index]
        }

        /// 将图层移动到列表最前（最近使用优先），不存在时创建。
        pub fn promote_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            let layer = match self.layers.iter().position(|layer| layer.name == key) {
                Some(index) => self.layers.remove(index),
                None => Layer::new(key),
            };
            self.layers.insert(0, layer);
        }

        pub fn set_layer_colors(
            &mut self,
            name: impl AsRef<str>,
            color: Option<i32>,
            true_color: Option<u32>,
        ) {
            let layer = self.ensure_layer(name);
            layer.color = color;
            layer.true_color = true_color;
        }

        #[inline]
        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers.iter().find(|layer| layer.name == name)
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.iter()
        }

        pub fn layer_names(&self) -> Vec<&str> {
            self.layers.iter().map(|layer| layer.name.as_str()).collect()
        }

        /// 追加实体并分配新的 ID，ID 单调递增且不会复用。
        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(&entity.layer);
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        pub fn add_line(&mut self, start: Point2, end: Point2, layer: impl Into<String>) -> EntityId {
            self.add_entity(Entity::line(start, end, layer))
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::circle(center, radius, layer))
        }

        pub fn add_polyline<I>(
            &mut self,
            kind: PolylineKind,
            vertices: I,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            self.add_entity(Entity::polyline(kind, vertices, layer))
        }

        #[inline]
        pub fn entities(&self) -> impl DoubleEndedIterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.entities.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.entities.is_empty()
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
            self.entities
                .iter_mut()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        #[inline]
        pub fn contains(&self, id: EntityId) -> bool {
            self.entity(id).is_some()
        }

        /// 修改实体所在图层，返回实体是否存在。
        pub fn set_entity_layer(&mut self, id: EntityId, layer: impl Into<String>) -> bool {
            let layer = layer.into();
            self.ensure_layer(&layer);
            match self.entity_mut(id) {
                Some(entity) => {
                    entity.layer = layer;
                    true
                }
                None => false,
            }
        }

        /// 图层面板使用：返回指定图层上的实体。
        pub fn entities_on_layer<'a>(
            &'a self,
            layer: &'a str,
        ) -> impl Iterator<Item = &'a (EntityId, Entity)> + 'a {
            self.entities
                .iter()
                .filter(move |(_, entity)| entity.layer == layer)
        }

        #[inline]
        pub fn entity_bounds(&self, id: EntityId) -> Option<Bounds2D> {
            self.entity(id).and_then(Entity::bounds)
        }

        /// 覆盖全部实体的包围盒；没有实体时退化为 ±50 单位方框。
        pub fn bounds(&self) -> Bounds2D {
            let mut bounds = Bounds2D::empty();
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                }
            }
            if bounds.is_empty() {
                Bounds2D::fallback()
            } else {
                bounds
            }
        }

        /// 用较早的副本替换当前内容。ID 计数器只进不退，
        /// 回退之后新增的实体不会拿到已经发出过的 ID。
        pub fn restore(&mut self, earlier: Drawing) {
            let next_entity_id = self.next_entity_id.max(earlier.next_entity_id);
            *self = earlier;
            self.next_entity_id = next_entity_id;
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn drawing_stores_entities_and_layers_in_order() {
            let mut drawing = Drawing::new();
            let line = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "A");
            let circle = drawing.add_circle(Point2::new(5.0, 5.0), 2.0, "B");
            let again = drawing.add_line(Point2::new(1.0, 1.0), Point2::new(2.0, 2.0), "A");

            assert_eq!(line.get(), 0);
            assert_eq!(circle.get(), 1);
            assert_eq!(again.get(), 2);
            assert_eq!(drawing.layer_names(), vec!["A", "B"]);
            assert_eq!(drawing.len(), 3);
            assert_eq!(drawing.entities_on_layer("A").count(), 2);

            match drawing.entity(circle).map(|entity| &entity.shape) {
                Some(Shape::Circle(circle)) => assert!((circle.radius - 2.0).abs() < f64::EPSILON),
                other => panic!("unexpected entity lookup result: {other:?}"),
            }
        }

        #[test]
        fn restoring_an_earlier_copy_never_rewinds_ids() {
            let mut drawing = Drawing::new();
            drawing.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "A");
            let earlier = drawing.clone();
            let issued = drawing.add_circle(Point2::new(0.0, 0.0), 1.0, "B");

            drawing.restore(earlier);
            assert_eq!(drawing.len(), 1);
            assert!(drawing.layer("B").is_none());
            let next = drawing.add_line(Point2::new(0.0, 1.0), Point2::new(1.0, 1.0), "A");
            assert_ne!(next, issued);
            assert_eq!(next.get(), 2);
        }

        #[test]
        fn promote_layer_moves_to_front_without_duplicates() {
            let mut drawing = Drawing::new();
            drawing.ensure_layer("A");
            drawing.ensure_layer("B");
            drawing.ensure_layer("C");

            drawing.promote_layer("C");
            assert_eq!(drawing.layer_names(), vec!["C", "A", "B"]);

            drawing.promote_layer("RoadEdge");
            assert_eq!(drawing.layer_names(), vec!["RoadEdge", "C", "A", "B"]);
        }

        #[test]
        fn empty_drawing_bounds_fall_back_to_fixed_box() {
            let drawing = Drawing::with_user_layer();
            let bounds = drawing.bounds();
            assert_eq!(bounds.min(), Point2::new(-50.0, -50.0));
            assert_eq!(bounds.max(), Point2::new(50.0, 50.0));
            assert!((bounds.width() - 100.0).abs() < f64::EPSILON);
            assert_eq!(drawing.layer_names(), vec![USER_DRAWING_LAYER]);
        }

        #[test]
        fn circle_and_arc_bounds_use_full_radius() {
            let mut drawing = Drawing::new();
            drawing.add_entity(Entity::arc(Point2::new(0.0, 0.0), 2.0, 0.0, 90.0, "A"));
            drawing.add_circle(Point2::new(10.0, 0.0), 1.0, "A");
            let bounds = drawing.bounds();
            assert_eq!(bounds.min(), Point2::new(-2.0, -2.0));
            assert_eq!(bounds.max(), Point2::new(11.0, 2.0));
            let center = bounds.center();
            assert!((center.x() - 4.5).abs() < 1e-9);
            assert!((bounds.height() - 4.0).abs() < 1e-9);
        }

        #[test]
        fn closed_polyline_detection_uses_first_and_last_vertex() {
            let square = [
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(0.0, 0.0),
            ];
            let entity = Entity::polyline(
                PolylineKind::Lightweight,
                square.into_iter().map(PolylineVertex::new),
                "A",
            );
            let Shape::Polyline(polyline) = &entity.shape else {
                panic!("expected polyline");
            };
            assert!(polyline.is_closed());
            assert_eq!(polyline.segments().count(), 3);
            assert_eq!(entity.kind(), EntityKind::LwPolyline);
        }

        #[test]
        fn set_entity_layer_registers_layer() {
            let mut drawing = Drawing::new();
            let id = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "A");
            assert!(drawing.set_entity_layer(id, "Drive1"));
            assert_eq!(drawing.entity(id).unwrap().layer, "Drive1");
            assert!(drawing.layer("Drive1").is_some());
            assert!(!drawing.set_entity_layer(EntityId::new(99), "X"));
        }

        #[test]
        fn entity_kind_names_round_trip() {
            for kind in [
                EntityKind::Line,
                EntityKind::Circle,
                EntityKind::Arc,
                EntityKind::LwPolyline,
                EntityKind::Polyline,
                EntityKind::Rectangle,
            ] {
                assert_eq!(EntityKind::from_name(kind.as_str()), Some(kind));
            }
            assert_eq!(EntityKind::from_name("SPLINE"), None);
        }
    }
}
