//! 绘图工具：两次点击生成直线、圆或矩形。

use std::fmt;

use cadvision_core::document::{Entity, PolylineKind, PolylineVertex, USER_DRAWING_LAYER};
use cadvision_core::geometry::Point2;
use tracing::debug;

/// 用户绘制实体使用的强调色（ACI 4，青色）。
pub const USER_ACCENT_COLOR: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawingTool {
    #[default]
    Select,
    Pan,
    Line,
    Circle,
    Rectangle,
}

impl DrawingTool {
    const ALL: [DrawingTool; 5] = [
        DrawingTool::Select,
        DrawingTool::Pan,
        DrawingTool::Line,
        DrawingTool::Circle,
        DrawingTool::Rectangle,
    ];

    /// 该工具是否通过点击创建实体。
    #[inline]
    pub fn creates_entities(self) -> bool {
        matches!(
            self,
            DrawingTool::Line | DrawingTool::Circle | DrawingTool::Rectangle
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DrawingTool::Select => "select",
            DrawingTool::Pan => "pan",
            DrawingTool::Line => "line",
            DrawingTool::Circle => "circle",
            DrawingTool::Rectangle => "rectangle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for DrawingTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次点击的处理结果。
#[derive(Debug, Clone, PartialEq)]
pub enum ToolClick {
    /// 当前工具不创建实体。
    Ignored,
    /// 已锁定第一点，等待第二次点击。
    Anchored(Point2),
    /// 第二次点击完成，生成新实体（尚未加入图纸）。
    Completed(Entity),
}

#[derive(Debug, Clone, Default)]
pub struct ToolController {
    tool: DrawingTool,
    anchor: Option<Point2>,
}

impl ToolController {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn tool(&self) -> DrawingTool {
        self.tool
    }

    /// 正在等待第二点时返回锚点。
    #[inline]
    pub fn anchor(&self) -> Option<Point2> {
        self.anchor
    }

    #[inline]
    pub fn is_awaiting_second_point(&self) -> bool {
        self.anchor.is_some()
    }

    /// 切换工具总会丢弃未完成的锚点。
    pub fn set_tool(&mut self, tool: DrawingTool) {
        if self.anchor.take().is_some() {
            debug!(from = %self.tool, to = %tool, "切换工具，丢弃未完成的绘制");
        }
        self.tool = tool;
    }

    /// 取消未完成的绘制，返回是否确有状态被取消。
    pub fn cancel(&mut self) -> bool {
        self.anchor.take().is_some()
    }

    pub fn click(&mut self, world: Point2) -> ToolClick {
        if !self.tool.creates_entities() {
            return ToolClick::Ignored;
        }
        match self.anchor.take() {
            None => {
                self.anchor = Some(world);
                ToolClick::Anchored(world)
            }
            Some(anchor) => {
                let entity = build_entity(self.tool, anchor, world);
                debug!(tool = %self.tool, kind = %entity.kind(), "完成绘制");
                ToolClick::Completed(entity)
            }
        }
    }

    /// 以当前光标位置预览将要生成的实体。
    pub fn ghost(&self, cursor: Point2) -> Option<Entity> {
        let anchor = self.anchor?;
        self.tool
            .creates_entities()
            .then(|| build_entity(self.tool, anchor, cursor))
    }
}

fn build_entity(tool: DrawingTool, anchor: Point2, cursor: Point2) -> Entity {
    let entity = match tool {
        DrawingTool::Circle => Entity::circle(anchor, anchor.distance(cursor), USER_DRAWING_LAYER),
        DrawingTool::Rectangle => {
            let corners = [
                anchor,
                Point2::new(cursor.x(), anchor.y()),
                cursor,
                Point2::new(anchor.x(), cursor.y()),
                anchor,
            ];
            Entity::polyline(
                PolylineKind::Rectangle,
                corners.into_iter().map(PolylineVertex::new),
                USER_DRAWING_LAYER,
            )
        }
        _ => Entity::line(anchor, cursor, USER_DRAWING_LAYER),
    };
    entity.with_color(USER_ACCENT_COLOR)
}

#[cfg(test)]
mod tests {
    use cadvision_core::document::{EntityKind, Shape};

    use super::*;

    #[test]
    fn two_clicks_create_a_line() {
        let mut tools = ToolController::new();
        tools.set_tool(DrawingTool::Line);
        assert_eq!(
            tools.click(Point2::new(1.0, 2.0)),
            ToolClick::Anchored(Point2::new(1.0, 2.0))
        );
        let ToolClick::Completed(entity) = tools.click(Point2::new(4.0, 6.0)) else {
            panic!("second click should complete the line");
        };
        assert_eq!(entity.layer, USER_DRAWING_LAYER);
        assert_eq!(entity.color, Some(USER_ACCENT_COLOR));
        match entity.shape {
            Shape::Line(line) => {
                assert_eq!(line.start, Point2::new(1.0, 2.0));
                assert_eq!(line.end, Point2::new(4.0, 6.0));
            }
            other => panic!("unexpected shape {other:?}"),
        }
        assert!(!tools.is_awaiting_second_point());
    }

    #[test]
    fn circle_radius_is_anchor_distance() {
        let mut tools = ToolController::new();
        tools.set_tool(DrawingTool::Circle);
        tools.click(Point2::new(0.0, 0.0));
        let ghost = tools.ghost(Point2::new(3.0, 4.0)).expect("ghost while anchored");
        match ghost.shape {
            Shape::Circle(circle) => assert!((circle.radius - 5.0).abs() < 1e-12),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn rectangle_is_closed_five_vertex_polyline() {
        let mut tools = ToolController::new();
        tools.set_tool(DrawingTool::Rectangle);
        tools.click(Point2::new(0.0, 0.0));
        let ToolClick::Completed(entity) = tools.click(Point2::new(4.0, 3.0)) else {
            panic!("rectangle not completed");
        };
        assert_eq!(entity.kind(), EntityKind::Rectangle);
        let Shape::Polyline(polyline) = &entity.shape else {
            panic!("rectangle should be a polyline");
        };
        assert_eq!(polyline.vertices.len(), 5);
        assert!(polyline.is_closed());
        assert_eq!(polyline.vertices[2].position, Point2::new(4.0, 3.0));
    }

    #[test]
    fn switching_tool_or_cancel_drops_anchor() {
        let mut tools = ToolController::new();
        tools.set_tool(DrawingTool::Line);
        tools.click(Point2::new(0.0, 0.0));
        tools.set_tool(DrawingTool::Circle);
        assert!(tools.ghost(Point2::new(1.0, 1.0)).is_none());

        tools.click(Point2::new(0.0, 0.0));
        assert!(tools.cancel());
        assert!(!tools.cancel());
    }

    #[test]
    fn select_and_pan_ignore_clicks() {
        let mut tools = ToolController::new();
        assert_eq!(tools.click(Point2::new(1.0, 1.0)), ToolClick::Ignored);
        tools.set_tool(DrawingTool::Pan);
        assert_eq!(tools.click(Point2::new(1.0, 1.0)), ToolClick::Ignored);
        assert_eq!(DrawingTool::from_name(" Rectangle "), Some(DrawingTool::Rectangle));
        assert_eq!(DrawingTool::from_name("spline"), None);
    }
}
