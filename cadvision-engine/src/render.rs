//! 把图纸投影为屏幕空间的显示列表，供任意绘图后端消费。
//!
//! 这里只做投影与样式选择；凸度圆弧与拾取共用 [`bulge_to_arc`]，保证所见即所点。

use cadvision_core::color::{Rgb, resolve_color};
use cadvision_core::document::{Drawing, Entity, EntityId, Shape};
use cadvision_core::geometry::{Point2, bulge_to_arc};
use glam::DVec2;

use crate::Selection;
use crate::grid::{GridLines, GridSpacing, grid_lines};
use crate::picking::normalized_span;
use crate::viewport::{CanvasSize, ViewportState};

pub const SELECTED_STROKE_PX: f64 = 3.0;
pub const HOVER_STROKE_PX: f64 = 2.0;
pub const NORMAL_STROKE_PX: f64 = 1.2;
pub const GHOST_STROKE_PX: f64 = 1.5;
pub const HANDLE_HALF_SIZE_PX: f64 = 3.5;

pub const SELECTION_COLOR: Rgb = Rgb(0x3B82F6);
pub const HOVER_COLOR: Rgb = Rgb(0xFFFFFF);
pub const GHOST_ALPHA: u8 = 0xAA;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Normal,
    Hovered,
    Selected,
    Ghost,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgb,
    pub alpha: u8,
    pub width: f64,
    pub dashed: bool,
}

/// 屏幕坐标（Y 向下）下的绘制图元。
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Path(Vec<PathCommand>),
    Circle {
        center: DVec2,
        radius: f64,
    },
    /// `anticlockwise` 与 Canvas 2D `arc()` 的同名参数一致。
    Arc {
        center: DVec2,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        anticlockwise: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathCommand {
    MoveTo(DVec2),
    LineTo(DVec2),
    /// 圆弧段，终点即圆弧终点。
    ArcTo {
        center: DVec2,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        anticlockwise: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub id: Option<EntityId>,
    pub state: ItemState,
    pub stroke: Stroke,
    pub primitive: Primitive,
    /// 控制柄中心（屏幕坐标），仅单选时非空。
    pub handles: Vec<DVec2>,
}

/// 画布状态栏内容。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusLine {
    pub cursor: Option<Point2>,
    pub visible_x: (f64, f64),
    pub grid_step: f64,
    pub scale: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub minor_grid: GridLines,
    pub major_grid: GridLines,
    /// 世界原点所在的屏幕位置（坐标轴）。
    pub origin: DVec2,
    pub items: Vec<DrawItem>,
    pub status: StatusLine,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub drawing: &'a Drawing,
    pub viewport: &'a ViewportState,
    pub canvas: CanvasSize,
    pub selection: &'a Selection,
    pub hover: Option<EntityId>,
    pub ghost: Option<&'a Entity>,
    pub cursor: Option<Point2>,
    pub grid_min_pixels: f64,
}

pub fn render_frame(input: &RenderInput<'_>) -> Frame {
    let viewport = input.viewport;
    let spacing = GridSpacing::for_viewport(viewport, input.grid_min_pixels);
    let single_selection = (input.selection.len() == 1)
        .then(|| input.selection.iter().next().copied())
        .flatten();

    let mut items = Vec::with_capacity(input.drawing.len() + 1);
    for (id, entity) in input.drawing.entities() {
        let Some(primitive) = project(entity, viewport) else {
            continue;
        };
        let state = if input.selection.contains(id) {
            ItemState::Selected
        } else if input.hover == Some(*id) {
            ItemState::Hovered
        } else {
            ItemState::Normal
        };
        let handles = if single_selection == Some(*id) {
            entity
                .defining_points()
                .into_iter()
                .map(|point| viewport.world_to_screen(point))
                .collect()
        } else {
            Vec::new()
        };
        items.push(DrawItem {
            id: Some(*id),
            state,
            stroke: stroke_for(state, entity, input.drawing),
            primitive,
            handles,
        });
    }

    if let Some(ghost) = input.ghost
        && let Some(primitive) = project(ghost, viewport)
    {
        items.push(DrawItem {
            id: None,
            state: ItemState::Ghost,
            stroke: stroke_for(ItemState::Ghost, ghost, input.drawing),
            primitive,
            handles: Vec::new(),
        });
    }

    Frame {
        minor_grid: grid_lines(viewport, input.canvas, spacing.minor),
        major_grid: grid_lines(viewport, input.canvas, spacing.major),
        origin: viewport.world_to_screen(Point2::new(0.0, 0.0)),
        items,
        status: StatusLine {
            cursor: input.cursor,
            visible_x: viewport.visible_x_range(input.canvas),
            grid_step: spacing.minor,
            scale: viewport.scale(),
        },
    }
}

fn stroke_for(state: ItemState, entity: &Entity, drawing: &Drawing) -> Stroke {
    let (color, width, alpha, dashed) = match state {
        ItemState::Selected => (SELECTION_COLOR, SELECTED_STROKE_PX, 0xFF, false),
        ItemState::Hovered => (HOVER_COLOR, HOVER_STROKE_PX, 0xFF, false),
        ItemState::Ghost => (SELECTION_COLOR, GHOST_STROKE_PX, GHOST_ALPHA, true),
        ItemState::Normal => {
            let layer = drawing
                .layer(&entity.layer)
                .map(|layer| layer.color_source())
                .unwrap_or_default();
            (
                resolve_color(entity.color_source(), layer),
                NORMAL_STROKE_PX,
                0xFF,
                false,
            )
        }
    };
    Stroke {
        color,
        alpha,
        width,
        dashed,
    }
}

/// 把实体投影到屏幕。几何不完整的实体返回 `None` 并被跳过。
pub fn project(entity: &Entity, viewport: &ViewportState) -> Option<Primitive> {
    if !entity.is_well_formed() {
        return None;
    }
    let primitive = match &entity.shape {
        Shape::Line(line) => Primitive::Path(vec![
            PathCommand::MoveTo(viewport.world_to_screen(line.start)),
            PathCommand::LineTo(viewport.world_to_screen(line.end)),
        ]),
        Shape::Circle(circle) => Primitive::Circle {
            center: viewport.world_to_screen(circle.center),
            radius: viewport.world_to_pixels(circle.radius),
        },
        Shape::Arc(arc) => {
            // 世界逆时针 → 屏幕角度取反后递减
            let start = arc.start_angle.to_radians();
            let span = normalized_span(arc.start_angle, arc.end_angle).to_radians();
            Primitive::Arc {
                center: viewport.world_to_screen(arc.center),
                radius: viewport.world_to_pixels(arc.radius),
                start_angle: -start,
                end_angle: -(start + span),
                anticlockwise: true,
            }
        }
        Shape::Polyline(polyline) => {
            let first = polyline.vertices.first()?;
            let mut commands = Vec::with_capacity(polyline.vertices.len());
            commands.push(PathCommand::MoveTo(viewport.world_to_screen(first.position)));
            for (start, end, bulge) in polyline.segments() {
                match bulge_to_arc(start, end, bulge) {
                    Some(arc) => commands.push(PathCommand::ArcTo {
                        center: viewport.world_to_screen(arc.center),
                        radius: viewport.world_to_pixels(arc.radius),
                        start_angle: -arc.start_angle,
                        end_angle: -(arc.start_angle + arc.sweep),
                        anticlockwise: arc.is_counter_clockwise(),
                    }),
                    None => commands.push(PathCommand::LineTo(viewport.world_to_screen(end))),
                }
            }
            Primitive::Path(commands)
        }
    };
    Some(primitive)
}

#[cfg(test)]
mod tests {
    use cadvision_core::document::{PolylineKind, PolylineVertex};

    use super::*;
    use crate::viewport::ScaleLimits;

    fn viewport() -> ViewportState {
        ViewportState::new(10.0, DVec2::new(100.0, 100.0), ScaleLimits::default())
    }

    fn input<'a>(
        drawing: &'a Drawing,
        viewport: &'a ViewportState,
        selection: &'a Selection,
    ) -> RenderInput<'a> {
        RenderInput {
            drawing,
            viewport,
            canvas: CanvasSize::new(200.0, 200.0),
            selection,
            hover: None,
            ghost: None,
            cursor: None,
            grid_min_pixels: 20.0,
        }
    }

    #[test]
    fn handles_only_for_single_selection() {
        let mut drawing = Drawing::new();
        let a = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "A");
        let b = drawing.add_circle(Point2::new(2.0, 2.0), 1.0, "A");
        let viewport = viewport();

        let single: Selection = [a].into_iter().collect();
        let frame = render_frame(&input(&drawing, &viewport, &single));
        assert_eq!(frame.items[0].state, ItemState::Selected);
        assert_eq!(
            frame.items[0].handles,
            vec![DVec2::new(100.0, 100.0), DVec2::new(110.0, 100.0)]
        );
        assert!(frame.items[1].handles.is_empty());

        let both: Selection = [a, b].into_iter().collect();
        let frame = render_frame(&input(&drawing, &viewport, &both));
        assert!(frame.items.iter().all(|item| item.handles.is_empty()));
        assert!(frame.items.iter().all(|item| item.stroke.width == SELECTED_STROKE_PX));
    }

    #[test]
    fn hover_and_normal_styles() {
        let mut drawing = Drawing::new();
        let a = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "A");
        drawing.add_entity(Entity::line(Point2::new(0.0, 1.0), Point2::new(1.0, 1.0), "A").with_color(1));
        let viewport = viewport();
        let selection = Selection::new();
        let mut render_input = input(&drawing, &viewport, &selection);
        render_input.hover = Some(a);

        let frame = render_frame(&render_input);
        assert_eq!(frame.items[0].state, ItemState::Hovered);
        assert_eq!(frame.items[0].stroke.color, HOVER_COLOR);
        assert_eq!(frame.items[1].stroke.color, Rgb(0xFF0000));
        assert_eq!(frame.items[1].stroke.width, NORMAL_STROKE_PX);
    }

    #[test]
    fn bulge_segment_becomes_screen_arc() {
        let entity = Entity::polyline(
            PolylineKind::Lightweight,
            [
                PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 1.0),
                PolylineVertex::new(Point2::new(10.0, 0.0)),
            ],
            "A",
        );
        let Some(Primitive::Path(commands)) = project(&entity, &viewport()) else {
            panic!("polyline should project to a path");
        };
        assert_eq!(commands[0], PathCommand::MoveTo(DVec2::new(100.0, 100.0)));
        match commands[1] {
            PathCommand::ArcTo {
                center,
                radius,
                anticlockwise,
                ..
            } => {
                assert!((center - DVec2::new(150.0, 100.0)).length() < 1e-9);
                assert!((radius - 50.0).abs() < 1e-9);
                assert!(anticlockwise);
            }
            ref other => panic!("expected arc, got {other:?}"),
        }
    }

    #[test]
    fn ghost_is_dashed_and_last() {
        let drawing = Drawing::with_user_layer();
        let ghost = Entity::circle(Point2::new(0.0, 0.0), 2.0, "User Drawing");
        let viewport = viewport();
        let selection = Selection::new();
        let mut render_input = input(&drawing, &viewport, &selection);
        render_input.ghost = Some(&ghost);

        let frame = render_frame(&render_input);
        let last = frame.items.last().expect("ghost item");
        assert_eq!(last.state, ItemState::Ghost);
        assert!(last.stroke.dashed);
        assert_eq!(last.stroke.alpha, GHOST_ALPHA);
        assert_eq!(frame.origin, DVec2::new(100.0, 100.0));
        assert!((frame.status.grid_step - 5.0).abs() < 1e-9);
    }

    #[test]
    fn entities_on_switched_off_layers_still_draw() {
        let mut drawing = Drawing::new();
        drawing.ensure_layer("Off").is_visible = false;
        drawing.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "Off");
        let viewport = viewport();
        let selection = Selection::new();
        let frame = render_frame(&input(&drawing, &viewport, &selection));
        assert_eq!(frame.items.len(), 1);
        assert_eq!(frame.items[0].state, ItemState::Normal);
    }

    #[test]
    fn malformed_entities_are_skipped() {
        let mut drawing = Drawing::new();
        drawing.add_polyline(PolylineKind::Heavy, Vec::new(), "A");
        drawing.add_circle(Point2::new(0.0, 0.0), 1.0, "A");
        let viewport = viewport();
        let selection = Selection::new();
        let frame = render_frame(&input(&drawing, &viewport, &selection));
        assert_eq!(frame.items.len(), 1);
    }
}
