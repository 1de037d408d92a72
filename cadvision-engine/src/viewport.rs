//! 世界坐标与屏幕像素之间的变换、以光标为锚点的缩放与平移。

use cadvision_core::geometry::Point2;
use glam::DVec2;

pub const DEFAULT_MIN_SCALE: f64 = 0.000_001;
pub const DEFAULT_MAX_SCALE: f64 = 200_000.0;
pub const DEFAULT_ZOOM_SENSITIVITY: f64 = 0.015;
/// 标准视图下画布宽度对应的世界单位。
pub const DEFAULT_TARGET_WORLD_WIDTH: f64 = 120.0;
/// 计算标准视图时画布尺寸的下限（像素）。
const MIN_CANVAS_EXTENT: f64 = 100.0;

/// 缩放比例（世界单位 → 像素）的允许区间。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLimits {
    pub min: f64,
    pub max: f64,
}

impl ScaleLimits {
    /// 构造区间；上下限颠倒时自动交换。
    pub fn new(min: f64, max: f64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    #[inline]
    pub fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.min, self.max)
    }
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_SCALE,
            max: DEFAULT_MAX_SCALE,
        }
    }
}

/// 画布像素尺寸。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    #[inline]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn center(&self) -> DVec2 {
        DVec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// 视口状态：`offset` 是世界原点所在的屏幕像素位置，`scale` 为每世界单位的像素数。
///
/// 所有修改方法都会把 `scale` 限制在 [`ScaleLimits`] 内，调用方无需自行钳制。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    scale: f64,
    offset: DVec2,
    limits: ScaleLimits,
}

impl ViewportState {
    pub fn new(scale: f64, offset: DVec2, limits: ScaleLimits) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            limits.clamp(scale)
        } else {
            limits.clamp(1.0)
        };
        Self {
            scale,
            offset,
            limits,
        }
    }

    /// 标准视图：画布宽度容纳 `target_world_width` 个世界单位，世界原点位于画布中心。
    pub fn standard(canvas: CanvasSize, target_world_width: f64, limits: ScaleLimits) -> Self {
        let width = canvas.width.max(MIN_CANVAS_EXTENT);
        let height = canvas.height.max(MIN_CANVAS_EXTENT);
        let target = if target_world_width > 0.0 {
            target_world_width
        } else {
            DEFAULT_TARGET_WORLD_WIDTH
        };
        Self::new(
            width / target,
            DVec2::new(width / 2.0, height / 2.0),
            limits,
        )
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[inline]
    pub fn offset(&self) -> DVec2 {
        self.offset
    }

    #[inline]
    pub fn limits(&self) -> ScaleLimits {
        self.limits
    }

    /// 世界 Y 轴向上、屏幕 Y 轴向下，因此 Y 分量取反。
    #[inline]
    pub fn world_to_screen(&self, point: Point2) -> DVec2 {
        DVec2::new(
            point.x() * self.scale + self.offset.x,
            -point.y() * self.scale + self.offset.y,
        )
    }

    #[inline]
    pub fn screen_to_world(&self, screen: DVec2) -> Point2 {
        Point2::new(
            (screen.x - self.offset.x) / self.scale,
            -(screen.y - self.offset.y) / self.scale,
        )
    }

    /// 屏幕像素长度换算为世界长度。
    #[inline]
    pub fn pixels_to_world(&self, pixels: f64) -> f64 {
        pixels / self.scale
    }

    #[inline]
    pub fn world_to_pixels(&self, length: f64) -> f64 {
        length * self.scale
    }

    /// 以屏幕点为锚缩放：缩放前位于该像素下的世界点，缩放后仍位于该像素下。
    pub fn zoom_at(&mut self, screen: DVec2, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let world = self.screen_to_world(screen);
        self.scale = self.limits.clamp(self.scale * factor);
        self.anchor(world, screen);
    }

    #[inline]
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.offset += DVec2::new(dx, dy);
    }

    /// 当前画布宽度下可见的世界 X 范围。
    pub fn visible_x_range(&self, canvas: CanvasSize) -> (f64, f64) {
        let left = -self.offset.x / self.scale;
        (left, left + canvas.width / self.scale)
    }

    /// 按滚轮事件缩放或平移。
    pub fn apply_wheel(&mut self, cursor: DVec2, event: WheelEvent, sensitivity: f64) {
        match event.action(sensitivity) {
            WheelAction::Zoom { factor } => self.zoom_at(cursor, factor),
            WheelAction::Pan { dx, dy } => self.pan_by(dx, dy),
        }
    }

    fn anchor(&mut self, world: Point2, screen: DVec2) {
        self.offset = DVec2::new(
            screen.x - world.x() * self.scale,
            screen.y + world.y() * self.scale,
        );
    }
}

/// 滚轮/触控板滚动事件，`modified` 对应 Ctrl 或捏合手势。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    pub delta_x: f64,
    pub delta_y: f64,
    pub modified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelAction {
    Zoom { factor: f64 },
    Pan { dx: f64, dy: f64 },
}

impl WheelEvent {
    /// 带修饰键或无水平分量的滚动视为缩放（指数响应），其余视为双轴平移。
    pub fn action(&self, sensitivity: f64) -> WheelAction {
        if self.modified || self.delta_x == 0.0 {
            WheelAction::Zoom {
                factor: (-self.delta_y * sensitivity).exp(),
            }
        } else {
            WheelAction::Pan {
                dx: -self.delta_x,
                dy: -self.delta_y,
            }
        }
    }
}

/// 双指捏合手势。每次移动都基于手势开始时的视口快照重新推导，避免误差累积。
#[derive(Debug, Clone, Copy)]
pub struct PinchGesture {
    start_viewport: ViewportState,
    start_distance: f64,
    anchor_world: Point2,
}

impl PinchGesture {
    /// 两指距离过小时无法计算比例，返回 `None`。
    pub fn begin(viewport: ViewportState, first: DVec2, second: DVec2) -> Option<Self> {
        let distance = first.distance(second);
        if distance <= f64::EPSILON {
            return None;
        }
        let center = (first + second) * 0.5;
        Some(Self {
            start_viewport: viewport,
            start_distance: distance,
            anchor_world: viewport.screen_to_world(center),
        })
    }

    /// 根据当前两指位置计算新的视口；手势中心的移动同时带来平移。
    pub fn update(&self, first: DVec2, second: DVec2) -> ViewportState {
        let ratio = first.distance(second) / self.start_distance;
        let mut next = self.start_viewport;
        if ratio.is_finite() && ratio > 0.0 {
            next.scale = next.limits.clamp(self.start_viewport.scale * ratio);
        }
        next.anchor(self.anchor_world, (first + second) * 0.5);
        next
    }

    #[inline]
    pub fn start_viewport(&self) -> ViewportState {
        self.start_viewport
    }
}
