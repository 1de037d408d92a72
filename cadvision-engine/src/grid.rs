//! 自适应网格间距：1-2-5-10 递进，主网格为次网格的 5 倍。

use cadvision_core::geometry::Point2;
use glam::DVec2;

use crate::viewport::{CanvasSize, ViewportState};

pub const DEFAULT_GRID_MIN_PIXELS: f64 = 20.0;
pub const MAJOR_GRID_MULTIPLIER: f64 = 5.0;
/// 单方向网格线数量上限，防止极端参数下生成过多线条。
const MAX_LINES_PER_AXIS: usize = 2_000;

/// 由像素间距下限推导“整洁”的世界网格步长。
pub fn grid_step(scale: f64, min_pixels: f64) -> f64 {
    let world_units = min_pixels / scale;
    if !world_units.is_finite() || world_units <= 0.0 {
        return 1.0;
    }
    let base = 10f64.powf(world_units.log10().floor());
    let ratio = world_units / base;
    if ratio < 2.0 {
        base * 2.0
    } else if ratio < 5.0 {
        base * 5.0
    } else {
        base * 10.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpacing {
    pub minor: f64,
    pub major: f64,
}

impl GridSpacing {
    pub fn for_viewport(viewport: &ViewportState, min_pixels: f64) -> Self {
        let minor = grid_step(viewport.scale(), min_pixels);
        Self {
            minor,
            major: minor * MAJOR_GRID_MULTIPLIER,
        }
    }
}

/// 屏幕坐标下的网格线位置。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridLines {
    /// 竖线的屏幕 x。
    pub vertical: Vec<f64>,
    /// 横线的屏幕 y。
    pub horizontal: Vec<f64>,
}

/// 计算覆盖整个画布的网格线。
pub fn grid_lines(viewport: &ViewportState, canvas: CanvasSize, step: f64) -> GridLines {
    if !step.is_finite() || step <= 0.0 {
        return GridLines::default();
    }
    let top_left = viewport.screen_to_world(DVec2::ZERO);
    let bottom_right = viewport.screen_to_world(DVec2::new(canvas.width, canvas.height));

    let vertical = world_positions(top_left.x(), bottom_right.x(), step)
        .map(|x| viewport.world_to_screen(Point2::new(x, 0.0)).x)
        .collect();
    let horizontal = world_positions(bottom_right.y(), top_left.y(), step)
        .map(|y| viewport.world_to_screen(Point2::new(0.0, y)).y)
        .collect();
    GridLines {
        vertical,
        horizontal,
    }
}

fn world_positions(from: f64, to: f64, step: f64) -> impl Iterator<Item = f64> {
    let first = (from / step).floor() as i64;
    let last = (to / step).ceil() as i64;
    (first..=last)
        .take(MAX_LINES_PER_AXIS)
        .map(move |index| index as f64 * step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::ScaleLimits;

    fn mantissa(step: f64) -> f64 {
        step / 10f64.powf(step.log10().floor())
    }

    #[test]
    fn steps_follow_one_two_five_progression() {
        assert!((grid_step(1.0, 20.0) - 50.0).abs() < 1e-9);
        assert!((grid_step(10.0, 20.0) - 5.0).abs() < 1e-9);
        assert!((grid_step(20.0, 20.0) - 2.0).abs() < 1e-9);
        assert!((grid_step(4.0, 20.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn step_is_always_nice_and_wider_than_minimum() {
        let mut scale = 0.000_37;
        while scale < 150_000.0 {
            let step = grid_step(scale, DEFAULT_GRID_MIN_PIXELS);
            let m = mantissa(step);
            let nice = [1.0, 2.0, 5.0, 10.0]
                .iter()
                .any(|candidate| (m - candidate).abs() < 1e-6);
            assert!(nice, "scale={scale} step={step}");
            assert!(step * scale >= DEFAULT_GRID_MIN_PIXELS - 1e-6);
            scale *= 1.37;
        }
    }

    #[test]
    fn degenerate_inputs_fall_back() {
        assert_eq!(grid_step(1.0, 0.0), 1.0);
        assert_eq!(grid_step(1.0, f64::NAN), 1.0);
    }

    #[test]
    fn major_is_five_times_minor() {
        let viewport = ViewportState::new(10.0, DVec2::ZERO, ScaleLimits::default());
        let spacing = GridSpacing::for_viewport(&viewport, DEFAULT_GRID_MIN_PIXELS);
        assert!((spacing.major - spacing.minor * 5.0).abs() < 1e-12);
    }

    #[test]
    fn grid_lines_cover_canvas() {
        let viewport = ViewportState::new(10.0, DVec2::new(50.0, 50.0), ScaleLimits::default());
        let canvas = CanvasSize::new(100.0, 100.0);
        let lines = grid_lines(&viewport, canvas, 5.0);
        // 世界 x ∈ [-5, 5] → 屏幕 0, 50, 100
        assert_eq!(lines.vertical, vec![0.0, 50.0, 100.0]);
        assert_eq!(lines.horizontal.len(), 3);
        assert!(lines.horizontal.contains(&50.0));
        assert!(grid_lines(&viewport, canvas, 0.0).vertical.is_empty());
    }
}
