use std::path::{Path, PathBuf};

use cadvision_config::ViewportConfig;
use cadvision_engine::scene::{Scene, ViewSettings};
use cadvision_engine::viewport::{CanvasSize, ScaleLimits};
use cadvision_io::load_drawing;
use tracing::info;

use crate::errors::FrontendError;

/// 图纸来源，决定导出时写入的源文件名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawingSource {
    File(PathBuf),
    Blank,
}

impl DrawingSource {
    /// 源文件名（不含目录）；空白画布返回 `None`。
    pub fn file_name(&self) -> Option<String> {
        match self {
            DrawingSource::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            DrawingSource::Blank => None,
        }
    }
}

/// 统一封装加载后的场景与元信息。
#[derive(Debug)]
pub struct LoadedScene {
    pub scene: Scene,
    pub source: DrawingSource,
}

pub fn view_settings(config: &ViewportConfig) -> ViewSettings {
    ViewSettings {
        limits: ScaleLimits::new(config.min_scale, config.max_scale),
        zoom_sensitivity: config.zoom_sensitivity,
        zoom_step: config.zoom_step,
        pick_tolerance_px: config.pick_tolerance_px,
        grid_min_pixels: config.grid_min_pixels,
        target_world_width: config.target_world_width,
    }
}

pub fn canvas_size(config: &ViewportConfig) -> CanvasSize {
    CanvasSize::new(config.canvas_width, config.canvas_height)
}

/// 有路径时读取图纸（失败即返回错误，不留下半成品），否则给出空白画布。
pub fn load_scene(config: &ViewportConfig, path: Option<&Path>) -> Result<LoadedScene, FrontendError> {
    let mut scene = Scene::new(canvas_size(config), view_settings(config));
    let Some(path) = path else {
        return Ok(LoadedScene {
            scene,
            source: DrawingSource::Blank,
        });
    };
    let drawing = load_drawing(path)?;
    info!(path = %path.display(), entities = drawing.len(), "图纸载入场景");
    scene.load_drawing(drawing);
    Ok(LoadedScene {
        scene,
        source: DrawingSource::File(path.to_path_buf()),
    })
}
