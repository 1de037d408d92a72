//! 图纸读写：DXF 导入、JSON 交换格式的导出与再导入。

use std::fs;
use std::path::{Path, PathBuf};

use cadvision_core::document::Drawing;
use cadvision_core::geometry::{Point2, Vector2};
use thiserror::Error;
use tracing::{debug, info};

mod dxf;
pub mod exchange;

pub use exchange::{ExportDocument, ExportEntity, ExportLayer, export_file_name};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
    #[error("malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait DrawingLoader {
    fn load(&self, path: &Path) -> Result<Drawing, IoError>;
}

pub trait DrawingSaver {
    fn save(&self, drawing: &Drawing, path: &Path) -> Result<(), IoError>;
}

/// 根据扩展名区分的文件格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingFormat {
    Dxf,
    Json,
}

impl DrawingFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("dxf") {
            Some(DrawingFormat::Dxf)
        } else if extension.eq_ignore_ascii_case("json") {
            Some(DrawingFormat::Json)
        } else {
            None
        }
    }
}

/// DXF 读取入口。解析完成并重定心后才返回图纸，失败时不产生部分结果。
#[derive(Debug, Default)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_str(&self, source: &str) -> Result<Drawing, IoError> {
        let drawing = dxf::parse(source)?;
        Ok(recenter(drawing))
    }
}

impl DrawingLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Drawing, IoError> {
        let data = read_text(path)?;
        let drawing = self.parse_str(&data)?;
        info!(path = %path.display(), entities = drawing.len(), "DXF 已载入");
        Ok(drawing)
    }
}

/// JSON 交换格式。导出的坐标已经重定心，再导入时不再平移。
#[derive(Debug, Default)]
pub struct JsonFacade {
    source_name: Option<String>,
}

impl JsonFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// 导出时写入 `filename` 字段的源文件名。
    pub fn with_source_name(name: impl Into<String>) -> Self {
        Self {
            source_name: Some(name.into()),
        }
    }
}

impl DrawingLoader for JsonFacade {
    fn load(&self, path: &Path) -> Result<Drawing, IoError> {
        let data = read_text(path)?;
        let drawing = exchange::import_str(&data)?;
        info!(path = %path.display(), entities = drawing.len(), "JSON 图纸已载入");
        Ok(drawing)
    }
}

impl DrawingSaver for JsonFacade {
    fn save(&self, drawing: &Drawing, path: &Path) -> Result<(), IoError> {
        let document = ExportDocument::from_drawing(drawing, self.source_name.as_deref());
        let serialized = serde_json::to_string_pretty(&document)?;
        fs::write(path, serialized).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), entities = drawing.len(), "图纸已导出");
        Ok(())
    }
}

/// 按扩展名选择读取器。
pub fn load_drawing(path: &Path) -> Result<Drawing, IoError> {
    match DrawingFormat::from_path(path) {
        Some(DrawingFormat::Dxf) => DxfFacade::new().load(path),
        Some(DrawingFormat::Json) => JsonFacade::new().load(path),
        None => Err(IoError::UnsupportedFeature(format!(
            "unrecognised drawing extension: {}",
            path.display()
        ))),
    }
}

fn read_text(path: &Path) -> Result<String, IoError> {
    fs::read_to_string(path).map_err(|source| IoError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// 以全部实体定义点的 X/Y 中位数为原点平移图纸，抵抗个别离群坐标的影响。
pub fn recenter(mut drawing: Drawing) -> Drawing {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (_, entity) in drawing.entities() {
        for point in entity.defining_points() {
            xs.push(point.x());
            ys.push(point.y());
        }
    }
    let center = Point2::new(median(&mut xs), median(&mut ys));
    if center.x() == 0.0 && center.y() == 0.0 {
        return drawing;
    }
    let offset = Vector2::new(-center.x(), -center.y());
    let ids: Vec<_> = drawing.entities().map(|(id, _)| *id).collect();
    for id in ids {
        if let Some(entity) = drawing.entity_mut(id) {
            entity.translate(offset);
        }
    }
    debug!(x = center.x(), y = center.y(), "按中位数重定心");
    drawing
}

/// 空序列的中位数取 0；偶数个元素取中间两值的平均。
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let half = values.len() / 2;
    if values.len() % 2 == 1 {
        values[half]
    } else {
        (values[half - 1] + values[half]) / 2.0
    }
}
