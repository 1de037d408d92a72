//! JSON 交换格式。字段布局与下游 Python 脚本约定一致：
//! 点为 `[x, y, z]`，折线顶点为 `[x, y, z, bulge]`，`blocks` 恒为空。

use cadvision_core::document::{
    Arc, Circle, Drawing, Entity, EntityId, Line, Polyline, PolylineKind, PolylineVertex, Shape,
};
use cadvision_core::geometry::Point2;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::IoError;

pub const DEFAULT_SOURCE_NAME: &str = "untitled.dxf";
pub const UNKNOWN_ACAD_VERSION: &str = "Unknown";
pub const DEFAULT_EXPORT_NAME: &str = "drawing.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub filename: String,
    pub acad_version: String,
    pub entities: Vec<ExportEntity>,
    pub layers: Vec<ExportLayer>,
    pub blocks: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportLayer {
    pub name: String,
    pub color: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_color: Option<u32>,
    /// 缺省视为打开。
    #[serde(default = "layer_on")]
    pub is_visible: bool,
}

fn layer_on() -> bool {
    true
}

/// 各类实体共有的字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    #[serde(default)]
    pub handle: String,
    pub layer: String,
    #[serde(default)]
    pub color: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_color: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExportEntity {
    #[serde(rename = "LINE")]
    Line {
        #[serde(flatten)]
        info: EntityInfo,
        start: [f64; 3],
        end: [f64; 3],
    },
    #[serde(rename = "CIRCLE")]
    Circle {
        #[serde(flatten)]
        info: EntityInfo,
        center: [f64; 3],
        radius: f64,
    },
    #[serde(rename = "ARC")]
    Arc {
        #[serde(flatten)]
        info: EntityInfo,
        center: [f64; 3],
        radius: f64,
        start_angle_deg: f64,
        end_angle_deg: f64,
    },
    #[serde(rename = "LWPOLYLINE")]
    LwPolyline {
        #[serde(flatten)]
        info: EntityInfo,
        #[serde(flatten)]
        body: PolylineBody,
    },
    #[serde(rename = "POLYLINE")]
    Polyline {
        #[serde(flatten)]
        info: EntityInfo,
        #[serde(flatten)]
        body: PolylineBody,
    },
    #[serde(rename = "RECTANGLE")]
    Rectangle {
        #[serde(flatten)]
        info: EntityInfo,
        #[serde(flatten)]
        body: PolylineBody,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineBody {
    #[serde(default)]
    pub is_closed: bool,
    pub points: Vec<[f64; 4]>,
}

fn point3(point: Point2) -> [f64; 3] {
    [point.x(), point.y(), 0.0]
}

fn point2(raw: [f64; 3]) -> Point2 {
    Point2::new(raw[0], raw[1])
}

impl ExportEntity {
    pub fn from_entity(id: EntityId, entity: &Entity) -> Self {
        let info = EntityInfo {
            handle: id.to_string(),
            layer: entity.layer.clone(),
            color: entity.color,
            true_color: entity.true_color,
        };
        match &entity.shape {
            Shape::Line(line) => ExportEntity::Line {
                info,
                start: point3(line.start),
                end: point3(line.end),
            },
            Shape::Circle(circle) => ExportEntity::Circle {
                info,
                center: point3(circle.center),
                radius: circle.radius,
            },
            Shape::Arc(arc) => ExportEntity::Arc {
                info,
                center: point3(arc.center),
                radius: arc.radius,
                start_angle_deg: arc.start_angle,
                end_angle_deg: arc.end_angle,
            },
            Shape::Polyline(polyline) => {
                let body = PolylineBody {
                    is_closed: polyline.is_closed(),
                    points: polyline
                        .vertices
                        .iter()
                        .map(|vertex| {
                            [vertex.position.x(), vertex.position.y(), 0.0, vertex.bulge]
                        })
                        .collect(),
                };
                match polyline.kind {
                    PolylineKind::Lightweight => ExportEntity::LwPolyline { info, body },
                    PolylineKind::Heavy => ExportEntity::Polyline { info, body },
                    PolylineKind::Rectangle => ExportEntity::Rectangle { info, body },
                }
            }
        }
    }

    fn is_well_formed(&self) -> bool {
        match self {
            ExportEntity::Circle { radius, .. } | ExportEntity::Arc { radius, .. } => {
                radius.is_finite() && *radius >= 0.0
            }
            ExportEntity::LwPolyline { body, .. }
            | ExportEntity::Polyline { body, .. }
            | ExportEntity::Rectangle { body, .. } => body.points.len() >= 2,
            ExportEntity::Line { .. } => true,
        }
    }

    pub fn into_entity(self) -> Entity {
        let (info, shape) = match self {
            ExportEntity::Line { info, start, end } => (
                info,
                Shape::Line(Line {
                    start: point2(start),
                    end: point2(end),
                }),
            ),
            ExportEntity::Circle {
                info,
                center,
                radius,
            } => (
                info,
                Shape::Circle(Circle {
                    center: point2(center),
                    radius,
                }),
            ),
            ExportEntity::Arc {
                info,
                center,
                radius,
                start_angle_deg,
                end_angle_deg,
            } => (
                info,
                Shape::Arc(Arc {
                    center: point2(center),
                    radius,
                    start_angle: start_angle_deg,
                    end_angle: end_angle_deg,
                }),
            ),
            ExportEntity::LwPolyline { info, body } => {
                (info, polyline_shape(PolylineKind::Lightweight, body))
            }
            ExportEntity::Polyline { info, body } => {
                (info, polyline_shape(PolylineKind::Heavy, body))
            }
            ExportEntity::Rectangle { info, body } => {
                (info, polyline_shape(PolylineKind::Rectangle, body))
            }
        };
        Entity {
            layer: info.layer,
            color: info.color,
            true_color: info.true_color,
            shape,
        }
    }
}

fn polyline_shape(kind: PolylineKind, body: PolylineBody) -> Shape {
    Shape::Polyline(Polyline {
        kind,
        vertices: body
            .points
            .into_iter()
            .map(|[x, y, _, bulge]| PolylineVertex::with_bulge(Point2::new(x, y), bulge))
            .collect(),
    })
}

impl ExportDocument {
    pub fn from_drawing(drawing: &Drawing, filename: Option<&str>) -> Self {
        Self {
            filename: filename.unwrap_or(DEFAULT_SOURCE_NAME).to_string(),
            acad_version: UNKNOWN_ACAD_VERSION.to_string(),
            entities: drawing
                .entities()
                .map(|(id, entity)| ExportEntity::from_entity(*id, entity))
                .collect(),
            layers: drawing
                .layers()
                .map(|layer| ExportLayer {
                    name: layer.name.clone(),
                    color: layer.color,
                    true_color: layer.true_color,
                    is_visible: layer.is_visible,
                })
                .collect(),
            blocks: Vec::new(),
        }
    }

    /// 还原为图纸：ID 按导入顺序重新分配，图层按文档顺序登记。
    pub fn into_drawing(self) -> Drawing {
        let mut drawing = Drawing::new();
        for layer in &self.layers {
            drawing.set_layer_colors(&layer.name, layer.color, layer.true_color);
            drawing.ensure_layer(&layer.name).is_visible = layer.is_visible;
        }
        for entity in self.entities {
            drawing.add_entity(entity.into_entity());
        }
        drawing
    }
}

/// 解析交换格式文本。缺少 `entities` 或 `layers` 列表时整体拒绝；
/// 单个实体字段不完整时告警并跳过。
pub fn import_str(source: &str) -> Result<Drawing, IoError> {
    let mut root: Value = serde_json::from_str(source)?;
    let Some(object) = root.as_object_mut() else {
        return Err(IoError::InvalidDocument(
            "exchange document must be a JSON object".into(),
        ));
    };
    let entities = match object.remove("entities") {
        Some(Value::Array(entities)) => entities,
        _ => {
            return Err(IoError::InvalidDocument(
                "exchange document is missing the `entities` list".into(),
            ));
        }
    };
    let layers: Vec<ExportLayer> = match object.remove("layers") {
        Some(layers @ Value::Array(_)) => serde_json::from_value(layers)?,
        _ => {
            return Err(IoError::InvalidDocument(
                "exchange document is missing the `layers` list".into(),
            ));
        }
    };

    let mut parsed = Vec::with_capacity(entities.len());
    for (index, value) in entities.into_iter().enumerate() {
        match serde_json::from_value::<ExportEntity>(value) {
            Ok(entity) if entity.is_well_formed() => parsed.push(entity),
            Ok(_) => warn!(index, "跳过几何不完整的实体"),
            Err(error) => warn!(index, %error, "跳过无法识别的实体"),
        }
    }

    let document = ExportDocument {
        filename: object
            .get("filename")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SOURCE_NAME)
            .to_string(),
        acad_version: object
            .get("acad_version")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_ACAD_VERSION)
            .to_string(),
        entities: parsed,
        layers,
        blocks: Vec::new(),
    };
    Ok(document.into_drawing())
}

/// 导出文件名：去掉源文件的 `.dxf`/`.json` 后缀后加上 `.json`。
pub fn export_file_name(source: Option<&str>) -> String {
    let Some(source) = source.filter(|name| !name.is_empty()) else {
        return DEFAULT_EXPORT_NAME.to_string();
    };
    let lower = source.to_ascii_lowercase();
    let base = if lower.ends_with(".dxf") || lower.ends_with(".json") {
        let cut = source.rfind('.').unwrap_or(source.len());
        &source[..cut]
    } else {
        source
    };
    format!("{base}.json")
}
