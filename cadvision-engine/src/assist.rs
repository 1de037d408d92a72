//! 实体文字说明：调用外部文本生成服务，并保证同一时间只有一个请求在途。

use cadvision_core::document::{Entity, EntityKind, Shape};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::EngineError;

/// 请求失败时展示给用户的固定文案。
pub const ANALYSIS_FAILED_MESSAGE: &str = "AI analysis failed. Please try again.";
/// 服务返回空文本时展示的文案。
pub const EMPTY_ANALYSIS_MESSAGE: &str = "The analysis returned no text.";

#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("description service rejected the request: {0}")]
    Rejected(String),
    #[error("description service is unavailable")]
    Unavailable,
}

/// 发给说明服务的请求内容。
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionRequest {
    pub entity_type: EntityKind,
    pub layer: String,
    pub geometry: Value,
}

impl DescriptionRequest {
    pub fn for_entity(entity: &Entity) -> Self {
        Self {
            entity_type: entity.kind(),
            layer: entity.layer.clone(),
            geometry: geometry_summary(entity),
        }
    }

    pub fn prompt(&self) -> String {
        format!(
            "Analyze this CAD entity: {} on layer {}. Geometry: {}. \
             Explain its function in a professional blueprint context.",
            self.entity_type, self.layer, self.geometry
        )
    }
}

/// 外部说明服务。实现方可以是远程模型，也可以是测试替身。
pub trait Describer {
    fn describe(&self, request: &DescriptionRequest) -> Result<String, DescribeError>;
}

/// 实体几何摘要：多段线/直线给出顶点，圆与圆弧给出圆心与半径。
pub fn geometry_summary(entity: &Entity) -> Value {
    match &entity.shape {
        Shape::Line(line) => json!([
            { "x": line.start.x(), "y": line.start.y() },
            { "x": line.end.x(), "y": line.end.y() },
        ]),
        Shape::Circle(circle) => json!({
            "center": { "x": circle.center.x(), "y": circle.center.y() },
            "radius": circle.radius,
        }),
        Shape::Arc(arc) => json!({
            "center": { "x": arc.center.x(), "y": arc.center.y() },
            "radius": arc.radius,
            "startAngle": arc.start_angle,
            "endAngle": arc.end_angle,
        }),
        Shape::Polyline(polyline) => Value::Array(
            polyline
                .vertices
                .iter()
                .map(|vertex| {
                    if vertex.bulge == 0.0 {
                        json!({ "x": vertex.position.x(), "y": vertex.position.y() })
                    } else {
                        json!({
                            "x": vertex.position.x(),
                            "y": vertex.position.y(),
                            "bulge": vertex.bulge,
                        })
                    }
                })
                .collect(),
        ),
    }
}

/// 说明面板状态。
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    in_flight: bool,
    message: Option<String>,
}

impl Analysis {
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// 标记请求开始；已有请求在途时拒绝。
    pub fn begin(&mut self) -> Result<(), EngineError> {
        if self.in_flight {
            return Err(EngineError::AnalysisInFlight);
        }
        self.in_flight = true;
        Ok(())
    }

    /// 记录请求结果。失败时只展示通用文案，细节写入日志。
    pub fn finish(&mut self, result: Result<String, DescribeError>) {
        self.in_flight = false;
        self.message = Some(match result {
            Ok(text) if text.trim().is_empty() => EMPTY_ANALYSIS_MESSAGE.to_string(),
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "实体说明请求失败");
                ANALYSIS_FAILED_MESSAGE.to_string()
            }
        });
    }

    /// 同步地完成一次请求。
    pub fn run(
        &mut self,
        describer: &dyn Describer,
        entity: &Entity,
    ) -> Result<(), EngineError> {
        self.begin()?;
        let request = DescriptionRequest::for_entity(entity);
        info!(kind = %request.entity_type, layer = %request.layer, "请求实体说明");
        self.finish(describer.describe(&request));
        Ok(())
    }

    /// 关闭说明面板，返回此前是否有内容。
    pub fn dismiss(&mut self) -> bool {
        self.message.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use cadvision_core::document::{PolylineKind, PolylineVertex};
    use cadvision_core::geometry::Point2;

    use super::*;

    struct Canned(Result<&'static str, ()>, RefCell<Vec<String>>);

    impl Describer for Canned {
        fn describe(&self, request: &DescriptionRequest) -> Result<String, DescribeError> {
            self.1.borrow_mut().push(request.prompt());
            self.0
                .map(str::to_string)
                .map_err(|_| DescribeError::Rejected("quota".into()))
        }
    }

    #[test]
    fn prompt_mentions_type_layer_and_geometry() {
        let entity = Entity::circle(Point2::new(1.0, 2.0), 3.0, "Walls");
        let prompt = DescriptionRequest::for_entity(&entity).prompt();
        assert!(prompt.starts_with("Analyze this CAD entity: CIRCLE on layer Walls. Geometry: "));
        assert!(prompt.contains("\"radius\":3.0"));
        assert!(prompt.ends_with("Explain its function in a professional blueprint context."));
    }

    #[test]
    fn polyline_summary_keeps_bulges() {
        let entity = Entity::polyline(
            PolylineKind::Lightweight,
            [
                PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 0.5),
                PolylineVertex::new(Point2::new(1.0, 0.0)),
            ],
            "A",
        );
        let summary = geometry_summary(&entity);
        assert_eq!(summary[0]["bulge"], json!(0.5));
        assert!(summary[1].get("bulge").is_none());
    }

    #[test]
    fn failures_show_generic_message() {
        let describer = Canned(Err(()), RefCell::default());
        let mut analysis = Analysis::default();
        let entity = Entity::line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "A");
        analysis.run(&describer, &entity).unwrap();
        assert_eq!(analysis.message(), Some(ANALYSIS_FAILED_MESSAGE));
        assert!(!analysis.is_in_flight());
        assert_eq!(describer.1.borrow().len(), 1);
    }

    #[test]
    fn empty_text_is_replaced_and_dismissable() {
        let describer = Canned(Ok("   "), RefCell::default());
        let mut analysis = Analysis::default();
        let entity = Entity::line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "A");
        analysis.run(&describer, &entity).unwrap();
        assert_eq!(analysis.message(), Some(EMPTY_ANALYSIS_MESSAGE));
        assert!(analysis.dismiss());
        assert!(!analysis.dismiss());
    }

    #[test]
    fn only_one_request_in_flight() {
        let mut analysis = Analysis::default();
        analysis.begin().unwrap();
        assert!(matches!(analysis.begin(), Err(EngineError::AnalysisInFlight)));
        analysis.finish(Ok("A wall.".into()));
        assert_eq!(analysis.message(), Some("A wall."));
        assert!(analysis.begin().is_ok());
    }
}
