//! DXF 组码解析。只读取 TABLES 中的图层与 ENTITIES 中的二维曲线实体，
//! 其余段落整体跳过，不支持的实体记录告警后跳过。

use cadvision_core::color::normalize_true_color;
use cadvision_core::document::{
    Arc, Circle, Drawing, Entity, Line, Polyline, PolylineKind, PolylineVertex, Shape,
};
use cadvision_core::geometry::Point2;
use tracing::{debug, warn};

use crate::IoError;

const DEFAULT_LAYER: &str = "0";

pub(crate) fn parse(source: &str) -> Result<Drawing, IoError> {
    DxfParser::new(source).parse()
}

fn invalid(message: impl Into<String>) -> IoError {
    IoError::InvalidDocument(message.into())
}

#[derive(Debug)]
struct LayerRecord {
    name: String,
    color: Option<i32>,
    true_color: Option<u32>,
    is_visible: bool,
}

/// 所有实体共有的组码：图层 8、颜色索引 62、真彩色 420。
#[derive(Debug, Default)]
struct EntityHeader {
    layer: Option<String>,
    color: Option<i32>,
    true_color: Option<u32>,
}

impl EntityHeader {
    /// 处理公共组码，返回该组码是否已被消费。
    fn accept(&mut self, code: i32, value: &str, kind: &str) -> Result<bool, IoError> {
        match code {
            8 => self.layer = Some(value.trim().to_string()),
            62 => self.color = Some(parse_i32(value, &format!("{kind} 颜色（组码 62）"))?),
            420 => {
                let raw = parse_i64(value, &format!("{kind} 真彩色（组码 420）"))?;
                self.true_color = Some(normalize_true_color(raw));
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn finish(self, shape: Shape) -> Entity {
        Entity {
            layer: self.layer.unwrap_or_else(|| DEFAULT_LAYER.to_string()),
            color: self.color,
            true_color: self.true_color,
            shape,
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
    layers: Vec<LayerRecord>,
    entities: Vec<Entity>,
    saw_entities: bool,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
            layers: Vec::new(),
            entities: Vec::new(),
            saw_entities: false,
        }
    }

    fn parse(mut self) -> Result<Drawing, IoError> {
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 999 {
                continue;
            }
            if code != 0 {
                return Err(invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "TABLES" => self.parse_tables()?,
                        "ENTITIES" => self.parse_entities()?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        if !self.saw_entities {
            return Err(invalid("Invalid DXF file or no entities found."));
        }
        Ok(self.into_drawing())
    }

    /// 图层列表只包含实体实际引用的图层（按首次出现顺序），
    /// 图层表中的颜色信息附加到同名图层上。
    fn into_drawing(self) -> Drawing {
        let mut drawing = Drawing::new();
        for entity in self.entities {
            drawing.add_entity(entity);
        }
        for record in self.layers {
            if drawing.layer(&record.name).is_none() {
                continue;
            }
            let layer = drawing.ensure_layer(&record.name);
            layer.color = record.color;
            layer.true_color = record.true_color;
            layer.is_visible = record.is_visible;
        }
        drawing
    }

    fn skip_section(&mut self) -> Result<(), IoError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => return Err(invalid("SECTION 未找到 ENDSEC 终止标记")),
            }
        }
        Ok(())
    }

    fn parse_tables(&mut self) -> Result<(), IoError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "ENDSEC" => break,
                    "LAYER" => {
                        if let Some(record) = self.parse_layer_record()? {
                            self.layers.push(record);
                        }
                    }
                    _ => continue,
                },
                Some(_) => continue,
                None => return Err(invalid("TABLES 段提前结束")),
            }
        }
        debug!(count = self.layers.len(), "读取图层表");
        Ok(())
    }

    fn parse_layer_record(&mut self) -> Result<Option<LayerRecord>, IoError> {
        let mut name = None;
        let mut color = None;
        let mut true_color = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((2, value)) => name = Some(value.trim().to_string()),
                Some((62, value)) => color = Some(parse_i32(&value, "LAYER 颜色（组码 62）")?),
                Some((420, value)) => {
                    let raw = parse_i64(&value, "LAYER 真彩色（组码 420）")?;
                    true_color = Some(normalize_true_color(raw));
                }
                Some(_) => continue,
                None => return Err(invalid("LAYER 记录未正确结束")),
            }
        }
        let Some(name) = name else {
            warn!("图层记录缺少名称（组码 2），已忽略");
            return Ok(None);
        };
        // 颜色为负表示图层关闭
        let is_visible = color.is_none_or(|value: i32| value >= 0);
        Ok(Some(LayerRecord {
            name,
            color: color.map(i32::abs),
            true_color,
            is_visible,
        }))
    }

    fn parse_entities(&mut self) -> Result<(), IoError> {
        self.saw_entities = true;
        let mut skipped = 0usize;
        loop {
            let (code, value) = self
                .reader
                .next_pair()?
                .ok_or_else(|| invalid("ENTITIES 段提前结束"))?;
            if code != 0 {
                return Err(invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }
            let parsed = match value.trim() {
                "ENDSEC" => break,
                "LINE" => Some(self.parse_line()?),
                "CIRCLE" => Some(self.parse_circle()?),
                "ARC" => Some(self.parse_arc()?),
                "LWPOLYLINE" => self.parse_lwpolyline()?,
                "POLYLINE" => self.parse_polyline()?,
                other => {
                    warn!(kind = other, "跳过不支持的实体类型");
                    self.skip_entity_body()?;
                    None
                }
            };
            match parsed {
                Some(entity) => self.entities.push(entity),
                None => skipped += 1,
            }
        }
        debug!(entities = self.entities.len(), skipped, "ENTITIES 段解析完成");
        Ok(())
    }

    fn parse_line(&mut self) -> Result<Entity, IoError> {
        let mut header = EntityHeader::default();
        let (mut sx, mut sy, mut ex, mut ey) = (None, None, None, None);
        while let Some((code, value)) = self.entity_pair("LINE")? {
            if header.accept(code, &value, "LINE")? {
                continue;
            }
            match code {
                10 => assign_coord(&mut sx, &value, "LINE 起点 X（组码 10）")?,
                20 => assign_coord(&mut sy, &value, "LINE 起点 Y（组码 20）")?,
                11 => assign_coord(&mut ex, &value, "LINE 终点 X（组码 11）")?,
                21 => assign_coord(&mut ey, &value, "LINE 终点 Y（组码 21）")?,
                _ => {}
            }
        }
        let start = Point2::new(
            sx.ok_or_else(|| invalid("LINE 缺少起点 X（组码 10）"))?,
            sy.ok_or_else(|| invalid("LINE 缺少起点 Y（组码 20）"))?,
        );
        let end = Point2::new(
            ex.ok_or_else(|| invalid("LINE 缺少终点 X（组码 11）"))?,
            ey.ok_or_else(|| invalid("LINE 缺少终点 Y（组码 21）"))?,
        );
        Ok(header.finish(Shape::Line(Line { start, end })))
    }

    fn parse_circle(&mut self) -> Result<Entity, IoError> {
        let mut header = EntityHeader::default();
        let (mut cx, mut cy, mut radius) = (None, None, None);
        while let Some((code, value)) = self.entity_pair("CIRCLE")? {
            if header.accept(code, &value, "CIRCLE")? {
                continue;
            }
            match code {
                10 => assign_coord(&mut cx, &value, "CIRCLE 圆心 X（组码 10）")?,
                20 => assign_coord(&mut cy, &value, "CIRCLE 圆心 Y（组码 20）")?,
                40 => assign_coord(&mut radius, &value, "CIRCLE 半径（组码 40）")?,
                _ => {}
            }
        }
        let center = Point2::new(
            cx.ok_or_else(|| invalid("CIRCLE 缺少圆心 X（组码 10）"))?,
            cy.ok_or_else(|| invalid("CIRCLE 缺少圆心 Y（组码 20）"))?,
        );
        let radius = radius.ok_or_else(|| invalid("CIRCLE 缺少半径（组码 40）"))?;
        Ok(header.finish(Shape::Circle(Circle {
            center,
            radius,
        })))
    }

    /// 角度保持 DXF 原样的“度”。
    fn parse_arc(&mut self) -> Result<Entity, IoError> {
        let mut header = EntityHeader::default();
        let (mut cx, mut cy, mut radius) = (None, None, None);
        let (mut start_angle, mut end_angle) = (None, None);
        while let Some((code, value)) = self.entity_pair("ARC")? {
            if header.accept(code, &value, "ARC")? {
                continue;
            }
            match code {
                10 => assign_coord(&mut cx, &value, "ARC 圆心 X（组码 10）")?,
                20 => assign_coord(&mut cy, &value, "ARC 圆心 Y（组码 20）")?,
                40 => assign_coord(&mut radius, &value, "ARC 半径（组码 40）")?,
                50 => assign_coord(&mut start_angle, &value, "ARC 起始角（组码 50）")?,
                51 => assign_coord(&mut end_angle, &value, "ARC 终止角（组码 51）")?,
                _ => {}
            }
        }
        Ok(header.finish(Shape::Arc(Arc {
            center: Point2::new(
                cx.ok_or_else(|| invalid("ARC 缺少圆心 X（组码 10）"))?,
                cy.ok_or_else(|| invalid("ARC 缺少圆心 Y（组码 20）"))?,
            ),
            radius: radius.ok_or_else(|| invalid("ARC 缺少半径（组码 40）"))?,
            start_angle: start_angle.ok_or_else(|| invalid("ARC 缺少起始角（组码 50）"))?,
            end_angle: end_angle.ok_or_else(|| invalid("ARC 缺少终止角（组码 51）"))?,
        })))
    }

    fn parse_lwpolyline(&mut self) -> Result<Option<Entity>, IoError> {
        let mut header = EntityHeader::default();
        let mut is_closed = false;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut pending_x: Option<f64> = None;
        let mut pending_y: Option<f64> = None;
        while let Some((code, value)) = self.entity_pair("LWPOLYLINE")? {
            if header.accept(code, &value, "LWPOLYLINE")? {
                continue;
            }
            match code {
                70 => {
                    let flag = parse_i32(&value, "LWPOLYLINE 标志（组码 70）")?;
                    is_closed = flag & 0x01 == 0x01;
                }
                10 => {
                    let x = parse_f64(&value, "LWPOLYLINE 顶点 X")?;
                    if let Some(y) = pending_y.take() {
                        vertices.push(PolylineVertex::new(Point2::new(x, y)));
                    } else if pending_x.replace(x).is_some() {
                        return Err(invalid("LWPOLYLINE 顶点缺少对应的 Y（组码 20）"));
                    }
                }
                20 => {
                    let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                    if let Some(x) = pending_x.take() {
                        vertices.push(PolylineVertex::new(Point2::new(x, y)));
                    } else if pending_y.replace(y).is_some() {
                        return Err(invalid("LWPOLYLINE 顶点缺少对应的 X（组码 10）"));
                    }
                }
                42 => {
                    let bulge = parse_f64(&value, "LWPOLYLINE 顶点 bulge")?;
                    let vertex = vertices
                        .last_mut()
                        .ok_or_else(|| invalid("LWPOLYLINE 在定义首个顶点前遇到 bulge（组码 42）"))?;
                    vertex.bulge = bulge;
                }
                _ => {}
            }
        }
        if pending_x.is_some() || pending_y.is_some() {
            return Err(invalid(
                "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }
        Ok(finish_polyline(
            header,
            PolylineKind::Lightweight,
            vertices,
            is_closed,
        ))
    }

    /// 旧式 POLYLINE：头部之后是若干 VERTEX 记录，以 SEQEND 结束。
    /// 网格类（Polyface/Polygon Mesh）不属于二维曲线，整体跳过。
    fn parse_polyline(&mut self) -> Result<Option<Entity>, IoError> {
        let mut header = EntityHeader::default();
        let mut flags = 0;
        while let Some((code, value)) = self.entity_pair("POLYLINE")? {
            if header.accept(code, &value, "POLYLINE")? {
                continue;
            }
            if code == 70 {
                flags = parse_i32(&value, "POLYLINE 标志（组码 70）")?;
            }
        }

        let mut vertices = Vec::new();
        loop {
            let Some((code, value)) = self.reader.next_pair()? else {
                return Err(invalid("POLYLINE 缺少 SEQEND"));
            };
            match (code, value.trim()) {
                (0, "VERTEX") => {
                    if let Some(vertex) = self.parse_vertex()? {
                        vertices.push(vertex);
                    }
                }
                (0, "SEQEND") => {
                    self.skip_entity_body()?;
                    break;
                }
                (0, _) => {
                    warn!("POLYLINE 未以 SEQEND 结束");
                    self.reader.put_back((code, value));
                    break;
                }
                _ => {
                    return Err(invalid(format!(
                        "POLYLINE 序列中遇到组码 {code}（期望 0）"
                    )));
                }
            }
        }

        if flags & (0x10 | 0x40) != 0 {
            warn!(flags, "跳过网格类 POLYLINE");
            return Ok(None);
        }
        Ok(finish_polyline(
            header,
            PolylineKind::Heavy,
            vertices,
            flags & 0x01 == 0x01,
        ))
    }

    fn parse_vertex(&mut self) -> Result<Option<PolylineVertex>, IoError> {
        let (mut x, mut y) = (None, None);
        let mut bulge = 0.0;
        let mut flags = 0;
        while let Some((code, value)) = self.entity_pair("VERTEX")? {
            match code {
                10 => assign_coord(&mut x, &value, "VERTEX X（组码 10）")?,
                20 => assign_coord(&mut y, &value, "VERTEX Y（组码 20）")?,
                42 => bulge = parse_f64(&value, "VERTEX bulge（组码 42）")?,
                70 => flags = parse_i32(&value, "VERTEX 标志（组码 70）")?,
                _ => {}
            }
        }
        // 样条控制点不是折线上的实际顶点
        if flags & 0x10 != 0 {
            return Ok(None);
        }
        match (x, y) {
            (Some(x), Some(y)) => Ok(Some(PolylineVertex::with_bulge(Point2::new(x, y), bulge))),
            _ => Err(invalid("VERTEX 缺少完整的 XY 坐标")),
        }
    }

    /// 读取实体体内的下一组码；遇到下一个实体（组码 0）时回退并返回 `None`。
    fn entity_pair(&mut self, kind: &str) -> Result<Option<(i32, String)>, IoError> {
        match self.reader.next_pair()? {
            Some((0, value)) => {
                self.reader.put_back((0, value));
                Ok(None)
            }
            Some(pair) => Ok(Some(pair)),
            None => Err(invalid(format!("{kind} 未正确结束"))),
        }
    }

    fn skip_entity_body(&mut self) -> Result<(), IoError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

/// 闭合标志置位且首尾不重合时补上闭合顶点；不足两个顶点的折线告警后丢弃。
fn finish_polyline(
    header: EntityHeader,
    kind: PolylineKind,
    mut vertices: Vec<PolylineVertex>,
    is_closed: bool,
) -> Option<Entity> {
    if is_closed
        && let (Some(first), Some(last)) = (vertices.first(), vertices.last())
        && vertices.len() >= 2
        && (first.position.x() != last.position.x() || first.position.y() != last.position.y())
    {
        let closing = PolylineVertex::new(first.position);
        vertices.push(closing);
    }
    if vertices.len() < 2 {
        warn!(count = vertices.len(), "折线顶点不足两个，已跳过");
        return None;
    }
    Some(header.finish(Shape::Polyline(Polyline {
        kind,
        vertices,
    })))
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, IoError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    // 文件末尾的空行不算一组
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只允许回退一次");
        self.buffer = Some(pair);
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), IoError> {
    if slot.is_some() {
        return Err(invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, IoError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, IoError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i64(raw: &str, context: &str) -> Result<i64, IoError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

#[cfg(test)]
mod tests {
    use cadvision_core::document::EntityKind;

    use super::*;

    fn dxf(pairs: &[(i32, &str)]) -> String {
        pairs
            .iter()
            .map(|(code, value)| format!("{code}\n{value}\n"))
            .collect()
    }

    fn entities(body: &[(i32, &str)]) -> String {
        let mut pairs = vec![(0, "SECTION"), (2, "ENTITIES")];
        pairs.extend_from_slice(body);
        pairs.extend_from_slice(&[(0, "ENDSEC"), (0, "EOF")]);
        dxf(&pairs)
    }

    #[test]
    fn entity_colors_and_default_layer() {
        let source = entities(&[
            (0, "LINE"),
            (62, "1"),
            (420, "-16711936"),
            (10, "0"),
            (20, "0"),
            (11, "1"),
            (21, "1"),
        ]);
        let drawing = parse(&source).unwrap();
        let (_, line) = drawing.entities().next().unwrap();
        assert_eq!(line.layer, "0");
        assert_eq!(line.color, Some(1));
        assert_eq!(line.true_color, Some(0xFF0100));
    }

    #[test]
    fn closed_lwpolyline_gets_closing_vertex() {
        let source = entities(&[
            (0, "LWPOLYLINE"),
            (8, "Lots"),
            (90, "3"),
            (70, "1"),
            (10, "0"),
            (20, "0"),
            (42, "0.5"),
            (10, "4"),
            (20, "0"),
            (10, "4"),
            (20, "3"),
        ]);
        let drawing = parse(&source).unwrap();
        let (_, entity) = drawing.entities().next().unwrap();
        let Shape::Polyline(polyline) = &entity.shape else {
            panic!("expected polyline");
        };
        assert_eq!(polyline.vertices.len(), 4);
        assert!(polyline.is_closed());
        assert!((polyline.vertices[0].bulge - 0.5).abs() < 1e-12);
    }

    #[test]
    fn heavy_polyline_reads_vertices_until_seqend() {
        let source = entities(&[
            (0, "POLYLINE"),
            (8, "P"),
            (66, "1"),
            (70, "0"),
            (0, "VERTEX"),
            (10, "1"),
            (20, "1"),
            (42, "-1"),
            (0, "VERTEX"),
            (10, "3"),
            (20, "1"),
            (0, "SEQEND"),
            (0, "CIRCLE"),
            (10, "0"),
            (20, "0"),
            (40, "2"),
        ]);
        let drawing = parse(&source).unwrap();
        let kinds: Vec<_> = drawing.entities().map(|(_, e)| e.kind()).collect();
        assert_eq!(kinds, vec![EntityKind::Polyline, EntityKind::Circle]);
    }

    #[test]
    fn unsupported_entities_are_skipped() {
        let source = entities(&[
            (0, "TEXT"),
            (8, "Notes"),
            (1, "hello"),
            (0, "ARC"),
            (8, "Curb"),
            (10, "0"),
            (20, "0"),
            (40, "5"),
            (50, "0"),
            (51, "90"),
        ]);
        let drawing = parse(&source).unwrap();
        assert_eq!(drawing.len(), 1);
        assert_eq!(drawing.layer_names(), vec!["Curb"]);
    }

    #[test]
    fn layer_table_colors_attach_to_used_layers() {
        let source = dxf(&[
            (0, "SECTION"),
            (2, "TABLES"),
            (0, "TABLE"),
            (2, "LAYER"),
            (70, "2"),
            (0, "LAYER"),
            (2, "Walls"),
            (62, "-3"),
            (420, "255"),
            (0, "LAYER"),
            (2, "Unused"),
            (62, "5"),
            (0, "ENDTAB"),
            (0, "ENDSEC"),
            (0, "SECTION"),
            (2, "ENTITIES"),
            (0, "CIRCLE"),
            (8, "Walls"),
            (10, "0"),
            (20, "0"),
            (40, "1"),
            (0, "ENDSEC"),
            (0, "EOF"),
        ]);
        let drawing = parse(&source).unwrap();
        assert_eq!(drawing.layer_names(), vec!["Walls"]);
        let walls = drawing.layer("Walls").unwrap();
        assert_eq!(walls.color, Some(3));
        assert_eq!(walls.true_color, Some(255));
        assert!(!walls.is_visible);
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(parse("0\nSECTION\n2\nHEADER\n0\nENDSEC\n0\nEOF\n").is_err());
        let missing_radius = entities(&[(0, "CIRCLE"), (10, "0"), (20, "0")]);
        assert!(matches!(
            parse(&missing_radius),
            Err(IoError::InvalidDocument(message)) if message.contains("半径")
        ));
        assert!(parse("0\nSECTION\n2\nENTITIES\n0\nLINE\n10\nabc\n").is_err());
    }
}
