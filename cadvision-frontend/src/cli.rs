use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use cadvision_core::color::{ColorSource, describe_color};
use cadvision_core::document::{Drawing, EntityId, Layer};
use cadvision_engine::assist::{DescribeError, DescriptionRequest, Describer, geometry_summary};
use cadvision_engine::command::{CommandBus, CommandContext, CommandRequest};
use cadvision_engine::scene::Scene;
use cadvision_io::{DrawingSaver, JsonFacade, export_file_name, load_drawing};
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{DrawingSource, LoadedScene};

/// 前端自身处理的命令，其余交给引擎的命令总线。
const SESSION_COMMANDS: [&str; 5] = ["load", "export", "summary", "analyze", "help"];

/// 未接入任何说明服务时使用，所有请求都按不可用处理。
#[derive(Debug, Default)]
pub struct OfflineDescriber;

impl Describer for OfflineDescriber {
    fn describe(&self, request: &DescriptionRequest) -> Result<String, DescribeError> {
        warn!(kind = %request.entity_type, "未配置实体说明服务");
        Err(DescribeError::Unavailable)
    }
}

/// 命令行会话：持有场景、命令总线与图纸来源。
pub struct CliSession {
    bus: CommandBus,
    scene: Scene,
    source: DrawingSource,
    default_source_name: String,
    describer: Box<dyn Describer>,
}

impl CliSession {
    pub fn new(loaded: LoadedScene, default_source_name: impl Into<String>) -> Self {
        Self {
            bus: CommandBus::new(),
            scene: loaded.scene,
            source: loaded.source,
            default_source_name: default_source_name.into(),
            describer: Box::new(OfflineDescriber),
        }
    }

    pub fn with_describer(mut self, describer: Box<dyn Describer>) -> Self {
        self.describer = describer;
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn source(&self) -> &DrawingSource {
        &self.source
    }

    /// 执行单行命令。空行与 `#` 注释返回 `Ok(None)`。
    pub fn execute(&mut self, line: &str) -> Result<Option<String>, FrontendError> {
        let line = line.trim();
        if line.starts_with('#') {
            return Ok(None);
        }
        let Some(request) = CommandRequest::parse(line) else {
            return Ok(None);
        };
        let message = match request.name.as_str() {
            "load" => self.load(&request)?,
            "export" => {
                let path = self.export(request.args.first().map(PathBuf::from))?;
                format!("已导出 {}", path.display())
            }
            "summary" => summary_lines(&self.scene, &self.source).join("\n"),
            "analyze" => self.analyze(&request)?,
            "help" => self.help(),
            _ => {
                let mut context = CommandContext {
                    scene: &mut self.scene,
                };
                let response = self.bus.dispatch(&request, &mut context);
                let message = response.message.unwrap_or_default();
                if !response.success {
                    return Err(FrontendError::Command {
                        name: request.name,
                        message,
                    });
                }
                message
            }
        };
        Ok(Some(message))
    }

    /// 依次执行脚本中的命令；单条失败只记录告警，返回失败条数。
    pub fn run_script<I, S>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut failures = 0;
        for line in lines {
            match self.execute(line.as_ref()) {
                Ok(Some(message)) => println!("[命令] {message}"),
                Ok(None) => {}
                Err(err) => {
                    failures += 1;
                    warn!(command = line.as_ref().trim(), error = %err, "CLI 命令执行失败");
                    println!("[错误] {err}");
                }
            }
        }
        failures
    }

    /// 交互模式：逐行读取命令，`quit`/`exit` 或输入结束时退出。
    pub fn run_interactive<R: BufRead>(&mut self, input: R) -> Result<(), FrontendError> {
        println!("输入 help 查看可用命令，quit 退出。");
        prompt();
        for line in input.lines() {
            let line = line.map_err(FrontendError::Stdin)?;
            if matches!(line.trim(), "quit" | "exit") {
                break;
            }
            self.run_script([line.as_str()]);
            prompt();
        }
        Ok(())
    }

    /// 导出交换格式 JSON。未给出路径时按源文件名生成 `<名称>.json`。
    pub fn export(&self, path: Option<PathBuf>) -> Result<PathBuf, FrontendError> {
        let source_name = self.source.file_name();
        let path = path.unwrap_or_else(|| PathBuf::from(export_file_name(source_name.as_deref())));
        let saver = JsonFacade::with_source_name(
            source_name.unwrap_or_else(|| self.default_source_name.clone()),
        );
        saver.save(self.scene.drawing(), &path)?;
        Ok(path)
    }

    fn load(&mut self, request: &CommandRequest) -> Result<String, FrontendError> {
        let Some(raw) = request.args.first() else {
            return Err(usage("load", "load <path>"));
        };
        let path = Path::new(raw);
        let drawing = load_drawing(path)?;
        let count = drawing.len();
        self.scene.load_drawing(drawing);
        self.source = DrawingSource::File(path.to_path_buf());
        info!(path = %path.display(), entities = count, "已替换当前图纸");
        Ok(format!("已载入 {count} 个实体"))
    }

    /// `analyze [id]`：给出 ID 时先单选该实体。
    fn analyze(&mut self, request: &CommandRequest) -> Result<String, FrontendError> {
        if let Some(raw) = request.args.first() {
            let id = raw
                .parse::<u64>()
                .map(EntityId::new)
                .map_err(|_| usage("analyze", "analyze [id]"))?;
            self.scene.select_only(id).map_err(|err| FrontendError::Command {
                name: "analyze".into(),
                message: err.to_string(),
            })?;
        }
        self.scene
            .analyze_selection(self.describer.as_ref())
            .map_err(|err| FrontendError::Command {
                name: "analyze".into(),
                message: err.to_string(),
            })?;
        Ok(self.scene.analysis().message().unwrap_or_default().to_string())
    }

    fn help(&self) -> String {
        let mut commands: Vec<&str> = self
            .bus
            .available_commands()
            .copied()
            .chain(SESSION_COMMANDS)
            .collect();
        commands.sort_unstable();
        format!("支持的命令: {}", commands.join(", "))
    }
}

fn usage(name: &str, text: &str) -> FrontendError {
    FrontendError::Command {
        name: name.to_string(),
        message: format!("用法: {text}"),
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn layer_source(drawing: &Drawing, name: &str) -> ColorSource {
    drawing
        .layer(name)
        .map(Layer::color_source)
        .unwrap_or_default()
}

/// 场景概览：来源、视口状态、按图层分组的实体及其颜色与几何摘要。
pub fn summary_lines(scene: &Scene, source: &DrawingSource) -> Vec<String> {
    let drawing = scene.drawing();
    let frame = scene.render();
    let status = frame.status;
    let mut lines = Vec::new();

    match source {
        DrawingSource::File(path) => lines.push(format!("图纸来源：{}", path.display())),
        DrawingSource::Blank => lines.push("图纸来源：空白画布".to_string()),
    }
    lines.push(format!(
        "实体 {} 个，图层 {} 个",
        drawing.len(),
        drawing.layers().count()
    ));
    let offset = scene.viewport().offset();
    lines.push(format!(
        "视口缩放={:.4}, 原点屏幕坐标=({:.1}, {:.1}), 可见 X 范围=[{:.2}, {:.2}], 网格步长={}",
        status.scale, offset.x, offset.y, status.visible_x.0, status.visible_x.1, status.grid_step
    ));
    if let Some(cursor) = status.cursor {
        lines.push(format!("光标=({:.2}, {:.2})", cursor.x(), cursor.y()));
    }
    lines.push(format!(
        "当前工具={}, 归类阶段={}",
        scene.tool(),
        scene.sectioning().phase()
    ));

    if scene.selection().is_empty() {
        lines.push("当前尚未选中任何实体。".to_string());
    } else {
        let ids: Vec<String> = scene.selection().iter().map(ToString::to_string).collect();
        lines.push(format!("选中集包含实体 ID：{}", ids.join(", ")));
    }

    lines.push("图层：".to_string());
    for layer in drawing.layers() {
        let layer_color = describe_color(ColorSource::default(), layer.color_source());
        let members: Vec<_> = drawing.entities_on_layer(&layer.name).collect();
        lines.push(format!(
            "  - {} (可见: {}, 颜色: {}) {} 个实体",
            layer.name,
            if layer.is_visible { "是" } else { "否" },
            layer_color.rgb.to_hex(),
            members.len()
        ));
        for (id, entity) in members {
            let color = describe_color(entity.color_source(), layer_source(drawing, &layer.name));
            lines.push(format!(
                "      #{id} {} 颜色={} ({}) 几何={}",
                entity.kind(),
                color.rgb.to_hex(),
                color.label,
                geometry_summary(entity)
            ));
        }
    }

    if let Some(message) = scene.analysis().message() {
        lines.push(format!("实体说明：{message}"));
    }
    lines
}
