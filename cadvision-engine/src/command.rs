use std::collections::HashMap;

use cadvision_core::document::EntityId;
use cadvision_core::geometry::Point2;

use crate::errors::EngineError;
use crate::scene::Scene;
use crate::tools::DrawingTool;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    /// 解析形如 `click 1.5 -2` 的单行命令；空行返回 `None`。
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let name = parts.next()?.to_string();
        Some(Self {
            name,
            args: parts.map(str::to_string).collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

impl From<EngineError> for CommandResponse {
    fn from(error: EngineError) -> Self {
        CommandResponse::err(error.to_string())
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub scene: &'a mut Scene,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(SimpleCommand("reset_view", |scene| {
            scene.reset_view();
            Ok("视口已复位".into())
        }));
        bus.register(SimpleCommand("zoom_in", |scene| {
            scene.zoom_in();
            Ok(format!("缩放比例 {:.4}", scene.viewport().scale()))
        }));
        bus.register(SimpleCommand("zoom_out", |scene| {
            scene.zoom_out();
            Ok(format!("缩放比例 {:.4}", scene.viewport().scale()))
        }));
        bus.register(SimpleCommand("clear_selection", |scene| {
            scene.clear_selection();
            Ok("选中集已清空".into())
        }));
        bus.register(SimpleCommand("clear", |scene| {
            scene.clear();
            Ok("画布已清空".into())
        }));
        bus.register(SimpleCommand("sectioning_start", |scene| {
            Ok(format!("当前阶段: {}", scene.start_sectioning()))
        }));
        bus.register(SimpleCommand("sectioning_confirm", |scene| {
            Ok(format!("当前阶段: {}", scene.confirm_section()?))
        }));
        bus.register(SimpleCommand("sectioning_yes", |scene| {
            Ok(format!("当前阶段: {}", scene.answer_section(true)?))
        }));
        bus.register(SimpleCommand("sectioning_no", |scene| {
            Ok(format!("当前阶段: {}", scene.answer_section(false)?))
        }));
        bus.register(SimpleCommand("sectioning_back", |scene| {
            if scene.section_go_back() {
                Ok(format!("已回退，当前阶段: {}", scene.sectioning().phase()))
            } else {
                Ok("没有可回退的步骤".into())
            }
        }));
        bus.register(SimpleCommand("sectioning_cancel", |scene| {
            scene.cancel_sectioning();
            Ok("分段归类已取消".into())
        }));
        bus.register(SelectCommand);
        bus.register(ToolCommand);
        bus.register(ClickCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 无参数命令。
struct SimpleCommand(
    &'static str,
    fn(&mut Scene) -> Result<String, EngineError>,
);

impl CommandHandler for SimpleCommand {
    fn name(&self) -> &'static str {
        self.0
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match (self.1)(context.scene) {
            Ok(message) => CommandResponse::ok(message),
            Err(error) => error.into(),
        }
    }
}

struct SelectCommand;

impl CommandHandler for SelectCommand {
    fn name(&self) -> &'static str {
        "select"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if request.args.is_empty() {
            return CommandResponse::err("用法: select <id>...");
        }
        // 先校验全部 ID，任何一个无效时选中集保持不变
        let mut ids = Vec::with_capacity(request.args.len());
        for arg in &request.args {
            let Ok(value) = arg.parse::<u64>() else {
                return CommandResponse::err(format!("无效的实体 ID: {arg}"));
            };
            let id = EntityId::new(value);
            if !context.scene.drawing().contains(id) {
                return EngineError::EntityNotFound(id).into();
            }
            ids.push(id);
        }
        for id in &ids {
            if let Err(error) = context.scene.select(*id) {
                return error.into();
            }
        }
        CommandResponse::ok(format!(
            "已选中 {} 个实体，共 {} 个",
            ids.len(),
            context.scene.selection_len()
        ))
    }
}

struct ToolCommand;

impl CommandHandler for ToolCommand {
    fn name(&self) -> &'static str {
        "tool"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let name = request.args.first().map(String::as_str).unwrap_or_default();
        match DrawingTool::from_name(name) {
            Some(tool) => {
                context.scene.set_tool(tool);
                CommandResponse::ok(format!("当前工具: {tool}"))
            }
            None => EngineError::UnknownTool(name.to_string()).into(),
        }
    }
}

/// 以世界坐标模拟一次主键点击。
struct ClickCommand;

impl CommandHandler for ClickCommand {
    fn name(&self) -> &'static str {
        "click"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let coords: Vec<f64> = request
            .args
            .iter()
            .filter_map(|arg| arg.parse().ok())
            .collect();
        let [x, y] = coords[..] else {
            return CommandResponse::err("用法: click <x> <y>");
        };
        let scene = &mut *context.scene;
        match scene.click_world(Point2::new(x, y)) {
            Some(id) => CommandResponse::ok(format!("实体 {id} 已选中")),
            None if scene.tools().is_awaiting_second_point() => {
                CommandResponse::ok("已记录第一点")
            }
            None => CommandResponse::ok("未拾取到实体"),
        }
    }
}
