pub mod cli;
pub mod errors;
pub mod loader;

use std::fs;
use std::path::PathBuf;

use cadvision_config::{AppConfig, FrontendMode};
use cli::{CliSession, summary_lines};
use errors::FrontendError;
use tracing::{info, warn};

/// 命令行给出的运行参数。
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// 启动时载入的 DXF 或 JSON 图纸。
    pub file: Option<PathBuf>,
    /// 逐行读取命令的脚本文件，先于 `commands` 执行。
    pub script: Option<PathBuf>,
    pub commands: Vec<String>,
    /// 结束前导出 JSON 的目标路径。
    pub export: Option<PathBuf>,
    pub mode: Option<FrontendMode>,
}

/// 载入图纸、执行命令并输出场景概览。单条命令失败不会中止运行。
pub fn run(config: &AppConfig, options: RunOptions) -> Result<(), FrontendError> {
    let loaded = loader::load_scene(&config.viewport, options.file.as_deref())?;
    let mut session = CliSession::new(loaded, config.frontend.default_export_name.clone());

    if let Some(path) = &options.script {
        let script = fs::read_to_string(path).map_err(|source| FrontendError::Script {
            path: path.clone(),
            source,
        })?;
        let failures = session.run_script(script.lines());
        info!(path = %path.display(), failures, "命令脚本执行完毕");
    }
    let failures = session.run_script(&options.commands);
    if failures > 0 {
        warn!(failures, "部分命令执行失败");
    }

    match options.mode.unwrap_or(config.frontend.default_mode) {
        FrontendMode::Interactive => {
            info!("进入交互模式");
            session.run_interactive(std::io::stdin().lock())?;
        }
        FrontendMode::Cli => {}
    }

    if let Some(path) = options.export {
        let written = session.export(Some(path))?;
        println!("已导出 {}", written.display());
    }

    for line in summary_lines(session.scene(), session.source()) {
        println!("{line}");
    }
    Ok(())
}
