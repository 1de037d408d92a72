use std::path::PathBuf;

use cadvision_config::{AppConfig, ConfigError, FrontendMode};
use cadvision_frontend::RunOptions;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

const USAGE: &str = "用法: cadvision-app [--config <path>] [--file <drawing>] [--script <path>] \
[--export <path>] [--interactive | --cli] [命令 ...]";

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut options = RunOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--cli" => options.mode = Some(FrontendMode::Cli),
            "--interactive" => options.mode = Some(FrontendMode::Interactive),
            "--config" => config_override = Some(PathBuf::from(required(&mut args, "--config"))),
            "--file" => options.file = Some(PathBuf::from(required(&mut args, "--file"))),
            "--script" => options.script = Some(PathBuf::from(required(&mut args, "--script"))),
            "--export" => options.export = Some(PathBuf::from(required(&mut args, "--export"))),
            "--help" | "-h" => {
                println!("{USAGE}");
                return;
            }
            other if other.starts_with("--") => {
                eprintln!("未知参数：{other}");
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
            // 其余参数按一条命令处理，例如 "zoom_in" 或 "select 3"
            command => options.commands.push(command.to_string()),
        }
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动 CADVision 命令行");

    if let Err(err) = cadvision_frontend::run(&config, options) {
        error!(error = %err, "前端运行失败");
        std::process::exit(1);
    }
}

fn required(args: &mut impl Iterator<Item = String>, flag: &str) -> String {
    match args.next() {
        Some(value) => value,
        None => {
            eprintln!("`{flag}` 需要提供参数值");
            std::process::exit(1);
        }
    }
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match AppConfig::discover_with(override_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            match &err {
                ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                    warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
                }
                ConfigError::Context { .. } => {
                    warn!(error = %err, "加载配置失败，使用内建默认值");
                }
            }
            AppConfig::default()
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
