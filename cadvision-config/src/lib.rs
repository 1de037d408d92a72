use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV_VAR: &str = "CADVISION_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub viewport: ViewportConfig,
    #[serde(default)]
    pub frontend: FrontendConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `CADVISION_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        Self::discover_with(None)
    }

    /// 命令行显式给出的路径优先于环境变量与默认位置，且必须存在。
    pub fn discover_with(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 视口与交互参数。无界面运行时画布尺寸取 `canvas_width` × `canvas_height`。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub min_scale: f64,
    pub max_scale: f64,
    pub zoom_sensitivity: f64,
    pub zoom_step: f64,
    pub pick_tolerance_px: f64,
    pub grid_min_pixels: f64,
    pub target_world_width: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 1e-6,
            max_scale: 200_000.0,
            zoom_sensitivity: 0.015,
            zoom_step: 1.5,
            pick_tolerance_px: 12.0,
            grid_min_pixels: 20.0,
            target_world_width: 120.0,
            canvas_width: 1024.0,
            canvas_height: 768.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontendMode {
    /// 执行命令脚本后输出场景摘要。
    #[default]
    Cli,
    /// 从标准输入逐行读取命令。
    Interactive,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrontendConfig {
    #[serde(default)]
    pub default_mode: FrontendMode,
    #[serde(default = "FrontendConfig::default_export_name")]
    pub default_export_name: String,
}

impl FrontendConfig {
    fn default_export_name() -> String {
        "untitled.dxf".to_string()
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            default_mode: FrontendMode::default(),
            default_export_name: Self::default_export_name(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_every_section() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Cli);
        assert_eq!(cfg.frontend.default_export_name, "untitled.dxf");
        assert_eq!(cfg.viewport.max_scale, 200_000.0);
        assert_eq!(cfg.viewport.zoom_step, 1.5);
        assert_eq!(cfg.viewport.canvas_width, 1024.0);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [viewport]
            pick_tolerance_px = 8.0
            canvas_width = 640.0

            [frontend]
            default_mode = "interactive"
            "#
        )
        .unwrap();

        let cfg = AppConfig::discover_with(Some(file.path())).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.frontend.default_mode, FrontendMode::Interactive);
        assert_eq!(cfg.frontend.default_export_name, "untitled.dxf");
        assert_eq!(cfg.viewport.pick_tolerance_px, 8.0);
        assert_eq!(cfg.viewport.canvas_width, 640.0);
        // 未出现的字段回落到默认值
        assert_eq!(cfg.viewport.canvas_height, 768.0);
        assert_eq!(cfg.viewport.zoom_sensitivity, 0.015);
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let missing = dir.path().join("nope.toml");
        let error = AppConfig::discover_with(Some(&missing)).unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[viewport]\nmin_scale = \"small\"").unwrap();
        let error = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }));
    }
}
