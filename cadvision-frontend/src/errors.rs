use std::path::PathBuf;

use cadvision_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("命令 `{name}` 执行失败: {message}")]
    Command { name: String, message: String },
    #[error("读取命令脚本 {path:?} 失败: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("读取标准输入失败: {0}")]
    Stdin(#[source] std::io::Error),
}
