// ==========================================
// 试验台遥测系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 行级错误不在此列：行解析失败只计数，不中断导入
// ==========================================

use crate::config::ConfigError;
use crate::repository::RepositoryError;
use crate::timeseries::TimeseriesError;
use thiserror::Error;

/// 导入流水线错误（导致整次导入失败）
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("CSV 文件为空")]
    EmptyFile,

    #[error("文件编码错误（需要 UTF-8）: {0}")]
    Encoding(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 表头错误 =====
    #[error("缺少必需列: {0}")]
    MissingColumns(String),

    // ===== 配置错误 =====
    #[error("测量量未配置: {0}")]
    QuantityNotConfigured(String),

    #[error("导入配置错误: {0}")]
    Config(#[from] ConfigError),

    // ===== 下游错误 =====
    #[error("元数据存储失败: {0}")]
    Repository(#[from] RepositoryError),

    #[error("时序库写入失败: {0}")]
    Timeseries(#[from] TimeseriesError),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
