// ==========================================
// 试验台遥测系统 - 时序库错误类型
// ==========================================

use thiserror::Error;

/// 时序库写入错误
#[derive(Error, Debug)]
pub enum TimeseriesError {
    #[error("时序库连接失败: {0}")]
    Transport(String),

    #[error("时序库拒绝写入 (HTTP {status}): {body}")]
    Backend { status: u16, body: String },

    #[error("时序库客户端初始化失败: {0}")]
    ClientInit(String),
}

impl From<reqwest::Error> for TimeseriesError {
    fn from(err: reqwest::Error) -> Self {
        TimeseriesError::Transport(err.to_string())
    }
}

/// Result 类型别名
pub type TimeseriesResult<T> = Result<T, TimeseriesError>;
