// ==========================================
// 试验台遥测系统 - API 层
// ==========================================
// 职责: 对外入口（上传接口、命令行工具）
// ==========================================

pub mod error;
pub mod import_api;

pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
