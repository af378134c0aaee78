// ==========================================
// 试验台遥测系统 - 配置层
// ==========================================
// 职责: 时序库连接与导入参数配置
// 存储: config_kv 表（支持环境变量覆写）
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{
    config_keys, ConfigError, ConfigManager, ConfigResult, ImporterSettings, InfluxSettings,
};
