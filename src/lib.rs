// ==========================================
// 试验台遥测系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite（元数据） + InfluxDB（时序数据）
// 系统定位: 将试验台 CSV 导出导入到采集会话
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 元数据访问
pub mod repository;

// 导入层 - CSV 解析与导入编排
pub mod importer;

// 时序库写入层
pub mod timeseries;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 对外入口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::ImportStatus;

// 领域实体
pub use domain::{
    CsvImport, MeasuredQuantity, MotorGroup, Sensor, SensorChannel, SensorReading, Session,
    Stand, TimeseriesPoint,
};

// 导入
pub use importer::{CsvImporter, ImportError, ImportResult};

// 时序库
pub use timeseries::{InfluxWriter, TimeseriesError, TimeseriesWriter};

// API
pub use api::{ApiError, ApiResult, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "试验台遥测系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
