// ==========================================
// 试验台遥测系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型与参考数据
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod catalog;
pub mod telemetry;
pub mod types;

// 重导出核心类型
pub use catalog::{QuantityDef, CANONICAL_QUANTITIES};
pub use telemetry::{
    validate_session_window, CsvImport, MeasuredQuantity, MotorGroup, Sensor, SensorChannel,
    SensorReading, Session, Stand, TimeseriesPoint,
};
pub use types::ImportStatus;
