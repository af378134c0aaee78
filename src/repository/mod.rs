// ==========================================
// 试验台遥测系统 - 数据仓储层（元数据库）
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod csv_import_repo;
pub mod error;
pub mod quantity_repo;
pub mod sensor_repo;
pub mod session_repo;

// 重导出核心仓储
pub use csv_import_repo::CsvImportRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use quantity_repo::MeasuredQuantityRepository;
pub use sensor_repo::{SensorChannelRepository, SensorChannelRepositoryImpl};
pub use session_repo::{MotorGroupRepository, SessionRepository};
