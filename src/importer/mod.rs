// ==========================================
// 试验台遥测系统 - 导入层
// ==========================================
// 职责: 将试验台 CSV 导出解析为读数并写入时序库
// 流程: 行解析 → 传感器解析 → 整批写入 → 导入记录终结
// ==========================================

pub mod csv_importer;
pub mod error;
pub mod row_parser;
pub mod sensor_resolver;

pub use csv_importer::CsvImporter;
pub use error::{ImportError, ImportResult};
pub use row_parser::{parse_timestamp, ParsedRow, RowError, RowParser, REQUIRED_COLUMNS};
pub use sensor_resolver::{SensorResolver, AUTO_SENSOR_NAME, DEFAULT_STAND_NAME};
