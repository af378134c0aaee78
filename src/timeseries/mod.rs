// ==========================================
// 试验台遥测系统 - 时序库写入层
// ==========================================
// 职责: 将一次导入累积的读数整批写入外部时序库
// 约束: 每次导入至多一次写入；空批次不写；失败即整体失败（无部分重试）
// ==========================================

pub mod error;
pub mod influx;
pub mod line_protocol;

pub use error::{TimeseriesError, TimeseriesResult};
pub use influx::InfluxWriter;
pub use line_protocol::{encode_point, LineProtocolBuilder};

use crate::domain::telemetry::{SensorReading, Session};
use std::sync::Arc;

// ==========================================
// TimeseriesWriter Trait
// ==========================================
// 实现者: InfluxWriter
pub trait TimeseriesWriter: Send + Sync {
    /// 整批写入一次导入的全部读数
    ///
    /// 每个点带 session_id / motor_group_id / sensor_id / quantity 标签
    ///
    /// # 返回
    /// - Ok(n): 实际写入的点数（空批次为 0，且不发起写入）
    /// - Err: 传输或时序库错误
    fn write_points(&self, session: &Session, readings: &[SensorReading])
        -> TimeseriesResult<usize>;
}

impl<W: TimeseriesWriter + ?Sized> TimeseriesWriter for Arc<W> {
    fn write_points(
        &self,
        session: &Session,
        readings: &[SensorReading],
    ) -> TimeseriesResult<usize> {
        (**self).write_points(session, readings)
    }
}
