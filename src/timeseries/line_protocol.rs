//! InfluxDB 线协议编码

use crate::domain::telemetry::TimeseriesPoint;

/// 线协议构建器（单行）
#[derive(Debug)]
pub struct LineProtocolBuilder {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, f64)>,
    timestamp: Option<i64>,
}

impl LineProtocolBuilder {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: None,
        }
    }

    /// 添加标签（空值标签按线协议要求省略）
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.tags.push((key.into(), value));
        }
        self
    }

    /// 添加浮点字段
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.push((key.into(), value));
        self
    }

    /// 设置时间戳（纳秒）
    #[must_use]
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// 构建线协议字符串；没有字段时返回 None
    pub fn build(self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }

        let mut line = escape_measurement(&self.measurement);
        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape_key(key), value))
            .collect();
        line.push(' ');
        line.push_str(&fields.join(","));

        if let Some(ts) = self.timestamp {
            line.push(' ');
            line.push_str(&ts.to_string());
        }
        Some(line)
    }
}

fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

// 标签键、标签值、字段键的转义规则相同
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// 编码单个时序点
///
/// 非有限数值（NaN/Inf）或超出纳秒表示范围的时间戳无法写入时序库，返回 None
pub fn encode_point(measurement: &str, point: &TimeseriesPoint) -> Option<String> {
    if !point.value.is_finite() {
        return None;
    }
    let ts = point.ts.timestamp_nanos_opt()?;

    // 标签按键名字典序排列
    LineProtocolBuilder::new(measurement)
        .tag("motor_group_id", point.motor_group_id.to_string())
        .tag("quantity", point.quantity.as_str())
        .tag("sensor_id", point.sensor_id.to_string())
        .tag("session_id", point.session_id.to_string())
        .field("value", point.value)
        .timestamp(ts)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_point(value: f64) -> TimeseriesPoint {
        TimeseriesPoint {
            session_id: 4,
            motor_group_id: 2,
            sensor_id: 9,
            quantity: "throttle".to_string(),
            ts: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            value,
        }
    }

    #[test]
    fn test_encode_point() {
        let line = encode_point("readings", &make_point(5.0)).unwrap();
        assert_eq!(
            line,
            "readings,motor_group_id=2,quantity=throttle,sensor_id=9,session_id=4 value=5 1704067200000000000"
        );
    }

    #[test]
    fn test_encode_fractional_value() {
        let line = encode_point("readings", &make_point(-12.25)).unwrap();
        assert!(line.contains(" value=-12.25 "));
    }

    #[test]
    fn test_non_finite_values_skipped() {
        assert!(encode_point("readings", &make_point(f64::NAN)).is_none());
        assert!(encode_point("readings", &make_point(f64::INFINITY)).is_none());
    }

    #[test]
    fn test_escaping() {
        let line = LineProtocolBuilder::new("bench readings")
            .tag("stand name", "hall a,b=c")
            .tag("empty", "")
            .field("value", 1.5)
            .build()
            .unwrap();
        assert_eq!(line, "bench\\ readings,stand\\ name=hall\\ a\\,b\\=c value=1.5");
    }

    #[test]
    fn test_builder_without_fields() {
        assert!(LineProtocolBuilder::new("readings").tag("a", "b").build().is_none());
    }
}
