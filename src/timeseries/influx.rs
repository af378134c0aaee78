//! InfluxDB 2.x 写入（HTTP `/api/v2/write`，线协议）

use crate::config::InfluxSettings;
use crate::domain::telemetry::{SensorReading, Session, TimeseriesPoint};
use crate::timeseries::error::{TimeseriesError, TimeseriesResult};
use crate::timeseries::line_protocol::encode_point;
use crate::timeseries::TimeseriesWriter;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};

/// InfluxDB 写入器（同步阻塞）
#[derive(Debug)]
pub struct InfluxWriter {
    client: Client,
    settings: InfluxSettings,
}

impl InfluxWriter {
    pub fn new(settings: InfluxSettings) -> TimeseriesResult<Self> {
        debug!(
            url = %settings.url,
            org = %settings.org,
            bucket = %settings.bucket,
            "创建 InfluxDB 写入器"
        );
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TimeseriesError::ClientInit(e.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &InfluxSettings {
        &self.settings
    }

    fn write_url(&self) -> String {
        format!("{}/api/v2/write", self.settings.url.trim_end_matches('/'))
    }

    /// 整批编码为线协议正文
    ///
    /// # 返回
    /// - (body, 编码成功的点数)
    fn encode_batch(&self, session: &Session, readings: &[SensorReading]) -> (String, usize) {
        let mut lines = Vec::with_capacity(readings.len());
        for reading in readings {
            let point = TimeseriesPoint::from_reading(session, reading);
            match encode_point(&self.settings.measurement, &point) {
                Some(line) => lines.push(line),
                None => warn!(
                    quantity = %reading.quantity,
                    ts = %reading.ts,
                    value = reading.value,
                    "读数无法写入时序库，已跳过"
                ),
            }
        }
        let count = lines.len();
        (lines.join("\n"), count)
    }
}

impl TimeseriesWriter for InfluxWriter {
    fn write_points(
        &self,
        session: &Session,
        readings: &[SensorReading],
    ) -> TimeseriesResult<usize> {
        if readings.is_empty() {
            return Ok(0);
        }

        let (body, count) = self.encode_batch(session, readings);
        if count == 0 {
            return Ok(0);
        }

        debug!(
            org = %self.settings.org,
            bucket = %self.settings.bucket,
            points = count,
            body_len = body.len(),
            "写入 InfluxDB"
        );

        let response = self
            .client
            .post(self.write_url())
            .query(&[
                ("org", self.settings.org.as_str()),
                ("bucket", self.settings.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(AUTHORIZATION, format!("Token {}", self.settings.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TimeseriesError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        Ok(count)
    }
}
