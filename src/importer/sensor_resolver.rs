// ==========================================
// 试验台遥测系统 - 传感器解析器
// ==========================================
// 职责: 为测量量确定承接读数的传感器
// 顺序: 1. 已有通道（按 sensor_id 升序取第一条）
//       2. 自动补建: 默认试验台 → "Auto Sensor" → 通道
// 缓存: 每次导入一个解析器实例，按测量量键缓存，
//       同一次导入内每个测量量至多查询/补建一次
// 补建的元数据是持久的，导入失败也不回滚
// ==========================================

use crate::domain::telemetry::{MeasuredQuantity, Sensor};
use crate::repository::{RepositoryResult, SensorChannelRepository};
use std::collections::HashMap;
use tracing::{debug, info};

/// 自动补建时使用的默认试验台名称
pub const DEFAULT_STAND_NAME: &str = "Default Stand";

/// 自动补建的传感器名称
pub const AUTO_SENSOR_NAME: &str = "Auto Sensor";

pub struct SensorResolver<'a, R>
where
    R: SensorChannelRepository + ?Sized,
{
    repo: &'a R,
    cache: HashMap<String, Sensor>,
    provisioned: usize,
}

impl<'a, R> SensorResolver<'a, R>
where
    R: SensorChannelRepository + ?Sized,
{
    pub fn new(repo: &'a R) -> Self {
        Self {
            repo,
            cache: HashMap::new(),
            provisioned: 0,
        }
    }

    /// 解析测量量对应的传感器
    pub fn resolve(&mut self, quantity: &MeasuredQuantity) -> RepositoryResult<Sensor> {
        if let Some(sensor) = self.cache.get(&quantity.key) {
            return Ok(sensor.clone());
        }

        let sensor = match self.repo.find_first_sensor_for_quantity(quantity.id)? {
            Some(sensor) => {
                debug!(quantity = %quantity.key, sensor_id = sensor.id, "使用已有通道");
                sensor
            }
            None => self.provision(quantity)?,
        };

        self.cache.insert(quantity.key.clone(), sensor.clone());
        Ok(sensor)
    }

    fn provision(&mut self, quantity: &MeasuredQuantity) -> RepositoryResult<Sensor> {
        let stand = match self.repo.find_first_stand()? {
            Some(stand) => stand,
            None => {
                let (stand, created) = self.repo.get_or_create_stand(DEFAULT_STAND_NAME)?;
                if created {
                    info!(stand_id = stand.id, name = DEFAULT_STAND_NAME, "自动创建默认试验台");
                }
                stand
            }
        };

        let (sensor, sensor_created) = self.repo.get_or_create_sensor(stand.id, AUTO_SENSOR_NAME)?;
        let (channel, channel_created) = self.repo.get_or_create_channel(sensor.id, quantity.id)?;
        self.provisioned += 1;

        info!(
            quantity = %quantity.key,
            stand_id = stand.id,
            sensor_id = sensor.id,
            channel_id = channel.id,
            sensor_created,
            channel_created,
            "测量量无通道，已自动补建"
        );
        Ok(sensor)
    }

    /// 本次导入中触发自动补建的测量量数
    pub fn provisioned_count(&self) -> usize {
        self.provisioned
    }

    /// 已解析（已缓存）的测量量数
    pub fn resolved_count(&self) -> usize {
        self.cache.len()
    }
}
