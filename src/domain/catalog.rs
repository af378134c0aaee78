// ==========================================
// 试验台遥测系统 - 测量量目录（参考数据）
// ==========================================
// 职责: 定义 CSV 六个测量列对应的规范测量量
// 说明: 导入期间只读；建库时写入 measured_quantity 表
// ==========================================

/// 规范测量量定义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityDef {
    pub key: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
}

/// 六个规范测量量（顺序即 CSV 列处理顺序）
pub const CANONICAL_QUANTITIES: [QuantityDef; 6] = [
    QuantityDef { key: "throttle", name: "Throttle", unit: "%" },
    QuantityDef { key: "temperature", name: "Temperature", unit: "°C" },
    QuantityDef { key: "humidity", name: "Humidity", unit: "%" },
    QuantityDef { key: "rpm", name: "RPM", unit: "rpm" },
    QuantityDef { key: "noise", name: "Noise", unit: "dB" },
    QuantityDef { key: "thrust", name: "Thrust", unit: "N" },
];
