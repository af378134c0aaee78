// ==========================================
// 试验台遥测系统 - 领域类型定义
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 导入状态 (Import Status)
// ==========================================
// 状态机: PENDING → SUCCESS | FAILED，离开 PENDING 后不再变化
// 序列化格式: 小写（与数据库一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Pending, // 处理中
    Success, // 成功
    Failed,  // 失败
}

impl ImportStatus {
    /// 数据库存储值
    pub fn to_db_str(self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Success => "success",
            ImportStatus::Failed => "failed",
        }
    }

    /// 从数据库值解析（未知值返回 None）
    pub fn from_db_str(raw: &str) -> Option<Self> {
        match raw.trim() {
            "pending" => Some(ImportStatus::Pending),
            "success" => Some(ImportStatus::Success),
            "failed" => Some(ImportStatus::Failed),
            _ => None,
        }
    }

    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        !matches!(self, ImportStatus::Pending)
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_status_db_roundtrip() {
        for status in [ImportStatus::Pending, ImportStatus::Success, ImportStatus::Failed] {
            assert_eq!(ImportStatus::from_db_str(status.to_db_str()), Some(status));
        }
        assert_eq!(ImportStatus::from_db_str("done"), None);
    }

    #[test]
    fn test_only_pending_is_not_terminal() {
        assert!(!ImportStatus::Pending.is_terminal());
        assert!(ImportStatus::Success.is_terminal());
        assert!(ImportStatus::Failed.is_terminal());
    }
}
