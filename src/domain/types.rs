// ==========================================
// 港口靠泊管理 - 领域类型定义
// ==========================================
// 职责: VVN 状态、舱单方向等封闭枚举
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// VVN 状态 (Vessel Visit Notification Status)
// ==========================================
// 初始状态: InProgress (草稿)
// 活跃状态: Submitted / Accepted (参与冲突检测)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VvnStatus {
    InProgress, // 草稿
    Submitted,  // 已提交,待审核
    Accepted,   // 已批准,已分配码头
    Rejected,   // 已驳回
}

impl fmt::Display for VvnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl VvnStatus {
    /// 活跃状态: 已提交或已批准的 VVN 才会阻塞其他 VVN
    pub fn is_active(&self) -> bool {
        matches!(self, VvnStatus::Submitted | VvnStatus::Accepted)
    }

    /// 是否为草稿
    pub fn is_draft(&self) -> bool {
        *self == VvnStatus::InProgress
    }

    /// 从字符串解析状态
    ///
    /// 未知字符串返回 None (不做默认值回退,避免把脏数据当草稿)
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "IN_PROGRESS" => Some(VvnStatus::InProgress),
            "SUBMITTED" => Some(VvnStatus::Submitted),
            "ACCEPTED" => Some(VvnStatus::Accepted),
            "REJECTED" => Some(VvnStatus::Rejected),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            VvnStatus::InProgress => "IN_PROGRESS",
            VvnStatus::Submitted => "SUBMITTED",
            VvnStatus::Accepted => "ACCEPTED",
            VvnStatus::Rejected => "REJECTED",
        }
    }
}

// ==========================================
// 舱单方向 (Manifest Type)
// ==========================================
// Load: 堆场 → 船舶
// Unload: 船舶 → 堆场
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManifestType {
    Load,   // 装船
    Unload, // 卸船
}

impl fmt::Display for ManifestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestType::Load => write!(f, "Load"),
            ManifestType::Unload => write!(f, "Unload"),
        }
    }
}

impl ManifestType {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOAD" => Some(ManifestType::Load),
            "UNLOAD" => Some(ManifestType::Unload),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ManifestType::Load => "LOAD",
            ManifestType::Unload => "UNLOAD",
        }
    }
}
