use serde::{Deserialize, Serialize};

/// VVN 审批/提交策略
///
/// 存储位置：config_kv（scope_id='global'），每个字段一个键，见 `config_keys`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VvnPolicy {
    /// 是否允许审批人确认后覆盖码头时间窗冲突
    ///
    /// 关闭时调用方传入的覆盖标记被忽略，码头冲突一律拒绝
    #[serde(default = "default_true")]
    pub allow_conflict_override: bool,

    /// 提交时校验舱单引用的堆场是否存在
    #[serde(default = "default_true")]
    pub check_storage_areas: bool,

    /// 提交时校验舱单引用的集装箱是否存在
    #[serde(default = "default_true")]
    pub check_containers: bool,
}

fn default_true() -> bool {
    true
}

impl Default for VvnPolicy {
    fn default() -> Self {
        Self {
            allow_conflict_override: true,
            check_storage_areas: true,
            check_containers: true,
        }
    }
}

impl VvnPolicy {
    /// 实际生效的覆盖标记
    pub fn effective_override(&self, requested: bool) -> bool {
        requested && self.allow_conflict_override
    }
}
