// ==========================================
// 港口靠泊管理 - 领域错误类型
// ==========================================
// 分类:
// - Validation: 输入结构非法 (缺字段/格式错误)
// - BusinessRule / InvalidTransition: 领域规则守卫失败
// - Conflict: 时间窗冲突 (携带结构化冲突明细)
// - ReferenceNotFound: 引用实体不存在 (协作方查询结果,原样透传)
// 所有错误信息必须是可直接展示给用户的可读文本
// ==========================================

use crate::domain::conflict::ConflictReport;
use crate::domain::types::VvnStatus;
use thiserror::Error;

/// 领域层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BusinessRule(String),

    #[error("Cannot {operation} a VVN in status {from}.")]
    InvalidTransition {
        from: VvnStatus,
        operation: &'static str,
    },

    /// 冲突明细: 调用方可据 `overridable` 提供"确认并覆盖"重试路径
    #[error("{0}")]
    Conflict(ConflictReport),

    #[error("{entity} {id} was not found.")]
    ReferenceNotFound { entity: String, id: String },

    /// 乐观锁冲突: 并发修改导致修订号不一致, 需重新加载后再操作
    #[error("VVN {vvn_id} was modified concurrently (expected revision {expected}, actual revision {actual}). Reload and retry.")]
    StaleRevision {
        vvn_id: String,
        expected: i32,
        actual: i32,
    },

    /// 协作方查询本身失败 (存储层错误)
    #[error("Lookup failed: {0}")]
    Lookup(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn business_rule(msg: impl Into<String>) -> Self {
        DomainError::BusinessRule(msg.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DomainError::ReferenceNotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DomainError::Validation(_))
    }

    /// 冲突错误属于业务规则错误的特化
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            DomainError::BusinessRule(_)
                | DomainError::InvalidTransition { .. }
                | DomainError::Conflict(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::Conflict(_))
    }

    /// 是否为可覆盖的码头冲突 (审批时)
    pub fn is_overridable_conflict(&self) -> bool {
        matches!(self, DomainError::Conflict(report) if report.overridable)
    }

    pub fn conflict_report(&self) -> Option<&ConflictReport> {
        match self {
            DomainError::Conflict(report) => Some(report),
            _ => None,
        }
    }
}

/// Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;
