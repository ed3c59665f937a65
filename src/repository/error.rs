// ==========================================
// 港口靠泊管理 - 仓储层错误类型
// ==========================================
// 并发控制: revision 乐观锁
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::conflict::{ActiveVisit, ConflictReport};
use crate::domain::error::DomainError;
use crate::domain::vvn::VesselVisitNotification;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 并发控制错误 =====
    #[error("乐观锁冲突: vvn_id={vvn_id}, expected_revision={expected}, actual_revision={actual}")]
    OptimisticLockFailure {
        vvn_id: String,
        expected: i32,
        actual: i32,
    },

    /// 写事务内复核发现其他写者已占用的时间窗
    #[error("写入冲突: {0}")]
    ConflictDetected(ConflictReport),

    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 数据质量错误 =====
    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    /// 持久化数据无法还原为合法聚合
    #[error("数据损坏 (vvn_id={vvn_id}): {message}")]
    CorruptRecord { vvn_id: String, message: String },

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

// 仓储错误进入领域层时的映射
impl From<RepositoryError> for DomainError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                vvn_id,
                expected,
                actual,
            } => DomainError::StaleRevision {
                vvn_id,
                expected,
                actual,
            },
            RepositoryError::ConflictDetected(report) => DomainError::Conflict(report),
            RepositoryError::NotFound { entity, id } => DomainError::ReferenceNotFound { entity, id },
            other => DomainError::Lookup(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// 写入前冲突复核的结果收敛为仓储错误
#[allow(clippy::ptr_arg)]
pub(crate) fn recheck_before_write(
    vvn: &VesselVisitNotification,
    candidates: &Vec<ActiveVisit>,
) -> RepositoryResult<()> {
    match vvn.recheck_conflicts(candidates) {
        Ok(()) => Ok(()),
        Err(DomainError::Conflict(report)) => Err(RepositoryError::ConflictDetected(report)),
        Err(other) => Err(RepositoryError::Other(other.into())),
    }
}
