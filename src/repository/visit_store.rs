// ==========================================
// 港口靠泊管理 - VVN 存储能力
// ==========================================
// 实现方: VesselVisitRepository (SQLite) / InMemoryVisitStore
// 并发控制: revision 乐观锁
//   - revision = 0 表示尚未持久化, save 执行插入
//   - revision ≥ 1 时 save 带修订号条件更新, 成功后修订号 +1
// ==========================================

use crate::domain::conflict::VisitConflictQuery;
use crate::domain::vvn::VesselVisitNotification;
use crate::repository::error::RepositoryResult;

pub trait VisitStore: VisitConflictQuery + Send + Sync {
    /// 按 id 加载聚合
    fn find_by_id(&self, vvn_id: &str) -> RepositoryResult<Option<VesselVisitNotification>>;

    /// 保存聚合 (插入或带乐观锁更新), 成功后回写新的修订号
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: 修订号不一致
    /// - `RepositoryError::NotFound`: 更新时记录不存在
    fn save(&self, vvn: &mut VesselVisitNotification) -> RepositoryResult<()>;

    /// 删除 (幂等), 返回是否存在
    fn delete(&self, vvn_id: &str) -> RepositoryResult<bool>;
}
