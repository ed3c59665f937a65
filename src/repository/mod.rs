// ==========================================
// 港口靠泊管理 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod memory_store;
pub mod visit_index;
pub mod visit_store;
pub mod vvn_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use memory_store::InMemoryVisitStore;
pub use visit_index::VisitIndex;
pub use visit_store::VisitStore;
pub use vvn_repo::VesselVisitRepository;
