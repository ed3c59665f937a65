// ==========================================
// 港口靠泊管理 - 领域模型层
// ==========================================
// 职责: 定义值对象、VVN 聚合根、状态机与冲突规则
// 红线: 不含数据访问逻辑,不含 I/O
// ==========================================

pub mod conflict;
pub mod error;
pub mod hazard;
pub mod imo;
pub mod manifest;
pub mod types;
pub mod visit_window;
pub mod vvn;

// 重导出核心类型
pub use conflict::{
    ActiveVisit, ConflictDetector, ConflictReport, ConflictScope, ConflictingVisit,
    VisitConflictQuery,
};
pub use error::{DomainError, DomainResult};
pub use hazard::{ContainerSnapshot, HazardAggregator};
pub use imo::ImoNumber;
pub use manifest::{CargoManifest, ManifestEntry};
pub use types::{ManifestType, VvnStatus};
pub use visit_window::VisitWindow;
pub use vvn::{ApprovalOutcome, VesselVisitNotification, VvnSnapshot, VvnTransition};
