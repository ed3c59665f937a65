// ==========================================
// 港口靠泊管理 - 引擎层
// ==========================================
// 职责: 编排协作方查询、聚合状态转换与事件发布
// 红线: Engine 不拼 SQL, 存储访问只经 VisitStore
// ==========================================

pub mod catalogs;
pub mod events;
pub mod lifecycle;

// 重导出核心引擎
pub use catalogs::{
    ContainerCatalog, DockCatalog, DockRef, InMemoryCatalog, ReferenceCatalogs, StorageAreaCatalog,
    StorageAreaRef, VesselCatalog, VesselRef,
};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, VisitEvent, VisitEventPublisher, VisitEventType,
};
pub use lifecycle::VvnLifecycleService;
