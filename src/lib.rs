// ==========================================
// 港口靠泊管理 - 核心库
// ==========================================
// 职责: 船舶靠泊申报 (VVN) 生命周期状态机
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 值对象与聚合根
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 生命周期编排
pub mod engine;

// 配置层 - 审批/提交策略
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ManifestType, VvnStatus};

// 领域实体
pub use domain::{
    ActiveVisit, ApprovalOutcome, CargoManifest, ConflictReport, ContainerSnapshot, DomainError,
    DomainResult, ImoNumber, ManifestEntry, VesselVisitNotification, VisitWindow, VvnSnapshot,
};

// 引擎
pub use engine::{InMemoryCatalog, ReferenceCatalogs, VvnLifecycleService};

// 仓储
pub use repository::{InMemoryVisitStore, VesselVisitRepository, VisitStore};

// 配置
pub use config::{ConfigManager, VvnPolicy};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 数据库版本
pub const DB_VERSION: &str = "v0.1";
