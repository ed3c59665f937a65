// ==========================================
// 港口靠泊管理 - 外部协作方接口
// ==========================================
// 职责: 船舶/码头/堆场/集装箱 查询能力 (只读, 按 id 引用)
// 红线: 核心逻辑从不加载或修改这些实体, 只做存在性/能力判断
// ==========================================

use crate::domain::error::DomainResult;
use crate::domain::hazard::ContainerSnapshot;
use crate::domain::imo::ImoNumber;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// ==========================================
// 引用快照
// ==========================================

/// 船舶引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselRef {
    pub imo: ImoNumber,
    pub name: String,
    pub vessel_type_id: String,
}

/// 码头引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockRef {
    pub dock_id: String,
    pub name: String,
    pub allowed_vessel_type_ids: Vec<String>,
}

impl DockRef {
    /// 码头能否停靠该船型
    pub fn can_host(&self, vessel_type_id: &str) -> bool {
        self.allowed_vessel_type_ids
            .iter()
            .any(|t| t == vessel_type_id)
    }
}

/// 堆场引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAreaRef {
    pub storage_area_id: String,
    pub name: String,
}

// ==========================================
// 查询能力 Trait
// ==========================================

pub trait VesselCatalog: Send + Sync {
    fn get_vessel_by_imo(&self, imo: &ImoNumber) -> DomainResult<Option<VesselRef>>;
}

pub trait DockCatalog: Send + Sync {
    fn get_dock_by_id(&self, dock_id: &str) -> DomainResult<Option<DockRef>>;
}

pub trait StorageAreaCatalog: Send + Sync {
    fn get_storage_area_by_id(&self, storage_area_id: &str) -> DomainResult<Option<StorageAreaRef>>;
}

pub trait ContainerCatalog: Send + Sync {
    fn get_all_containers(&self) -> DomainResult<Vec<ContainerSnapshot>>;
}

// ==========================================
// ReferenceCatalogs - 协作方聚合
// ==========================================
// 将 4 个查询依赖合并为 1 个参数
#[derive(Clone)]
pub struct ReferenceCatalogs {
    pub vessels: Arc<dyn VesselCatalog>,
    pub docks: Arc<dyn DockCatalog>,
    pub storage_areas: Arc<dyn StorageAreaCatalog>,
    pub containers: Arc<dyn ContainerCatalog>,
}

impl ReferenceCatalogs {
    pub fn new(
        vessels: Arc<dyn VesselCatalog>,
        docks: Arc<dyn DockCatalog>,
        storage_areas: Arc<dyn StorageAreaCatalog>,
        containers: Arc<dyn ContainerCatalog>,
    ) -> Self {
        Self {
            vessels,
            docks,
            storage_areas,
            containers,
        }
    }

    /// 单一实现同时提供全部查询能力时使用
    pub fn from_single<C>(catalog: Arc<C>) -> Self
    where
        C: VesselCatalog + DockCatalog + StorageAreaCatalog + ContainerCatalog + 'static,
    {
        Self {
            vessels: catalog.clone(),
            docks: catalog.clone(),
            storage_areas: catalog.clone(),
            containers: catalog,
        }
    }
}

// ==========================================
// InMemoryCatalog - 内存实现 (测试/嵌入场景)
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    vessels: HashMap<ImoNumber, VesselRef>,
    docks: HashMap<String, DockRef>,
    storage_areas: HashMap<String, StorageAreaRef>,
    containers: Vec<ContainerSnapshot>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vessel(mut self, imo: ImoNumber, name: &str, vessel_type_id: &str) -> Self {
        self.vessels.insert(
            imo.clone(),
            VesselRef {
                imo,
                name: name.to_string(),
                vessel_type_id: vessel_type_id.to_string(),
            },
        );
        self
    }

    pub fn with_dock(mut self, dock_id: &str, allowed_vessel_type_ids: &[&str]) -> Self {
        self.docks.insert(
            dock_id.to_string(),
            DockRef {
                dock_id: dock_id.to_string(),
                name: dock_id.to_string(),
                allowed_vessel_type_ids: allowed_vessel_type_ids
                    .iter()
                    .map(|t| t.to_string())
                    .collect(),
            },
        );
        self
    }

    pub fn with_storage_area(mut self, storage_area_id: &str) -> Self {
        self.storage_areas.insert(
            storage_area_id.to_string(),
            StorageAreaRef {
                storage_area_id: storage_area_id.to_string(),
                name: storage_area_id.to_string(),
            },
        );
        self
    }

    pub fn with_container(mut self, container_id: &str, is_hazardous: bool) -> Self {
        self.containers.retain(|c| c.container_id != container_id);
        self.containers
            .push(ContainerSnapshot::new(container_id, is_hazardous));
        self
    }
}

impl VesselCatalog for InMemoryCatalog {
    fn get_vessel_by_imo(&self, imo: &ImoNumber) -> DomainResult<Option<VesselRef>> {
        Ok(self.vessels.get(imo).cloned())
    }
}

impl DockCatalog for InMemoryCatalog {
    fn get_dock_by_id(&self, dock_id: &str) -> DomainResult<Option<DockRef>> {
        Ok(self.docks.get(dock_id).cloned())
    }
}

impl StorageAreaCatalog for InMemoryCatalog {
    fn get_storage_area_by_id(&self, storage_area_id: &str) -> DomainResult<Option<StorageAreaRef>> {
        Ok(self.storage_areas.get(storage_area_id).cloned())
    }
}

impl ContainerCatalog for InMemoryCatalog {
    fn get_all_containers(&self) -> DomainResult<Vec<ContainerSnapshot>> {
        Ok(self.containers.clone())
    }
}
