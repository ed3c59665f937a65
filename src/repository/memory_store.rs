// ==========================================
// 港口靠泊管理 - 内存 VVN 存储
// ==========================================
// 用途: 测试 / 嵌入场景, 无需数据库
// 语义与 SQLite 仓储一致 (乐观锁 + 活跃 VVN 冲突查询 + 写锁内冲突复核)
// ==========================================

use crate::domain::conflict::{ActiveVisit, VisitConflictQuery};
use crate::domain::error::DomainResult;
use crate::domain::imo::ImoNumber;
use crate::domain::visit_window::VisitWindow;
use crate::domain::vvn::{VesselVisitNotification, VvnSnapshot};
use crate::repository::visit_index::VisitIndex;
use crate::repository::error::{recheck_before_write, RepositoryError, RepositoryResult};
use crate::repository::visit_store::VisitStore;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct StoreState {
    visits: HashMap<String, VvnSnapshot>,
    index: VisitIndex,
}

#[derive(Default)]
pub struct InMemoryVisitStore {
    state: RwLock<StoreState>,
}

impl InMemoryVisitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepositoryResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn write(&self) -> RepositoryResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.read().map(|s| s.visits.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VisitConflictQuery for InMemoryVisitStore {
    fn find_active_visits_for_vessel(
        &self,
        imo: &ImoNumber,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>> {
        Ok(self.read()?.index.vessel_conflicts(imo, window, exclude_vvn_id))
    }

    fn find_active_visits_for_dock(
        &self,
        dock_id: &str,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>> {
        Ok(self.read()?.index.dock_conflicts(dock_id, window, exclude_vvn_id))
    }
}

impl VisitStore for InMemoryVisitStore {
    fn find_by_id(&self, vvn_id: &str) -> RepositoryResult<Option<VesselVisitNotification>> {
        let state = self.read()?;
        state
            .visits
            .get(vvn_id)
            .cloned()
            .map(|snapshot| {
                VesselVisitNotification::from_snapshot(snapshot).map_err(|e| {
                    RepositoryError::CorruptRecord {
                        vvn_id: vvn_id.to_string(),
                        message: e.to_string(),
                    }
                })
            })
            .transpose()
    }

    fn save(&self, vvn: &mut VesselVisitNotification) -> RepositoryResult<()> {
        let mut state = self.write()?;
        let actual = state.visits.get(vvn.id()).map(|s| s.revision);

        match (vvn.revision(), actual) {
            (0, None) => {}
            (0, Some(_)) => {
                return Err(RepositoryError::UniqueConstraintViolation(format!(
                    "vessel_visit.vvn_id: {}",
                    vvn.id()
                )))
            }
            (_, None) => {
                return Err(RepositoryError::NotFound {
                    entity: "VVN".to_string(),
                    id: vvn.id().to_string(),
                })
            }
            (expected, Some(actual)) if expected != actual => {
                return Err(RepositoryError::OptimisticLockFailure {
                    vvn_id: vvn.id().to_string(),
                    expected,
                    actual,
                })
            }
            _ => {}
        }

        if let (true, Some(window)) = (vvn.status().is_active(), vvn.window()) {
            let mut candidates = state
                .index
                .vessel_conflicts(vvn.imo(), &window, Some(vvn.id()));
            if let Some(dock_id) = vvn.assigned_dock_id() {
                candidates.extend(state.index.dock_conflicts(dock_id, &window, Some(vvn.id())));
            }
            recheck_before_write(vvn, &candidates)?;
        }

        vvn.set_revision(vvn.revision() + 1);
        state.index.upsert(vvn.as_active_visit());
        state.visits.insert(vvn.id().to_string(), vvn.to_snapshot());
        Ok(())
    }

    fn delete(&self, vvn_id: &str) -> RepositoryResult<bool> {
        let mut state = self.write()?;
        state.index.remove(vvn_id);
        Ok(state.visits.remove(vvn_id).is_some())
    }
}
