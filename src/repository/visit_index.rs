// ==========================================
// 港口靠泊管理 - 内存冲突索引
// ==========================================
// 按船舶 IMO 与码头 id 建立二级索引, 查询时扫描同键 VVN 做区间重叠判定
// 语义与 SQL 查询一致, 不依赖数据库即可测试
// ==========================================

use crate::domain::conflict::{ActiveVisit, ConflictDetector, VisitConflictQuery};
use crate::domain::error::DomainResult;
use crate::domain::imo::ImoNumber;
use crate::domain::visit_window::VisitWindow;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct VisitIndex {
    visits: HashMap<String, ActiveVisit>,
    by_vessel: HashMap<ImoNumber, BTreeSet<String>>,
    by_dock: HashMap<String, BTreeSet<String>>,
}

impl VisitIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从快照集合构建
    pub fn build(visits: impl IntoIterator<Item = ActiveVisit>) -> Self {
        let mut index = Self::new();
        for visit in visits {
            index.upsert(visit);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    pub fn get(&self, vvn_id: &str) -> Option<&ActiveVisit> {
        self.visits.get(vvn_id)
    }

    /// 插入或替换 (船舶/码头键变化时同步更新二级索引)
    pub fn upsert(&mut self, visit: ActiveVisit) {
        self.remove(&visit.vvn_id);
        self.by_vessel
            .entry(visit.imo.clone())
            .or_default()
            .insert(visit.vvn_id.clone());
        if let Some(dock_id) = &visit.dock_id {
            self.by_dock
                .entry(dock_id.clone())
                .or_default()
                .insert(visit.vvn_id.clone());
        }
        self.visits.insert(visit.vvn_id.clone(), visit);
    }

    pub fn remove(&mut self, vvn_id: &str) -> Option<ActiveVisit> {
        let removed = self.visits.remove(vvn_id)?;
        detach(&mut self.by_vessel, &removed.imo, vvn_id);
        if let Some(dock_id) = &removed.dock_id {
            detach(&mut self.by_dock, dock_id, vvn_id);
        }
        Some(removed)
    }

    /// 船舶维度冲突
    pub fn vessel_conflicts(
        &self,
        imo: &ImoNumber,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> Vec<ActiveVisit> {
        let ids = self.by_vessel.get(imo);
        ConflictDetector::find_conflicts(self.resolve(ids), window, exclude_vvn_id)
    }

    /// 码头维度冲突
    pub fn dock_conflicts(
        &self,
        dock_id: &str,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> Vec<ActiveVisit> {
        let ids = self.by_dock.get(dock_id);
        ConflictDetector::find_conflicts(self.resolve(ids), window, exclude_vvn_id)
    }

    fn resolve<'a>(
        &'a self,
        ids: Option<&'a BTreeSet<String>>,
    ) -> impl Iterator<Item = &'a ActiveVisit> + 'a {
        ids.into_iter()
            .flatten()
            .filter_map(move |id| self.visits.get(id))
    }
}

fn detach<K>(index: &mut HashMap<K, BTreeSet<String>>, key: &K, vvn_id: &str)
where
    K: std::hash::Hash + Eq,
{
    if let Some(ids) = index.get_mut(key) {
        ids.remove(vvn_id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

impl VisitConflictQuery for VisitIndex {
    fn find_active_visits_for_vessel(
        &self,
        imo: &ImoNumber,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>> {
        Ok(self.vessel_conflicts(imo, window, exclude_vvn_id))
    }

    fn find_active_visits_for_dock(
        &self,
        dock_id: &str,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>> {
        Ok(self.dock_conflicts(dock_id, window, exclude_vvn_id))
    }
}
