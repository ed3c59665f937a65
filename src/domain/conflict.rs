// ==========================================
// 港口靠泊管理 - 时间窗冲突检测
// ==========================================
// 规则:
// - 只有 Submitted / Accepted 的 VVN 参与冲突 (草稿/驳回不具约束力)
// - 日期缺失的 VVN 不参与比较
// - 排除被评估的 VVN 本身 (按 id)
// - 半开区间重叠: a1 < b2 && b1 < a2
// 纯查询,无副作用,幂等
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::imo::ImoNumber;
use crate::domain::types::VvnStatus;
use crate::domain::visit_window::VisitWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// ActiveVisit - 参与冲突比较的 VVN 快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveVisit {
    pub vvn_id: String,
    pub imo: ImoNumber,
    pub dock_id: Option<String>,
    pub status: VvnStatus,
    pub arrival: Option<DateTime<Utc>>,
    pub departure: Option<DateTime<Utc>>,
}

impl ActiveVisit {
    /// 合法时间窗 (日期缺失或倒置时为 None)
    pub fn window(&self) -> Option<VisitWindow> {
        VisitWindow::from_optional(self.arrival, self.departure)
            .ok()
            .flatten()
    }
}

// ==========================================
// VisitConflictQuery - 活跃 VVN 查询能力 (由调用方提供)
// ==========================================
// 实现方: 仓储层 (SQLite) / 内存索引
// 返回值可以比冲突集合更宽,最终由 ConflictDetector 精确过滤
pub trait VisitConflictQuery {
    /// 查询同一船舶的活跃 VVN
    fn find_active_visits_for_vessel(
        &self,
        imo: &ImoNumber,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>>;

    /// 查询同一码头的活跃 VVN
    fn find_active_visits_for_dock(
        &self,
        dock_id: &str,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>>;
}

/// 已加载快照集合上的线性扫描
impl VisitConflictQuery for Vec<ActiveVisit> {
    fn find_active_visits_for_vessel(
        &self,
        imo: &ImoNumber,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>> {
        let same_vessel = self.iter().filter(|v| &v.imo == imo);
        Ok(ConflictDetector::find_conflicts(same_vessel, window, exclude_vvn_id))
    }

    fn find_active_visits_for_dock(
        &self,
        dock_id: &str,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>> {
        let same_dock = self
            .iter()
            .filter(|v| v.dock_id.as_deref() == Some(dock_id));
        Ok(ConflictDetector::find_conflicts(same_dock, window, exclude_vvn_id))
    }
}

// ==========================================
// 冲突明细
// ==========================================

/// 冲突范围
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictScope {
    Vessel(ImoNumber),
    Dock(String),
}

/// 冲突的对方 VVN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingVisit {
    pub vvn_id: String,
    pub status: VvnStatus,
    pub window: VisitWindow,
}

/// 冲突报告 (ConflictViolation 的结构化载荷)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub scope: ConflictScope,
    /// 被评估的候选时间窗
    pub window: VisitWindow,
    pub conflicts: Vec<ConflictingVisit>,
    /// 码头审批冲突可由调用方显式确认后覆盖
    pub overridable: bool,
}

impl ConflictReport {
    pub fn conflicting_ids(&self) -> Vec<&str> {
        self.conflicts.iter().map(|c| c.vvn_id.as_str()).collect()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listed = self
            .conflicts
            .iter()
            .map(|c| format!("{} {}", c.vvn_id, c.window))
            .collect::<Vec<_>>()
            .join("; ");
        match &self.scope {
            ConflictScope::Vessel(imo) => write!(
                f,
                "Vessel {} already has an active visit in {}: {}",
                imo, self.window, listed
            ),
            ConflictScope::Dock(dock_id) => {
                write!(
                    f,
                    "Dock {} is already booked in {} by: {}",
                    dock_id, self.window, listed
                )?;
                if self.overridable {
                    write!(f, ". Approve with override to proceed.")?;
                }
                Ok(())
            }
        }
    }
}

// ==========================================
// ConflictDetector - 纯函数工具类
// ==========================================
pub struct ConflictDetector;

impl ConflictDetector {
    /// 过滤出与候选时间窗冲突的活跃 VVN
    ///
    /// 结果按到港时间、id 排序
    pub fn find_conflicts<'a>(
        candidates: impl IntoIterator<Item = &'a ActiveVisit>,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> Vec<ActiveVisit> {
        let mut conflicts: Vec<ActiveVisit> = candidates
            .into_iter()
            .filter(|v| v.status.is_active())
            .filter(|v| exclude_vvn_id != Some(v.vvn_id.as_str()))
            .filter(|v| v.window().is_some_and(|w| w.overlaps(window)))
            .cloned()
            .collect();
        conflicts.sort_by(|a, b| a.arrival.cmp(&b.arrival).then_with(|| a.vvn_id.cmp(&b.vvn_id)));
        conflicts.dedup_by(|a, b| a.vvn_id == b.vvn_id);
        conflicts
    }

    /// 船舶维度冲突查询
    pub fn find_vessel_conflicts(
        query: &dyn VisitConflictQuery,
        imo: &ImoNumber,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>> {
        let candidates = query.find_active_visits_for_vessel(imo, window, exclude_vvn_id)?;
        let same_vessel: Vec<&ActiveVisit> = candidates.iter().filter(|v| &v.imo == imo).collect();
        Ok(Self::find_conflicts(same_vessel, window, exclude_vvn_id))
    }

    /// 码头维度冲突查询
    pub fn find_dock_conflicts(
        query: &dyn VisitConflictQuery,
        dock_id: &str,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>> {
        let candidates = query.find_active_visits_for_dock(dock_id, window, exclude_vvn_id)?;
        let same_dock: Vec<&ActiveVisit> = candidates
            .iter()
            .filter(|v| v.dock_id.as_deref() == Some(dock_id))
            .collect();
        Ok(Self::find_conflicts(same_dock, window, exclude_vvn_id))
    }

    /// 将冲突集合转换为错误 (空集合返回 Ok)
    pub fn ensure_none(
        scope: ConflictScope,
        window: &VisitWindow,
        conflicts: Vec<ActiveVisit>,
        overridable: bool,
    ) -> DomainResult<()> {
        if conflicts.is_empty() {
            return Ok(());
        }
        let conflicts = conflicts
            .into_iter()
            .filter_map(|v| {
                v.window().map(|w| ConflictingVisit {
                    vvn_id: v.vvn_id,
                    status: v.status,
                    window: w,
                })
            })
            .collect();
        Err(DomainError::Conflict(ConflictReport {
            scope,
            window: *window,
            conflicts,
            overridable,
        }))
    }
}
