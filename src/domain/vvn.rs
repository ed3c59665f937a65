// ==========================================
// 港口靠泊管理 - 船舶靠泊申报 (VVN) 聚合根
// ==========================================
// 状态机:
//   (new) ──draft──▶ InProgress ──submit──▶ Submitted ──approve──▶ Accepted
//                        ▲                    │  ▲                   │
//                        │                 reject └──resubmit────────┘
//                 convert_to_draft            ▼     update_and_resubmit
//                        └───────────────  Rejected
// 红线:
// - 非法转换在 VvnTransition::target 处统一拒绝
// - 守卫失败时聚合保持原状 (先校验候选值,后提交)
// - 到港/离港都存在且状态 ≥ Submitted 时, 离港必须晚于到港
// - 同方向舱单最多一份
// ==========================================

use crate::domain::conflict::{ActiveVisit, ConflictDetector, ConflictScope, VisitConflictQuery};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::hazard::{ContainerSnapshot, HazardAggregator};
use crate::domain::imo::ImoNumber;
use crate::domain::manifest::{CargoManifest, ManifestEntry};
use crate::domain::types::{ManifestType, VvnStatus};
use crate::domain::visit_window::VisitWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// VvnTransition - 显式转换表
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VvnTransition {
    /// 草稿内编辑 (日期/舱单)
    EditDraft,
    Submit,
    Approve,
    Reject,
    ConvertToDraft,
    UpdateAndResubmit,
    Resubmit,
}

impl VvnTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            VvnTransition::EditDraft => "edit",
            VvnTransition::Submit => "submit",
            VvnTransition::Approve => "approve",
            VvnTransition::Reject => "reject",
            VvnTransition::ConvertToDraft => "convert to draft",
            VvnTransition::UpdateAndResubmit => "update and resubmit",
            VvnTransition::Resubmit => "resubmit",
        }
    }

    /// 目标状态; None 表示该状态下不允许此操作
    pub fn target(&self, from: VvnStatus) -> Option<VvnStatus> {
        use VvnStatus::*;
        match (from, self) {
            (InProgress, VvnTransition::EditDraft) => Some(InProgress),
            (InProgress, VvnTransition::Submit) => Some(Submitted),
            (Submitted, VvnTransition::Approve) => Some(Accepted),
            (Submitted, VvnTransition::Reject) => Some(Rejected),
            (Rejected, VvnTransition::ConvertToDraft) => Some(InProgress),
            (Submitted | Accepted, VvnTransition::UpdateAndResubmit) => Some(Submitted),
            (Accepted, VvnTransition::Resubmit) => Some(Submitted),
            _ => None,
        }
    }
}

/// 审批结果: 记录被显式覆盖的码头冲突
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApprovalOutcome {
    pub overridden_conflicts: Vec<ActiveVisit>,
}

impl ApprovalOutcome {
    pub fn had_conflicts(&self) -> bool {
        !self.overridden_conflicts.is_empty()
    }
}

// ==========================================
// VvnSnapshot - 聚合的纯数据形态 (供仓储序列化)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VvnSnapshot {
    pub vvn_id: String,
    pub imo: ImoNumber,
    pub arrival: Option<DateTime<Utc>>,
    pub departure: Option<DateTime<Utc>>,
    pub status: VvnStatus,
    pub loading_manifest: Option<CargoManifest>,
    pub unloading_manifest: Option<CargoManifest>,
    pub is_hazardous: bool,
    pub assigned_dock_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewing_officer_id: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revision: i32,
}

// ==========================================
// VesselVisitNotification - 聚合根
// ==========================================
#[derive(Debug, Clone)]
pub struct VesselVisitNotification {
    state: VvnSnapshot,
    /// 审批时显式覆盖的码头冲突 (不持久化, 供写入前复核排除)
    acknowledged_dock_conflicts: Vec<String>,
}

impl PartialEq for VesselVisitNotification {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl Eq for VesselVisitNotification {}

impl VesselVisitNotification {
    // ==========================================
    // 创建 / 还原
    // ==========================================

    /// 创建草稿 (自动分配 id)
    pub fn draft(
        imo: ImoNumber,
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
    ) -> Self {
        Self::new_draft(uuid::Uuid::new_v4().to_string(), imo, arrival, departure)
    }

    /// 使用指定 id 创建草稿
    pub fn draft_with_id(
        vvn_id: &str,
        imo: ImoNumber,
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
    ) -> DomainResult<Self> {
        let vvn_id = vvn_id.trim();
        if vvn_id.is_empty() {
            return Err(DomainError::validation("VVN id is required."));
        }
        Ok(Self::new_draft(vvn_id.to_string(), imo, arrival, departure))
    }

    fn new_draft(
        vvn_id: String,
        imo: ImoNumber,
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            state: VvnSnapshot {
                vvn_id,
                imo,
                arrival,
                departure,
                status: VvnStatus::InProgress,
                loading_manifest: None,
                unloading_manifest: None,
                is_hazardous: false,
                assigned_dock_id: None,
                rejection_reason: None,
                reviewing_officer_id: None,
                submitted_at: None,
                reviewed_at: None,
                created_at: now,
                updated_at: now,
                revision: 0,
            },
            acknowledged_dock_conflicts: Vec::new(),
        }
    }

    /// 从纯数据还原,校验与状态相关的结构不变量
    pub fn from_snapshot(snapshot: VvnSnapshot) -> DomainResult<Self> {
        if snapshot.vvn_id.trim().is_empty() {
            return Err(DomainError::validation("VVN id is required."));
        }
        check_slot(snapshot.loading_manifest.as_ref(), ManifestType::Load)
            .map_err(|e| DomainError::validation(e.to_string()))?;
        check_slot(snapshot.unloading_manifest.as_ref(), ManifestType::Unload)
            .map_err(|e| DomainError::validation(e.to_string()))?;
        for manifest in snapshot
            .loading_manifest
            .iter()
            .chain(snapshot.unloading_manifest.iter())
        {
            manifest
                .validate_consistency()
                .map_err(|e| DomainError::validation(e.to_string()))?;
        }

        if !snapshot.status.is_draft() {
            match VisitWindow::from_optional(snapshot.arrival, snapshot.departure) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    return Err(DomainError::validation(format!(
                        "VVN {} in status {} must have both arrival and departure dates.",
                        snapshot.vvn_id, snapshot.status
                    )))
                }
                Err(e) => return Err(DomainError::validation(e.to_string())),
            }
        }
        if snapshot.status == VvnStatus::Accepted && snapshot.assigned_dock_id.is_none() {
            return Err(DomainError::validation(format!(
                "Accepted VVN {} must have an assigned dock.",
                snapshot.vvn_id
            )));
        }
        Ok(Self {
            state: snapshot,
            acknowledged_dock_conflicts: Vec::new(),
        })
    }

    pub fn to_snapshot(&self) -> VvnSnapshot {
        self.state.clone()
    }

    pub fn into_snapshot(self) -> VvnSnapshot {
        self.state
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn id(&self) -> &str {
        &self.state.vvn_id
    }

    pub fn imo(&self) -> &ImoNumber {
        &self.state.imo
    }

    pub fn arrival(&self) -> Option<DateTime<Utc>> {
        self.state.arrival
    }

    pub fn departure(&self) -> Option<DateTime<Utc>> {
        self.state.departure
    }

    /// 当前时间窗 (日期缺失或倒置时为 None)
    pub fn window(&self) -> Option<VisitWindow> {
        VisitWindow::from_optional(self.state.arrival, self.state.departure)
            .ok()
            .flatten()
    }

    pub fn status(&self) -> VvnStatus {
        self.state.status
    }

    pub fn loading_manifest(&self) -> Option<&CargoManifest> {
        self.state.loading_manifest.as_ref()
    }

    pub fn unloading_manifest(&self) -> Option<&CargoManifest> {
        self.state.unloading_manifest.as_ref()
    }

    /// 所有已挂载的舱单
    pub fn manifests(&self) -> impl Iterator<Item = &CargoManifest> {
        self.state
            .loading_manifest
            .iter()
            .chain(self.state.unloading_manifest.iter())
    }

    pub fn is_hazardous(&self) -> bool {
        self.state.is_hazardous
    }

    pub fn assigned_dock_id(&self) -> Option<&str> {
        self.state.assigned_dock_id.as_deref()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.state.rejection_reason.as_deref()
    }

    pub fn reviewing_officer_id(&self) -> Option<&str> {
        self.state.reviewing_officer_id.as_deref()
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.state.submitted_at
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.state.reviewed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.state.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.state.updated_at
    }

    /// 乐观锁修订号
    pub fn revision(&self) -> i32 {
        self.state.revision
    }

    pub(crate) fn set_revision(&mut self, revision: i32) {
        self.state.revision = revision;
    }

    /// 两份舱单合计估算 TEU
    pub fn estimated_teu(&self) -> usize {
        self.manifests().map(|m| m.calculate_estimated_teu()).sum()
    }

    /// 舱单引用的全部集装箱 id
    pub fn referenced_container_ids(&self) -> Vec<&str> {
        self.manifests().flat_map(|m| m.container_ids()).collect()
    }

    /// 舱单引用的全部堆场 id (去重)
    pub fn referenced_storage_area_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .manifests()
            .flat_map(|m| m.entries().iter())
            .filter_map(ManifestEntry::storage_area_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// 冲突比较用快照
    pub fn as_active_visit(&self) -> ActiveVisit {
        ActiveVisit {
            vvn_id: self.state.vvn_id.clone(),
            imo: self.state.imo.clone(),
            dock_id: self.state.assigned_dock_id.clone(),
            status: self.state.status,
            arrival: self.state.arrival,
            departure: self.state.departure,
        }
    }

    // ==========================================
    // 草稿编辑
    // ==========================================

    /// 更新日期 (草稿可保存部分/倒置日期,提交时再校验)
    pub fn update_dates(
        &mut self,
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
    ) -> DomainResult<()> {
        self.guard(VvnTransition::EditDraft)?;
        self.state.arrival = arrival;
        self.state.departure = departure;
        self.touch();
        Ok(())
    }

    pub fn set_loading_manifest(&mut self, manifest: CargoManifest) -> DomainResult<()> {
        self.guard(VvnTransition::EditDraft)?;
        check_slot(Some(&manifest), ManifestType::Load)?;
        self.state.loading_manifest = Some(manifest);
        self.touch();
        Ok(())
    }

    pub fn set_unloading_manifest(&mut self, manifest: CargoManifest) -> DomainResult<()> {
        self.guard(VvnTransition::EditDraft)?;
        check_slot(Some(&manifest), ManifestType::Unload)?;
        self.state.unloading_manifest = Some(manifest);
        self.touch();
        Ok(())
    }

    /// 移除装船舱单,返回被移除的舱单
    pub fn remove_loading_manifest(&mut self) -> DomainResult<Option<CargoManifest>> {
        self.guard(VvnTransition::EditDraft)?;
        let removed = self.state.loading_manifest.take();
        self.touch();
        Ok(removed)
    }

    pub fn remove_unloading_manifest(&mut self) -> DomainResult<Option<CargoManifest>> {
        self.guard(VvnTransition::EditDraft)?;
        let removed = self.state.unloading_manifest.take();
        self.touch();
        Ok(removed)
    }

    /// 按条目方向追加到对应舱单 (舱单不存在时自动创建)
    pub fn add_manifest_entry(&mut self, entry: ManifestEntry) -> DomainResult<()> {
        self.guard(VvnTransition::EditDraft)?;
        let direction = entry.direction();
        let slot = self.slot_mut(direction);
        match slot.take() {
            Some(mut manifest) => {
                let added = manifest.add_entry(entry);
                *slot = Some(manifest);
                added?;
            }
            None => *slot = Some(CargoManifest::with_entries(direction, [entry])?),
        }
        self.touch();
        Ok(())
    }

    /// 从指定方向舱单移除集装箱 (幂等)
    pub fn remove_manifest_entry(
        &mut self,
        manifest_type: ManifestType,
        container_id: &str,
    ) -> DomainResult<bool> {
        self.guard(VvnTransition::EditDraft)?;
        let removed = self
            .slot_mut(manifest_type)
            .as_mut()
            .is_some_and(|m| m.remove_entry(container_id));
        if removed {
            self.touch();
        }
        Ok(removed)
    }

    /// 按集装箱快照重算危险品标记
    ///
    /// 舱单变更后、提交前由调用方触发
    pub fn update_hazardous_status(&mut self, containers: &[ContainerSnapshot]) {
        let hazardous = HazardAggregator::is_hazardous(self.manifests(), containers);
        if hazardous != self.state.is_hazardous {
            self.state.is_hazardous = hazardous;
            self.touch();
        }
    }

    // ==========================================
    // 状态转换
    // ==========================================

    /// 提交: InProgress → Submitted
    ///
    /// # 守卫
    /// - 到港/离港日期齐全且离港晚于到港
    /// - 舱单一致性校验通过
    /// - 同船舶无活跃 VVN 时间窗冲突
    pub fn submit(&mut self, conflicts: &dyn VisitConflictQuery) -> DomainResult<()> {
        let next = self.guard(VvnTransition::Submit)?;
        let window = validate_submission(
            self.state.arrival,
            self.state.departure,
            self.state.loading_manifest.as_ref(),
            self.state.unloading_manifest.as_ref(),
        )?;
        self.ensure_no_vessel_conflicts(conflicts, &window)?;

        let now = Utc::now();
        self.state.status = next;
        self.state.submitted_at = Some(now);
        self.state.updated_at = now;
        Ok(())
    }

    /// 审批通过: Submitted → Accepted
    ///
    /// 码头能力校验由调用方完成; 此处只做码头时间窗冲突。
    /// 存在冲突且 `override_conflicts` 为 false 时返回可覆盖的冲突错误。
    pub fn approve(
        &mut self,
        dock_id: &str,
        officer_id: &str,
        conflicts: &dyn VisitConflictQuery,
        override_conflicts: bool,
    ) -> DomainResult<ApprovalOutcome> {
        let next = self.guard(VvnTransition::Approve)?;
        let dock_id = required("Dock id", dock_id)?;
        let officer_id = required("Reviewing officer id", officer_id)?;
        let window = self.window().ok_or_else(|| {
            DomainError::business_rule("A submitted VVN must have a valid visit window.")
        })?;

        let found =
            ConflictDetector::find_dock_conflicts(conflicts, &dock_id, &window, Some(self.id()))?;
        if !override_conflicts {
            ConflictDetector::ensure_none(ConflictScope::Dock(dock_id.clone()), &window, found, true)?;
            return Ok(self.commit_approval(next, dock_id, officer_id, Vec::new()));
        }
        Ok(self.commit_approval(next, dock_id, officer_id, found))
    }

    fn commit_approval(
        &mut self,
        next: VvnStatus,
        dock_id: String,
        officer_id: String,
        overridden_conflicts: Vec<ActiveVisit>,
    ) -> ApprovalOutcome {
        let now = Utc::now();
        self.state.status = next;
        self.state.assigned_dock_id = Some(dock_id);
        self.state.reviewing_officer_id = Some(officer_id);
        self.state.rejection_reason = None;
        self.state.reviewed_at = Some(now);
        self.state.updated_at = now;
        self.acknowledged_dock_conflicts = overridden_conflicts
            .iter()
            .map(|v| v.vvn_id.clone())
            .collect();
        ApprovalOutcome {
            overridden_conflicts,
        }
    }

    /// 驳回: Submitted → Rejected
    pub fn reject(&mut self, reason: &str, officer_id: &str) -> DomainResult<()> {
        let next = self.guard(VvnTransition::Reject)?;
        let reason = required("Rejection reason", reason)?;
        let officer_id = required("Reviewing officer id", officer_id)?;

        let now = Utc::now();
        self.state.status = next;
        self.state.rejection_reason = Some(reason);
        self.state.reviewing_officer_id = Some(officer_id);
        self.state.assigned_dock_id = None;
        self.state.reviewed_at = Some(now);
        self.state.updated_at = now;
        Ok(())
    }

    /// 驳回后转回草稿: Rejected → InProgress
    ///
    /// 清除审核信息,保留日期与舱单
    pub fn convert_to_draft(&mut self) -> DomainResult<()> {
        let next = self.guard(VvnTransition::ConvertToDraft)?;
        self.state.status = next;
        self.clear_review();
        self.state.submitted_at = None;
        self.touch();
        Ok(())
    }

    /// 修改并重新提交: Submitted/Accepted → Submitted
    ///
    /// 新值先完整走提交守卫,失败时聚合不变
    pub fn update_and_resubmit(
        &mut self,
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
        loading_manifest: Option<CargoManifest>,
        unloading_manifest: Option<CargoManifest>,
        conflicts: &dyn VisitConflictQuery,
    ) -> DomainResult<()> {
        let next = self.guard(VvnTransition::UpdateAndResubmit)?;
        check_slot(loading_manifest.as_ref(), ManifestType::Load)?;
        check_slot(unloading_manifest.as_ref(), ManifestType::Unload)?;
        let window = validate_submission(
            arrival,
            departure,
            loading_manifest.as_ref(),
            unloading_manifest.as_ref(),
        )?;
        self.ensure_no_vessel_conflicts(conflicts, &window)?;

        let now = Utc::now();
        self.state.arrival = arrival;
        self.state.departure = departure;
        self.state.loading_manifest = loading_manifest;
        self.state.unloading_manifest = unloading_manifest;
        self.state.status = next;
        self.clear_review();
        self.state.submitted_at = Some(now);
        self.state.updated_at = now;
        Ok(())
    }

    /// 不改数据重新提交: Accepted → Submitted
    pub fn resubmit(&mut self, conflicts: &dyn VisitConflictQuery) -> DomainResult<()> {
        let next = self.guard(VvnTransition::Resubmit)?;
        let window = validate_submission(
            self.state.arrival,
            self.state.departure,
            self.state.loading_manifest.as_ref(),
            self.state.unloading_manifest.as_ref(),
        )?;
        self.ensure_no_vessel_conflicts(conflicts, &window)?;

        let now = Utc::now();
        self.state.status = next;
        self.clear_review();
        self.state.submitted_at = Some(now);
        self.state.updated_at = now;
        Ok(())
    }

    /// 写入前复核冲突 (由存储在写锁/写事务内调用)
    ///
    /// - Submitted / Accepted: 同船舶不得与其他活跃 VVN 重叠
    /// - Accepted: 同码头不得重叠, 审批时已显式覆盖的 VVN 除外
    ///
    /// 其余状态或日期不全时直接通过
    pub fn recheck_conflicts(&self, conflicts: &dyn VisitConflictQuery) -> DomainResult<()> {
        if !self.state.status.is_active() {
            return Ok(());
        }
        let Some(window) = self.window() else {
            return Ok(());
        };
        self.ensure_no_vessel_conflicts(conflicts, &window)?;

        if self.state.status != VvnStatus::Accepted {
            return Ok(());
        }
        let Some(dock_id) = self.assigned_dock_id() else {
            return Ok(());
        };
        let unacknowledged: Vec<ActiveVisit> =
            ConflictDetector::find_dock_conflicts(conflicts, dock_id, &window, Some(self.id()))?
                .into_iter()
                .filter(|v| !self.acknowledged_dock_conflicts.contains(&v.vvn_id))
                .collect();
        ConflictDetector::ensure_none(
            ConflictScope::Dock(dock_id.to_string()),
            &window,
            unacknowledged,
            false,
        )
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn guard(&self, transition: VvnTransition) -> DomainResult<VvnStatus> {
        transition
            .target(self.state.status)
            .ok_or(DomainError::InvalidTransition {
                from: self.state.status,
                operation: transition.as_str(),
            })
    }

    fn ensure_no_vessel_conflicts(
        &self,
        conflicts: &dyn VisitConflictQuery,
        window: &VisitWindow,
    ) -> DomainResult<()> {
        let found =
            ConflictDetector::find_vessel_conflicts(conflicts, self.imo(), window, Some(self.id()))?;
        ConflictDetector::ensure_none(ConflictScope::Vessel(self.imo().clone()), window, found, false)
    }

    fn slot_mut(&mut self, manifest_type: ManifestType) -> &mut Option<CargoManifest> {
        match manifest_type {
            ManifestType::Load => &mut self.state.loading_manifest,
            ManifestType::Unload => &mut self.state.unloading_manifest,
        }
    }

    fn clear_review(&mut self) {
        self.acknowledged_dock_conflicts.clear();
        self.state.assigned_dock_id = None;
        self.state.reviewing_officer_id = None;
        self.state.rejection_reason = None;
        self.state.reviewed_at = None;
    }

    fn touch(&mut self) {
        self.state.updated_at = Utc::now();
    }
}

/// 提交守卫 (不含冲突检查),返回合法时间窗
fn validate_submission(
    arrival: Option<DateTime<Utc>>,
    departure: Option<DateTime<Utc>>,
    loading_manifest: Option<&CargoManifest>,
    unloading_manifest: Option<&CargoManifest>,
) -> DomainResult<VisitWindow> {
    let arrival = arrival
        .ok_or_else(|| DomainError::business_rule("Arrival date is required for submission."))?;
    let departure = departure
        .ok_or_else(|| DomainError::business_rule("Departure date is required for submission."))?;
    let window = VisitWindow::new(arrival, departure)?;

    for manifest in loading_manifest.into_iter().chain(unloading_manifest) {
        manifest.validate_consistency()?;
    }
    Ok(window)
}

fn check_slot(manifest: Option<&CargoManifest>, expected: ManifestType) -> DomainResult<()> {
    match manifest {
        Some(m) if m.manifest_type() != expected => Err(DomainError::business_rule(format!(
            "Expected a {} manifest, but got a {} manifest.",
            expected,
            m.manifest_type()
        ))),
        _ => Ok(()),
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{} is required.", field)));
    }
    Ok(trimmed.to_string())
}
