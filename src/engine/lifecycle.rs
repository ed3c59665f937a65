// ==========================================
// 港口靠泊管理 - VVN 生命周期服务
// ==========================================
// 职责: 调用方守卫 + 聚合状态转换 + 持久化 + 事件发布
// 调用方守卫:
// - 船舶存在 (创建/提交/审批)
// - 码头存在且可停靠该船型 (审批)
// - 堆场/集装箱存在 (提交路径, 受 VvnPolicy 控制, 草稿跳过)
// - 舱单变更后刷新危险品标记
// 红线:
// - 不拼 SQL, 仅通过 VisitStore 访问存储
// - 写操作经 write_gate 串行化: 冲突检查与保存之间不插入其他写入
// - 事件发布失败只告警, 不回滚已保存的状态
// ==========================================

use crate::config::VvnPolicy;
use crate::domain::conflict::VisitConflictQuery;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::hazard::ContainerSnapshot;
use crate::domain::imo::ImoNumber;
use crate::domain::manifest::{CargoManifest, ManifestEntry};
use crate::domain::types::ManifestType;
use crate::domain::vvn::{ApprovalOutcome, VesselVisitNotification};
use crate::engine::catalogs::{ReferenceCatalogs, VesselRef};
use crate::engine::events::{OptionalEventPublisher, VisitEvent, VisitEventPublisher, VisitEventType};
use crate::repository::visit_store::VisitStore;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::instrument;

// ==========================================
// VvnLifecycleService - VVN 生命周期服务
// ==========================================
pub struct VvnLifecycleService<S: VisitStore> {
    store: Arc<S>,
    catalogs: ReferenceCatalogs,
    publisher: OptionalEventPublisher,
    policy: VvnPolicy,
    write_gate: Mutex<()>,
}

impl<S: VisitStore> VvnLifecycleService<S> {
    /// 创建服务 (默认策略, 不发布事件)
    pub fn new(store: Arc<S>, catalogs: ReferenceCatalogs) -> Self {
        Self {
            store,
            catalogs,
            publisher: OptionalEventPublisher::none(),
            policy: VvnPolicy::default(),
            write_gate: Mutex::new(()),
        }
    }

    pub fn with_policy(mut self, policy: VvnPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn VisitEventPublisher>) -> Self {
        self.publisher = OptionalEventPublisher::with_publisher(publisher);
        self
    }

    pub fn policy(&self) -> &VvnPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get(&self, vvn_id: &str) -> DomainResult<VesselVisitNotification> {
        self.store
            .find_by_id(vvn_id)?
            .ok_or_else(|| DomainError::not_found("VVN", vvn_id))
    }

    // ==========================================
    // 草稿
    // ==========================================

    /// 创建草稿
    ///
    /// 日期可为空或倒置, 提交时再校验
    #[instrument(skip_all, fields(imo = %imo))]
    pub fn create_draft(
        &self,
        imo: &str,
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
    ) -> DomainResult<VesselVisitNotification> {
        let imo = ImoNumber::parse(imo)?;
        self.require_vessel(&imo)?;

        let _gate = self.lock_writes()?;
        let mut vvn = VesselVisitNotification::draft(imo, arrival, departure);
        self.store.save(&mut vvn)?;

        tracing::info!("VVN 草稿已创建: vvn_id={}, imo={}", vvn.id(), vvn.imo());
        Ok(vvn)
    }

    #[instrument(skip_all, fields(vvn_id = %vvn_id))]
    pub fn update_draft_dates(
        &self,
        vvn_id: &str,
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
    ) -> DomainResult<VesselVisitNotification> {
        let (vvn, ()) = self.mutate(vvn_id, |vvn, _| vvn.update_dates(arrival, departure))?;
        Ok(vvn)
    }

    /// 设置舱单 (按舱单方向放入对应槽位, 替换原有舱单)
    #[instrument(skip_all, fields(vvn_id = %vvn_id, manifest_type = %manifest.manifest_type()))]
    pub fn set_manifest(
        &self,
        vvn_id: &str,
        manifest: CargoManifest,
    ) -> DomainResult<VesselVisitNotification> {
        let containers = self.catalogs.containers.get_all_containers()?;
        let (vvn, ()) = self.mutate(vvn_id, |vvn, _| {
            match manifest.manifest_type() {
                ManifestType::Load => vvn.set_loading_manifest(manifest)?,
                ManifestType::Unload => vvn.set_unloading_manifest(manifest)?,
            }
            vvn.update_hazardous_status(&containers);
            Ok(())
        })?;
        Ok(vvn)
    }

    /// 移除舱单, 返回被移除的舱单
    #[instrument(skip(self), fields(vvn_id = %vvn_id))]
    pub fn remove_manifest(
        &self,
        vvn_id: &str,
        manifest_type: ManifestType,
    ) -> DomainResult<Option<CargoManifest>> {
        let containers = self.catalogs.containers.get_all_containers()?;
        let (_, removed) = self.mutate(vvn_id, |vvn, _| {
            let removed = match manifest_type {
                ManifestType::Load => vvn.remove_loading_manifest()?,
                ManifestType::Unload => vvn.remove_unloading_manifest()?,
            };
            vvn.update_hazardous_status(&containers);
            Ok(removed)
        })?;
        Ok(removed)
    }

    #[instrument(skip_all, fields(vvn_id = %vvn_id, container_id = %entry.container_id()))]
    pub fn add_manifest_entry(
        &self,
        vvn_id: &str,
        entry: ManifestEntry,
    ) -> DomainResult<VesselVisitNotification> {
        let containers = self.catalogs.containers.get_all_containers()?;
        let (vvn, ()) = self.mutate(vvn_id, |vvn, _| {
            vvn.add_manifest_entry(entry)?;
            vvn.update_hazardous_status(&containers);
            Ok(())
        })?;
        Ok(vvn)
    }

    /// 移除舱单条目 (幂等), 返回条目是否存在
    #[instrument(skip(self), fields(vvn_id = %vvn_id))]
    pub fn remove_manifest_entry(
        &self,
        vvn_id: &str,
        manifest_type: ManifestType,
        container_id: &str,
    ) -> DomainResult<bool> {
        let containers = self.catalogs.containers.get_all_containers()?;
        let (_, removed) = self.mutate(vvn_id, |vvn, _| {
            let removed = vvn.remove_manifest_entry(manifest_type, container_id)?;
            vvn.update_hazardous_status(&containers);
            Ok(removed)
        })?;
        Ok(removed)
    }

    // ==========================================
    // 状态转换
    // ==========================================

    /// 提交: Draft → Submitted
    #[instrument(skip(self), fields(vvn_id = %vvn_id))]
    pub fn submit(&self, vvn_id: &str) -> DomainResult<VesselVisitNotification> {
        let (vvn, ()) = self.mutate(vvn_id, |vvn, conflicts| {
            self.require_vessel(vvn.imo())?;
            let containers = self.check_manifest_references(vvn.manifests())?;
            vvn.update_hazardous_status(&containers);
            vvn.submit(conflicts)
        })?;

        tracing::info!("VVN 已提交: vvn_id={}, hazardous={}", vvn.id(), vvn.is_hazardous());
        self.publish(&vvn, VisitEventType::Submitted);
        Ok(vvn)
    }

    /// 审批通过: Submitted → Accepted
    ///
    /// `override_conflicts` 仅在策略允许时生效; 被覆盖的冲突以 warn 级别记录
    #[instrument(skip(self), fields(vvn_id = %vvn_id))]
    pub fn approve(
        &self,
        vvn_id: &str,
        dock_id: &str,
        officer_id: &str,
        override_conflicts: bool,
    ) -> DomainResult<ApprovalOutcome> {
        let allow_override = self.policy.effective_override(override_conflicts);
        if override_conflicts && !allow_override {
            tracing::debug!("策略禁止覆盖码头冲突, 忽略覆盖标记: vvn_id={}", vvn_id);
        }

        let (vvn, outcome) = self.mutate(vvn_id, |vvn, conflicts| {
            let vessel = self.require_vessel(vvn.imo())?;
            self.require_capable_dock(dock_id.trim(), &vessel)?;
            vvn.approve(dock_id, officer_id, conflicts, allow_override)
        })?;

        if outcome.had_conflicts() {
            let ids: Vec<&str> = outcome
                .overridden_conflicts
                .iter()
                .map(|v| v.vvn_id.as_str())
                .collect();
            tracing::warn!(
                "审批覆盖码头冲突: vvn_id={}, dock_id={:?}, officer_id={:?}, conflicts={:?}",
                vvn.id(),
                vvn.assigned_dock_id(),
                vvn.reviewing_officer_id(),
                ids
            );
        }
        tracing::info!("VVN 已审批: vvn_id={}, dock_id={:?}", vvn.id(), vvn.assigned_dock_id());
        self.publish(&vvn, VisitEventType::Approved);
        Ok(outcome)
    }

    /// 驳回: Submitted → Rejected
    #[instrument(skip(self, reason), fields(vvn_id = %vvn_id))]
    pub fn reject(
        &self,
        vvn_id: &str,
        reason: &str,
        officer_id: &str,
    ) -> DomainResult<VesselVisitNotification> {
        let (vvn, ()) = self.mutate(vvn_id, |vvn, _| vvn.reject(reason, officer_id))?;

        tracing::info!("VVN 已驳回: vvn_id={}", vvn.id());
        self.publish(&vvn, VisitEventType::Rejected);
        Ok(vvn)
    }

    /// 驳回后转回草稿: Rejected → Draft
    #[instrument(skip(self), fields(vvn_id = %vvn_id))]
    pub fn convert_to_draft(&self, vvn_id: &str) -> DomainResult<VesselVisitNotification> {
        let (vvn, ()) = self.mutate(vvn_id, |vvn, _| vvn.convert_to_draft())?;

        self.publish(&vvn, VisitEventType::ReturnedToDraft);
        Ok(vvn)
    }

    /// 修改并重新提交: Submitted/Accepted → Submitted
    ///
    /// 引用校验针对新舱单执行, 失败时存储中的 VVN 不变
    #[instrument(skip(self, loading_manifest, unloading_manifest), fields(vvn_id = %vvn_id))]
    pub fn update_and_resubmit(
        &self,
        vvn_id: &str,
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
        loading_manifest: Option<CargoManifest>,
        unloading_manifest: Option<CargoManifest>,
    ) -> DomainResult<VesselVisitNotification> {
        let (vvn, ()) = self.mutate(vvn_id, |vvn, conflicts| {
            self.require_vessel(vvn.imo())?;
            let containers = self.check_manifest_references(
                loading_manifest.iter().chain(unloading_manifest.iter()),
            )?;
            vvn.update_and_resubmit(arrival, departure, loading_manifest, unloading_manifest, conflicts)?;
            vvn.update_hazardous_status(&containers);
            Ok(())
        })?;

        tracing::info!("VVN 已修改并重新提交: vvn_id={}", vvn.id());
        self.publish(&vvn, VisitEventType::Resubmitted);
        Ok(vvn)
    }

    /// 不改数据重新提交: Accepted → Submitted
    #[instrument(skip(self), fields(vvn_id = %vvn_id))]
    pub fn resubmit(&self, vvn_id: &str) -> DomainResult<VesselVisitNotification> {
        let (vvn, ()) = self.mutate(vvn_id, |vvn, conflicts| {
            self.require_vessel(vvn.imo())?;
            let containers = self.check_manifest_references(vvn.manifests())?;
            vvn.resubmit(conflicts)?;
            vvn.update_hazardous_status(&containers);
            Ok(())
        })?;

        tracing::info!("VVN 已重新提交: vvn_id={}", vvn.id());
        self.publish(&vvn, VisitEventType::Resubmitted);
        Ok(vvn)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn lock_writes(&self) -> DomainResult<MutexGuard<'_, ()>> {
        self.write_gate
            .lock()
            .map_err(|e| DomainError::Lookup(format!("write gate poisoned: {}", e)))
    }

    /// 加载 → 修改 → 保存, 全程持有写锁
    ///
    /// 写锁只串行化本服务实例; 其他连接上的写者由存储在写事务内复核冲突
    fn mutate<T>(
        &self,
        vvn_id: &str,
        op: impl FnOnce(&mut VesselVisitNotification, &dyn VisitConflictQuery) -> DomainResult<T>,
    ) -> DomainResult<(VesselVisitNotification, T)> {
        let _gate = self.lock_writes()?;
        let mut vvn = self.get(vvn_id)?;
        let conflicts: &dyn VisitConflictQuery = self.store.as_ref();
        let result = op(&mut vvn, conflicts)?;
        self.store.save(&mut vvn)?;
        Ok((vvn, result))
    }

    fn require_vessel(&self, imo: &ImoNumber) -> DomainResult<VesselRef> {
        self.catalogs
            .vessels
            .get_vessel_by_imo(imo)?
            .ok_or_else(|| DomainError::not_found("Vessel", imo.as_str()))
    }

    fn require_capable_dock(&self, dock_id: &str, vessel: &VesselRef) -> DomainResult<()> {
        if dock_id.is_empty() {
            return Err(DomainError::validation("Dock id is required."));
        }
        let dock = self
            .catalogs
            .docks
            .get_dock_by_id(dock_id)?
            .ok_or_else(|| DomainError::not_found("Dock", dock_id))?;
        if !dock.can_host(&vessel.vessel_type_id) {
            return Err(DomainError::business_rule(format!(
                "Dock {} cannot host vessel type {}.",
                dock.dock_id, vessel.vessel_type_id
            )));
        }
        Ok(())
    }

    /// 提交路径的舱单引用校验, 返回集装箱快照供危险品刷新复用
    fn check_manifest_references<'a>(
        &self,
        manifests: impl Iterator<Item = &'a CargoManifest>,
    ) -> DomainResult<Vec<ContainerSnapshot>> {
        let containers = self.catalogs.containers.get_all_containers()?;
        let known: HashSet<&str> = containers.iter().map(|c| c.container_id.as_str()).collect();
        let mut checked_areas = HashSet::new();

        for manifest in manifests {
            for entry in manifest.entries() {
                if self.policy.check_storage_areas {
                    if let Some(area_id) = entry.storage_area_id() {
                        if checked_areas.insert(area_id)
                            && self
                                .catalogs
                                .storage_areas
                                .get_storage_area_by_id(area_id)?
                                .is_none()
                        {
                            return Err(DomainError::not_found("Storage area", area_id));
                        }
                    }
                }
                if self.policy.check_containers && !known.contains(entry.container_id()) {
                    return Err(DomainError::not_found("Container", entry.container_id()));
                }
            }
        }
        Ok(containers)
    }

    fn publish(&self, vvn: &VesselVisitNotification, event_type: VisitEventType) {
        let event = VisitEvent::from_vvn(vvn, event_type);
        if let Err(e) = self.publisher.publish(event) {
            tracing::warn!(
                "事件发布失败: vvn_id={}, event_type={}, error={}",
                vvn.id(),
                event_type.as_str(),
                e
            );
        }
    }
}
