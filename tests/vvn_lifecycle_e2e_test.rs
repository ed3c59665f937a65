// ==========================================
// VVN 生命周期端到端测试
// ==========================================
// 测试目标: 草稿 → 提交 → 审批/驳回 → 重新提交 全流程
// 覆盖: 内存存储与 SQLite 仓储两种 VisitStore
// ==========================================


use port_visit_core::config::ConfigManager;
use port_visit_core::domain::visit_window::DEPARTURE_AFTER_ARRIVAL;
use port_visit_core::logging;
use port_visit_core::{
    DomainError, InMemoryVisitStore, ManifestEntry, ManifestType, VisitStore, VvnLifecycleService,
    VvnStatus,
};
use std::sync::Arc;
use test_helpers::*;

fn memory_service() -> VvnLifecycleService<InMemoryVisitStore> {
    VvnLifecycleService::new(Arc::new(InMemoryVisitStore::new()), test_catalogs())
}

/// 在任意 VisitStore 上跑完整流程
fn run_full_lifecycle<S: VisitStore>(svc: &VvnLifecycleService<S>) {
    // 草稿: 日期可以暂时倒置
    let draft = svc
        .create_draft(IMO_AURORA, Some(at(30)), Some(at(10)))
        .unwrap();
    let id = draft.id().to_string();
    assert_eq!(draft.status(), VvnStatus::InProgress);

    let err = svc.submit(&id).unwrap_err();
    assert_eq!(err.to_string(), DEPARTURE_AFTER_ARRIVAL);
    assert_eq!(svc.get(&id).unwrap().status(), VvnStatus::InProgress);

    svc.update_draft_dates(&id, Some(at(0)), Some(at(24))).unwrap();
    svc.add_manifest_entry(&id, ManifestEntry::create_load_entry("C1", "SA-1").unwrap())
        .unwrap();
    svc.set_manifest(&id, unload_manifest(&["C2", "C3"])).unwrap();

    let submitted = svc.submit(&id).unwrap();
    assert_eq!(submitted.status(), VvnStatus::Submitted);
    assert!(submitted.is_hazardous());
    assert_eq!(submitted.estimated_teu(), 3);

    // 驳回 → 转回草稿: 日期与舱单保留
    let rejected = svc.reject(&id, "Pilotage unavailable", "officer-9").unwrap();
    assert_eq!(rejected.status(), VvnStatus::Rejected);
    assert!(svc.submit(&id).is_err());

    let draft = svc.convert_to_draft(&id).unwrap();
    assert_eq!(draft.status(), VvnStatus::InProgress);
    assert!(draft.rejection_reason().is_none());
    assert!(draft.reviewing_officer_id().is_none());
    assert_eq!(draft.arrival(), Some(at(0)));
    assert_eq!(draft.departure(), Some(at(24)));
    assert_eq!(draft.loading_manifest().unwrap().len(), 1);
    assert_eq!(draft.unloading_manifest().unwrap().len(), 2);

    // 再次提交并审批
    svc.submit(&id).unwrap();
    let outcome = svc.approve(&id, "D1", "officer-1", false).unwrap();
    assert!(!outcome.had_conflicts());
    let accepted = svc.get(&id).unwrap();
    assert_eq!(accepted.status(), VvnStatus::Accepted);
    assert_eq!(accepted.assigned_dock_id(), Some("D1"));

    // 修改后重新提交: 危险品标记随新舱单刷新
    let updated = svc
        .update_and_resubmit(&id, Some(at(2)), Some(at(26)), Some(load_manifest(&["C1"])), None)
        .unwrap();
    assert_eq!(updated.status(), VvnStatus::Submitted);
    assert!(!updated.is_hazardous());
    assert!(updated.assigned_dock_id().is_none());
    assert!(updated.unloading_manifest().is_none());

    svc.approve(&id, "D3", "officer-1", false).unwrap();
    let resubmitted = svc.resubmit(&id).unwrap();
    assert_eq!(resubmitted.status(), VvnStatus::Submitted);
}

#[test]
fn test_full_lifecycle_in_memory() {
    logging::init_test();
    run_full_lifecycle(&memory_service());
}

#[test]
fn test_full_lifecycle_sqlite() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let svc = sqlite_service(&db_path).expect("Failed to create service");
    run_full_lifecycle(&svc);
}

#[test]
fn test_conflicting_submission_lists_first_visit() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let svc = sqlite_service(&db_path).unwrap();

    let first = submit_visit(&svc, IMO_AURORA, 0, 24);
    let second = svc
        .create_draft(IMO_AURORA, Some(at(12)), Some(at(36)))
        .unwrap();

    let err = svc.submit(second.id()).unwrap_err();
    let report = err.conflict_report().expect("expected a conflict");
    assert_eq!(report.conflicting_ids(), vec![first.as_str()]);
    assert!(!report.overridable);
    assert!(err
        .to_string()
        .starts_with(&format!("Vessel {} already has an active visit", IMO_AURORA)));
    assert!(err.to_string().contains(&first));

    // 紧邻的时间窗不冲突
    let third = svc
        .create_draft(IMO_AURORA, Some(at(24)), Some(at(48)))
        .unwrap();
    svc.submit(third.id()).unwrap();

    // 其他船舶同一时间窗不冲突
    submit_visit(&svc, IMO_BOREALIS, 0, 24);
}

#[test]
fn test_rejected_visit_no_longer_blocks() {
    let svc = memory_service();
    let first = submit_visit(&svc, IMO_AURORA, 0, 24);
    svc.reject(&first, "Wrong voyage", "officer-2").unwrap();

    let second = submit_visit(&svc, IMO_AURORA, 0, 24);
    assert_eq!(svc.get(&second).unwrap().status(), VvnStatus::Submitted);
}

#[test]
fn test_dock_conflict_override_in_sqlite() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().unwrap();
    let svc = sqlite_service(&db_path).unwrap();

    let booked = submit_visit(&svc, IMO_BOREALIS, 0, 24);
    svc.approve(&booked, "D1", "officer-1", false).unwrap();

    let late = submit_visit(&svc, IMO_AURORA, 20, 30);
    let err = svc.approve(&late, "D1", "officer-1", false).unwrap_err();
    assert!(err.is_overridable_conflict());
    assert!(err.to_string().contains("Dock D1 is already booked"));
    assert_eq!(svc.get(&late).unwrap().status(), VvnStatus::Submitted);

    let outcome = svc.approve(&late, "D1", "officer-1", true).unwrap();
    assert_eq!(outcome.overridden_conflicts.len(), 1);
    assert_eq!(outcome.overridden_conflicts[0].vvn_id, booked);

    // 另一码头不受影响
    let other = submit_visit(&svc, IMO_CASSIOPEIA, 20, 30);
    svc.approve(&other, "D3", "officer-1", false).unwrap();
}

#[test]
fn test_policy_from_config_disables_override() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let conn = open_test_connection(&db_path).unwrap();
    insert_test_config(&conn).unwrap();

    let policy = ConfigManager::new(&db_path)
        .unwrap()
        .load_vvn_policy()
        .unwrap();
    assert!(!policy.allow_conflict_override);

    let svc = sqlite_service(&db_path).unwrap().with_policy(policy);
    let booked = submit_visit(&svc, IMO_BOREALIS, 0, 24);
    svc.approve(&booked, "D1", "officer-1", false).unwrap();

    let late = submit_visit(&svc, IMO_AURORA, 20, 30);
    let err = svc.approve(&late, "D1", "officer-1", true).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(svc.get(&late).unwrap().status(), VvnStatus::Submitted);
}

#[test]
fn test_illegal_transitions_leave_state_untouched() {
    let svc = memory_service();
    let id = submit_visit(&svc, IMO_AURORA, 0, 24);

    let err = svc.convert_to_draft(&id).unwrap_err();
    assert_eq!(err.to_string(), "Cannot convert to draft a VVN in status SUBMITTED.");
    assert!(svc.resubmit(&id).is_err());
    assert!(svc
        .add_manifest_entry(&id, ManifestEntry::create_load_entry("C1", "SA-1").unwrap())
        .is_err());

    svc.approve(&id, "D1", "o", false).unwrap();
    let err = svc.reject(&id, "late", "o").unwrap_err();
    assert!(matches!(err, DomainError::InvalidTransition { from: VvnStatus::Accepted, .. }));
    assert_eq!(svc.get(&id).unwrap().status(), VvnStatus::Accepted);
}

#[test]
fn test_events_published_per_transition() {
    let recorder = Arc::new(RecordingPublisher::default());
    let svc = memory_service().with_publisher(recorder.clone());

    let id = submit_visit(&svc, IMO_AURORA, 0, 24);
    svc.reject(&id, "no berth", "o").unwrap();
    svc.convert_to_draft(&id).unwrap();
    svc.submit(&id).unwrap();
    svc.approve(&id, "D1", "o", false).unwrap();
    svc.resubmit(&id).unwrap();

    assert_eq!(
        recorder.event_types(),
        vec!["Submitted", "Rejected", "ReturnedToDraft", "Submitted", "Approved", "Resubmitted"]
    );
    let events = recorder.events.lock().unwrap();
    let approved = &events[4];
    assert_eq!(approved.dock_id.as_deref(), Some("D1"));
    assert!(approved.window.is_some());
}

#[test]
fn test_remove_entry_twice_is_noop() {
    let svc = memory_service();
    let vvn = svc.create_draft(IMO_AURORA, None, None).unwrap();
    svc.set_manifest(vvn.id(), load_manifest(&["C1", "C3"])).unwrap();

    assert!(svc.remove_manifest_entry(vvn.id(), ManifestType::Load, "C1").unwrap());
    assert!(!svc.remove_manifest_entry(vvn.id(), ManifestType::Load, "C1").unwrap());
    let manifest = svc.get(vvn.id()).unwrap();
    let ids: Vec<&str> = manifest.loading_manifest().unwrap().container_ids().collect();
    assert_eq!(ids, vec!["C3"]);
}

#[test]
fn test_unknown_vvn_is_reference_not_found() {
    let svc = memory_service();
    let err = svc.submit("missing").unwrap_err();
    assert_eq!(err.to_string(), "VVN missing was not found.");
}
