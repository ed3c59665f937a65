// ==========================================
// VesselVisitRepository 集成测试
// ==========================================
// 测试目标: 文件数据库上的持久化、乐观锁、冲突查询
// ==========================================


use port_visit_core::db::{read_schema_version, CURRENT_SCHEMA_VERSION};
use port_visit_core::repository::RepositoryError;
use port_visit_core::{
    ActiveVisit, DomainError, VesselVisitNotification, VesselVisitRepository, VisitStore, VisitWindow,
    VvnStatus,
};
use std::sync::Barrier;
use std::sync::{Arc, Mutex};
use std::thread;
use test_helpers::*;

fn open_repo(db_path: &str) -> VesselVisitRepository {
    let conn = open_test_connection(db_path).expect("Failed to open db");
    VesselVisitRepository::new(Arc::new(Mutex::new(conn)))
}

fn draft(imo_raw: &str, start: i64, end: i64) -> VesselVisitNotification {
    VesselVisitNotification::draft(imo(imo_raw), Some(at(start)), Some(at(end)))
}

#[test]
fn test_schema_bootstrap() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).unwrap();
    assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
}

#[test]
fn test_persisted_visit_survives_reopen() {
    let (_temp_file, db_path) = create_test_db().unwrap();

    let mut vvn = draft(IMO_AURORA, 0, 24);
    vvn.set_loading_manifest(load_manifest(&["C1", "C2"])).unwrap();
    vvn.set_unloading_manifest(unload_manifest(&["C3"])).unwrap();
    let no_visits: Vec<ActiveVisit> = Vec::new();
    vvn.submit(&no_visits).unwrap();
    vvn.approve("D1", "officer-1", &no_visits, false).unwrap();

    {
        let repo = open_repo(&db_path);
        repo.save(&mut vvn).unwrap();
    }

    let repo = open_repo(&db_path);
    let loaded = repo.find_by_id(vvn.id()).unwrap().expect("visit should exist");
    assert_eq!(loaded, vvn);
    assert_eq!(loaded.status(), VvnStatus::Accepted);
    assert_eq!(loaded.assigned_dock_id(), Some("D1"));
    assert_eq!(loaded.estimated_teu(), 3);
    assert_eq!(loaded.submitted_at(), vvn.submitted_at());
}

#[test]
fn test_find_by_imo_and_status() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let repo = open_repo(&db_path);

    let mut late = draft(IMO_AURORA, 48, 72);
    let mut early = draft(IMO_AURORA, 0, 24);
    let mut undated = VesselVisitNotification::draft(imo(IMO_AURORA), None, None);
    let mut other = draft(IMO_BOREALIS, 0, 24);
    for vvn in [&mut late, &mut early, &mut undated, &mut other] {
        repo.save(vvn).unwrap();
    }
    early.submit(&repo).unwrap();
    repo.save(&mut early).unwrap();

    let ids: Vec<String> = repo
        .find_by_imo(&imo(IMO_AURORA))
        .unwrap()
        .iter()
        .map(|v| v.id().to_string())
        .collect();
    assert_eq!(ids, vec![early.id(), late.id(), undated.id()]);

    let submitted = repo.find_by_status(VvnStatus::Submitted).unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].id(), early.id());
}

#[test]
fn test_dock_overlap_query_ignores_drafts_and_other_docks() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let repo = open_repo(&db_path);

    let mut on_d1 = draft(IMO_AURORA, 0, 24);
    on_d1.submit(&repo).unwrap();
    on_d1.approve("D1", "o", &repo, false).unwrap();
    repo.save(&mut on_d1).unwrap();

    let mut on_d2 = draft(IMO_BOREALIS, 0, 24);
    on_d2.submit(&repo).unwrap();
    on_d2.approve("D2", "o", &repo, false).unwrap();
    repo.save(&mut on_d2).unwrap();

    let window = VisitWindow::new(at(12), at(36)).unwrap();
    let hits = repo.find_active_overlapping_for_dock("D1", &window, None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].vvn_id, on_d1.id());
    assert_eq!(hits[0].dock_id.as_deref(), Some("D1"));

    let touching = VisitWindow::new(at(24), at(30)).unwrap();
    assert!(repo
        .find_active_overlapping_for_dock("D1", &touching, None)
        .unwrap()
        .is_empty());
}

#[test]
fn test_concurrent_writers_one_wins() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let repo = Arc::new(open_repo(&db_path));

    let mut vvn = draft(IMO_AURORA, 0, 24);
    repo.save(&mut vvn).unwrap();
    let id = vvn.id().to_string();

    // 先读出全部副本, 保证所有写者持有同一修订号
    let copies: Vec<VesselVisitNotification> = (0..4)
        .map(|_| repo.find_by_id(&id).unwrap().unwrap())
        .collect();

    let handles: Vec<_> = copies
        .into_iter()
        .enumerate()
        .map(|(i, mut copy)| {
            let repo = repo.clone();
            let shift = i as i64;
            thread::spawn(move || {
                copy.update_dates(Some(at(shift)), Some(at(24 + shift))).unwrap();
                repo.save(&mut copy)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(matches!(err, RepositoryError::OptimisticLockFailure { .. }));
        let domain: DomainError = err.into();
        assert!(matches!(domain, DomainError::StaleRevision { expected: 1, actual: 2, .. }));
    }
    assert_eq!(repo.find_by_id(&id).unwrap().unwrap().revision(), 2);
}

#[test]
fn test_second_connection_cannot_commit_overlapping_submission() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let first_repo = open_repo(&db_path);
    let second_repo = open_repo(&db_path);

    let mut a = draft(IMO_AURORA, 0, 24);
    let mut b = draft(IMO_AURORA, 12, 36);
    first_repo.save(&mut a).unwrap();
    first_repo.save(&mut b).unwrap();

    let mut a = first_repo.find_by_id(a.id()).unwrap().unwrap();
    let mut b = second_repo.find_by_id(b.id()).unwrap().unwrap();

    // 两个连接各自通过冲突检查, 此时对方都还是草稿
    a.submit(&first_repo).unwrap();
    b.submit(&second_repo).unwrap();

    first_repo.save(&mut a).unwrap();
    let err = second_repo.save(&mut b).unwrap_err();
    match &err {
        RepositoryError::ConflictDetected(report) => {
            assert_eq!(report.conflicting_ids(), vec![a.id()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let domain: DomainError = err.into();
    assert!(domain.is_conflict());

    assert_eq!(
        second_repo.find_by_id(b.id()).unwrap().unwrap().status(),
        VvnStatus::InProgress
    );
    let submitted = first_repo.find_by_status(VvnStatus::Submitted).unwrap();
    assert_eq!(submitted.len(), 1);
}

#[test]
fn test_second_connection_cannot_double_book_dock() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let first_repo = open_repo(&db_path);
    let second_repo = open_repo(&db_path);

    let mut a = draft(IMO_AURORA, 0, 24);
    let mut b = draft(IMO_BOREALIS, 12, 36);
    for vvn in [&mut a, &mut b] {
        vvn.submit(&first_repo).unwrap();
        first_repo.save(vvn).unwrap();
    }

    a.approve("D1", "officer-1", &first_repo, false).unwrap();
    b.approve("D1", "officer-2", &second_repo, false).unwrap();

    first_repo.save(&mut a).unwrap();
    let err: DomainError = second_repo.save(&mut b).unwrap_err().into();
    assert_eq!(err.conflict_report().unwrap().conflicting_ids(), vec![a.id()]);
    assert_eq!(
        second_repo.find_by_id(b.id()).unwrap().unwrap().status(),
        VvnStatus::Submitted
    );
}

#[test]
fn test_services_on_separate_connections_admit_one_overlap() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let services: Vec<_> = (0..4)
        .map(|_| Arc::new(sqlite_service(&db_path).unwrap()))
        .collect();

    let drafts: Vec<String> = services
        .iter()
        .enumerate()
        .map(|(i, svc)| {
            let shift = i as i64;
            svc.create_draft(IMO_AURORA, Some(at(shift)), Some(at(24 + shift)))
                .unwrap()
                .id()
                .to_string()
        })
        .collect();

    let barrier = Arc::new(Barrier::new(services.len()));
    let handles: Vec<_> = services
        .iter()
        .cloned()
        .zip(drafts)
        .map(|(svc, id)| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                svc.submit(&id)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(err.is_conflict(), "unexpected error: {err}");
    }

    let repo = open_repo(&db_path);
    assert_eq!(repo.find_by_status(VvnStatus::Submitted).unwrap().len(), 1);
}

#[test]
fn test_corrupt_row_is_reported() {
    let (_temp_file, db_path) = create_test_db().unwrap();
    let repo = open_repo(&db_path);
    let mut vvn = draft(IMO_AURORA, 0, 24);
    repo.save(&mut vvn).unwrap();

    let conn = open_test_connection(&db_path).unwrap();
    conn.execute(
        "UPDATE vessel_visit SET status = 'ACCEPTED' WHERE vvn_id = ?1",
        [vvn.id()],
    )
    .unwrap();

    let err = repo.find_by_id(vvn.id()).unwrap_err();
    assert!(matches!(err, RepositoryError::CorruptRecord { .. }));
}
