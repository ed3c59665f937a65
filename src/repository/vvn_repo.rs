// ==========================================
// 港口靠泊管理 - VVN 数据仓储 (SQLite)
// ==========================================
// 表: vessel_visit (聚合根) + manifest_entry (舱单条目, 级联删除)
// 红线: Repository 不含业务逻辑, 状态守卫全部在聚合内完成
// 并发: 写操作使用 IMMEDIATE 事务 (先取得写锁), 事务内复核活跃 VVN 冲突,
//       跨连接/跨进程的两个写者不会同时提交重叠时间窗
// ==========================================

use crate::domain::conflict::{ActiveVisit, VisitConflictQuery};
use crate::domain::error::DomainResult;
use crate::domain::imo::ImoNumber;
use crate::domain::manifest::{CargoManifest, ManifestEntry};
use crate::domain::types::{ManifestType, VvnStatus};
use crate::domain::visit_window::VisitWindow;
use crate::domain::vvn::{VesselVisitNotification, VvnSnapshot};
use crate::repository::error::{recheck_before_write, RepositoryError, RepositoryResult};
use crate::repository::visit_store::VisitStore;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};

const VISIT_COLUMNS: &str = r#"vvn_id, imo, arrival, departure, status, is_hazardous,
    has_loading_manifest, has_unloading_manifest, assigned_dock_id, rejection_reason,
    reviewing_officer_id, submitted_at, reviewed_at, created_at, updated_at, revision"#;

/// 时间列统一格式: RFC3339 UTC, 纳秒定宽 (字典序 = 时间序)
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn fmt_opt_ts(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.as_ref().map(fmt_ts)
}

fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_opt_ts(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|r| parse_ts(idx, r)).transpose()
}

/// vessel_visit 行 (舱单条目另行加载)
struct VisitRow {
    snapshot: VvnSnapshot,
    has_loading_manifest: bool,
    has_unloading_manifest: bool,
}

// ==========================================
// VesselVisitRepository - VVN 仓储
// ==========================================
pub struct VesselVisitRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VesselVisitRepository {
    /// 创建新的 VesselVisitRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写操作
    // ==========================================

    /// 插入新 VVN, 返回写入后的修订号 (1)
    pub fn create(&self, vvn: &VesselVisitNotification) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        recheck_in_tx(&tx, vvn)?;
        let revision = 1;

        tx.execute(
            &format!(
                "INSERT INTO vessel_visit ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                VISIT_COLUMNS
            ),
            params![
                vvn.id(),
                vvn.imo().as_str(),
                fmt_opt_ts(vvn.arrival()),
                fmt_opt_ts(vvn.departure()),
                vvn.status().to_db_str(),
                vvn.is_hazardous(),
                vvn.loading_manifest().is_some(),
                vvn.unloading_manifest().is_some(),
                vvn.assigned_dock_id(),
                vvn.rejection_reason(),
                vvn.reviewing_officer_id(),
                fmt_opt_ts(vvn.submitted_at()),
                fmt_opt_ts(vvn.reviewed_at()),
                fmt_ts(&vvn.created_at()),
                fmt_ts(&vvn.updated_at()),
                revision,
            ],
        )?;
        write_entries(&tx, vvn)?;
        tx.commit()?;

        tracing::debug!("VVN 已创建: vvn_id={}, imo={}", vvn.id(), vvn.imo());
        Ok(revision)
    }

    /// 更新 VVN (乐观锁), 返回新修订号
    ///
    /// 舱单条目整体替换, 与主表更新在同一事务内
    ///
    /// # 错误
    /// - `OptimisticLockFailure`: 修订号不一致
    /// - `ConflictDetected`: 事务内复核发现重叠的活跃 VVN
    pub fn update(&self, vvn: &VesselVisitNotification) -> RepositoryResult<i32> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        recheck_in_tx(&tx, vvn)?;

        let rows_affected = tx.execute(
            r#"UPDATE vessel_visit
               SET arrival = ?1, departure = ?2, status = ?3, is_hazardous = ?4,
                   has_loading_manifest = ?5, has_unloading_manifest = ?6,
                   assigned_dock_id = ?7, rejection_reason = ?8, reviewing_officer_id = ?9,
                   submitted_at = ?10, reviewed_at = ?11, updated_at = ?12,
                   revision = revision + 1
               WHERE vvn_id = ?13 AND revision = ?14"#,
            params![
                fmt_opt_ts(vvn.arrival()),
                fmt_opt_ts(vvn.departure()),
                vvn.status().to_db_str(),
                vvn.is_hazardous(),
                vvn.loading_manifest().is_some(),
                vvn.unloading_manifest().is_some(),
                vvn.assigned_dock_id(),
                vvn.rejection_reason(),
                vvn.reviewing_officer_id(),
                fmt_opt_ts(vvn.submitted_at()),
                fmt_opt_ts(vvn.reviewed_at()),
                fmt_ts(&vvn.updated_at()),
                vvn.id(),
                vvn.revision(),
            ],
        )?;

        if rows_affected == 0 {
            // 判断是记录不存在还是revision冲突
            let actual: Option<i32> = tx
                .query_row(
                    "SELECT revision FROM vessel_visit WHERE vvn_id = ?1",
                    params![vvn.id()],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match actual {
                Some(actual) => RepositoryError::OptimisticLockFailure {
                    vvn_id: vvn.id().to_string(),
                    expected: vvn.revision(),
                    actual,
                },
                None => RepositoryError::NotFound {
                    entity: "VVN".to_string(),
                    id: vvn.id().to_string(),
                },
            });
        }

        tx.execute("DELETE FROM manifest_entry WHERE vvn_id = ?1", params![vvn.id()])?;
        write_entries(&tx, vvn)?;
        tx.commit()?;

        Ok(vvn.revision() + 1)
    }

    /// 删除 VVN (舱单条目级联删除), 返回是否存在
    pub fn delete(&self, vvn_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let rows = conn.execute("DELETE FROM vessel_visit WHERE vvn_id = ?1", params![vvn_id])?;
        Ok(rows > 0)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, vvn_id: &str) -> RepositoryResult<Option<VesselVisitNotification>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM vessel_visit WHERE vvn_id = ?1", VISIT_COLUMNS),
                params![vvn_id],
                map_visit_row,
            )
            .optional()?;

        match row {
            Some(row) => Ok(Some(assemble(&conn, row?)?)),
            None => Ok(None),
        }
    }

    /// 按船舶查询全部 VVN (按到港时间排序, 无日期的排在最后)
    pub fn find_by_imo(&self, imo: &ImoNumber) -> RepositoryResult<Vec<VesselVisitNotification>> {
        self.find_where("imo = ?1", imo.as_str())
    }

    pub fn find_by_status(&self, status: VvnStatus) -> RepositoryResult<Vec<VesselVisitNotification>> {
        self.find_where("status = ?1", status.to_db_str())
    }

    fn find_where(&self, predicate: &str, arg: &str) -> RepositoryResult<Vec<VesselVisitNotification>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM vessel_visit WHERE {} ORDER BY arrival IS NULL, arrival, vvn_id",
            VISIT_COLUMNS, predicate
        ))?;
        let rows = stmt
            .query_map(params![arg], map_visit_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|row| assemble(&conn, row?))
            .collect()
    }

    /// 活跃且与时间窗重叠的 VVN (船舶维度)
    pub fn find_active_overlapping_for_vessel(
        &self,
        imo: &ImoNumber,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> RepositoryResult<Vec<ActiveVisit>> {
        self.find_active_overlapping("imo = ?1", imo.as_str(), window, exclude_vvn_id)
    }

    /// 活跃且与时间窗重叠的 VVN (码头维度)
    pub fn find_active_overlapping_for_dock(
        &self,
        dock_id: &str,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> RepositoryResult<Vec<ActiveVisit>> {
        self.find_active_overlapping("assigned_dock_id = ?1", dock_id, window, exclude_vvn_id)
    }

    fn find_active_overlapping(
        &self,
        key_predicate: &str,
        key: &str,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> RepositoryResult<Vec<ActiveVisit>> {
        let conn = self.get_conn()?;
        query_active_overlapping(&conn, key_predicate, key, window, exclude_vvn_id)
    }
}

// ==========================================
// 冲突查询 / 写入前复核
// ==========================================

fn query_active_overlapping(
    conn: &Connection,
    key_predicate: &str,
    key: &str,
    window: &VisitWindow,
    exclude_vvn_id: Option<&str>,
) -> RepositoryResult<Vec<ActiveVisit>> {
    let mut stmt = conn.prepare(&format!(
        r#"SELECT vvn_id, imo, assigned_dock_id, status, arrival, departure
           FROM vessel_visit
           WHERE {}
             AND status IN ('SUBMITTED', 'ACCEPTED')
             AND arrival IS NOT NULL AND departure IS NOT NULL
             AND arrival < ?2 AND ?3 < departure
             AND (?4 IS NULL OR vvn_id <> ?4)
           ORDER BY arrival, vvn_id"#,
        key_predicate
    ))?;

    let rows = stmt.query_map(
        params![
            key,
            fmt_ts(&window.departure()),
            fmt_ts(&window.arrival()),
            exclude_vvn_id
        ],
        |row| {
            let vvn_id: String = row.get(0)?;
            let imo: String = row.get(1)?;
            let status: String = row.get(3)?;
            Ok((
                vvn_id,
                imo,
                row.get::<_, Option<String>>(2)?,
                status,
                parse_opt_ts(4, row.get(4)?)?,
                parse_opt_ts(5, row.get(5)?)?,
            ))
        },
    )?;

    let mut visits = Vec::new();
    for row in rows {
        let (vvn_id, imo, dock_id, status, arrival, departure) = row?;
        visits.push(ActiveVisit {
            imo: parse_imo(&vvn_id, &imo)?,
            status: parse_status(&vvn_id, &status)?,
            vvn_id,
            dock_id,
            arrival,
            departure,
        });
    }
    Ok(visits)
}

/// 在写事务内读取当前已提交的活跃 VVN, 交给聚合复核
fn recheck_in_tx(tx: &Transaction, vvn: &VesselVisitNotification) -> RepositoryResult<()> {
    if !vvn.status().is_active() {
        return Ok(());
    }
    let Some(window) = vvn.window() else {
        return Ok(());
    };

    let mut candidates =
        query_active_overlapping(tx, "imo = ?1", vvn.imo().as_str(), &window, Some(vvn.id()))?;
    if let Some(dock_id) = vvn.assigned_dock_id() {
        candidates.extend(query_active_overlapping(
            tx,
            "assigned_dock_id = ?1",
            dock_id,
            &window,
            Some(vvn.id()),
        )?);
    }
    recheck_before_write(vvn, &candidates)
}

// ==========================================
// 行映射 / 组装
// ==========================================

fn map_visit_row(row: &rusqlite::Row) -> rusqlite::Result<RepositoryResult<VisitRow>> {
    let vvn_id: String = row.get(0)?;
    let imo_raw: String = row.get(1)?;
    let status_raw: String = row.get(4)?;
    let arrival = parse_opt_ts(2, row.get(2)?)?;
    let departure = parse_opt_ts(3, row.get(3)?)?;
    let is_hazardous: bool = row.get(5)?;
    let has_loading_manifest: bool = row.get(6)?;
    let has_unloading_manifest: bool = row.get(7)?;
    let assigned_dock_id: Option<String> = row.get(8)?;
    let rejection_reason: Option<String> = row.get(9)?;
    let reviewing_officer_id: Option<String> = row.get(10)?;
    let submitted_at = parse_opt_ts(11, row.get(11)?)?;
    let reviewed_at = parse_opt_ts(12, row.get(12)?)?;
    let created_at = parse_ts(13, row.get(13)?)?;
    let updated_at = parse_ts(14, row.get(14)?)?;
    let revision: i32 = row.get(15)?;

    // 业务字段解析失败不算 SQL 错误, 交给外层映射为 FieldValueError
    let parsed = parse_imo(&vvn_id, &imo_raw).and_then(|imo| {
        let status = parse_status(&vvn_id, &status_raw)?;
        Ok(VisitRow {
            snapshot: VvnSnapshot {
                vvn_id: vvn_id.clone(),
                imo,
                arrival,
                departure,
                status,
                loading_manifest: None,
                unloading_manifest: None,
                is_hazardous,
                assigned_dock_id,
                rejection_reason,
                reviewing_officer_id,
                submitted_at,
                reviewed_at,
                created_at,
                updated_at,
                revision,
            },
            has_loading_manifest,
            has_unloading_manifest,
        })
    });
    Ok(parsed)
}

fn parse_imo(vvn_id: &str, raw: &str) -> RepositoryResult<ImoNumber> {
    ImoNumber::parse(raw).map_err(|e| RepositoryError::FieldValueError {
        field: "imo".to_string(),
        message: format!("vvn_id={}: {}", vvn_id, e),
    })
}

fn parse_status(vvn_id: &str, raw: &str) -> RepositoryResult<VvnStatus> {
    VvnStatus::from_db_str(raw).ok_or_else(|| RepositoryError::FieldValueError {
        field: "status".to_string(),
        message: format!("vvn_id={}: unknown status '{}'", vvn_id, raw),
    })
}

/// 加载舱单条目并还原聚合
fn assemble(conn: &Connection, row: VisitRow) -> RepositoryResult<VesselVisitNotification> {
    let VisitRow {
        mut snapshot,
        has_loading_manifest,
        has_unloading_manifest,
    } = row;

    let mut stmt = conn.prepare(
        r#"SELECT manifest_type, container_id, source_storage_area_id, target_storage_area_id
           FROM manifest_entry
           WHERE vvn_id = ?1
           ORDER BY manifest_type, seq_no"#,
    )?;
    let rows = stmt.query_map(params![&snapshot.vvn_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut loading = Vec::new();
    let mut unloading = Vec::new();
    for row in rows {
        let (manifest_type, container_id, source, target) = row?;
        let entry = ManifestEntry::from_parts(container_id, source, target);
        match ManifestType::from_db_str(&manifest_type) {
            Some(ManifestType::Load) => loading.push(entry),
            Some(ManifestType::Unload) => unloading.push(entry),
            None => {
                return Err(RepositoryError::FieldValueError {
                    field: "manifest_type".to_string(),
                    message: format!("vvn_id={}: unknown manifest type '{}'", snapshot.vvn_id, manifest_type),
                })
            }
        }
    }

    snapshot.loading_manifest = (has_loading_manifest || !loading.is_empty())
        .then(|| CargoManifest::restore(ManifestType::Load, loading));
    snapshot.unloading_manifest = (has_unloading_manifest || !unloading.is_empty())
        .then(|| CargoManifest::restore(ManifestType::Unload, unloading));

    let vvn_id = snapshot.vvn_id.clone();
    VesselVisitNotification::from_snapshot(snapshot).map_err(|e| RepositoryError::CorruptRecord {
        vvn_id,
        message: e.to_string(),
    })
}

fn write_entries(tx: &Transaction, vvn: &VesselVisitNotification) -> RepositoryResult<()> {
    let mut stmt = tx.prepare(
        r#"INSERT INTO manifest_entry (
               vvn_id, manifest_type, seq_no, container_id,
               source_storage_area_id, target_storage_area_id
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
    )?;
    for manifest in vvn.manifests() {
        for (seq_no, entry) in manifest.entries().iter().enumerate() {
            stmt.execute(params![
                vvn.id(),
                manifest.manifest_type().to_db_str(),
                seq_no as i64,
                entry.container_id(),
                entry.source_storage_area_id(),
                entry.target_storage_area_id(),
            ])?;
        }
    }
    Ok(())
}

// ==========================================
// 能力实现
// ==========================================

impl VisitConflictQuery for VesselVisitRepository {
    fn find_active_visits_for_vessel(
        &self,
        imo: &ImoNumber,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>> {
        Ok(self.find_active_overlapping_for_vessel(imo, window, exclude_vvn_id)?)
    }

    fn find_active_visits_for_dock(
        &self,
        dock_id: &str,
        window: &VisitWindow,
        exclude_vvn_id: Option<&str>,
    ) -> DomainResult<Vec<ActiveVisit>> {
        Ok(self.find_active_overlapping_for_dock(dock_id, window, exclude_vvn_id)?)
    }
}

impl VisitStore for VesselVisitRepository {
    fn find_by_id(&self, vvn_id: &str) -> RepositoryResult<Option<VesselVisitNotification>> {
        VesselVisitRepository::find_by_id(self, vvn_id)
    }

    fn save(&self, vvn: &mut VesselVisitNotification) -> RepositoryResult<()> {
        let revision = if vvn.revision() == 0 {
            self.create(vvn)?
        } else {
            self.update(vvn)?
        };
        vvn.set_revision(revision);
        Ok(())
    }

    fn delete(&self, vvn_id: &str) -> RepositoryResult<bool> {
        VesselVisitRepository::delete(self, vvn_id)
    }
}
