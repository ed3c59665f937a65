// ==========================================
// 港口靠泊管理 - 货物舱单
// ==========================================
// ManifestEntry: 单个集装箱移动 (值对象,构造后不可变)
//   - Load:   source_storage_area_id 必填, target 为空
//   - Unload: target_storage_area_id 必填, source 为空
// CargoManifest: 同方向条目集合,按 container_id 去重
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::types::ManifestType;
use serde::{Deserialize, Serialize};

pub const LOAD_ENTRY_REQUIRES_SOURCE: &str =
    "Load manifest entries must have a source storage area.";
pub const UNLOAD_ENTRY_REQUIRES_TARGET: &str =
    "Unload manifest entries must have a target storage area.";

// ==========================================
// ManifestEntry - 舱单条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawManifestEntry")]
pub struct ManifestEntry {
    container_id: String,
    source_storage_area_id: Option<String>,
    target_storage_area_id: Option<String>,
}

// 反序列化入口, 按方向走 create_load_entry / create_unload_entry
#[derive(Deserialize)]
struct RawManifestEntry {
    container_id: String,
    source_storage_area_id: Option<String>,
    target_storage_area_id: Option<String>,
}

impl TryFrom<RawManifestEntry> for ManifestEntry {
    type Error = DomainError;

    fn try_from(raw: RawManifestEntry) -> Result<Self, Self::Error> {
        match (raw.source_storage_area_id, raw.target_storage_area_id) {
            (Some(source), None) => Self::create_load_entry(&raw.container_id, &source),
            (None, Some(target)) => Self::create_unload_entry(&raw.container_id, &target),
            _ => Err(DomainError::validation(
                "Manifest entry must have exactly one of source or target storage area.",
            )),
        }
    }
}

impl ManifestEntry {
    /// 装船条目: 堆场 → 船舶
    pub fn create_load_entry(
        container_id: &str,
        source_storage_area_id: &str,
    ) -> DomainResult<Self> {
        let container_id = required("Container id", container_id)?;
        let source = required("Source storage area id", source_storage_area_id)?;
        Ok(Self {
            container_id,
            source_storage_area_id: Some(source),
            target_storage_area_id: None,
        })
    }

    /// 卸船条目: 船舶 → 堆场
    pub fn create_unload_entry(
        container_id: &str,
        target_storage_area_id: &str,
    ) -> DomainResult<Self> {
        let container_id = required("Container id", container_id)?;
        let target = required("Target storage area id", target_storage_area_id)?;
        Ok(Self {
            container_id,
            source_storage_area_id: None,
            target_storage_area_id: Some(target),
        })
    }

    /// 从持久化字段还原 (不校验方向,由 validate_against 兜底)
    pub(crate) fn from_parts(
        container_id: String,
        source_storage_area_id: Option<String>,
        target_storage_area_id: Option<String>,
    ) -> Self {
        Self {
            container_id,
            source_storage_area_id,
            target_storage_area_id,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn source_storage_area_id(&self) -> Option<&str> {
        self.source_storage_area_id.as_deref()
    }

    pub fn target_storage_area_id(&self) -> Option<&str> {
        self.target_storage_area_id.as_deref()
    }

    /// 条目自身方向: 有来源堆场即为装船
    pub fn direction(&self) -> ManifestType {
        if self.source_storage_area_id.is_some() {
            ManifestType::Load
        } else {
            ManifestType::Unload
        }
    }

    /// 条目引用的堆场 (装船取来源,卸船取目标)
    pub fn storage_area_id(&self) -> Option<&str> {
        match self.direction() {
            ManifestType::Load => self.source_storage_area_id(),
            ManifestType::Unload => self.target_storage_area_id(),
        }
    }

    /// 按舱单声明的方向自检
    pub fn validate_against(&self, manifest_type: ManifestType) -> DomainResult<()> {
        let well_formed = match manifest_type {
            ManifestType::Load => {
                self.source_storage_area_id.is_some() && self.target_storage_area_id.is_none()
            }
            ManifestType::Unload => {
                self.target_storage_area_id.is_some() && self.source_storage_area_id.is_none()
            }
        };
        if well_formed {
            return Ok(());
        }
        Err(DomainError::business_rule(match manifest_type {
            ManifestType::Load => LOAD_ENTRY_REQUIRES_SOURCE,
            ManifestType::Unload => UNLOAD_ENTRY_REQUIRES_TARGET,
        }))
    }
}

fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{} is required.", field)));
    }
    Ok(trimmed.to_string())
}

// ==========================================
// CargoManifest - 货物舱单
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCargoManifest")]
pub struct CargoManifest {
    manifest_type: ManifestType,
    entries: Vec<ManifestEntry>,
}

// 反序列化入口, 逐条走 add_entry 校验
#[derive(Deserialize)]
struct RawCargoManifest {
    manifest_type: ManifestType,
    entries: Vec<ManifestEntry>,
}

impl TryFrom<RawCargoManifest> for CargoManifest {
    type Error = DomainError;

    fn try_from(raw: RawCargoManifest) -> Result<Self, Self::Error> {
        Self::with_entries(raw.manifest_type, raw.entries)
    }
}

impl CargoManifest {
    pub fn new(manifest_type: ManifestType) -> Self {
        Self {
            manifest_type,
            entries: Vec::new(),
        }
    }

    /// 批量构造,逐条走 add_entry 校验
    pub fn with_entries(
        manifest_type: ManifestType,
        entries: impl IntoIterator<Item = ManifestEntry>,
    ) -> DomainResult<Self> {
        let mut manifest = Self::new(manifest_type);
        for entry in entries {
            manifest.add_entry(entry)?;
        }
        Ok(manifest)
    }

    /// 从持久化数据还原 (不做校验,提交前由 validate_consistency 把关)
    pub(crate) fn restore(manifest_type: ManifestType, entries: Vec<ManifestEntry>) -> Self {
        Self {
            manifest_type,
            entries,
        }
    }

    pub fn manifest_type(&self) -> ManifestType {
        self.manifest_type
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains_container(&self, container_id: &str) -> bool {
        self.entries.iter().any(|e| e.container_id == container_id)
    }

    pub fn container_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.container_id.as_str())
    }

    /// 添加条目
    ///
    /// # 错误
    /// - 条目方向与舱单方向不一致
    /// - container_id 已存在于本舱单
    ///
    /// 失败时不修改 entries
    pub fn add_entry(&mut self, entry: ManifestEntry) -> DomainResult<()> {
        entry.validate_against(self.manifest_type)?;
        if self.contains_container(&entry.container_id) {
            return Err(DomainError::business_rule(format!(
                "Container {} is already in this manifest.",
                entry.container_id
            )));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// 移除条目 (幂等: 不存在时为空操作)
    ///
    /// 返回是否实际移除
    pub fn remove_entry(&mut self, container_id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.container_id != container_id);
        self.entries.len() != before
    }

    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }

    /// 提交前的最终一致性检查
    ///
    /// 按声明方向逐条复核,返回第一个违规条目的要求说明;
    /// 同时复核 container_id 唯一性 (还原自存储的数据可能绕过 add_entry)
    pub fn validate_consistency(&self) -> DomainResult<()> {
        for entry in &self.entries {
            entry.validate_against(self.manifest_type)?;
        }
        for (idx, entry) in self.entries.iter().enumerate() {
            if self.entries[..idx]
                .iter()
                .any(|e| e.container_id == entry.container_id)
            {
                return Err(DomainError::business_rule(format!(
                    "Container {} is already in this manifest.",
                    entry.container_id
                )));
            }
        }
        Ok(())
    }

    /// 估算 TEU: 每个条目按 1 TEU 计 (不区分 20/40 尺箱)
    pub fn calculate_estimated_teu(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(container: &str) -> ManifestEntry {
        ManifestEntry::create_load_entry(container, "SA-01").unwrap()
    }

    fn unload(container: &str) -> ManifestEntry {
        ManifestEntry::create_unload_entry(container, "SA-02").unwrap()
    }

    #[test]
    fn test_entry_constructors_pair_fields() {
        let l = load("MSCU1234565");
        assert_eq!(l.direction(), ManifestType::Load);
        assert_eq!(l.source_storage_area_id(), Some("SA-01"));
        assert_eq!(l.target_storage_area_id(), None);

        let u = unload("MSCU1234565");
        assert_eq!(u.direction(), ManifestType::Unload);
        assert_eq!(u.source_storage_area_id(), None);
        assert_eq!(u.target_storage_area_id(), Some("SA-02"));
    }

    #[test]
    fn test_entry_requires_ids() {
        assert!(ManifestEntry::create_load_entry(" ", "SA-01")
            .unwrap_err()
            .is_validation());
        assert!(ManifestEntry::create_unload_entry("C1", "").is_err());
    }

    #[test]
    fn test_add_entry_rejects_opposite_direction() {
        let mut manifest = CargoManifest::new(ManifestType::Load);
        manifest.add_entry(load("C1")).unwrap();

        let err = manifest.add_entry(unload("C2")).unwrap_err();
        assert_eq!(err.to_string(), LOAD_ENTRY_REQUIRES_SOURCE);
        assert_eq!(manifest.len(), 1);

        let mut manifest = CargoManifest::new(ManifestType::Unload);
        let err = manifest.add_entry(load("C3")).unwrap_err();
        assert_eq!(err.to_string(), UNLOAD_ENTRY_REQUIRES_TARGET);
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_add_entry_rejects_duplicate_container() {
        let mut manifest = CargoManifest::new(ManifestType::Unload);
        manifest.add_entry(unload("C1")).unwrap();

        let err = manifest.add_entry(unload("C1")).unwrap_err();
        assert_eq!(err.to_string(), "Container C1 is already in this manifest.");
        assert_eq!(manifest.entries(), &[unload("C1")]);
    }

    #[test]
    fn test_remove_entry_is_idempotent() {
        let mut manifest = CargoManifest::with_entries(
            ManifestType::Load,
            vec![load("C1"), load("C2")],
        )
        .unwrap();

        assert!(manifest.remove_entry("C1"));
        assert!(!manifest.remove_entry("C1"));
        assert!(!manifest.contains_container("C1"));
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_clear_and_teu() {
        let mut manifest = CargoManifest::with_entries(
            ManifestType::Load,
            vec![load("C1"), load("C2"), load("C3")],
        )
        .unwrap();
        assert_eq!(manifest.calculate_estimated_teu(), 3);

        manifest.clear_entries();
        assert!(manifest.is_empty());
        assert_eq!(manifest.calculate_estimated_teu(), 0);
    }

    #[test]
    fn test_validate_consistency_reports_first_offender() {
        let manifest = CargoManifest::restore(
            ManifestType::Unload,
            vec![
                unload("C1"),
                ManifestEntry::from_parts("C2".to_string(), Some("SA-09".to_string()), None),
            ],
        );
        let err = manifest.validate_consistency().unwrap_err();
        assert_eq!(err.to_string(), UNLOAD_ENTRY_REQUIRES_TARGET);

        let manifest = CargoManifest::restore(ManifestType::Load, vec![load("C1"), load("C1")]);
        assert!(manifest.validate_consistency().is_err());

        let manifest = CargoManifest::with_entries(ManifestType::Load, vec![load("C1")]).unwrap();
        assert!(manifest.validate_consistency().is_ok());
    }

    #[test]
    fn test_deserialize_goes_through_constructors() {
        let entry: ManifestEntry = serde_json::from_str(
            r#"{"container_id":" C1 ","source_storage_area_id":"SA-01","target_storage_area_id":null}"#,
        )
        .unwrap();
        assert_eq!(entry, load("C1"));

        let both = r#"{"container_id":"C1","source_storage_area_id":"SA-01","target_storage_area_id":"SA-02"}"#;
        assert!(serde_json::from_str::<ManifestEntry>(both).is_err());
        let neither = r#"{"container_id":"C1","source_storage_area_id":null,"target_storage_area_id":null}"#;
        assert!(serde_json::from_str::<ManifestEntry>(neither).is_err());
        let blank = r#"{"container_id":"  ","source_storage_area_id":"SA-01","target_storage_area_id":null}"#;
        assert!(serde_json::from_str::<ManifestEntry>(blank).is_err());
    }

    #[test]
    fn test_deserialize_manifest_rejects_bad_entries() {
        let manifest = CargoManifest::with_entries(ManifestType::Load, vec![load("C1"), load("C2")]).unwrap();
        let json = serde_json::to_string(&manifest).unwrap();
        let parsed: CargoManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);

        let duplicate = CargoManifest::restore(ManifestType::Load, vec![load("C1"), load("C1")]);
        let json = serde_json::to_string(&duplicate).unwrap();
        let err = serde_json::from_str::<CargoManifest>(&json).unwrap_err();
        assert!(err.to_string().contains("Container C1 is already in this manifest."));

        let wrong_direction = CargoManifest::restore(ManifestType::Load, vec![unload("C1")]);
        let json = serde_json::to_string(&wrong_direction).unwrap();
        let err = serde_json::from_str::<CargoManifest>(&json).unwrap_err();
        assert!(err.to_string().contains(LOAD_ENTRY_REQUIRES_SOURCE));
    }
}
