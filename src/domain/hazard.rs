// ==========================================
// 港口靠泊管理 - 危险品标记汇总
// ==========================================
// 规则: 两份舱单引用的任一集装箱为危险品 → VVN 为危险品
// 集装箱数据来自外部协作方快照 (聚合本身无法访问)
// ==========================================

use crate::domain::manifest::CargoManifest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 集装箱快照 (id + 危险品标记)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub container_id: String,
    pub is_hazardous: bool,
}

impl ContainerSnapshot {
    pub fn new(container_id: impl Into<String>, is_hazardous: bool) -> Self {
        Self {
            container_id: container_id.into(),
            is_hazardous,
        }
    }
}

pub struct HazardAggregator;

impl HazardAggregator {
    /// 计算危险品标记
    ///
    /// 快照中不存在的集装箱按非危险品处理 (存在性由提交路径另行校验)
    pub fn is_hazardous<'a>(
        manifests: impl IntoIterator<Item = &'a CargoManifest>,
        containers: &[ContainerSnapshot],
    ) -> bool {
        let lookup: HashMap<&str, bool> = containers
            .iter()
            .map(|c| (c.container_id.as_str(), c.is_hazardous))
            .collect();

        manifests
            .into_iter()
            .flat_map(|m| m.container_ids())
            .any(|id| lookup.get(id).copied().unwrap_or(false))
    }
}
