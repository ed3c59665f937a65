// ==========================================
// 港口靠泊管理 - 靠泊时间窗
// ==========================================
// 半开区间 [arrival, departure)
// 冲突判定: a1 < b2 && b1 < a2 (端点相接不算冲突)
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEPARTURE_AFTER_ARRIVAL: &str = "Departure date must be after arrival date.";

/// 靠泊时间窗 (不变量: arrival < departure)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawVisitWindow")]
pub struct VisitWindow {
    arrival: DateTime<Utc>,
    departure: DateTime<Utc>,
}

// 反序列化入口,经 VisitWindow::new 重新校验
#[derive(Deserialize)]
struct RawVisitWindow {
    arrival: DateTime<Utc>,
    departure: DateTime<Utc>,
}

impl TryFrom<RawVisitWindow> for VisitWindow {
    type Error = DomainError;

    fn try_from(raw: RawVisitWindow) -> Result<Self, Self::Error> {
        VisitWindow::new(raw.arrival, raw.departure)
    }
}

impl VisitWindow {
    /// 创建时间窗
    ///
    /// # 错误
    /// - departure <= arrival 时返回业务规则错误
    pub fn new(arrival: DateTime<Utc>, departure: DateTime<Utc>) -> DomainResult<Self> {
        if departure <= arrival {
            return Err(DomainError::business_rule(DEPARTURE_AFTER_ARRIVAL));
        }
        Ok(Self { arrival, departure })
    }

    /// 从可空日期构造: 任一缺失返回 Ok(None)
    pub fn from_optional(
        arrival: Option<DateTime<Utc>>,
        departure: Option<DateTime<Utc>>,
    ) -> DomainResult<Option<Self>> {
        match (arrival, departure) {
            (Some(a), Some(d)) => Self::new(a, d).map(Some),
            _ => Ok(None),
        }
    }

    pub fn arrival(&self) -> DateTime<Utc> {
        self.arrival
    }

    pub fn departure(&self) -> DateTime<Utc> {
        self.departure
    }

    /// 区间重叠判定 (对称)
    pub fn overlaps(&self, other: &VisitWindow) -> bool {
        self.arrival < other.departure && other.arrival < self.departure
    }

    /// 停靠时长
    pub fn duration(&self) -> chrono::Duration {
        self.departure - self.arrival
    }
}

impl fmt::Display for VisitWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.arrival.format("%Y-%m-%d %H:%M"),
            self.departure.format("%Y-%m-%d %H:%M")
        )
    }
}
