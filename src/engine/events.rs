// ==========================================
// 港口靠泊管理 - 靠泊事件发布
// ==========================================
// 职责: 定义 VVN 状态变更事件与发布 trait (依赖倒置)
// 下游: 泊位计划 (排程优化器) 只需要计划时间窗、审批结果、码头分配
// ==========================================

use crate::domain::vvn::VesselVisitNotification;
use crate::domain::visit_window::VisitWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitEventType {
    /// 草稿提交
    Submitted,
    /// 审批通过 (已分配码头)
    Approved,
    /// 驳回
    Rejected,
    /// 驳回后转回草稿
    ReturnedToDraft,
    /// 修改后重新提交 / 直接重新提交
    Resubmitted,
}

impl VisitEventType {
    pub fn as_str(&self) -> &str {
        match self {
            VisitEventType::Submitted => "Submitted",
            VisitEventType::Approved => "Approved",
            VisitEventType::Rejected => "Rejected",
            VisitEventType::ReturnedToDraft => "ReturnedToDraft",
            VisitEventType::Resubmitted => "Resubmitted",
        }
    }
}

/// 靠泊事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitEvent {
    pub vvn_id: String,
    pub event_type: VisitEventType,
    pub imo: String,
    /// 计划时间窗 (草稿可能为空)
    pub window: Option<VisitWindow>,
    pub dock_id: Option<String>,
    pub officer_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub is_hazardous: bool,
    pub occurred_at: DateTime<Utc>,
}

impl VisitEvent {
    /// 由聚合当前状态生成事件
    pub fn from_vvn(vvn: &VesselVisitNotification, event_type: VisitEventType) -> Self {
        Self {
            vvn_id: vvn.id().to_string(),
            event_type,
            imo: vvn.imo().to_string(),
            window: vvn.window(),
            dock_id: vvn.assigned_dock_id().map(str::to_string),
            officer_id: vvn.reviewing_officer_id().map(str::to_string),
            rejection_reason: vvn.rejection_reason().map(str::to_string),
            is_hazardous: vvn.is_hazardous(),
            occurred_at: Utc::now(),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 靠泊事件发布者
///
/// # 实现说明
/// - 发布失败不回滚已持久化的状态, 由调用方记录告警
pub trait VisitEventPublisher: Send + Sync {
    /// 发布事件
    ///
    /// # 返回
    /// - `Ok(message_id)`: 消息 ID（如果支持）或空字符串
    fn publish(&self, event: VisitEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl VisitEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: VisitEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - vvn_id={}, event_type={}",
            event.vvn_id,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn VisitEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn VisitEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: VisitEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - vvn_id={}, event_type={}",
                    event.vvn_id,
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
