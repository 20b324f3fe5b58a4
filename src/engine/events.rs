// ==========================================
// 课表版本与局部重排引擎 - 版本事件发布
// ==========================================
// 职责: 定义版本事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，下游 (缓存刷新/通知) 实现适配器
// ==========================================

use crate::domain::timetable::SlotRef;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 版本事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionEventType {
    /// 登记初始版本
    VersionRegistered,
    /// 局部重排产生新版本
    VersionRegenerated,
    /// 回滚产生新版本
    VersionRestored,
}

impl VersionEventType {
    pub fn as_str(&self) -> &str {
        match self {
            VersionEventType::VersionRegistered => "VersionRegistered",
            VersionEventType::VersionRegenerated => "VersionRegenerated",
            VersionEventType::VersionRestored => "VersionRestored",
        }
    }
}

/// 版本事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEvent {
    pub timetable_id: String,
    pub version_id: String,
    pub version: i32,
    pub event_type: VersionEventType,
    /// 事件来源描述
    pub source: Option<String>,
    /// 有变化的课节 (None 表示未知/全量)
    pub changed_slots: Option<Vec<SlotRef>>,
}

impl VersionEvent {
    pub fn new(
        timetable_id: &str,
        version_id: &str,
        version: i32,
        event_type: VersionEventType,
        source: Option<String>,
    ) -> Self {
        Self {
            timetable_id: timetable_id.to_string(),
            version_id: version_id.to_string(),
            version,
            event_type,
            source,
            changed_slots: None,
        }
    }

    pub fn with_changed_slots(mut self, slots: Vec<SlotRef>) -> Self {
        self.changed_slots = Some(slots);
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 版本事件发布者
///
/// # 返回
/// - `Ok(task_id)`: 下游任务 ID（如果支持）或空字符串
pub trait VersionEventPublisher: Send + Sync {
    fn publish(&self, event: VersionEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl VersionEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: VersionEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - timetable_id={}, version={}, event_type={}",
            event.timetable_id,
            event.version,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn VersionEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn VersionEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: VersionEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - timetable_id={}, version={}",
                    event.timetable_id,
                    event.version
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
