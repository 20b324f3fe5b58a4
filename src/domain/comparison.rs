// ==========================================
// 课表版本与局部重排引擎 - 版本对比模型
// ==========================================

use crate::domain::timetable::{SlotCell, Timetable};
use crate::domain::types::Day;
use crate::domain::version::TimetableVersion;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

/// 单个课节差异
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotChange {
    pub section_id: String,
    pub day: Day,
    pub slot_index: usize,
    pub change_type: ChangeType,
    pub before: Option<SlotCell>,
    pub after: Option<SlotCell>,
    pub changed_fields: Vec<String>,
    /// 显著度 = 差异字段数
    pub significance: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub unchanged: usize,
}

/// 快照级对比结果 (不含版本信息)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDiff {
    pub changes: Vec<SlotChange>,
    pub summary: ComparisonSummary,
    pub top_modified: Vec<SlotChange>,
}

/// 版本对比响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionComparisonResponse {
    pub timetable_id: String,
    pub version1: i32,
    pub version2: i32,
    pub changes: Vec<SlotChange>,
    pub summary: ComparisonSummary,
    pub top_modified: Vec<SlotChange>,
}

// ==========================================
// 快照 / 版本列表响应
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub slot_count: usize,
    pub days_with_classes: Vec<Day>,
    pub last_updated: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub timetable_id: String,
    pub version: i32,
    pub score: f64,
    pub health_score: f64,
    pub generated_at: NaiveDateTime,
    pub timetable: Timetable,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionsResponse {
    pub timetable_id: String,
    pub current_version: i32,
    pub versions: Vec<TimetableVersion>,
}
