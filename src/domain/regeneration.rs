// ==========================================
// 课表版本与局部重排引擎 - 重排请求/响应模型
// ==========================================
// 字段命名: camelCase (前端契约逐字保留)
// ==========================================

use crate::domain::timetable::{SlotCell, SlotRef, WeekSchedule};
use crate::domain::types::{Day, RegenerationScope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// RegenerationRequest - 重排请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerationRequest {
    pub timetable_id: String,
    pub section_id: String,
    /// teacher 范围为教师ID,其余范围为班级ID
    pub target_id: String,
    pub scope: RegenerationScope,
    #[serde(default)]
    pub day: Option<Day>,
    #[serde(default)]
    pub slot_index: Option<usize>,
    #[serde(default)]
    pub preserve_unchanged: bool,
    pub solver_type: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// 求解超时 (毫秒), 缺省取配置值
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub requested_by: Option<String>,
}

impl RegenerationRequest {
    /// 便捷构造: 单节重排
    pub fn slot(
        timetable_id: &str,
        section_id: &str,
        day: Day,
        slot_index: usize,
        solver_type: &str,
    ) -> Self {
        Self {
            timetable_id: timetable_id.to_string(),
            section_id: section_id.to_string(),
            target_id: section_id.to_string(),
            scope: RegenerationScope::Slot,
            day: Some(day),
            slot_index: Some(slot_index),
            preserve_unchanged: true,
            solver_type: solver_type.to_string(),
            notes: None,
            timeout_ms: None,
            requested_by: None,
        }
    }

    /// 便捷构造: 教师重排
    pub fn teacher(timetable_id: &str, section_id: &str, teacher_id: &str, solver_type: &str) -> Self {
        Self {
            timetable_id: timetable_id.to_string(),
            section_id: section_id.to_string(),
            target_id: teacher_id.to_string(),
            scope: RegenerationScope::Teacher,
            day: None,
            slot_index: None,
            preserve_unchanged: true,
            solver_type: solver_type.to_string(),
            notes: None,
            timeout_ms: None,
            requested_by: None,
        }
    }
}

// ==========================================
// Conflict - 硬约束冲突 (非致命,随响应返回)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    TeacherDoubleBooked,
    RoomDoubleBooked,
    RoomCapacityExceeded,
    RoomKindMismatch,
    TeacherUnavailable,
    TeacherOverloaded,
    BrokenLabSpan,
    UnplacedLesson,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::TeacherDoubleBooked => "teacherDoubleBooked",
            ConflictKind::RoomDoubleBooked => "roomDoubleBooked",
            ConflictKind::RoomCapacityExceeded => "roomCapacityExceeded",
            ConflictKind::RoomKindMismatch => "roomKindMismatch",
            ConflictKind::TeacherUnavailable => "teacherUnavailable",
            ConflictKind::TeacherOverloaded => "teacherOverloaded",
            ConflictKind::BrokenLabSpan => "brokenLabSpan",
            ConflictKind::UnplacedLesson => "unplacedLesson",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub kind: ConflictKind,
    pub slots: Vec<SlotRef>,
    pub reason: String,
}

impl Conflict {
    pub fn new(kind: ConflictKind, mut slots: Vec<SlotRef>, reason: impl Into<String>) -> Self {
        slots.sort();
        slots.dedup();
        Self {
            kind,
            slots,
            reason: reason.into(),
        }
    }

    pub fn touches_section(&self, section_id: &str) -> bool {
        self.slots.iter().any(|s| s.section_id == section_id)
    }
}

// ==========================================
// ChangedSlot - 重排前后有变化的课节
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedSlot {
    pub section_id: String,
    pub day: Day,
    pub slot_index: usize,
    pub before: SlotCell,
    pub after: SlotCell,
    pub changed_fields: Vec<String>,
    /// 冻结区课节因化解冲突被连带调整
    pub secondary: bool,
}

// ==========================================
// SolverMetadata - 求解诊断信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SolverMetadata {
    pub strategy: String,          // 实际使用的策略
    pub attempts: u64,             // 尝试次数 (搜索节点数)
    pub elapsed_ms: u64,           // 耗时
    pub placed_lessons: usize,     // 已落位课次
    pub unplaced_lessons: usize,   // 未能可行落位课次
    pub widened: bool,             // 是否扩大范围重解
}

// ==========================================
// CommittedVersionRef - 本次提交的版本
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedVersionRef {
    pub timetable_id: String,
    pub section_id: String,
    pub version_id: String,
    pub version: i32,
    pub score: f64,
    pub health_score: f64,
}

// ==========================================
// RegenerationResponse - 重排响应
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerationResponse {
    /// section_id -> 候选课表 (已提交)
    pub timetables: BTreeMap<String, WeekSchedule>,
    pub score: f64,
    pub health_score: f64,
    pub conflicts: Vec<Conflict>,
    pub changed_slots: Vec<ChangedSlot>,
    pub solver_metadata: SolverMetadata,
    pub versions: Vec<CommittedVersionRef>,
}

impl RegenerationResponse {
    /// 有冲突 = 成功但不完美
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}
