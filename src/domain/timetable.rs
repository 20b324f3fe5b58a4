// ==========================================
// 课表版本与局部重排引擎 - 课表领域模型
// ==========================================
// 结构: 班级(section) -> 五天 -> 课节序号 -> 课节内容
// 红线: 实验课跨节时只有首节携带完整属性,后续节标记为 continuation
// ==========================================

use crate::domain::types::{Day, SlotKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// SlotCell - 单个课节内容
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SlotCell {
    pub kind: SlotKind,                  // 课节类型
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_code: Option<String>,    // 科目代码
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,      // 教师ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,         // 教室ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<u8>,                // 实验课跨节数 (仅首节)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub continuation: bool,              // 实验课后续节
}

impl SlotCell {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn break_cell() -> Self {
        Self {
            kind: SlotKind::Break,
            ..Self::default()
        }
    }

    pub fn theory(subject_code: &str, teacher_id: &str, room_id: &str) -> Self {
        Self {
            kind: SlotKind::Theory,
            subject_code: Some(subject_code.to_string()),
            teacher_id: Some(teacher_id.to_string()),
            room_id: Some(room_id.to_string()),
            span: None,
            continuation: false,
        }
    }

    pub fn lab_head(subject_code: &str, teacher_id: &str, room_id: &str, span: u8) -> Self {
        Self {
            kind: SlotKind::Lab,
            subject_code: Some(subject_code.to_string()),
            teacher_id: Some(teacher_id.to_string()),
            room_id: Some(room_id.to_string()),
            span: Some(span.max(1)),
            continuation: false,
        }
    }

    pub fn lab_continuation() -> Self {
        Self {
            kind: SlotKind::Lab,
            continuation: true,
            ..Self::default()
        }
    }

    /// 空课节 (empty 或缺失)
    pub fn is_empty(&self) -> bool {
        self.kind == SlotKind::Empty
    }

    pub fn is_break(&self) -> bool {
        self.kind == SlotKind::Break
    }

    pub fn is_continuation(&self) -> bool {
        self.kind == SlotKind::Lab && self.continuation
    }

    pub fn is_lab_head(&self) -> bool {
        self.kind == SlotKind::Lab && !self.continuation
    }

    /// 是否为携带完整属性的教学课节 (理论课或实验课首节)
    pub fn is_lesson_head(&self) -> bool {
        self.kind.is_lesson() && !self.continuation
    }

    /// 实际占用节数 (实验课首节按 span,其余为 1)
    pub fn effective_span(&self) -> usize {
        if self.is_lab_head() {
            self.span.unwrap_or(1).max(1) as usize
        } else {
            1
        }
    }

    /// 与另一课节存在差异的属性字段
    ///
    /// 顺序固定: kind, subjectCode, teacherId, roomId, span
    /// continuation 标记差异计入 kind
    pub fn differing_fields(&self, other: &SlotCell) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.kind != other.kind || self.continuation != other.continuation {
            fields.push("kind");
        }
        if self.subject_code != other.subject_code {
            fields.push("subjectCode");
        }
        if self.teacher_id != other.teacher_id {
            fields.push("teacherId");
        }
        if self.room_id != other.room_id {
            fields.push("roomId");
        }
        if self.span != other.span {
            fields.push("span");
        }
        fields
    }
}

// ==========================================
// SlotRef - 课节坐标
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRef {
    pub section_id: String,
    pub day: Day,
    pub slot_index: usize,
}

impl SlotRef {
    pub fn new(section_id: &str, day: Day, slot_index: usize) -> Self {
        Self {
            section_id: section_id.to_string(),
            day,
            slot_index,
        }
    }

    /// 对应的时间点 (不含班级)
    pub fn time(&self) -> SlotTime {
        SlotTime {
            day: self.day,
            slot_index: self.slot_index,
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.section_id, self.day, self.slot_index)
    }
}

/// 时间点 (星期 + 课节序号),用于跨班级占用判断
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotTime {
    pub day: Day,
    pub slot_index: usize,
}

// ==========================================
// WeekSchedule - 单个班级的一周课表
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct WeekSchedule {
    pub days: BTreeMap<Day, Vec<SlotCell>>,
}

impl WeekSchedule {
    /// 创建全空课表
    pub fn new(slots_per_day: usize) -> Self {
        let days = Day::ALL
            .iter()
            .map(|d| (*d, vec![SlotCell::empty(); slots_per_day]))
            .collect();
        Self { days }
    }

    /// 每天课节数 (取各天最大值)
    pub fn slots_per_day(&self) -> usize {
        self.days.values().map(|v| v.len()).max().unwrap_or(0)
    }

    pub fn get(&self, day: Day, slot_index: usize) -> Option<&SlotCell> {
        self.days.get(&day).and_then(|cells| cells.get(slot_index))
    }

    /// 写入课节 (必要时补齐当天长度)
    pub fn set(&mut self, day: Day, slot_index: usize, cell: SlotCell) {
        let cells = self.days.entry(day).or_default();
        if cells.len() <= slot_index {
            cells.resize(slot_index + 1, SlotCell::empty());
        }
        cells[slot_index] = cell;
    }

    /// 查找覆盖该课节的实验课首节序号
    pub fn lab_head_of(&self, day: Day, slot_index: usize) -> Option<usize> {
        let cells = self.days.get(&day)?;
        let cell = cells.get(slot_index)?;
        if cell.is_lab_head() {
            return Some(slot_index);
        }
        if !cell.is_continuation() {
            return None;
        }
        (0..slot_index).rev().find(|&i| {
            let c = &cells[i];
            c.is_lab_head() && i + c.effective_span() > slot_index
        })
    }

    /// 补齐五天,每天补齐到 slots_per_day 个课节
    pub fn normalize(&mut self) {
        let n = self.slots_per_day();
        for day in Day::ALL {
            let cells = self.days.entry(day).or_default();
            if cells.len() < n {
                cells.resize(n, SlotCell::empty());
            }
        }
    }

    /// 遍历全部课节 (按星期、序号升序)
    pub fn iter(&self) -> impl Iterator<Item = (Day, usize, &SlotCell)> {
        self.days
            .iter()
            .flat_map(|(day, cells)| cells.iter().enumerate().map(move |(i, c)| (*day, i, c)))
    }
}

// ==========================================
// Timetable - 课表 (section_id -> 一周课表)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timetable {
    pub sections: BTreeMap<String, WeekSchedule>,
}

impl Timetable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 仅包含单个班级的课表
    pub fn single(section_id: &str, schedule: WeekSchedule) -> Self {
        let mut sections = BTreeMap::new();
        sections.insert(section_id.to_string(), schedule);
        Self { sections }
    }

    pub fn section(&self, section_id: &str) -> Option<&WeekSchedule> {
        self.sections.get(section_id)
    }

    pub fn get_cell(&self, slot: &SlotRef) -> Option<&SlotCell> {
        self.sections
            .get(&slot.section_id)
            .and_then(|s| s.get(slot.day, slot.slot_index))
    }

    pub fn set_cell(&mut self, slot: &SlotRef, cell: SlotCell) {
        self.sections
            .entry(slot.section_id.clone())
            .or_default()
            .set(slot.day, slot.slot_index, cell);
    }

    /// 遍历全部课节坐标与内容
    pub fn cells(&self) -> impl Iterator<Item = (SlotRef, &SlotCell)> {
        self.sections.iter().flat_map(|(section_id, week)| {
            week.iter()
                .map(move |(day, i, cell)| (SlotRef::new(section_id, day, i), cell))
        })
    }

    /// 课节总数 (含空课节与课间)
    pub fn slot_count(&self) -> usize {
        self.sections
            .values()
            .map(|w| w.days.values().map(|v| v.len()).sum::<usize>())
            .sum()
    }

    /// 至少有一节教学课的星期
    pub fn days_with_classes(&self) -> Vec<Day> {
        Day::ALL
            .iter()
            .copied()
            .filter(|day| {
                self.sections.values().any(|w| {
                    w.days
                        .get(day)
                        .map(|cells| cells.iter().any(|c| c.kind.is_lesson()))
                        .unwrap_or(false)
                })
            })
            .collect()
    }

    /// 每天课节数 (取各班级最大值)
    pub fn slots_per_day(&self) -> usize {
        self.sections.values().map(|w| w.slots_per_day()).max().unwrap_or(0)
    }
}
