// ==========================================
// 课表版本与局部重排引擎 - 排课上下文
// ==========================================
// 用途: 教师可授科目 / 不可用时段 / 教室类型与容量 / 班级人数
// 说明: 随 version 1 一起登记; 缺失信息由课表本身推导
// ==========================================

use crate::domain::timetable::{SlotTime, Timetable};
use crate::domain::types::SlotKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TeacherProfile {
    pub teacher_id: String,
    #[serde(default)]
    pub subjects: Vec<String>,          // 可授科目
    #[serde(default)]
    pub unavailable: Vec<SlotTime>,     // 不可用时段
    #[serde(default)]
    pub max_periods_per_day: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomProfile {
    pub room_id: String,
    pub kind: SlotKind,                 // theory / lab
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SectionProfile {
    pub section_id: String,
    #[serde(default)]
    pub size: Option<u32>,
}

// ==========================================
// SchedulingContext - 登记上下文 (持久化对象)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingContext {
    #[serde(default)]
    pub teachers: Vec<TeacherProfile>,
    #[serde(default)]
    pub rooms: Vec<RoomProfile>,
    #[serde(default)]
    pub sections: Vec<SectionProfile>,
}

// ==========================================
// ResourceCatalog - 求解用资源目录 (合并后视图)
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    /// 科目 -> 可授教师 (有序,保证求解确定性)
    pub qualified_teachers: BTreeMap<String, BTreeSet<String>>,
    /// 课节类型 -> 可用教室
    pub rooms_by_kind: BTreeMap<SlotKind, BTreeSet<String>>,
    pub room_capacity: BTreeMap<String, u32>,
    pub section_size: BTreeMap<String, u32>,
    pub teacher_unavailable: BTreeMap<String, BTreeSet<SlotTime>>,
    pub teacher_max_per_day: BTreeMap<String, usize>,
}

impl ResourceCatalog {
    /// 由多个登记上下文与课表合并构建
    ///
    /// 规则:
    /// - 显式登记优先 (容量/人数/不可用时段/日上限)
    /// - 课表中出现过的 (科目, 教师) 视为可授
    /// - 未显式登记的教室,课表中出现过的 (课节类型, 教室) 视为可用
    pub fn build<'a>(
        contexts: impl IntoIterator<Item = &'a SchedulingContext>,
        timetables: impl IntoIterator<Item = &'a Timetable>,
    ) -> Self {
        let mut catalog = ResourceCatalog::default();

        for ctx in contexts {
            for teacher in &ctx.teachers {
                for subject in &teacher.subjects {
                    catalog
                        .qualified_teachers
                        .entry(subject.clone())
                        .or_default()
                        .insert(teacher.teacher_id.clone());
                }
                if !teacher.unavailable.is_empty() {
                    catalog
                        .teacher_unavailable
                        .entry(teacher.teacher_id.clone())
                        .or_default()
                        .extend(teacher.unavailable.iter().copied());
                }
                if let Some(max) = teacher.max_periods_per_day {
                    catalog
                        .teacher_max_per_day
                        .insert(teacher.teacher_id.clone(), max);
                }
            }
            for room in &ctx.rooms {
                catalog
                    .rooms_by_kind
                    .entry(room.kind)
                    .or_default()
                    .insert(room.room_id.clone());
                if let Some(cap) = room.capacity {
                    catalog.room_capacity.insert(room.room_id.clone(), cap);
                }
            }
            for section in &ctx.sections {
                if let Some(size) = section.size {
                    catalog.section_size.insert(section.section_id.clone(), size);
                }
            }
        }

        let declared_rooms: BTreeSet<String> = catalog
            .rooms_by_kind
            .values()
            .flat_map(|set| set.iter().cloned())
            .collect();

        for timetable in timetables {
            for (_, cell) in timetable.cells() {
                if !cell.is_lesson_head() {
                    continue;
                }
                if let (Some(subject), Some(teacher)) = (&cell.subject_code, &cell.teacher_id) {
                    catalog
                        .qualified_teachers
                        .entry(subject.clone())
                        .or_default()
                        .insert(teacher.clone());
                }
                if let Some(room) = cell.room_id.as_ref().filter(|r| !declared_rooms.contains(*r)) {
                    catalog
                        .rooms_by_kind
                        .entry(cell.kind)
                        .or_default()
                        .insert(room.clone());
                }
            }
        }

        catalog
    }

    pub fn teachers_for(&self, subject_code: &str) -> impl Iterator<Item = &String> {
        self.qualified_teachers
            .get(subject_code)
            .into_iter()
            .flat_map(|s| s.iter())
    }

    pub fn rooms_for(&self, kind: SlotKind) -> impl Iterator<Item = &String> {
        self.rooms_by_kind.get(&kind).into_iter().flat_map(|s| s.iter())
    }

    pub fn is_teacher_available(&self, teacher_id: &str, time: SlotTime) -> bool {
        self.teacher_unavailable
            .get(teacher_id)
            .map(|set| !set.contains(&time))
            .unwrap_or(true)
    }

    /// 教室是否容得下班级 (任一信息缺失视为可容纳)
    pub fn room_fits(&self, room_id: &str, section_id: &str) -> bool {
        match (self.room_capacity.get(room_id), self.section_size.get(section_id)) {
            (Some(cap), Some(size)) => size <= cap,
            _ => true,
        }
    }

    /// 教室是否登记为可承载该课节类型
    ///
    /// 未出现在任何类型中的教室不做判断
    pub fn room_supports(&self, room_id: &str, kind: SlotKind) -> bool {
        let known = self.rooms_by_kind.values().any(|set| set.contains(room_id));
        if !known {
            return true;
        }
        self.rooms_by_kind
            .get(&kind)
            .map(|set| set.contains(room_id))
            .unwrap_or(false)
    }
}
