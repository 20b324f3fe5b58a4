// ==========================================
// 课表版本与局部重排引擎 - 硬约束冲突检测
// ==========================================
// 输入: 合并后的全局课表 (全部已登记班级的最新快照,候选已替换)
// 输出: 冲突列表 (每条冲突必须给出 reason)
// 红线: 冲突只报告,不丢弃
// ==========================================

use crate::domain::context::ResourceCatalog;
use crate::domain::regeneration::{Conflict, ConflictKind};
use crate::domain::timetable::{SlotRef, SlotTime, Timetable};
use crate::domain::types::Day;
use crate::engine::occupancy;
use std::collections::BTreeMap;

pub struct ConflictDetector<'a> {
    catalog: &'a ResourceCatalog,
    default_max_periods_per_day: usize,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(catalog: &'a ResourceCatalog, default_max_periods_per_day: usize) -> Self {
        Self {
            catalog,
            default_max_periods_per_day,
        }
    }

    fn max_per_day(&self, teacher_id: &str) -> usize {
        self.catalog
            .teacher_max_per_day
            .get(teacher_id)
            .copied()
            .unwrap_or(self.default_max_periods_per_day)
    }

    /// 检测全部硬约束冲突 (结果有序)
    pub fn detect(&self, world: &Timetable) -> Vec<Conflict> {
        let scan = occupancy::scan(world);
        let mut conflicts = Vec::new();

        let mut teacher_at: BTreeMap<(&str, SlotTime), Vec<SlotRef>> = BTreeMap::new();
        let mut room_at: BTreeMap<(&str, SlotTime), Vec<SlotRef>> = BTreeMap::new();
        let mut teacher_day: BTreeMap<(&str, Day), Vec<SlotRef>> = BTreeMap::new();

        for occ in &scan.occupied {
            let time = occ.slot.time();
            let lesson = occ.lesson;

            if let Some(t) = lesson.teacher_id.as_deref() {
                teacher_at.entry((t, time)).or_default().push(occ.slot.clone());
                teacher_day
                    .entry((t, time.day))
                    .or_default()
                    .push(occ.slot.clone());

                if !self.catalog.is_teacher_available(t, time) {
                    conflicts.push(Conflict::new(
                        ConflictKind::TeacherUnavailable,
                        vec![occ.slot.clone()],
                        format!("教师 {} 在 {} 第{}节不可用", t, time.day, time.slot_index),
                    ));
                }
            }

            if let Some(r) = lesson.room_id.as_deref() {
                room_at.entry((r, time)).or_default().push(occ.slot.clone());
            }

            // 容量/教室类型只在首节检查一次
            if occ.slot == occ.head && lesson.is_lesson_head() {
                if let Some(r) = lesson.room_id.as_deref() {
                    if !self.catalog.room_fits(r, &occ.slot.section_id) {
                        conflicts.push(Conflict::new(
                            ConflictKind::RoomCapacityExceeded,
                            vec![occ.slot.clone()],
                            format!("教室 {} 容量不足以容纳班级 {}", r, occ.slot.section_id),
                        ));
                    }
                    if !self.catalog.room_supports(r, lesson.kind) {
                        conflicts.push(Conflict::new(
                            ConflictKind::RoomKindMismatch,
                            vec![occ.slot.clone()],
                            format!("教室 {} 不支持 {} 课", r, lesson.kind),
                        ));
                    }
                }
            }
        }

        for ((teacher, time), slots) in teacher_at {
            if slots.len() > 1 {
                conflicts.push(Conflict::new(
                    ConflictKind::TeacherDoubleBooked,
                    slots,
                    format!("教师 {} 在 {} 第{}节重复排课", teacher, time.day, time.slot_index),
                ));
            }
        }

        for ((room, time), slots) in room_at {
            if slots.len() > 1 {
                conflicts.push(Conflict::new(
                    ConflictKind::RoomDoubleBooked,
                    slots,
                    format!("教室 {} 在 {} 第{}节重复占用", room, time.day, time.slot_index),
                ));
            }
        }

        for ((teacher, day), slots) in teacher_day {
            let max = self.max_per_day(teacher);
            if slots.len() > max {
                conflicts.push(Conflict::new(
                    ConflictKind::TeacherOverloaded,
                    slots.clone(),
                    format!("教师 {} 在 {} 排课 {} 节, 超过上限 {}", teacher, day, slots.len(), max),
                ));
            }
        }

        for slot in scan.broken {
            let reason = format!("实验课跨节断裂: {}", slot);
            conflicts.push(Conflict::new(ConflictKind::BrokenLabSpan, vec![slot], reason));
        }

        conflicts.sort();
        conflicts.dedup();
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::{RoomProfile, SchedulingContext, SectionProfile, TeacherProfile};
    use crate::domain::timetable::{SlotCell, WeekSchedule};
    use crate::domain::types::SlotKind;

    fn kinds(conflicts: &[Conflict]) -> Vec<ConflictKind> {
        conflicts.iter().map(|c| c.kind).collect()
    }

    #[test]
    fn test_clean_world_has_no_conflicts() {
        let mut a = WeekSchedule::new(3);
        a.set(Day::Mon, 0, SlotCell::theory("MATH", "T1", "R1"));
        let mut b = WeekSchedule::new(3);
        b.set(Day::Mon, 1, SlotCell::theory("MATH", "T1", "R1"));
        let mut world = Timetable::single("S1", a);
        world.sections.insert("S2".to_string(), b);

        let catalog = ResourceCatalog::build([], [&world]);
        assert!(ConflictDetector::new(&catalog, 6).detect(&world).is_empty());
    }

    #[test]
    fn test_double_booking_across_sections() {
        let mut a = WeekSchedule::new(3);
        a.set(Day::Mon, 0, SlotCell::theory("MATH", "T1", "R1"));
        let mut b = WeekSchedule::new(3);
        b.set(Day::Mon, 0, SlotCell::theory("MATH", "T1", "R1"));
        let mut world = Timetable::single("S1", a);
        world.sections.insert("S2".to_string(), b);

        let catalog = ResourceCatalog::build([], [&world]);
        let conflicts = ConflictDetector::new(&catalog, 6).detect(&world);
        assert_eq!(
            kinds(&conflicts),
            vec![ConflictKind::TeacherDoubleBooked, ConflictKind::RoomDoubleBooked]
        );
        assert_eq!(conflicts[0].slots.len(), 2);
        assert!(conflicts[0].touches_section("S2"));
    }

    #[test]
    fn test_context_constraints() {
        let mut week = WeekSchedule::new(4);
        week.set(Day::Tue, 0, SlotCell::theory("MATH", "T1", "LAB1"));
        week.set(Day::Tue, 1, SlotCell::theory("MATH", "T1", "R-SMALL"));
        week.set(Day::Tue, 2, SlotCell::theory("MATH", "T1", "R1"));
        let world = Timetable::single("S1", week);

        let ctx = SchedulingContext {
            teachers: vec![TeacherProfile {
                teacher_id: "T1".to_string(),
                subjects: vec!["MATH".to_string()],
                unavailable: vec![SlotTime { day: Day::Tue, slot_index: 2 }],
                max_periods_per_day: Some(2),
            }],
            rooms: vec![
                RoomProfile { room_id: "LAB1".to_string(), kind: SlotKind::Lab, capacity: None },
                RoomProfile {
                    room_id: "R-SMALL".to_string(),
                    kind: SlotKind::Theory,
                    capacity: Some(10),
                },
            ],
            sections: vec![SectionProfile { section_id: "S1".to_string(), size: Some(30) }],
        };
        let catalog = ResourceCatalog::build([&ctx], [&world]);
        let conflicts = ConflictDetector::new(&catalog, 6).detect(&world);

        let found = kinds(&conflicts);
        assert!(found.contains(&ConflictKind::RoomKindMismatch));
        assert!(found.contains(&ConflictKind::RoomCapacityExceeded));
        assert!(found.contains(&ConflictKind::TeacherUnavailable));
        assert!(found.contains(&ConflictKind::TeacherOverloaded));
        assert!(!found.contains(&ConflictKind::TeacherDoubleBooked));
    }
}
