// ==========================================
// 课表版本与局部重排引擎 - 范围解析
// ==========================================
// teacher: 该教师在所有班级的全部课节
// section: 该班级全部课节
// day:     该班级某天全部课节
// slot:    单个课节 (实验课展开为整个跨节)
// 红线: 课间 (break) 永远冻结
// 红线: 校验失败必须在求解前返回
// ==========================================

use crate::domain::regeneration::RegenerationRequest;
use crate::domain::timetable::{SlotRef, WeekSchedule};
use crate::domain::types::{Day, RegenerationScope};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::occupancy;
use crate::engine::world::World;
use std::collections::BTreeSet;

/// 解析后的范围
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedScope {
    pub scope: RegenerationScope,
    /// 受影响班级
    pub sections: BTreeSet<String>,
    /// 受影响课表 (升序, 即加锁顺序)
    pub timetable_ids: BTreeSet<String>,
    pub mutable_slots: BTreeSet<SlotRef>,
    /// 受影响班级中的其余课节
    pub frozen_slots: BTreeSet<SlotRef>,
}

pub struct ScopeResolver;

impl ScopeResolver {
    /// 不依赖数据的参数校验
    pub fn validate(request: &RegenerationRequest) -> EngineResult<()> {
        if request.target_id.trim().is_empty() {
            return Err(EngineError::InvalidScope("targetId 不能为空".to_string()));
        }
        // 班级类范围的 targetId 即班级ID; sectionId 为空时不校验
        let section_id = request.section_id.trim();
        if request.scope != RegenerationScope::Teacher
            && !section_id.is_empty()
            && section_id != request.target_id.trim()
        {
            return Err(EngineError::InvalidScope(format!(
                "sectionId {} 与 targetId {} 不一致",
                section_id, request.target_id
            )));
        }
        if request.scope.requires_day() && request.day.is_none() {
            return Err(EngineError::InvalidScope(format!(
                "{} 范围缺少 day",
                request.scope
            )));
        }
        if request.scope.requires_slot_index() && request.slot_index.is_none() {
            return Err(EngineError::InvalidScope(format!(
                "{} 范围缺少 slotIndex",
                request.scope
            )));
        }
        Ok(())
    }

    pub fn resolve(request: &RegenerationRequest, world: &World) -> EngineResult<ResolvedScope> {
        Self::validate(request)?;

        let mutable = match request.scope {
            RegenerationScope::Teacher => Self::teacher_slots(request, world)?,
            _ => Self::section_slots(request, world)?,
        };

        let mut sections: BTreeSet<String> = mutable.iter().map(|s| s.section_id.clone()).collect();
        if request.scope != RegenerationScope::Teacher {
            sections.insert(request.target_id.trim().to_string());
        }
        let mut timetable_ids = BTreeSet::new();
        let mut frozen = BTreeSet::new();
        for section_id in &sections {
            let entry = world
                .entry_for_section(section_id)
                .ok_or_else(|| EngineError::InvalidTimetableId(section_id.clone()))?;
            timetable_ids.insert(entry.record.timetable_id.clone());
            if let Some(week) = entry.latest.timetable.section(section_id) {
                for (day, i, _) in week.iter() {
                    let slot = SlotRef::new(section_id, day, i);
                    if !mutable.contains(&slot) {
                        frozen.insert(slot);
                    }
                }
            }
        }

        Ok(ResolvedScope {
            scope: request.scope,
            sections,
            timetable_ids,
            mutable_slots: mutable,
            frozen_slots: frozen,
        })
    }

    /// 扩大范围: 受影响班级的全部非课间课节
    pub fn widen(resolved: &ResolvedScope, world: &World) -> BTreeSet<SlotRef> {
        let mut slots = resolved.mutable_slots.clone();
        for section_id in &resolved.sections {
            if let Some(week) = world.week_of(section_id) {
                for (day, i, cell) in week.iter() {
                    if !cell.is_break() {
                        slots.insert(SlotRef::new(section_id, day, i));
                    }
                }
            }
        }
        slots
    }

    fn teacher_slots(request: &RegenerationRequest, world: &World) -> EngineResult<BTreeSet<SlotRef>> {
        let timetable_id = request.timetable_id.trim();
        if !timetable_id.is_empty() && !world.entries.contains_key(timetable_id) {
            return Err(EngineError::InvalidTimetableId(timetable_id.to_string()));
        }

        let teacher_id = request.target_id.trim();
        let merged = world.merged();
        let slots: BTreeSet<SlotRef> = occupancy::scan(&merged)
            .occupied
            .into_iter()
            .filter(|o| o.lesson.teacher_id.as_deref() == Some(teacher_id))
            .map(|o| o.slot)
            .collect();

        if slots.is_empty() {
            return Err(EngineError::InvalidScope(format!(
                "教师 {} 在任何班级都没有课",
                teacher_id
            )));
        }
        Ok(slots)
    }

    fn section_slots(request: &RegenerationRequest, world: &World) -> EngineResult<BTreeSet<SlotRef>> {
        let section_id = request.target_id.trim();
        let entry = world.entry_for_section(section_id).ok_or_else(|| {
            EngineError::InvalidTimetableId(format!("班级未登记课表: {}", section_id))
        })?;

        let timetable_id = request.timetable_id.trim();
        if !timetable_id.is_empty() && timetable_id != entry.record.timetable_id {
            return Err(EngineError::InvalidTimetableId(format!(
                "课表 {} 不属于班级 {}",
                timetable_id, section_id
            )));
        }

        let week = entry
            .latest
            .timetable
            .section(section_id)
            .ok_or_else(|| EngineError::InvalidTimetableId(format!("快照中没有班级 {}", section_id)))?;

        let mut slots = BTreeSet::new();
        match request.scope {
            RegenerationScope::Section => {
                for (day, i, cell) in week.iter() {
                    if !cell.is_break() {
                        slots.insert(SlotRef::new(section_id, day, i));
                    }
                }
            }
            RegenerationScope::Day => {
                let day = Self::require_day(request)?;
                for (i, cell) in week.days.get(&day).into_iter().flatten().enumerate() {
                    if !cell.is_break() {
                        slots.insert(SlotRef::new(section_id, day, i));
                    }
                }
            }
            RegenerationScope::Slot => {
                let day = Self::require_day(request)?;
                let slot_index = request
                    .slot_index
                    .ok_or_else(|| EngineError::InvalidScope("slot 范围缺少 slotIndex".to_string()))?;
                let cell = week.get(day, slot_index).ok_or_else(|| {
                    EngineError::InvalidScope(format!(
                        "slotIndex 越界: {} (每天 {} 节)",
                        slot_index,
                        week.days.get(&day).map(|c| c.len()).unwrap_or(0)
                    ))
                })?;
                if cell.is_break() {
                    return Err(EngineError::InvalidScope(format!(
                        "{} 第{}节为课间, 不可重排",
                        day, slot_index
                    )));
                }
                slots.insert(SlotRef::new(section_id, day, slot_index));
            }
            RegenerationScope::Teacher => {
                return Err(EngineError::Internal("teacher 范围不按班级解析".to_string()))
            }
        }

        expand_lab_spans(section_id, week, &mut slots);
        Ok(slots)
    }

    fn require_day(request: &RegenerationRequest) -> EngineResult<Day> {
        request
            .day
            .ok_or_else(|| EngineError::InvalidScope(format!("{} 范围缺少 day", request.scope)))
    }
}

/// 实验课任一节可变 -> 整个跨节可变
fn expand_lab_spans(section_id: &str, week: &WeekSchedule, slots: &mut BTreeSet<SlotRef>) {
    let current: Vec<SlotRef> = slots.iter().cloned().collect();
    for slot in current {
        let head = match week.lab_head_of(slot.day, slot.slot_index) {
            Some(h) => h,
            None => continue,
        };
        let span = week.get(slot.day, head).map(|c| c.effective_span()).unwrap_or(1);
        slots.insert(SlotRef::new(section_id, slot.day, head));
        for k in head + 1..head + span {
            match week.get(slot.day, k) {
                Some(c) if c.is_continuation() => {
                    slots.insert(SlotRef::new(section_id, slot.day, k));
                }
                _ => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::context::SchedulingContext;
    use crate::domain::timetable::{SlotCell, Timetable};
    use crate::domain::types::VersionSource;
    use crate::domain::version::{TimetableRecord, TimetableVersion};
    use crate::engine::world::WorldEntry;

    fn entry(timetable_id: &str, section_id: &str, week: WeekSchedule) -> WorldEntry {
        let now = chrono::Local::now().naive_local();
        WorldEntry {
            record: TimetableRecord {
                timetable_id: timetable_id.to_string(),
                section_id: section_id.to_string(),
                context: SchedulingContext::default(),
                created_at: now,
            },
            latest: TimetableVersion {
                version_id: format!("{}-v1", timetable_id),
                timetable_id: timetable_id.to_string(),
                version: 1,
                timetable: Timetable::single(section_id, week),
                score: 100.0,
                health_score: 100.0,
                notes: None,
                source: VersionSource::Initial,
                generated_at: now,
                restoration_metadata: None,
            },
        }
    }

    fn world() -> World {
        let mut s1 = WeekSchedule::new(4);
        s1.set(Day::Mon, 0, SlotCell::theory("MATH", "T1", "R1"));
        s1.set(Day::Mon, 1, SlotCell::lab_head("PHY", "T2", "LAB", 2));
        s1.set(Day::Mon, 2, SlotCell::lab_continuation());
        s1.set(Day::Mon, 3, SlotCell::break_cell());
        let mut s2 = WeekSchedule::new(4);
        s2.set(Day::Tue, 0, SlotCell::theory("MATH", "T1", "R1"));

        let mut w = World::default();
        w.entries.insert("TT1".to_string(), entry("TT1", "S1", s1));
        w.entries.insert("TT2".to_string(), entry("TT2", "S2", s2));
        w
    }

    #[test]
    fn test_slot_scope_single_cell() {
        let req = RegenerationRequest::slot("TT1", "S1", Day::Mon, 0, "greedy");
        let r = ScopeResolver::resolve(&req, &world()).unwrap();
        assert_eq!(r.mutable_slots.len(), 1);
        assert_eq!(r.frozen_slots.len(), 19);
        assert_eq!(r.timetable_ids.iter().cloned().collect::<Vec<_>>(), vec!["TT1"]);
    }

    #[test]
    fn test_slot_on_continuation_expands_span() {
        let req = RegenerationRequest::slot("TT1", "S1", Day::Mon, 2, "greedy");
        let r = ScopeResolver::resolve(&req, &world()).unwrap();
        let idx: Vec<usize> = r.mutable_slots.iter().map(|s| s.slot_index).collect();
        assert_eq!(idx, vec![1, 2]);
    }

    #[test]
    fn test_invalid_slot_requests() {
        let w = world();
        let brk = RegenerationRequest::slot("TT1", "S1", Day::Mon, 3, "greedy");
        assert!(matches!(ScopeResolver::resolve(&brk, &w), Err(EngineError::InvalidScope(_))));

        let out = RegenerationRequest::slot("TT1", "S1", Day::Mon, 9, "greedy");
        assert!(matches!(ScopeResolver::resolve(&out, &w), Err(EngineError::InvalidScope(_))));

        let mut missing = RegenerationRequest::slot("TT1", "S1", Day::Mon, 0, "greedy");
        missing.slot_index = None;
        assert!(matches!(ScopeResolver::validate(&missing), Err(EngineError::InvalidScope(_))));

        let wrong_tt = RegenerationRequest::slot("TT2", "S1", Day::Mon, 0, "greedy");
        assert!(matches!(
            ScopeResolver::resolve(&wrong_tt, &w),
            Err(EngineError::InvalidTimetableId(_))
        ));

        let unknown = RegenerationRequest::slot("TT9", "S9", Day::Mon, 0, "greedy");
        assert!(matches!(
            ScopeResolver::resolve(&unknown, &w),
            Err(EngineError::InvalidTimetableId(_))
        ));
    }

    #[test]
    fn test_section_id_must_match_target() {
        let mut req = RegenerationRequest::slot("TT1", "S1", Day::Mon, 0, "greedy");
        req.section_id = "S2".to_string();
        assert!(matches!(ScopeResolver::validate(&req), Err(EngineError::InvalidScope(_))));

        req.section_id = String::new();
        assert!(ScopeResolver::validate(&req).is_ok());

        // teacher 范围的 targetId 是教师ID
        let teacher = RegenerationRequest::teacher("TT1", "S1", "T1", "greedy");
        assert!(ScopeResolver::validate(&teacher).is_ok());
    }

    #[test]
    fn test_day_scope_skips_breaks() {
        let mut req = RegenerationRequest::slot("TT1", "S1", Day::Mon, 0, "greedy");
        req.scope = RegenerationScope::Day;
        req.slot_index = None;
        let r = ScopeResolver::resolve(&req, &world()).unwrap();
        assert_eq!(r.mutable_slots.len(), 3);
        assert!(r.frozen_slots.contains(&SlotRef::new("S1", Day::Mon, 3)));
    }

    #[test]
    fn test_teacher_scope_spans_sections() {
        let req = RegenerationRequest::teacher("", "", "T1", "greedy");
        let r = ScopeResolver::resolve(&req, &world()).unwrap();
        assert_eq!(r.sections.len(), 2);
        assert_eq!(r.timetable_ids.len(), 2);
        assert_eq!(r.mutable_slots.len(), 2);

        let nobody = RegenerationRequest::teacher("", "", "T404", "greedy");
        assert!(matches!(ScopeResolver::resolve(&nobody, &world()), Err(EngineError::InvalidScope(_))));
    }

    #[test]
    fn test_widen_covers_non_break_cells() {
        let req = RegenerationRequest::slot("TT1", "S1", Day::Mon, 0, "greedy");
        let w = world();
        let r = ScopeResolver::resolve(&req, &w).unwrap();
        let wide = ScopeResolver::widen(&r, &w);
        assert_eq!(wide.len(), 19);
    }
}
