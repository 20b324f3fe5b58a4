// ==========================================
// 落位状态与代价函数 (greedy / exhaustive 共用)
// ==========================================
// 硬约束: 课节空闲、教师/教室不冲突、教师可用、日上限、教室容量与类型
// 代价:   保持原样的新颖度惩罚、换教师/换教室、同日同科目重复
// ==========================================

use crate::domain::timetable::{SlotRef, SlotTime};
use crate::domain::types::Day;
use crate::engine::solver::{Placement, SolverProblem};
use std::collections::{BTreeSet, HashMap, HashSet};

/// 原范围课次原样保留的惩罚 (重排应优先给出替代方案)
const NOVELTY_PENALTY: f64 = 5.0;
const TEACHER_SWITCH: f64 = 1.0;
const ROOM_SWITCH: f64 = 0.5;
const MOVE: f64 = 0.25;
/// 扩大范围所得课次离开原位的惩罚
const ANCHOR_MOVE: f64 = 4.0;
const ANCHOR_TEACHER_SWITCH: f64 = 2.0;
const ANCHOR_ROOM_SWITCH: f64 = 1.0;
const SUBJECT_REPEAT: f64 = 2.0;

pub struct PlacementState<'p> {
    problem: &'p SolverProblem,
    teacher_busy: HashMap<(String, SlotTime), usize>,
    room_busy: HashMap<(String, SlotTime), usize>,
    teacher_load: HashMap<(String, Day), usize>,
    subject_day: HashMap<(String, Day, String), usize>,
    taken: HashSet<SlotRef>,
}

impl<'p> PlacementState<'p> {
    pub fn new(problem: &'p SolverProblem) -> Self {
        Self {
            problem,
            teacher_busy: problem.pinned.teacher_busy.clone(),
            room_busy: problem.pinned.room_busy.clone(),
            teacher_load: problem.pinned.teacher_load.clone(),
            subject_day: problem.pinned.subject_day.clone(),
            taken: HashSet::new(),
        }
    }

    fn teacher_candidates(&self, idx: usize) -> Vec<Option<String>> {
        let lesson = &self.problem.lessons[idx];
        let original = match &lesson.teacher_id {
            Some(t) => t.clone(),
            None => return vec![None],
        };
        let mut set: BTreeSet<String> = lesson
            .subject_code
            .as_deref()
            .map(|s| self.problem.catalog.teachers_for(s).cloned().collect())
            .unwrap_or_default();
        set.insert(original);
        set.into_iter().map(Some).collect()
    }

    fn room_candidates(&self, idx: usize) -> Vec<Option<String>> {
        let lesson = &self.problem.lessons[idx];
        let original = match &lesson.room_id {
            Some(r) => r.clone(),
            None => return vec![None],
        };
        let mut set: BTreeSet<String> = self.problem.catalog.rooms_for(lesson.kind).cloned().collect();
        set.insert(original);
        set.into_iter().map(Some).collect()
    }

    fn slots_free(&self, head: &SlotRef, span: usize) -> bool {
        (0..span).all(|k| {
            let slot = SlotRef::new(&head.section_id, head.day, head.slot_index + k);
            self.problem.mutable_slots.contains(&slot) && !self.taken.contains(&slot)
        })
    }

    fn teacher_ok(&self, teacher: &str, head: &SlotRef, span: usize) -> bool {
        let catalog = &self.problem.catalog;
        let load = self
            .teacher_load
            .get(&(teacher.to_string(), head.day))
            .copied()
            .unwrap_or(0);
        if load + span > self.problem.max_per_day(teacher) {
            return false;
        }
        (0..span).all(|k| {
            let time = SlotTime {
                day: head.day,
                slot_index: head.slot_index + k,
            };
            catalog.is_teacher_available(teacher, time)
                && self
                    .teacher_busy
                    .get(&(teacher.to_string(), time))
                    .map_or(true, |n| *n == 0)
        })
    }

    fn room_ok(&self, idx: usize, room: &str, head: &SlotRef, span: usize) -> bool {
        let lesson = &self.problem.lessons[idx];
        let catalog = &self.problem.catalog;
        if !catalog.room_fits(room, &head.section_id) || !catalog.room_supports(room, lesson.kind) {
            return false;
        }
        (0..span).all(|k| {
            let time = SlotTime {
                day: head.day,
                slot_index: head.slot_index + k,
            };
            self.room_busy
                .get(&(room.to_string(), time))
                .map_or(true, |n| *n == 0)
        })
    }

    fn cost(&self, idx: usize, head: &SlotRef, teacher: &Option<String>, room: &Option<String>) -> f64 {
        let lesson = &self.problem.lessons[idx];
        let same_slot = *head == lesson.origin;
        let same_teacher = *teacher == lesson.teacher_id;
        let same_room = *room == lesson.room_id;

        let mut cost = 0.0;
        if lesson.anchored {
            if !same_slot {
                cost += ANCHOR_MOVE;
            }
            if !same_teacher {
                cost += ANCHOR_TEACHER_SWITCH;
            }
            if !same_room {
                cost += ANCHOR_ROOM_SWITCH;
            }
        } else {
            if same_slot && same_teacher && same_room {
                cost += NOVELTY_PENALTY;
            }
            if !same_teacher {
                cost += TEACHER_SWITCH;
            }
            if !same_room {
                cost += ROOM_SWITCH;
            }
            if !same_slot {
                cost += MOVE;
            }
        }

        if let Some(subject) = &lesson.subject_code {
            let already = self
                .subject_day
                .get(&(head.section_id.clone(), head.day, subject.clone()))
                .copied()
                .unwrap_or(0);
            cost += SUBJECT_REPEAT * already as f64;
        }
        cost
    }

    /// 课次的全部可行落位 (按代价升序, 代价相同保持 课节/教师/教室 顺序)
    pub fn options(&self, idx: usize) -> Vec<Placement> {
        let lesson = &self.problem.lessons[idx];
        let span = lesson.span;
        let teachers = self.teacher_candidates(idx);
        let rooms = self.room_candidates(idx);

        let mut options = Vec::new();
        let heads = self
            .problem
            .mutable_slots
            .iter()
            .filter(|s| s.section_id == lesson.origin.section_id);

        for head in heads {
            if !self.slots_free(head, span) {
                continue;
            }
            for teacher in &teachers {
                if let Some(t) = teacher {
                    if !self.teacher_ok(t, head, span) {
                        continue;
                    }
                }
                for room in &rooms {
                    if let Some(r) = room {
                        if !self.room_ok(idx, r, head, span) {
                            continue;
                        }
                    }
                    options.push(Placement {
                        lesson: idx,
                        head: head.clone(),
                        teacher_id: teacher.clone(),
                        room_id: room.clone(),
                        cost: self.cost(idx, head, teacher, room),
                    });
                }
            }
        }

        options.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        options
    }

    pub fn apply(&mut self, p: &Placement) {
        self.adjust(p, true);
    }

    pub fn revert(&mut self, p: &Placement) {
        self.adjust(p, false);
    }

    fn adjust(&mut self, p: &Placement, add: bool) {
        let lesson = &self.problem.lessons[p.lesson];
        let span = lesson.span;

        fn bump<K: std::hash::Hash + Eq>(map: &mut HashMap<K, usize>, key: K, add: bool, n: usize) {
            let entry = map.entry(key).or_default();
            if add {
                *entry += n;
            } else {
                *entry = entry.saturating_sub(n);
            }
        }

        for slot in p.covered(span) {
            let time = slot.time();
            if let Some(t) = &p.teacher_id {
                bump(&mut self.teacher_busy, (t.clone(), time), add, 1);
            }
            if let Some(r) = &p.room_id {
                bump(&mut self.room_busy, (r.clone(), time), add, 1);
            }
            if add {
                self.taken.insert(slot);
            } else {
                self.taken.remove(&slot);
            }
        }
        if let Some(t) = &p.teacher_id {
            bump(&mut self.teacher_load, (t.clone(), p.head.day), add, span);
        }
        if let Some(s) = &lesson.subject_code {
            bump(
                &mut self.subject_day,
                (p.head.section_id.clone(), p.head.day, s.clone()),
                add,
                1,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::solver::test_support::{problem, world};

    #[test]
    fn test_options_prefer_alternative_teacher() {
        let world = world();
        let p = problem(&world, &[SlotRef::new("S1", Day::Mon, 0)]);
        let state = PlacementState::new(&p);
        let opts = state.options(0);

        // TY 与 R2 在周一 0 节被 S2 占用, 只能原样保留
        assert_eq!(opts.len(), 1);
        assert_eq!(opts[0].teacher_id.as_deref(), Some("TX"));
        assert_eq!(opts[0].cost, NOVELTY_PENALTY);
    }

    #[test]
    fn test_options_move_within_section() {
        let world = world();
        let p = problem(
            &world,
            &[SlotRef::new("S1", Day::Mon, 0), SlotRef::new("S1", Day::Mon, 2)],
        );
        let state = PlacementState::new(&p);
        let best = &state.options(0)[0];
        // 周一 2 节空闲: 原教师原教室, 仅移动
        assert_eq!(best.head, SlotRef::new("S1", Day::Mon, 2));
        assert_eq!(best.teacher_id.as_deref(), Some("TX"));
        assert_eq!(best.room_id.as_deref(), Some("R1"));
        assert_eq!(best.cost, MOVE);
    }

    #[test]
    fn test_apply_and_revert_are_symmetric() {
        let world = world();
        let p = problem(&world, &[SlotRef::new("S1", Day::Mon, 0)]);
        let mut state = PlacementState::new(&p);
        let opt = state.options(0).remove(0);
        state.apply(&opt);
        assert!(state.options(0).is_empty());
        state.revert(&opt);
        assert_eq!(state.options(0).len(), 1);
    }
}
