// ==========================================
// 课表版本与局部重排引擎 - 局部求解器
// ==========================================
// 职责: 只对可变课节求解; 冻结课节与其他课表为固定占用
// 红线: 求解器不访问存储,不提交版本
// 红线: 求解器须定期检查取消标志
// ==========================================

pub mod exhaustive;
pub mod greedy;
pub mod placement;

use crate::domain::context::ResourceCatalog;
use crate::domain::timetable::{SlotCell, SlotRef, SlotTime, Timetable};
use crate::domain::types::{Day, SlotKind};
use crate::engine::occupancy;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub use exhaustive::ExhaustiveSolver;
pub use greedy::GreedySolver;
pub use placement::PlacementState;

// ==========================================
// 求解输入
// ==========================================

/// 待落位课次 (取自可变课节中的教学课首节)
#[derive(Debug, Clone, PartialEq)]
pub struct Lesson {
    pub origin: SlotRef,
    pub kind: SlotKind,
    pub subject_code: Option<String>,
    pub teacher_id: Option<String>,
    pub room_id: Option<String>,
    pub span: usize,
    /// 来自扩大范围前的冻结区 (倾向保持原位)
    pub anchored: bool,
}

impl Lesson {
    pub fn original_cell(&self) -> SlotCell {
        SlotCell {
            kind: self.kind,
            subject_code: self.subject_code.clone(),
            teacher_id: self.teacher_id.clone(),
            room_id: self.room_id.clone(),
            span: (self.kind == SlotKind::Lab).then_some(self.span as u8),
            continuation: false,
        }
    }
}

/// 固定占用 (其他课表 + 冻结课节)
#[derive(Debug, Clone, Default)]
pub struct PinnedOccupancy {
    pub teacher_busy: HashMap<(String, SlotTime), usize>,
    pub room_busy: HashMap<(String, SlotTime), usize>,
    pub teacher_load: HashMap<(String, Day), usize>,
    /// (班级, 星期, 科目) -> 已有课次
    pub subject_day: HashMap<(String, Day, String), usize>,
}

#[derive(Debug, Clone)]
pub struct SolverProblem {
    /// 受影响班级的课表, 可变课节已清空
    pub base: Timetable,
    pub mutable_slots: BTreeSet<SlotRef>,
    pub lessons: Vec<Lesson>,
    pub pinned: PinnedOccupancy,
    pub catalog: ResourceCatalog,
    pub default_max_periods_per_day: usize,
    /// exhaustive 搜索节点上限
    pub max_nodes: u64,
}

impl SolverProblem {
    /// 由全局课表构建求解问题
    ///
    /// # 参数
    /// - world: 全部已登记班级的最新快照
    /// - sections: 受影响班级
    /// - mutable_slots: 可变课节
    /// - core_slots: 原始范围内的课节 (其余可变课节视为扩大范围所得)
    pub fn build(
        world: &Timetable,
        sections: &BTreeSet<String>,
        mutable_slots: BTreeSet<SlotRef>,
        core_slots: &BTreeSet<SlotRef>,
        catalog: ResourceCatalog,
        default_max_periods_per_day: usize,
        max_nodes: u64,
    ) -> Self {
        let mut base = Timetable::new();
        for section_id in sections {
            if let Some(week) = world.sections.get(section_id) {
                base.sections.insert(section_id.clone(), week.clone());
            }
        }
        for slot in &mutable_slots {
            base.set_cell(slot, SlotCell::empty());
        }

        let scan = occupancy::scan(world);
        let mut lessons = Vec::new();
        let mut pinned = PinnedOccupancy::default();

        for occ in &scan.occupied {
            if mutable_slots.contains(&occ.slot) {
                if occ.slot == occ.head && occ.lesson.is_lesson_head() {
                    lessons.push(Lesson {
                        origin: occ.slot.clone(),
                        kind: occ.lesson.kind,
                        subject_code: occ.lesson.subject_code.clone(),
                        teacher_id: occ.lesson.teacher_id.clone(),
                        room_id: occ.lesson.room_id.clone(),
                        span: occ.lesson.effective_span(),
                        anchored: !core_slots.contains(&occ.slot),
                    });
                }
                continue;
            }

            let time = occ.slot.time();
            if let Some(t) = &occ.lesson.teacher_id {
                *pinned.teacher_busy.entry((t.clone(), time)).or_default() += 1;
                *pinned.teacher_load.entry((t.clone(), time.day)).or_default() += 1;
            }
            if let Some(r) = &occ.lesson.room_id {
                *pinned.room_busy.entry((r.clone(), time)).or_default() += 1;
            }
            if occ.slot == occ.head {
                if let Some(s) = &occ.lesson.subject_code {
                    *pinned
                        .subject_day
                        .entry((occ.slot.section_id.clone(), time.day, s.clone()))
                        .or_default() += 1;
                }
            }
        }

        Self {
            base,
            mutable_slots,
            lessons,
            pinned,
            catalog,
            default_max_periods_per_day,
            max_nodes,
        }
    }

    /// 落位顺序: 跨节长的优先, 原范围内的优先, 再按原位置
    pub fn placement_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.lessons.len()).collect();
        order.sort_by(|&a, &b| {
            let la = &self.lessons[a];
            let lb = &self.lessons[b];
            lb.span
                .cmp(&la.span)
                .then(la.anchored.cmp(&lb.anchored))
                .then(la.origin.cmp(&lb.origin))
        });
        order
    }

    pub fn max_per_day(&self, teacher_id: &str) -> usize {
        self.catalog
            .teacher_max_per_day
            .get(teacher_id)
            .copied()
            .unwrap_or(self.default_max_periods_per_day)
    }
}

// ==========================================
// 求解输出
// ==========================================

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub lesson: usize,
    pub head: SlotRef,
    pub teacher_id: Option<String>,
    pub room_id: Option<String>,
    pub cost: f64,
}

impl Placement {
    /// 占用的全部课节 (首节 + 后续节)
    pub fn covered(&self, span: usize) -> impl Iterator<Item = SlotRef> + '_ {
        (0..span).map(move |k| {
            SlotRef::new(&self.head.section_id, self.head.day, self.head.slot_index + k)
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolveOutcome {
    pub placements: Vec<Placement>,
    /// 无可行位置的课次
    pub unplaced: Vec<usize>,
    pub attempts: u64,
    pub cancelled: bool,
}

/// 合并到候选课表后的结果
#[derive(Debug, Clone)]
pub struct AppliedOutcome {
    pub candidate: Timetable,
    pub placed: usize,
    /// 无可行位置、回落到原位的课次
    pub fallback: Vec<usize>,
    /// 无处可放的课次
    pub unplaced: Vec<usize>,
}

impl SolveOutcome {
    /// 将落位结果写入候选课表
    ///
    /// 不可行的课次: 原位仍空则回落原位 (由冲突检测报告), 否则记为未落位
    pub fn apply(&self, problem: &SolverProblem) -> AppliedOutcome {
        let mut candidate = problem.base.clone();
        let mut taken: BTreeSet<SlotRef> = BTreeSet::new();

        for p in &self.placements {
            let lesson = &problem.lessons[p.lesson];
            let mut head_cell = lesson.original_cell();
            head_cell.teacher_id = p.teacher_id.clone();
            head_cell.room_id = p.room_id.clone();
            write_lesson(&mut candidate, &mut taken, &p.head, head_cell, lesson.span);
        }

        let mut fallback = Vec::new();
        let mut unplaced = Vec::new();
        for &idx in &self.unplaced {
            let lesson = &problem.lessons[idx];
            let free = (0..lesson.span).all(|k| {
                let slot = SlotRef::new(
                    &lesson.origin.section_id,
                    lesson.origin.day,
                    lesson.origin.slot_index + k,
                );
                problem.mutable_slots.contains(&slot) && !taken.contains(&slot)
            });
            if free {
                write_lesson(
                    &mut candidate,
                    &mut taken,
                    &lesson.origin,
                    lesson.original_cell(),
                    lesson.span,
                );
                fallback.push(idx);
            } else {
                unplaced.push(idx);
            }
        }

        AppliedOutcome {
            candidate,
            placed: self.placements.len(),
            fallback,
            unplaced,
        }
    }
}

fn write_lesson(
    candidate: &mut Timetable,
    taken: &mut BTreeSet<SlotRef>,
    head: &SlotRef,
    head_cell: SlotCell,
    span: usize,
) {
    candidate.set_cell(head, head_cell);
    taken.insert(head.clone());
    for k in 1..span {
        let slot = SlotRef::new(&head.section_id, head.day, head.slot_index + k);
        candidate.set_cell(&slot, SlotCell::lab_continuation());
        taken.insert(slot);
    }
}

// ==========================================
// Trait: TimetableSolver
// ==========================================

/// 可插拔求解策略
pub trait TimetableSolver: Send + Sync {
    /// 注册标识 (即请求中的 solverType)
    fn id(&self) -> &str;

    /// 求解; cancel 置位后须尽快返回当前最好结果
    fn solve(&self, problem: &SolverProblem, cancel: &AtomicBool) -> SolveOutcome;
}

/// 求解器注册表 (标识 -> 求解器)
#[derive(Clone, Default)]
pub struct SolverRegistry {
    solvers: BTreeMap<String, Arc<dyn TimetableSolver>>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置 greedy / exhaustive
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GreedySolver));
        registry.register(Arc::new(ExhaustiveSolver));
        registry
    }

    pub fn register(&mut self, solver: Arc<dyn TimetableSolver>) {
        self.solvers.insert(solver.id().to_string(), solver);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn TimetableSolver>> {
        self.solvers.get(id.trim()).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.solvers.keys().cloned().collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::timetable::WeekSchedule;

    /// 两个班级: S1 周一 0 节 MATH/TX/R1, 周一 1 节 PHY/TP/R1; S2 周一 0 节 MATH/TY/R2
    pub fn world() -> Timetable {
        let mut s1 = WeekSchedule::new(3);
        s1.set(Day::Mon, 0, SlotCell::theory("MATH", "TX", "R1"));
        s1.set(Day::Mon, 1, SlotCell::theory("PHY", "TP", "R1"));
        let mut s2 = WeekSchedule::new(3);
        s2.set(Day::Mon, 0, SlotCell::theory("MATH", "TY", "R2"));
        let mut world = Timetable::single("S1", s1);
        world.sections.insert("S2".to_string(), s2);
        world
    }

    pub fn problem(world: &Timetable, mutable: &[SlotRef]) -> SolverProblem {
        let mutable: BTreeSet<SlotRef> = mutable.iter().cloned().collect();
        let sections: BTreeSet<String> = mutable.iter().map(|s| s.section_id.clone()).collect();
        let catalog = ResourceCatalog::build([], [world]);
        SolverProblem::build(world, &sections, mutable.clone(), &mutable, catalog, 6, 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_problem_build_clears_mutable_and_pins_rest() {
        let world = world();
        let p = problem(&world, &[SlotRef::new("S1", Day::Mon, 0)]);

        assert_eq!(p.lessons.len(), 1);
        assert_eq!(p.lessons[0].teacher_id.as_deref(), Some("TX"));
        assert!(!p.lessons[0].anchored);
        assert!(p.base.get_cell(&SlotRef::new("S1", Day::Mon, 0)).unwrap().is_empty());
        assert!(!p.base.sections.contains_key("S2"));

        let mon0 = SlotTime { day: Day::Mon, slot_index: 0 };
        assert_eq!(p.pinned.teacher_busy.get(&("TY".to_string(), mon0)), Some(&1));
        assert_eq!(p.pinned.teacher_busy.get(&("TX".to_string(), mon0)), None);
    }

    #[test]
    fn test_registry_lookup() {
        let registry = SolverRegistry::with_defaults();
        assert_eq!(registry.ids(), vec!["exhaustive".to_string(), "greedy".to_string()]);
        assert!(registry.get("greedy").is_some());
        assert!(registry.get("quantum").is_none());
    }

    #[test]
    fn test_apply_falls_back_to_origin() {
        let world = world();
        let p = problem(&world, &[SlotRef::new("S1", Day::Mon, 0)]);
        let outcome = SolveOutcome {
            placements: vec![],
            unplaced: vec![0],
            attempts: 1,
            cancelled: false,
        };
        let applied = outcome.apply(&p);
        assert_eq!(applied.fallback, vec![0]);
        assert_eq!(
            applied.candidate.get_cell(&SlotRef::new("S1", Day::Mon, 0)),
            world.get_cell(&SlotRef::new("S1", Day::Mon, 0))
        );
    }
}
