// ==========================================
// 重排求解作业 (在 spawn_blocking 中执行)
// ==========================================
// 输入全部为拥有所有权的数据, 不访问存储
// 流程: 原范围求解 -> (preserveUnchanged=false 且存在本次引入的冲突) 扩大范围重解
//       -> 按本次引入的冲突数取较少者
// 本次引入: 涉及原可变课节, 或重排前快照中不存在的冲突
// ==========================================

use crate::domain::context::ResourceCatalog;
use crate::domain::regeneration::{Conflict, ConflictKind};
use crate::domain::timetable::{SlotRef, Timetable};
use crate::engine::conflict::ConflictDetector;
use crate::engine::scope::ResolvedScope;
use crate::engine::solver::{SolverProblem, TimetableSolver};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RegenerationJob {
    /// 全部班级最新快照合并
    pub world: Timetable,
    pub catalog: ResourceCatalog,
    pub resolved: ResolvedScope,
    /// Some = 允许扩大范围 (preserveUnchanged=false)
    pub widened_slots: Option<BTreeSet<SlotRef>>,
    pub default_max_periods_per_day: usize,
    pub max_nodes: u64,
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// 受影响班级的候选课表
    pub candidate: Timetable,
    pub conflicts: Vec<Conflict>,
    pub attempts: u64,
    pub placed: usize,
    pub unplaced: usize,
    pub widened: bool,
}

impl RegenerationJob {
    pub fn run(&self, solver: &dyn TimetableSolver, cancel: &AtomicBool) -> JobOutcome {
        let narrow = self.solve_once(solver, cancel, &self.resolved.mutable_slots);

        let wide_slots = match &self.widened_slots {
            Some(slots) => slots,
            None => return narrow,
        };

        // 冻结区原有冲突不触发扩大范围
        let baseline = self.detect(&self.world);
        let narrow_introduced = self.introduced(&narrow.conflicts, &baseline);
        if narrow_introduced == 0
            || cancel.load(Ordering::Relaxed)
            || wide_slots.len() <= self.resolved.mutable_slots.len()
        {
            return narrow;
        }

        debug!(
            introduced = narrow_introduced,
            narrow_slots = self.resolved.mutable_slots.len(),
            wide_slots = wide_slots.len(),
            "原范围存在新引入的冲突, 扩大范围重解"
        );
        let mut wide = self.solve_once(solver, cancel, wide_slots);
        wide.attempts += narrow.attempts;

        let wide_introduced = self.introduced(&wide.conflicts, &baseline);
        if wide_introduced < narrow_introduced {
            wide.widened = true;
            wide
        } else {
            warn!(
                narrow = narrow_introduced,
                wide = wide_introduced,
                "扩大范围未减少冲突, 保留原范围结果"
            );
            JobOutcome {
                attempts: wide.attempts,
                ..narrow
            }
        }
    }

    /// 受影响班级内的冲突
    fn detect(&self, merged: &Timetable) -> Vec<Conflict> {
        ConflictDetector::new(&self.catalog, self.default_max_periods_per_day)
            .detect(merged)
            .into_iter()
            .filter(|c| self.resolved.sections.iter().any(|s| c.touches_section(s)))
            .collect()
    }

    /// 本次重排引入的冲突数
    fn introduced(&self, conflicts: &[Conflict], baseline: &[Conflict]) -> usize {
        conflicts
            .iter()
            .filter(|c| {
                c.slots.iter().any(|s| self.resolved.mutable_slots.contains(s))
                    || !baseline.contains(c)
            })
            .count()
    }

    fn solve_once(
        &self,
        solver: &dyn TimetableSolver,
        cancel: &AtomicBool,
        mutable: &BTreeSet<SlotRef>,
    ) -> JobOutcome {
        let problem = SolverProblem::build(
            &self.world,
            &self.resolved.sections,
            mutable.clone(),
            &self.resolved.mutable_slots,
            self.catalog.clone(),
            self.default_max_periods_per_day,
            self.max_nodes,
        );
        let outcome = solver.solve(&problem, cancel);
        let applied = outcome.apply(&problem);

        let mut merged = self.world.clone();
        for (section_id, week) in &applied.candidate.sections {
            merged.sections.insert(section_id.clone(), week.clone());
        }

        let mut conflicts = self.detect(&merged);

        for &idx in &applied.unplaced {
            let lesson = &problem.lessons[idx];
            conflicts.push(Conflict::new(
                ConflictKind::UnplacedLesson,
                vec![lesson.origin.clone()],
                format!(
                    "课次 {} (原位置 {}) 无可行位置",
                    lesson.subject_code.as_deref().unwrap_or("?"),
                    lesson.origin
                ),
            ));
        }
        conflicts.sort();
        conflicts.dedup();

        JobOutcome {
            candidate: applied.candidate,
            conflicts,
            attempts: outcome.attempts,
            placed: applied.placed,
            unplaced: applied.fallback.len() + applied.unplaced.len(),
            widened: false,
        }
    }
}
