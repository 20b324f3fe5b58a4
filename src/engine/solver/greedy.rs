// ==========================================
// greedy 策略: 按落位顺序逐个取最低代价
// ==========================================

use crate::engine::solver::placement::PlacementState;
use crate::engine::solver::{SolveOutcome, SolverProblem, TimetableSolver};
use std::sync::atomic::{AtomicBool, Ordering};

pub struct GreedySolver;

impl TimetableSolver for GreedySolver {
    fn id(&self) -> &str {
        "greedy"
    }

    fn solve(&self, problem: &SolverProblem, cancel: &AtomicBool) -> SolveOutcome {
        let mut state = PlacementState::new(problem);
        let mut outcome = SolveOutcome::default();

        for idx in problem.placement_order() {
            if cancel.load(Ordering::Relaxed) {
                outcome.cancelled = true;
                outcome.unplaced.push(idx);
                continue;
            }

            let options = state.options(idx);
            outcome.attempts += options.len() as u64 + 1;

            match options.into_iter().next() {
                Some(best) => {
                    state.apply(&best);
                    outcome.placements.push(best);
                }
                None => outcome.unplaced.push(idx),
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timetable::SlotRef;
    use crate::domain::types::Day;
    use crate::engine::solver::test_support::{problem, world};

    #[test]
    fn test_greedy_places_all_lessons() {
        let world = world();
        let p = problem(
            &world,
            &[
                SlotRef::new("S1", Day::Mon, 0),
                SlotRef::new("S1", Day::Mon, 1),
                SlotRef::new("S1", Day::Mon, 2),
            ],
        );
        let outcome = GreedySolver.solve(&p, &AtomicBool::new(false));
        assert_eq!(outcome.placements.len(), 2);
        assert!(outcome.unplaced.is_empty());

        let applied = outcome.apply(&p);
        let lessons = applied
            .candidate
            .cells()
            .filter(|(_, c)| c.is_lesson_head())
            .count();
        assert_eq!(lessons, 2);
    }

    #[test]
    fn test_greedy_is_deterministic() {
        let world = world();
        let mutable = [SlotRef::new("S1", Day::Mon, 0), SlotRef::new("S1", Day::Mon, 2)];
        let p = problem(&world, &mutable);
        let a = GreedySolver.solve(&p, &AtomicBool::new(false));
        let b = GreedySolver.solve(&p, &AtomicBool::new(false));
        assert_eq!(a.placements, b.placements);
    }

    #[test]
    fn test_cancelled_before_start() {
        let world = world();
        let p = problem(&world, &[SlotRef::new("S1", Day::Mon, 0)]);
        let outcome = GreedySolver.solve(&p, &AtomicBool::new(true));
        assert!(outcome.cancelled);
        assert_eq!(outcome.unplaced, vec![0]);
    }
}
