// ==========================================
// exhaustive 策略: 分支限界深度优先搜索
// ==========================================
// 上限: SolverProblem.max_nodes; 取消标志置位后立即停止
// 未能落位的课次计 UNPLACED_PENALTY
// 以 greedy 结果为初始上界; 搜索未找到更优解时返回 greedy 结果
// ==========================================

use crate::engine::solver::greedy::GreedySolver;
use crate::engine::solver::placement::PlacementState;
use crate::engine::solver::{Placement, SolveOutcome, SolverProblem, TimetableSolver};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const UNPLACED_PENALTY: f64 = 1000.0;

pub struct ExhaustiveSolver;

impl TimetableSolver for ExhaustiveSolver {
    fn id(&self) -> &str {
        "exhaustive"
    }

    fn solve(&self, problem: &SolverProblem, cancel: &AtomicBool) -> SolveOutcome {
        let incumbent = GreedySolver.solve(problem, cancel);
        let order = problem.placement_order();
        let mut search = Search {
            state: PlacementState::new(problem),
            order: &order,
            cancel,
            max_nodes: problem.max_nodes.max(1),
            nodes: 0,
            stopped: false,
            current: Vec::with_capacity(order.len()),
            best: None,
            best_cost: outcome_cost(&incumbent),
        };
        search.dfs(0, 0.0);

        let (nodes, stopped, best) = (search.nodes, search.stopped, search.best);
        debug!(nodes, stopped, improved = best.is_some(), "exhaustive 搜索结束");

        let attempts = incumbent.attempts + nodes;
        let assignment = match best {
            Some(assignment) => assignment,
            None => {
                return SolveOutcome {
                    attempts,
                    cancelled: cancel.load(Ordering::Relaxed),
                    ..incumbent
                }
            }
        };

        let mut outcome = SolveOutcome {
            attempts,
            cancelled: cancel.load(Ordering::Relaxed),
            ..SolveOutcome::default()
        };
        for (pos, slot) in assignment.into_iter().enumerate() {
            match slot {
                Some(p) => outcome.placements.push(p),
                None => outcome.unplaced.push(order[pos]),
            }
        }
        outcome
    }
}

fn outcome_cost(outcome: &SolveOutcome) -> f64 {
    outcome.placements.iter().map(|p| p.cost).sum::<f64>()
        + UNPLACED_PENALTY * outcome.unplaced.len() as f64
}

struct Search<'p, 'o> {
    state: PlacementState<'p>,
    order: &'o [usize],
    cancel: &'o AtomicBool,
    max_nodes: u64,
    nodes: u64,
    stopped: bool,
    current: Vec<Option<Placement>>,
    best: Option<Vec<Option<Placement>>>,
    best_cost: f64,
}

impl Search<'_, '_> {
    fn dfs(&mut self, depth: usize, cost: f64) {
        if self.stopped {
            return;
        }
        if self.nodes >= self.max_nodes || self.cancel.load(Ordering::Relaxed) {
            self.stopped = true;
            return;
        }
        self.nodes += 1;

        if depth == self.order.len() {
            if cost < self.best_cost {
                self.best_cost = cost;
                self.best = Some(self.current.clone());
            }
            return;
        }
        if cost >= self.best_cost {
            return;
        }

        let idx = self.order[depth];
        for option in self.state.options(idx) {
            if cost + option.cost >= self.best_cost {
                break;
            }
            self.state.apply(&option);
            let step = option.cost;
            self.current.push(Some(option));
            self.dfs(depth + 1, cost + step);
            if let Some(Some(placed)) = self.current.pop() {
                self.state.revert(&placed);
            }
            if self.stopped {
                return;
            }
        }

        if cost + UNPLACED_PENALTY < self.best_cost {
            self.current.push(None);
            self.dfs(depth + 1, cost + UNPLACED_PENALTY);
            self.current.pop();
        }
    }
}
