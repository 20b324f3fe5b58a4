// ==========================================
// 课表版本与局部重排引擎 - 评分子系统
// ==========================================
// score:       优化得分 (软约束质量) [0, 100]
// healthScore: 结构健康度 (填充率 + 无结构缺陷比例) [0, 100]
// 红线: 纯函数,同一输入同一输出
// ==========================================

use crate::config::engine_config::ScoringWeights;
use crate::domain::timetable::{SlotRef, Timetable};
use crate::domain::types::Day;
use crate::engine::occupancy;
use std::collections::{BTreeMap, BTreeSet};

const FILL_WEIGHT: f64 = 0.3;
const CLEAN_WEIGHT: f64 = 0.7;

/// 扣分明细
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PenaltyBreakdown {
    pub gaps: usize,
    pub repeats: usize,
    pub imbalance: f64,
    pub overload: usize,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    weights: ScoringWeights,
    default_max_periods_per_day: usize,
    /// 登记的教师日上限, 与冲突检测一致
    teacher_max_per_day: BTreeMap<String, usize>,
}

impl Scorer {
    pub fn new(weights: ScoringWeights, default_max_periods_per_day: usize) -> Self {
        Self {
            weights,
            default_max_periods_per_day,
            teacher_max_per_day: BTreeMap::new(),
        }
    }

    pub fn with_teacher_limits(mut self, limits: BTreeMap<String, usize>) -> Self {
        self.teacher_max_per_day = limits;
        self
    }

    fn max_per_day(&self, teacher_id: &str) -> usize {
        self.teacher_max_per_day
            .get(teacher_id)
            .copied()
            .unwrap_or(self.default_max_periods_per_day)
    }

    /// 统计软约束扣分项
    pub fn penalties(&self, timetable: &Timetable) -> PenaltyBreakdown {
        let mut breakdown = PenaltyBreakdown::default();

        for week in timetable.sections.values() {
            let mut day_loads = Vec::with_capacity(Day::ALL.len());

            for day in Day::ALL {
                let cells = match week.days.get(&day) {
                    Some(c) => c,
                    None => {
                        day_loads.push(0usize);
                        continue;
                    }
                };

                // 空档: 首末教学课之间的空课节 (课间不计)
                let lesson_idx: Vec<usize> = cells
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.kind.is_lesson())
                    .map(|(i, _)| i)
                    .collect();
                if let (Some(first), Some(last)) = (lesson_idx.first(), lesson_idx.last()) {
                    breakdown.gaps += cells[*first..=*last]
                        .iter()
                        .filter(|c| c.is_empty())
                        .count();
                }
                day_loads.push(lesson_idx.len());

                // 同日同科目重复
                let mut per_subject: BTreeMap<&str, usize> = BTreeMap::new();
                for cell in cells.iter().filter(|c| c.is_lesson_head()) {
                    if let Some(subject) = cell.subject_code.as_deref() {
                        *per_subject.entry(subject).or_default() += 1;
                    }
                }
                breakdown.repeats += per_subject.values().map(|n| n.saturating_sub(1)).sum::<usize>();
            }

            let mean = day_loads.iter().sum::<usize>() as f64 / day_loads.len().max(1) as f64;
            breakdown.imbalance += day_loads
                .iter()
                .map(|&n| (n as f64 - mean).abs())
                .sum::<f64>();
        }

        // 教师日课时超限
        let scan = occupancy::scan(timetable);
        let mut teacher_day: BTreeMap<(&str, Day), usize> = BTreeMap::new();
        for occ in &scan.occupied {
            if let Some(t) = occ.lesson.teacher_id.as_deref() {
                *teacher_day.entry((t, occ.slot.day)).or_default() += 1;
            }
        }
        breakdown.overload = teacher_day
            .iter()
            .map(|((t, _), &n)| n.saturating_sub(self.max_per_day(t)))
            .sum();

        breakdown
    }

    /// 优化得分
    pub fn score(&self, timetable: &Timetable) -> f64 {
        let p = self.penalties(timetable);
        let w = &self.weights;
        let penalty = w.gap * p.gaps as f64
            + w.repeat * p.repeats as f64
            + w.imbalance * p.imbalance
            + w.overload * p.overload as f64;
        round2((100.0 - penalty).clamp(0.0, 100.0))
    }

    /// 结构健康度
    ///
    /// 30% 非课间课节填充率 + 70% 已占课节中无结构缺陷的比例
    pub fn health_score(&self, timetable: &Timetable) -> f64 {
        let non_break = timetable
            .cells()
            .filter(|(_, c)| !c.is_break())
            .count();
        let scan = occupancy::scan(timetable);
        let occupied = scan.occupied.len();

        let fill = if non_break == 0 {
            0.0
        } else {
            occupied as f64 / non_break as f64
        };

        let mut defective: BTreeSet<SlotRef> = BTreeSet::new();

        // 快照内教师/教室重复占用
        let mut teacher_at: BTreeMap<(&str, Day, usize), Vec<&SlotRef>> = BTreeMap::new();
        let mut room_at: BTreeMap<(&str, Day, usize), Vec<&SlotRef>> = BTreeMap::new();
        for occ in &scan.occupied {
            if let Some(t) = occ.lesson.teacher_id.as_deref() {
                teacher_at
                    .entry((t, occ.slot.day, occ.slot.slot_index))
                    .or_default()
                    .push(&occ.slot);
            }
            if let Some(r) = occ.lesson.room_id.as_deref() {
                room_at
                    .entry((r, occ.slot.day, occ.slot.slot_index))
                    .or_default()
                    .push(&occ.slot);
            }
            if occ.lesson.is_lesson_head()
                && (occ.lesson.subject_code.is_none() || occ.lesson.teacher_id.is_none())
            {
                defective.insert(occ.slot.clone());
            }
        }
        for slots in teacher_at.values().chain(room_at.values()) {
            if slots.len() > 1 {
                defective.extend(slots.iter().map(|s| (*s).clone()));
            }
        }

        // 断裂跨节: 首节及其已覆盖部分都计为缺陷
        let broken: BTreeSet<&SlotRef> = scan.broken.iter().collect();
        for occ in &scan.occupied {
            if broken.contains(&occ.head) {
                defective.insert(occ.slot.clone());
            }
        }

        let clean = if occupied == 0 {
            1.0
        } else {
            (occupied - defective.len().min(occupied)) as f64 / occupied as f64
        };

        round2(100.0 * (FILL_WEIGHT * fill + CLEAN_WEIGHT * clean))
    }
}

impl Default for Scorer {
    fn default() -> Self {
        let cfg = crate::config::EngineConfig::default();
        Self::new(cfg.weights, cfg.default_max_periods_per_day)
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timetable::{SlotCell, WeekSchedule};

    fn full_week() -> WeekSchedule {
        let subjects = ["MATH", "PHY", "CHEM", "BIO"];
        let mut week = WeekSchedule::new(4);
        for day in Day::ALL {
            for (i, s) in subjects.iter().enumerate() {
                week.set(day, i, SlotCell::theory(s, &format!("T-{}", s), "R1"));
            }
        }
        week
    }

    #[test]
    fn test_perfect_timetable() {
        let scorer = Scorer::default();
        let tt = Timetable::single("S1", full_week());
        // 同一教室在同一节课只出现一次 (单班级)
        assert_eq!(scorer.score(&tt), 100.0);
        assert_eq!(scorer.health_score(&tt), 100.0);
    }

    #[test]
    fn test_penalties_counted() {
        let mut week = full_week();
        week.set(Day::Mon, 1, SlotCell::empty());              // 空档
        week.set(Day::Tue, 3, SlotCell::theory("MATH", "T-MATH", "R1")); // 重复
        let tt = Timetable::single("S1", week);

        let scorer = Scorer::default();
        let p = scorer.penalties(&tt);
        assert_eq!(p.gaps, 1);
        assert_eq!(p.repeats, 1);
        // Mon 3 节, 其余 4 节, 平均 3.8
        assert!((p.imbalance - 1.6).abs() < 1e-9);
        assert_eq!(p.overload, 0);

        // 100 - 2*1 - 3*1 - 1*1.6
        assert_eq!(scorer.score(&tt), 93.4);
    }

    #[test]
    fn test_health_counts_defects() {
        let mut week = WeekSchedule::new(2);
        week.set(Day::Mon, 0, SlotCell::theory("MATH", "T1", "R1"));
        week.set(Day::Mon, 1, SlotCell::lab_head("PHY", "T2", "LAB", 3));
        let mut other = WeekSchedule::new(2);
        other.set(Day::Mon, 0, SlotCell::theory("MATH", "T1", "R2"));

        let mut tt = Timetable::single("S1", week);
        tt.sections.insert("S2".to_string(), other);

        // 非课间 20, 占用 3 -> fill 0.15; 缺陷 3 (T1 重复 x2 + 断裂实验) -> clean 0
        let h = Scorer::default().health_score(&tt);
        assert_eq!(h, round2(100.0 * (0.3 * 0.15)));
    }

    #[test]
    fn test_overload_uses_teacher_limit() {
        let mut week = WeekSchedule::new(4);
        for i in 0..4 {
            week.set(Day::Mon, i, SlotCell::theory(&format!("S{}", i), "T1", "R1"));
        }
        let tt = Timetable::single("S1", week);

        assert_eq!(Scorer::default().penalties(&tt).overload, 0);

        let limits: BTreeMap<String, usize> = [("T1".to_string(), 2)].into_iter().collect();
        let scorer = Scorer::default().with_teacher_limits(limits);
        assert_eq!(scorer.penalties(&tt).overload, 2);
    }

    #[test]
    fn test_empty_timetable_scores() {
        let tt = Timetable::single("S1", WeekSchedule::new(3));
        let scorer = Scorer::default();
        assert_eq!(scorer.score(&tt), 100.0);
        assert_eq!(scorer.health_score(&tt), 70.0);
    }
}
