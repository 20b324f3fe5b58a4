// ==========================================
// 课表版本与局部重排引擎 - 版本差异引擎
// ==========================================
// 规则:
// - 空课节与缺失课节等价
// - added:    空 -> 有
// - removed:  有 -> 空
// - modified: 两侧都有且不一致
// - topModified 排序: 差异字段数降序 -> 星期 -> 课节序号 -> 班级
// 红线: 同一输入必须得到同一顺序
// ==========================================

use crate::domain::comparison::{
    ChangeType, ComparisonSummary, SlotChange, SnapshotDiff, VersionComparisonResponse,
};
use crate::domain::timetable::{SlotCell, Timetable};
use crate::domain::types::Day;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::version_store::VersionStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// 逐课节对比两个快照
pub fn diff_snapshots(before: &Timetable, after: &Timetable, top_n: usize) -> SnapshotDiff {
    let empty = SlotCell::empty();
    let mut changes = Vec::new();
    let mut summary = ComparisonSummary::default();

    let sections: BTreeSet<&String> = before.sections.keys().chain(after.sections.keys()).collect();

    for section_id in sections {
        let left = before.sections.get(section_id);
        let right = after.sections.get(section_id);

        for day in Day::ALL {
            let l_cells = left.and_then(|w| w.days.get(&day));
            let r_cells = right.and_then(|w| w.days.get(&day));
            let len = l_cells
                .map(|c| c.len())
                .unwrap_or(0)
                .max(r_cells.map(|c| c.len()).unwrap_or(0));

            for slot_index in 0..len {
                let b = l_cells.and_then(|c| c.get(slot_index)).unwrap_or(&empty);
                let a = r_cells.and_then(|c| c.get(slot_index)).unwrap_or(&empty);

                let change_type = match (b.is_empty(), a.is_empty()) {
                    (true, true) => None,
                    (true, false) => Some(ChangeType::Added),
                    (false, true) => Some(ChangeType::Removed),
                    (false, false) if a == b => None,
                    (false, false) => Some(ChangeType::Modified),
                };

                let change_type = match change_type {
                    Some(t) => t,
                    None => {
                        summary.unchanged += 1;
                        continue;
                    }
                };

                match change_type {
                    ChangeType::Added => summary.added += 1,
                    ChangeType::Removed => summary.removed += 1,
                    ChangeType::Modified => summary.modified += 1,
                }

                let changed_fields: Vec<String> = b
                    .differing_fields(a)
                    .into_iter()
                    .map(String::from)
                    .collect();

                changes.push(SlotChange {
                    section_id: section_id.clone(),
                    day,
                    slot_index,
                    change_type,
                    before: (!b.is_empty()).then(|| b.clone()),
                    after: (!a.is_empty()).then(|| a.clone()),
                    significance: changed_fields.len(),
                    changed_fields,
                });
            }
        }
    }

    let top_modified = rank_top_modified(&changes, top_n);

    SnapshotDiff {
        changes,
        summary,
        top_modified,
    }
}

/// 取前 N 个 modified 课节
fn rank_top_modified(changes: &[SlotChange], top_n: usize) -> Vec<SlotChange> {
    let mut modified: Vec<&SlotChange> = changes
        .iter()
        .filter(|c| c.change_type == ChangeType::Modified)
        .collect();

    modified.sort_by(|x, y| {
        y.significance
            .cmp(&x.significance)
            .then(x.day.cmp(&y.day))
            .then(x.slot_index.cmp(&y.slot_index))
            .then(x.section_id.cmp(&y.section_id))
    });

    modified.into_iter().take(top_n).cloned().collect()
}

// ==========================================
// DiffEngine - 版本对比
// ==========================================
pub struct DiffEngine {
    store: Arc<VersionStore>,
}

impl DiffEngine {
    pub fn new(store: Arc<VersionStore>) -> Self {
        Self { store }
    }

    /// 对比同一课表的两个版本
    ///
    /// # 错误
    /// - VersionNotFound: 任一版本不存在 (含课表ID不存在)
    pub fn compare(
        &self,
        timetable_id: &str,
        version1: i32,
        version2: i32,
        top_n: usize,
    ) -> EngineResult<VersionComparisonResponse> {
        let left = self.store.get(timetable_id, version1)?;
        let right = self.store.get(timetable_id, version2)?;

        let diff = diff_snapshots(&left.timetable, &right.timetable, top_n);
        debug!(
            timetable_id = %timetable_id,
            version1,
            version2,
            added = diff.summary.added,
            removed = diff.summary.removed,
            modified = diff.summary.modified,
            "版本对比完成"
        );

        Ok(VersionComparisonResponse {
            timetable_id: timetable_id.to_string(),
            version1,
            version2,
            changes: diff.changes,
            summary: diff.summary,
            top_modified: diff.top_modified,
        })
    }

    /// 按版本ID对比
    ///
    /// # 错误
    /// - CrossTimetableComparison: 两个版本不属于同一课表
    pub fn compare_by_version_id(
        &self,
        version_id1: &str,
        version_id2: &str,
        top_n: usize,
    ) -> EngineResult<VersionComparisonResponse> {
        let left = self.store.get_by_version_id(version_id1)?;
        let right = self.store.get_by_version_id(version_id2)?;

        if left.timetable_id != right.timetable_id {
            return Err(EngineError::CrossTimetableComparison {
                left: left.timetable_id,
                right: right.timetable_id,
            });
        }

        self.compare(&left.timetable_id, left.version, right.version, top_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timetable::WeekSchedule;

    fn base() -> Timetable {
        let mut week = WeekSchedule::new(4);
        week.set(Day::Mon, 0, SlotCell::theory("MATH", "T1", "R1"));
        week.set(Day::Mon, 1, SlotCell::theory("PHY", "T2", "R1"));
        week.set(Day::Tue, 0, SlotCell::theory("CHEM", "T3", "R2"));
        week.set(Day::Wed, 3, SlotCell::break_cell());
        Timetable::single("S1", week)
    }

    #[test]
    fn test_identical_snapshots() {
        let d = diff_snapshots(&base(), &base(), 5);
        assert!(d.changes.is_empty());
        assert_eq!(d.summary.unchanged, 20);
    }

    #[test]
    fn test_classification_and_symmetry() {
        let before = base();
        let mut after = base();
        let mut week = after.sections["S1"].clone();
        week.set(Day::Mon, 0, SlotCell::theory("MATH", "T9", "R1"));   // modified (1)
        week.set(Day::Mon, 1, SlotCell::empty());                      // removed
        week.set(Day::Thu, 2, SlotCell::theory("BIO", "T4", "R3"));    // added
        week.set(Day::Tue, 0, SlotCell::theory("ART", "T5", "R5"));    // modified (3)
        after.sections.insert("S1".to_string(), week);

        let fwd = diff_snapshots(&before, &after, 5);
        assert_eq!(fwd.summary.added, 1);
        assert_eq!(fwd.summary.removed, 1);
        assert_eq!(fwd.summary.modified, 2);
        assert_eq!(fwd.summary.unchanged, 16);

        let back = diff_snapshots(&after, &before, 5);
        assert_eq!(back.summary.added, fwd.summary.removed);
        assert_eq!(back.summary.removed, fwd.summary.added);
        assert_eq!(back.summary.modified, fwd.summary.modified);

        // 差异字段多的排前
        assert_eq!(fwd.top_modified[0].day, Day::Tue);
        assert_eq!(fwd.top_modified[0].significance, 3);
        assert_eq!(fwd.top_modified[1].changed_fields, vec!["teacherId".to_string()]);

        // 变更列表按 (班级, 星期, 序号) 排序
        let order: Vec<(Day, usize)> = fwd.changes.iter().map(|c| (c.day, c.slot_index)).collect();
        assert_eq!(order, vec![(Day::Mon, 0), (Day::Mon, 1), (Day::Tue, 0), (Day::Thu, 2)]);
    }

    #[test]
    fn test_absent_equals_empty() {
        let before = base();
        let mut after = base();
        // 缺少一个空班级 vs 存在全空班级
        after.sections.insert("S2".to_string(), WeekSchedule::new(4));
        let d = diff_snapshots(&before, &after, 5);
        assert!(d.changes.is_empty());
        assert_eq!(d.summary.unchanged, 40);
    }

    #[test]
    fn test_top_n_tie_break() {
        let before = base();
        let mut after = base();
        let mut week = after.sections["S1"].clone();
        week.set(Day::Tue, 0, SlotCell::theory("CHEM", "T9", "R2"));
        week.set(Day::Mon, 1, SlotCell::theory("PHY", "T9", "R1"));
        week.set(Day::Mon, 0, SlotCell::theory("MATH", "T9", "R1"));
        after.sections.insert("S1".to_string(), week);

        let d = diff_snapshots(&before, &after, 2);
        let top: Vec<(Day, usize)> = d.top_modified.iter().map(|c| (c.day, c.slot_index)).collect();
        assert_eq!(top, vec![(Day::Mon, 0), (Day::Mon, 1)]);
        assert_eq!(diff_snapshots(&before, &after, 2), d);
    }
}
