// ==========================================
// 课节占用扫描
// ==========================================
// 将实验课跨节展开为逐节占用,并识别断裂的跨节
// 冲突检测、评分、求解器共用
// ==========================================

use crate::domain::timetable::{SlotCell, SlotRef, Timetable};

/// 一个被教学课占用的课节
#[derive(Debug, Clone)]
pub struct OccupiedCell<'a> {
    pub slot: SlotRef,
    /// 携带属性的首节坐标 (理论课为自身)
    pub head: SlotRef,
    pub lesson: &'a SlotCell,
}

#[derive(Debug, Default)]
pub struct OccupancyScan<'a> {
    pub occupied: Vec<OccupiedCell<'a>>,
    /// 断裂跨节涉及的课节 (首节越界/后续节缺失/孤立后续节)
    pub broken: Vec<SlotRef>,
}

pub fn scan(timetable: &Timetable) -> OccupancyScan<'_> {
    let mut result = OccupancyScan::default();

    for (section_id, week) in &timetable.sections {
        for (day, cells) in &week.days {
            let mut i = 0;
            while i < cells.len() {
                let cell = &cells[i];
                let here = SlotRef::new(section_id, *day, i);

                if cell.is_lab_head() {
                    let span = cell.effective_span();
                    let mut covered = 1;
                    result.occupied.push(OccupiedCell {
                        slot: here.clone(),
                        head: here.clone(),
                        lesson: cell,
                    });
                    while covered < span {
                        let j = i + covered;
                        if j >= cells.len() || !cells[j].is_continuation() {
                            break;
                        }
                        result.occupied.push(OccupiedCell {
                            slot: SlotRef::new(section_id, *day, j),
                            head: here.clone(),
                            lesson: cell,
                        });
                        covered += 1;
                    }
                    if covered < span {
                        result.broken.push(here);
                    }
                    i += covered;
                    continue;
                }

                if cell.is_continuation() {
                    // 没有被前面的首节覆盖
                    result.broken.push(here.clone());
                    result.occupied.push(OccupiedCell {
                        slot: here.clone(),
                        head: here,
                        lesson: cell,
                    });
                } else if cell.kind.is_lesson() {
                    result.occupied.push(OccupiedCell {
                        slot: here.clone(),
                        head: here,
                        lesson: cell,
                    });
                }
                i += 1;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::timetable::WeekSchedule;
    use crate::domain::types::Day;

    #[test]
    fn test_scan_expands_lab_and_flags_broken() {
        let mut week = WeekSchedule::new(5);
        week.set(Day::Mon, 0, SlotCell::theory("MATH", "T1", "R1"));
        week.set(Day::Mon, 1, SlotCell::lab_head("PHY", "T2", "LAB", 2));
        week.set(Day::Mon, 2, SlotCell::lab_continuation());
        // 越界的实验课
        week.set(Day::Mon, 4, SlotCell::lab_head("CHEM", "T3", "LAB", 2));
        // 孤立后续节
        week.set(Day::Tue, 0, SlotCell::lab_continuation());
        let tt = Timetable::single("S1", week);

        let scan = scan(&tt);
        assert_eq!(scan.occupied.len(), 5);
        let mon2 = scan
            .occupied
            .iter()
            .find(|o| o.slot == SlotRef::new("S1", Day::Mon, 2))
            .unwrap();
        assert_eq!(mon2.head, SlotRef::new("S1", Day::Mon, 1));
        assert_eq!(mon2.lesson.teacher_id.as_deref(), Some("T2"));
        assert_eq!(
            scan.broken,
            vec![SlotRef::new("S1", Day::Mon, 4), SlotRef::new("S1", Day::Tue, 0)]
        );
    }
}
