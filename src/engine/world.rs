// ==========================================
// 全局视图: 全部已登记课表的最新版本
// ==========================================
// 用于范围解析 (教师范围跨班级)、固定占用、冲突检测
// ==========================================

use crate::domain::context::ResourceCatalog;
use crate::domain::timetable::{Timetable, WeekSchedule};
use crate::domain::version::{TimetableRecord, TimetableVersion};
use crate::engine::error::EngineResult;
use crate::engine::version_store::VersionStore;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct WorldEntry {
    pub record: TimetableRecord,
    pub latest: TimetableVersion,
}

#[derive(Debug, Clone, Default)]
pub struct World {
    /// timetable_id -> 登记信息 + 最新版本
    pub entries: BTreeMap<String, WorldEntry>,
}

impl World {
    pub fn load(store: &VersionStore) -> EngineResult<Self> {
        let mut entries = BTreeMap::new();
        for record in store.list_timetables()? {
            let latest = store.latest(&record.timetable_id)?;
            entries.insert(record.timetable_id.clone(), WorldEntry { record, latest });
        }
        Ok(Self { entries })
    }

    /// 合并全部班级课表
    pub fn merged(&self) -> Timetable {
        let mut merged = Timetable::new();
        for entry in self.entries.values() {
            for (section_id, week) in &entry.latest.timetable.sections {
                merged.sections.insert(section_id.clone(), week.clone());
            }
        }
        merged
    }

    pub fn catalog(&self) -> ResourceCatalog {
        ResourceCatalog::build(
            self.entries.values().map(|e| &e.record.context),
            self.entries.values().map(|e| &e.latest.timetable),
        )
    }

    /// 班级所属课表 (快照中包含该班级)
    pub fn entry_for_section(&self, section_id: &str) -> Option<&WorldEntry> {
        self.entries
            .values()
            .find(|e| e.record.section_id == section_id)
            .or_else(|| {
                self.entries
                    .values()
                    .find(|e| e.latest.timetable.sections.contains_key(section_id))
            })
    }

    pub fn week_of(&self, section_id: &str) -> Option<&WeekSchedule> {
        self.entry_for_section(section_id)
            .and_then(|e| e.latest.timetable.section(section_id))
    }
}
