// ==========================================
// 课表版本与局部重排引擎 - 领域类型定义
// ==========================================
// 职责: 星期 / 课节类型 / 重排范围 等基础枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 星期 (Day)
// ==========================================
// 顺序: Mon < Tue < Wed < Thu < Fri (用于对比排序的 tie-break)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

impl Day {
    /// 一周全部上课日 (固定顺序)
    pub const ALL: [Day; 5] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri];

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Mon => "Mon",
            Day::Tue => "Tue",
            Day::Wed => "Wed",
            Day::Thu => "Thu",
            Day::Fri => "Fri",
        }
    }

    /// 在一周中的序号 (0..5)
    pub fn ordinal(&self) -> usize {
        match self {
            Day::Mon => 0,
            Day::Tue => 1,
            Day::Wed => 2,
            Day::Thu => 3,
            Day::Fri => 4,
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Day {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mon" | "monday" => Ok(Day::Mon),
            "tue" | "tues" | "tuesday" => Ok(Day::Tue),
            "wed" | "wednesday" => Ok(Day::Wed),
            "thu" | "thur" | "thurs" | "thursday" => Ok(Day::Thu),
            "fri" | "friday" => Ok(Day::Fri),
            other => Err(format!("未知星期: {}", other)),
        }
    }
}

// ==========================================
// 课节类型 (Slot Kind)
// ==========================================
// 序列化格式: theory / lab / break / empty (与前端契约一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Theory,
    Lab,
    Break,
    #[default]
    Empty,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Theory => "theory",
            SlotKind::Lab => "lab",
            SlotKind::Break => "break",
            SlotKind::Empty => "empty",
        }
    }

    /// 是否为教学课节 (需要科目/教师/教室)
    pub fn is_lesson(&self) -> bool {
        matches!(self, SlotKind::Theory | SlotKind::Lab)
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 重排范围 (Regeneration Scope)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenerationScope {
    Teacher,
    Section,
    Day,
    Slot,
}

impl RegenerationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegenerationScope::Teacher => "teacher",
            RegenerationScope::Section => "section",
            RegenerationScope::Day => "day",
            RegenerationScope::Slot => "slot",
        }
    }

    /// 该范围是否要求 day 参数
    pub fn requires_day(&self) -> bool {
        matches!(self, RegenerationScope::Day | RegenerationScope::Slot)
    }

    /// 该范围是否要求 slotIndex 参数
    pub fn requires_slot_index(&self) -> bool {
        matches!(self, RegenerationScope::Slot)
    }
}

impl fmt::Display for RegenerationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RegenerationScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "teacher" => Ok(RegenerationScope::Teacher),
            "section" => Ok(RegenerationScope::Section),
            "day" => Ok(RegenerationScope::Day),
            "slot" => Ok(RegenerationScope::Slot),
            other => Err(format!("未知重排范围: {}", other)),
        }
    }
}

// ==========================================
// 版本来源 (Version Source)
// ==========================================
// 存储格式: INITIAL / REGENERATION / RESTORE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VersionSource {
    /// 外部全量求解器产出的初始版本 (version 1)
    Initial,
    /// 局部重排产出
    #[serde(rename_all = "camelCase")]
    Regeneration {
        scope: RegenerationScope,
        solver_type: String,
    },
    /// 回滚产出 (快照复制自旧版本)
    Restore,
}

impl VersionSource {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            VersionSource::Initial => "INITIAL",
            VersionSource::Regeneration { .. } => "REGENERATION",
            VersionSource::Restore => "RESTORE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_parse_and_order() {
        assert_eq!("monday".parse::<Day>().unwrap(), Day::Mon);
        assert_eq!(" THU ".parse::<Day>().unwrap(), Day::Thu);
        assert!("sat".parse::<Day>().is_err());
        assert!(Day::Mon < Day::Fri);
        assert_eq!(Day::Wed.ordinal(), 2);
    }

    #[test]
    fn test_slot_kind_serde() {
        assert_eq!(serde_json::to_string(&SlotKind::Theory).unwrap(), "\"theory\"");
        let k: SlotKind = serde_json::from_str("\"break\"").unwrap();
        assert_eq!(k, SlotKind::Break);
    }

    #[test]
    fn test_scope_requirements() {
        assert!(RegenerationScope::Slot.requires_day());
        assert!(RegenerationScope::Slot.requires_slot_index());
        assert!(RegenerationScope::Day.requires_day());
        assert!(!RegenerationScope::Day.requires_slot_index());
        assert!(!RegenerationScope::Teacher.requires_day());
    }
}
