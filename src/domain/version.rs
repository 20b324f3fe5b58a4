// ==========================================
// 课表版本与局部重排引擎 - 课表版本领域模型
// ==========================================
// 红线: 版本提交后不可修改; 回滚 = 新建版本并记录来源
// 红线: 同一 timetable_id 的版本号从 1 开始连续递增,无空洞
// ==========================================

use crate::domain::context::SchedulingContext;
use crate::domain::timetable::Timetable;
use crate::domain::types::VersionSource;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// TimetableRecord - 课表登记信息
// ==========================================
// 一个 timetable_id 对应一个班级的课表版本序列
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableRecord {
    pub timetable_id: String,          // 课表ID
    pub section_id: String,            // 班级ID
    pub context: SchedulingContext,    // 登记上下文
    pub created_at: NaiveDateTime,     // 登记时间
}

// ==========================================
// RestorationMetadata - 回滚来源
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorationMetadata {
    pub restored_from: i32,            // 来源版本号
    pub restored_at: NaiveDateTime,    // 回滚时间
}

// ==========================================
// TimetableVersion - 课表版本 (不可变快照)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableVersion {
    pub version_id: String,                                  // 版本ID (uuid)
    pub timetable_id: String,                                // 所属课表
    pub version: i32,                                        // 版本号 (>=1)
    pub timetable: Timetable,                                // 快照
    pub score: f64,                                          // 优化得分
    pub health_score: f64,                                   // 结构健康度
    pub notes: Option<String>,                               // 备注
    pub source: VersionSource,                               // 来源
    pub generated_at: NaiveDateTime,                         // 生成时间
    pub restoration_metadata: Option<RestorationMetadata>,   // 回滚来源
}

// ==========================================
// NewVersion - 待提交版本 (版本号由仓储层分配)
// ==========================================
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub timetable_id: String,
    pub timetable: Timetable,
    pub score: f64,
    pub health_score: f64,
    pub notes: Option<String>,
    pub source: VersionSource,
    pub restoration_metadata: Option<RestorationMetadata>,
}
