// ==========================================
// 课表版本与局部重排引擎 - 操作日志领域模型
// ==========================================
// 红线: 每次版本提交必须记录
// 用途: 审计追踪
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,              // 日志ID
    pub timetable_id: String,           // 关联课表
    pub version: Option<i32>,           // 产出的版本号
    pub action_type: String,            // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,       // 操作时间戳
    pub actor: String,                  // 操作人
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,         // 详细描述
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    RegisterInitial, // 登记初始版本
    Regenerate,      // 局部重排
    Restore,         // 版本回滚
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::RegisterInitial => "REGISTER_INITIAL",
            ActionType::Regenerate => "REGENERATE",
            ActionType::Restore => "RESTORE",
        }
    }
}
