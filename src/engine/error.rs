// ==========================================
// 课表版本与局部重排引擎 - 引擎层错误类型
// ==========================================
// 红线: 校验类错误必须在求解前返回
// 说明: 冲突 (Conflict) 不是错误,随成功响应返回
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("版本不存在: timetable_id={timetable_id}, version={version}")]
    VersionNotFound { timetable_id: String, version: String },

    #[error("课表ID无效: {0}")]
    InvalidTimetableId(String),

    #[error("重排范围无效: {0}")]
    InvalidScope(String),

    #[error("求解器不可用: {0}")]
    SolverUnavailable(String),

    #[error("求解超时: solver={solver_type}, timeout_ms={timeout_ms}")]
    SolverTimeout { solver_type: String, timeout_ms: u64 },

    #[error("不能跨课表对比版本: {left} vs {right}")]
    CrossTimetableComparison { left: String, right: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn version_not_found(timetable_id: &str, version: impl ToString) -> Self {
        EngineError::VersionNotFound {
            timetable_id: timetable_id.to_string(),
            version: version.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
