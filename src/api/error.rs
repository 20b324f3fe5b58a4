// ==========================================
// 课表版本与局部重排引擎 - API层错误类型
// ==========================================
// 职责: 统一 Engine/Repository 错误为对外错误, 每个变体有稳定错误码
// 红线: 错误信息必须包含显式原因
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 契约错误 (与前端约定的错误分类)
    // ==========================================
    #[error("版本不存在: {0}")]
    VersionNotFound(String),

    #[error("课表ID无效: {0}")]
    InvalidTimetableId(String),

    #[error("重排范围无效: {0}")]
    InvalidScope(String),

    #[error("求解器不可用: {0}")]
    SolverUnavailable(String),

    #[error("求解超时: solver={solver_type}, timeout_ms={timeout_ms}")]
    SolverTimeout { solver_type: String, timeout_ms: u64 },

    #[error("不能跨课表对比版本: {0}")]
    CrossTimetableComparison(String),

    // ==========================================
    // 输入与数据访问错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码 (供客户端分支处理)
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::VersionNotFound(_) => "VERSION_NOT_FOUND",
            ApiError::InvalidTimetableId(_) => "INVALID_TIMETABLE_ID",
            ApiError::InvalidScope(_) => "INVALID_SCOPE",
            ApiError::SolverUnavailable(_) => "SOLVER_UNAVAILABLE",
            ApiError::SolverTimeout { .. } => "SOLVER_TIMEOUT",
            ApiError::CrossTimetableComparison(_) => "CROSS_TIMETABLE_COMPARISON",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::ValidationError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::CorruptRow { column, detail } => {
                ApiError::DatabaseError(format!("存储数据损坏: 第{}列 {}", column, detail))
            }
            RepositoryError::SerializationError(msg) | RepositoryError::ValidationError(msg) => {
                ApiError::ValidationError(msg)
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::VersionNotFound {
                timetable_id,
                version,
            } => ApiError::VersionNotFound(format!(
                "timetable_id={}, version={}",
                timetable_id, version
            )),
            EngineError::InvalidTimetableId(msg) => ApiError::InvalidTimetableId(msg),
            EngineError::InvalidScope(msg) => ApiError::InvalidScope(msg),
            EngineError::SolverUnavailable(msg) => ApiError::SolverUnavailable(msg),
            EngineError::SolverTimeout {
                solver_type,
                timeout_ms,
            } => ApiError::SolverTimeout {
                solver_type,
                timeout_ms,
            },
            EngineError::CrossTimetableComparison { left, right } => {
                ApiError::CrossTimetableComparison(format!("{} vs {}", left, right))
            }
            EngineError::Repository(e) => ApiError::from(e),
            EngineError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
