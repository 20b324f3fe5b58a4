// ==========================================
// 课表版本与局部重排引擎 - API 层
// ==========================================
// 职责: 提供对外业务接口, 供 CLI 或上层服务调用
// ==========================================

pub mod error;
pub mod timetable_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use timetable_api::{RegisterInitialRequest, TimetableApi};
