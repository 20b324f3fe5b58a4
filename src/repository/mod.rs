// ==========================================
// 课表版本与局部重排引擎 - 数据仓储层
// ==========================================
// 职责: 数据访问,不含业务逻辑
// 红线: 版本表只追加
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod version_repo;

pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use version_repo::{SqliteVersionRepository, VersionRepository};
