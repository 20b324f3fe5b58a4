// ==========================================
// 课表版本与局部重排引擎 - 引擎层
// ==========================================
// 职责: 版本存储、范围解析、求解、冲突检测、评分、对比
// 红线: Engine 不拼 SQL, 冲突必须输出 reason
// ==========================================

pub mod conflict;
pub mod diff;
pub mod error;
pub mod events;
pub mod occupancy;
pub mod orchestrator;
pub mod regeneration_job;
pub mod scope;
pub mod scoring;
pub mod solver;
pub mod version_store;
pub mod world;

// 重导出核心引擎
pub use conflict::ConflictDetector;
pub use diff::{diff_snapshots, DiffEngine};
pub use error::{EngineError, EngineResult};
pub use events::{
    NoOpEventPublisher, OptionalEventPublisher, VersionEvent, VersionEventPublisher,
    VersionEventType,
};
pub use orchestrator::RegenerationOrchestrator;
pub use scope::{ResolvedScope, ScopeResolver};
pub use scoring::{PenaltyBreakdown, Scorer};
pub use solver::{SolverRegistry, TimetableSolver};
pub use version_store::{TimetableLocks, VersionStore};
pub use world::World;
