// ==========================================
// 课表版本与局部重排引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、请求/响应契约
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod comparison;
pub mod context;
pub mod regeneration;
pub mod timetable;
pub mod types;
pub mod version;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use comparison::{
    ChangeType, ComparisonSummary, SlotChange, SnapshotDiff, SnapshotMetadata, SnapshotResponse,
    VersionComparisonResponse, VersionsResponse,
};
pub use context::{ResourceCatalog, RoomProfile, SchedulingContext, SectionProfile, TeacherProfile};
pub use regeneration::{
    ChangedSlot, CommittedVersionRef, Conflict, ConflictKind, RegenerationRequest,
    RegenerationResponse, SolverMetadata,
};
pub use timetable::{SlotCell, SlotRef, SlotTime, Timetable, WeekSchedule};
pub use types::{Day, RegenerationScope, SlotKind, VersionSource};
pub use version::{NewVersion, RestorationMetadata, TimetableRecord, TimetableVersion};
