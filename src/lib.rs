// ==========================================
// 课表版本与局部重排引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite + Tokio
// 系统定位: 已登记课表的版本管理与局部重排 (不做全量排课)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 版本存储 / 范围解析 / 求解 / 对比
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    ActionLog, ActionType, Conflict, ConflictKind, Day, RegenerationRequest,
    RegenerationResponse, RegenerationScope, SchedulingContext, SlotCell, SlotKind, SlotRef,
    Timetable, TimetableVersion, WeekSchedule,
};

pub use engine::{
    DiffEngine, EngineError, RegenerationOrchestrator, Scorer, SolverRegistry, TimetableSolver,
    VersionStore,
};

pub use api::{ApiError, TimetableApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "课表版本与局部重排引擎";
