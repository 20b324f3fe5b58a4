// ==========================================
// 课表版本与局部重排引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::TimetableApi;
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{
    DiffEngine, RegenerationOrchestrator, SolverRegistry, VersionEventPublisher, VersionStore,
};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::version_repo::SqliteVersionRepository;

/// 应用状态
///
/// 包含所有API实例和共享资源 (单个 SQLite 连接共享)
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 课表API
    pub timetable_api: Arc<TimetableApi>,

    /// 版本存储
    pub store: Arc<VersionStore>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例 (内置求解器, 无事件发布者)
    pub fn new(db_path: String) -> Result<Self, String> {
        Self::with_solvers(db_path, SolverRegistry::with_defaults(), None)
    }

    /// 使用指定求解器注册表创建
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并建表
    /// 2. 从 config_kv 加载引擎配置
    /// 3. 初始化 Repository / Engine / API
    pub fn with_solvers(
        db_path: String,
        solvers: SolverRegistry,
        event_publisher: Option<Arc<dyn VersionEventPublisher>>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("无法初始化数据库结构: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config = config_manager
            .load_engine_config()
            .map_err(|e| format!("无法加载引擎配置: {}", e))?;
        tracing::debug!(?config, "引擎配置已加载");

        // ==========================================
        // Repository / Engine
        // ==========================================
        let version_repo = Arc::new(SqliteVersionRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let store = Arc::new(VersionStore::new(version_repo));

        let mut orchestrator = RegenerationOrchestrator::new(
            store.clone(),
            action_log_repo.clone(),
            Arc::new(solvers),
            config.clone(),
        );
        if let Some(publisher) = event_publisher {
            orchestrator = orchestrator.with_event_publisher(publisher);
        }
        tracing::info!(solvers = ?orchestrator.solver_ids(), "求解器已注册");

        let diff_engine = Arc::new(DiffEngine::new(store.clone()));

        // ==========================================
        // API
        // ==========================================
        let timetable_api = Arc::new(TimetableApi::new(
            store.clone(),
            Arc::new(orchestrator),
            diff_engine,
            action_log_repo.clone(),
            config,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            timetable_api,
            store,
            config_manager,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 TIMETABLE_REGEN_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("TIMETABLE_REGEN_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./timetable_regen.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("timetable-regen");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("timetable_regen.db");
        }
    }

    path.to_string_lossy().to_string()
}
