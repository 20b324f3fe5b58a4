// ==========================================
// 课表版本与局部重排引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::engine_config::{EngineConfig, ScoringWeights};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置值; 缺失或格式错误时返回默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: FromStr + Copy + std::fmt::Display,
    {
        let raw = match self.get_global_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 写入操作日志,便于复现某次重排时的参数
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    // ===== 求解配置 =====

    pub fn get_solver_timeout_ms(&self) -> Result<u64, Box<dyn Error>> {
        let d = EngineConfig::default().solver_timeout_ms;
        self.get_parsed_or_default(config_keys::SOLVER_TIMEOUT_MS, d)
    }

    pub fn get_exhaustive_max_nodes(&self) -> Result<u64, Box<dyn Error>> {
        let d = EngineConfig::default().exhaustive_max_nodes;
        self.get_parsed_or_default(config_keys::EXHAUSTIVE_MAX_NODES, d)
    }

    pub fn get_default_top_n(&self) -> Result<usize, Box<dyn Error>> {
        let d = EngineConfig::default().default_top_n;
        self.get_parsed_or_default(config_keys::DEFAULT_TOP_N, d)
    }

    pub fn get_default_max_periods_per_day(&self) -> Result<usize, Box<dyn Error>> {
        let d = EngineConfig::default().default_max_periods_per_day;
        self.get_parsed_or_default(config_keys::DEFAULT_MAX_PERIODS_PER_DAY, d)
    }

    // ===== 评分权重 =====

    pub fn get_scoring_weights(&self) -> Result<ScoringWeights, Box<dyn Error>> {
        let d = ScoringWeights::default();
        Ok(ScoringWeights {
            gap: self.get_parsed_or_default(config_keys::SCORE_WEIGHT_GAP, d.gap)?,
            repeat: self.get_parsed_or_default(config_keys::SCORE_WEIGHT_REPEAT, d.repeat)?,
            imbalance: self
                .get_parsed_or_default(config_keys::SCORE_WEIGHT_IMBALANCE, d.imbalance)?,
            overload: self.get_parsed_or_default(config_keys::SCORE_WEIGHT_OVERLOAD, d.overload)?,
        })
    }

    /// 组装引擎运行参数
    pub fn load_engine_config(&self) -> Result<EngineConfig, Box<dyn Error>> {
        Ok(EngineConfig {
            solver_timeout_ms: self.get_solver_timeout_ms()?,
            exhaustive_max_nodes: self.get_exhaustive_max_nodes()?,
            default_top_n: self.get_default_top_n()?,
            default_max_periods_per_day: self.get_default_max_periods_per_day()?,
            weights: self.get_scoring_weights()?,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 求解
    pub const SOLVER_TIMEOUT_MS: &str = "solver_timeout_ms";
    pub const EXHAUSTIVE_MAX_NODES: &str = "exhaustive_max_nodes";

    // 对比
    pub const DEFAULT_TOP_N: &str = "default_top_n";

    // 评分
    pub const SCORE_WEIGHT_GAP: &str = "score_weight_gap";
    pub const SCORE_WEIGHT_REPEAT: &str = "score_weight_repeat";
    pub const SCORE_WEIGHT_IMBALANCE: &str = "score_weight_imbalance";
    pub const SCORE_WEIGHT_OVERLOAD: &str = "score_weight_overload";

    // 教师负荷
    pub const DEFAULT_MAX_PERIODS_PER_DAY: &str = "default_max_periods_per_day";
}
