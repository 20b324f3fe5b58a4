// ==========================================
// 课表版本与局部重排引擎 - 引擎运行参数
// ==========================================
// 来源: config_kv (由 ConfigManager 组装) 或 Default
// ==========================================

use serde::{Deserialize, Serialize};

/// 优化得分的扣分权重
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringWeights {
    pub gap: f64,        // 每个课间空档
    pub repeat: f64,     // 同日同科目重复 (每多一次)
    pub imbalance: f64,  // 每日课时与平均值的偏差
    pub overload: f64,   // 教师超出日上限 (每节)
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            gap: 2.0,
            repeat: 3.0,
            imbalance: 1.0,
            overload: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// 求解超时 (毫秒)
    pub solver_timeout_ms: u64,
    /// exhaustive 策略搜索节点上限
    pub exhaustive_max_nodes: u64,
    /// 对比 topModified 默认条数
    pub default_top_n: usize,
    /// 教师日课时上限 (未单独登记时)
    pub default_max_periods_per_day: usize,
    pub weights: ScoringWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            solver_timeout_ms: 30_000,
            exhaustive_max_nodes: 200_000,
            default_top_n: 5,
            default_max_periods_per_day: 6,
            weights: ScoringWeights::default(),
        }
    }
}
