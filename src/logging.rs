// ==========================================
// 日志系统初始化
// ==========================================
// tracing-subscriber: 文本 / JSON 两种输出, 统一写 stderr
// stdout 只留给命令行的 JSON 结果
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

const LOG_FORMAT_ENV: &str = "TIMETABLE_REGEN_LOG_FORMAT";
const DEFAULT_DIRECTIVE: &str = "info";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// 从环境变量解析; 未设置或无法识别时为 Text
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|v| Self::parse(&v))
            .unwrap_or(LogFormat::Text)
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// 初始化日志系统
///
/// # 环境变量
/// - RUST_LOG: 过滤器 (默认 info), 例如 `RUST_LOG=timetable_regen::engine=debug`
/// - TIMETABLE_REGEN_LOG_FORMAT: `text` | `json`
pub fn init() {
    init_with(LogFormat::from_env());
}

pub fn init_with(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    // 重复初始化时忽略 (例如库被嵌入到已有订阅者的进程)
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_line_number(true).try_init(),
    };
}

/// 测试用: debug 级别, 输出交给测试框架捕获
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
