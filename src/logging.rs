// ==========================================
// 港口靠泊管理 - 日志订阅者安装
// ==========================================
// 库本身只产生 tracing 事件, 由宿主程序/测试决定是否安装订阅者
// 环境变量:
// - RUST_LOG: 级别过滤 (例如 RUST_LOG=port_visit_core=trace)
// - PORT_VISIT_LOG_FORMAT: text (默认) / json
// ==========================================

use std::error::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// 输出格式环境变量名
pub const LOG_FORMAT_ENV: &str = "PORT_VISIT_LOG_FORMAT";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// 每行一个 JSON 对象, 便于日志采集
    Json,
}

impl LogFormat {
    /// 未识别的取值回退为 Text
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }

    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// 安装全局订阅者
///
/// # 错误
/// 进程内已安装过订阅者时返回错误, 原订阅者保持不变
pub fn try_init(format: LogFormat, default_level: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let filter = env_filter(default_level);
    match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_current_span(true)
            .with_env_filter(filter)
            .try_init(),
    }
}

/// 宿主程序入口调用: 格式取自 PORT_VISIT_LOG_FORMAT, 默认级别 info
///
/// ```no_run
/// port_visit_core::logging::init();
/// ```
pub fn init() {
    if let Err(e) = try_init(LogFormat::from_env(), "info") {
        tracing::debug!("日志订阅者已存在, 跳过安装: {}", e);
    }
}

/// 测试用: debug 级别, 输出交给测试框架捕获; 重复调用无副作用
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
