use std::time::Duration;

/// 程序配置（进程级）
///
/// 任务级的渲染参数见 [`crate::models::RenderConfig`]。
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时渲染的任务数量
    pub max_concurrent_jobs: usize,
    /// 连接已有浏览器的调试端口；为空时自行启动浏览器
    pub browser_debug_port: Option<u16>,
    /// 浏览器可执行文件路径；为空时由 chromiumoxide 自动探测
    pub chrome_executable: Option<String>,
    /// 是否以无头模式启动
    pub headless: bool,
    /// 窗口允许闲置的最长时间，超过后由清理器回收
    pub window_life_threshold: Duration,
    /// 清理器扫描间隔
    pub janitor_interval: Duration,
    /// 输出日志文件
    pub output_log_file: Option<String>,
    /// 弹性模式：单个任务出错时记录日志而不是中止整个程序
    pub resilient: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            browser_debug_port: None,
            chrome_executable: None,
            headless: true,
            window_life_threshold: Duration::from_millis(1000 * 60 * 5),
            janitor_interval: Duration::from_millis(30_000),
            output_log_file: None,
            resilient: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("MAX_CONCURRENT_JOBS").ok().and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(default.max_concurrent_jobs),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).or(default.browser_debug_port),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            headless: std::env::var("HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.headless),
            window_life_threshold: std::env::var("WINDOW_LIFE_THRESHOLD_MS").ok().and_then(|v| v.parse().ok()).map(Duration::from_millis).unwrap_or(default.window_life_threshold),
            janitor_interval: std::env::var("JANITOR_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).map(Duration::from_millis).unwrap_or(default.janitor_interval),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").ok().or(default.output_log_file),
            resilient: std::env::var("RESILIENT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.resilient),
        }
    }
}
