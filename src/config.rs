//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CONCIERGE__*` 覆盖（双下划线表示嵌套，如 `CONCIERGE__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub session: SessionSection,
    pub dispatch: DispatchSection,
    pub venue: VenueSection,
}

/// [app] 段：应用名、推理时携带的历史条数、终端对话保留轮数
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 每次推理携带的最近消息条数
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// 终端对话历史保留轮数
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            history_window: default_history_window(),
            max_context_turns: default_max_context_turns(),
        }
    }
}

fn default_history_window() -> usize {
    6
}

fn default_max_context_turns() -> usize {
    20
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次推理调用超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

/// [session] 段：会话过期与清理周期
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_cleanup_interval_secs() -> u64 {
    300
}

/// [dispatch] 段：单轮工作队列上限、工具调用超时、分类器规则快速匹配开关
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSection {
    /// 单轮最多执行的步骤数（计划步骤 + 智能体转交）
    #[serde(default = "default_max_steps_per_turn")]
    pub max_steps_per_turn: usize,
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_fast_match")]
    pub fast_match: bool,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            max_steps_per_turn: default_max_steps_per_turn(),
            tool_timeout_secs: default_tool_timeout_secs(),
            fast_match: default_fast_match(),
        }
    }
}

fn default_max_steps_per_turn() -> usize {
    6
}

fn default_tool_timeout_secs() -> u64 {
    10
}

fn default_fast_match() -> bool {
    true
}

/// [venue] 段：默认餐厅与货币符号
#[derive(Debug, Clone, Deserialize)]
pub struct VenueSection {
    #[serde(default = "default_restaurant_id")]
    pub restaurant_id: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for VenueSection {
    fn default() -> Self {
        Self {
            restaurant_id: default_restaurant_id(),
            currency: default_currency(),
        }
    }
}

fn default_restaurant_id() -> String {
    "demo-bistro".to_string()
}

fn default_currency() -> String {
    "€".to_string()
}

/// 从 config 目录加载配置，环境变量 CONCIERGE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CONCIERGE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path.filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CONCIERGE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.history_window, 6);
        assert_eq!(cfg.session.ttl_secs, 3600);
        assert_eq!(cfg.dispatch.max_steps_per_turn, 6);
        assert!(cfg.dispatch.fast_match);
        assert_eq!(cfg.llm.timeouts.request, 30);
        assert_eq!(cfg.venue.currency, "€");
    }

    #[test]
    fn test_explicit_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[session]\nttl_secs = 60\n\n[dispatch]\nmax_steps_per_turn = 3\nfast_match = false\n\n[venue]\nrestaurant_id = \"harbour\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.session.ttl_secs, 60);
        assert_eq!(cfg.dispatch.max_steps_per_turn, 3);
        assert!(!cfg.dispatch.fast_match);
        assert_eq!(cfg.venue.restaurant_id, "harbour");
        // 未出现的段保持默认
        assert_eq!(cfg.dispatch.tool_timeout_secs, 10);
    }
}
