//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）、超时包装、JSON 提取

pub mod mock;
pub mod openai;
pub mod parse;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use parse::{extract_json_array, extract_json_object};
pub use traits::{LlmClient, TimeoutLlmClient};

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / OpenAI 兼容 / Mock），并套上请求超时
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_deepseek_key = std::env::var("DEEPSEEK_API_KEY").is_ok();
    let has_openai_key = std::env::var("OPENAI_API_KEY").is_ok();

    let inner: Arc<dyn LlmClient> = match provider.as_str() {
        "deepseek" if has_deepseek_key || has_openai_key => {
            tracing::info!("Using DeepSeek LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::deepseek(Some(&cfg.llm.model)))
        }
        "openai" if has_openai_key => {
            tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                None,
            ))
        }
        _ => {
            tracing::warn!(provider = %provider, "No API key set or provider is mock, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    };

    Arc::new(TimeoutLlmClient::new(inner, cfg.llm.timeouts.request))
}
