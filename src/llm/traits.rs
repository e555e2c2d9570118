//! LLM 客户端抽象
//!
//! 所有推理后端（OpenAI 兼容 / DeepSeek / Mock）实现 LlmClient::complete。
//! 输出是尽力而为的文本，调用方必须防御性解析。TimeoutLlmClient 为每次调用加上上限时间。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::memory::Message;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;
}

/// 超时包装：超过上限时返回 Err，由各调用点走自己的降级路径
pub struct TimeoutLlmClient {
    inner: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl TimeoutLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, timeout_secs: u64) -> Self {
        Self {
            inner,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

#[async_trait]
impl LlmClient for TimeoutLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        match tokio::time::timeout(self.timeout, self.inner.complete(messages)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "inference call timed out");
                Err(format!(
                    "inference timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowClient;

    #[async_trait]
    impl LlmClient for SlowClient {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok("late".to_string())
        }
    }

    #[tokio::test]
    async fn test_timeout_wrapper_fails_slow_calls() {
        let client = TimeoutLlmClient::new(Arc::new(SlowClient), 1);
        let err = client.complete(&[Message::user("hi")]).await.unwrap_err();
        assert!(err.contains("timed out"));
    }
}
