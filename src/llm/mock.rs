//! Mock LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! 按顺序返回预设回复；预设用完后回退为一条 clarify_and_respond 决策，回显用户最后一条消息。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// Mock 客户端：脚本化回复 + 回显兜底；同时记录收到的 prompt 供断言
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定文本
    pub fn with_responses<S: Into<String>>(responses: Vec<S>) -> Self {
        let client = Self::default();
        for r in responses {
            client.push_response(Ok(r.into()));
        }
        client
    }

    /// 追加一条预设结果（Err 模拟后端失败）
    pub fn push_response(&self, response: Result<String, String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    /// 已收到的请求次数
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// 最近一次请求的全部消息内容（拼成一段文本）
    pub fn last_prompt(&self) -> Option<String> {
        let prompts = self.prompts.lock().ok()?;
        prompts.last().map(|msgs| {
            msgs.iter()
                .map(|m| m.content.as_str())
                .collect::<Vec<_>>()
                .join("\n")
        })
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(messages.to_vec());
        }

        if let Some(next) = self.responses.lock().ok().and_then(|mut q| q.pop_front()) {
            return next;
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(serde_json::json!({
            "tool_to_call": "clarify_and_respond",
            "parameters": { "message": format!("Echo from Mock: {last_user}") }
        })
        .to_string())
    }
}
