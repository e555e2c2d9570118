//! 流程分类器：打断检测与恢复意图检测
//!
//! 先做规则快速匹配（不调用 LLM），命中不了再交给推理后端，答案必须是约定的单词。
//! 推理失败或答案无法识别时返回 Classification 错误，由编排器按安全默认值处理。

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::agents::AgentKind;
use crate::core::state::FlowState;
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{format_transcript, Message};

#[async_trait]
pub trait FlowClassifier: Send + Sync {
    /// 用户是否放弃了待答问题（true = 打断）
    async fn is_interruption(
        &self,
        message: &str,
        pending_agent: AgentKind,
        flow_state: &FlowState,
        history: &[Message],
    ) -> Result<bool, AgentError>;

    /// 用户是否想回到被打断的流程
    async fn is_resume(
        &self,
        message: &str,
        snapshot: &FlowState,
        history: &[Message],
    ) -> Result<bool, AgentError>;
}

fn resume_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(continue|resume|back to|go back|carry on|finish|complete|proceed with|where we left)\b.*\b(reservation|booking|book|table)\b|\b(let'?s|lets) continue\b",
        )
        .unwrap()
    })
}

fn acknowledgement_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(yes|yeah|yep|sure|ok|okay|no|nope|that one|the first( one)?|the second( one)?)(\s*,?\s*(please|thanks|thank you))?\W*$",
        )
        .unwrap()
    })
}

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

fn phone_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?\d[\d\s().-]{6,}\d$").unwrap())
}

fn iso_date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap())
}

/// 整条消息只是简短确认、邮箱或电话号码
fn is_bare_answer(message: &str) -> bool {
    acknowledgement_pattern().is_match(message)
        || email_pattern().is_match(message)
        || (phone_pattern().is_match(message) && !iso_date_pattern().is_match(message))
}

/// 规则快速判定恢复意图
pub fn fast_resume(message: &str) -> Option<bool> {
    resume_pattern().is_match(message).then_some(true)
}

/// 规则快速判定「继续」：不带问题地点名可选桌型，或整条消息是简短确认 / 联系方式。
/// 其余一律交给推理后端。
pub fn fast_continuation(message: &str, flow_state: &FlowState) -> Option<bool> {
    let trimmed = message.trim();
    let lower = trimmed.to_lowercase();
    let names_table = !trimmed.contains('?')
        && flow_state
            .get("availableTableTypes")
            .and_then(Value::as_array)
            .is_some_and(|options| {
                options
                    .iter()
                    .filter_map(|o| o.get("tableType").and_then(Value::as_str))
                    .any(|t| lower.contains(&t.to_lowercase()))
            });
    if names_table || is_bare_answer(trimmed) {
        return Some(false);
    }
    None
}

fn parse_label(output: &str, positive: &str, negative: &str) -> Result<bool, AgentError> {
    let upper = output.trim().to_uppercase();
    let first = upper
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|w| !w.is_empty())
        .unwrap_or_default();
    if first == positive {
        Ok(true)
    } else if first == negative {
        Ok(false)
    } else {
        Err(AgentError::Classification(format!(
            "expected {positive} or {negative}, got {output:?}"
        )))
    }
}

const INTERRUPTION_PROMPT: &str = "The assistant asked the guest a question on behalf of {agent} \
and is waiting for the answer. Booking details so far: {flow}.\n\
Decide whether the guest's new message ANSWERS or continues that question (CONTINUATION), \
or abandons it to talk about something else (INTERRUPTION).\n\
Reply with exactly one word: CONTINUATION or INTERRUPTION.";

const RESUME_PROMPT: &str = "Earlier the guest left an unfinished booking: {flow}.\n\
Decide whether the guest's new message asks to go back to that booking (RESUME) \
or is about something else (NEW).\n\
Reply with exactly one word: RESUME or NEW.";

/// 规则 + LLM 的流程分类器
pub struct LlmFlowClassifier {
    llm: Arc<dyn LlmClient>,
    enable_fast_match: bool,
}

impl LlmFlowClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            enable_fast_match: true,
        }
    }

    pub fn with_fast_match(mut self, enable: bool) -> Self {
        self.enable_fast_match = enable;
        self
    }

    async fn ask(&self, system: String, message: &str, history: &[Message]) -> Result<String, AgentError> {
        let user = format!(
            "Recent conversation:\n{}\n\nGuest's new message: {}",
            format_transcript(history),
            message
        );
        self.llm
            .complete(&[Message::system(system), Message::user(user)])
            .await
            .map_err(AgentError::Classification)
    }
}

#[async_trait]
impl FlowClassifier for LlmFlowClassifier {
    async fn is_interruption(
        &self,
        message: &str,
        pending_agent: AgentKind,
        flow_state: &FlowState,
        history: &[Message],
    ) -> Result<bool, AgentError> {
        if self.enable_fast_match {
            if let Some(interrupted) = fast_continuation(message, flow_state) {
                return Ok(interrupted);
            }
        }
        let system = INTERRUPTION_PROMPT
            .replace("{agent}", pending_agent.as_str())
            .replace("{flow}", &Value::Object(flow_state.clone()).to_string());
        let output = self.ask(system, message, history).await?;
        parse_label(&output, "INTERRUPTION", "CONTINUATION")
    }

    async fn is_resume(
        &self,
        message: &str,
        snapshot: &FlowState,
        history: &[Message],
    ) -> Result<bool, AgentError> {
        if self.enable_fast_match {
            if let Some(resume) = fast_resume(message) {
                return Ok(resume);
            }
        }
        let system = RESUME_PROMPT.replace("{flow}", &Value::Object(snapshot.clone()).to_string());
        let output = self.ask(system, message, history).await?;
        parse_label(&output, "RESUME", "NEW")
    }
}
