//! 汇总器（Narrator）：把本轮各智能体的原始结果合成一条回复
//!
//! 单结果原样透传；多结果时构造事实摘要交给 Synthesizer，并做落地检查：
//! 回复中出现的金额、预订/工单编号和场馆名称必须能在结果里找到，否则退回拼接各结果文本。

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::agents::AgentResult;
use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::{format_transcript, Message};

/// 没有任何结果时的回复
pub const EMPTY_REPLY: &str = "I'm sorry, I wasn't able to find anything for that. Could you rephrase your request?";

#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        original_message: &str,
        digest: &str,
        history: &[Message],
    ) -> Result<String, AgentError>;
}

const NARRATOR_SYSTEM: &str = "You are the voice of a restaurant reservation assistant. \
Several specialists have gathered facts for the guest's message. Write ONE reply to the guest that:\n\
1. addresses the main actionable item first (bookings, availability, questions that need an answer),\n\
2. then answers the remaining informational items without repeating yourself,\n\
3. uses ONLY the facts listed below. Never mention prices, availability, names or reference numbers that are not in the facts.\n\
Keep it friendly and concise. Do not mention the specialists.";

/// 基于 LLM 的合成器
pub struct LlmSynthesizer {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl LlmSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_prompt: NARRATOR_SYSTEM.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(
        &self,
        original_message: &str,
        digest: &str,
        history: &[Message],
    ) -> Result<String, AgentError> {
        let user = format!(
            "Guest's message: {original_message}\n\nFacts:\n{digest}\n\nRecent conversation:\n{}",
            format_transcript(history)
        );
        self.llm
            .complete(&[Message::system(self.system_prompt.clone()), Message::user(user)])
            .await
            .map_err(AgentError::Consolidation)
    }
}

/// 事实摘要：每个结果一段，带智能体名与子任务
pub fn build_digest(results: &[AgentResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let status = if r.succeeded() { "ok" } else { "not completed" };
            format!(
                "[{}] {} ({status}) for \"{}\":\n{}\nData: {}",
                i + 1,
                r.agent,
                r.task,
                r.text(),
                r.tool_result_json()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn money_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[€$£]\s?\d+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?\s?(?:€|eur\b|euros?\b|usd\b|dollars?\b|pounds?\b)").unwrap()
    })
}

fn reference_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[RT]-[0-9A-Za-z]{4,}\b").unwrap())
}

fn amount_of(fragment: &str) -> Option<f64> {
    let digits: String = fragment
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    digits.parse().ok()
}

/// 数据中所有 price 字段的数值
fn collect_prices(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                match v {
                    Value::Number(n) if key == "price" => out.extend(n.as_f64()),
                    _ => collect_prices(v, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_prices(v, out)),
        _ => {}
    }
}

/// 整词出现（前后不是字母或数字）
fn mentions(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// 回复是否只引用本轮结果中的事实
///
/// 金额只认结果文本里的货币金额和数据里的 price 字段；预订/工单编号必须在结果中出现；
/// `vocabulary` 是场馆已知的名称（桌型、菜品、套餐），回复提到其中任何一个都必须在结果里找得到。
pub fn is_grounded(reply: &str, results: &[AgentResult], vocabulary: &[String]) -> bool {
    let mut amounts: Vec<f64> = Vec::new();
    let mut facts = String::new();
    for result in results {
        amounts.extend(
            money_pattern()
                .find_iter(result.text())
                .filter_map(|m| amount_of(m.as_str())),
        );
        let data = result.tool_result_json();
        collect_prices(&data, &mut amounts);
        facts.push_str(&result.text().to_lowercase());
        facts.push('\n');
        facts.push_str(&data.to_string().to_lowercase());
        facts.push('\n');
    }

    let prices_ok = money_pattern().find_iter(reply).all(|m| {
        amount_of(m.as_str())
            .is_some_and(|amount| amounts.iter().any(|known| (known - amount).abs() < 0.005))
    });
    let refs_ok = reference_pattern()
        .find_iter(reply)
        .all(|m| facts.contains(&m.as_str().to_lowercase()));

    let reply_lower = reply.to_lowercase();
    let names_ok = vocabulary
        .iter()
        .map(|name| name.to_lowercase())
        .filter(|name| mentions(&reply_lower, name))
        .all(|name| mentions(&facts, &name));

    prices_ok && refs_ok && names_ok
}

/// 降级：各结果文本以空行拼接
pub fn concatenate(results: &[AgentResult]) -> String {
    results
        .iter()
        .map(|r| r.text().trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 汇总器
pub struct Consolidator {
    synthesizer: Arc<dyn Synthesizer>,
    vocabulary: Vec<String>,
}

impl Consolidator {
    pub fn new(synthesizer: Arc<dyn Synthesizer>) -> Self {
        Self {
            synthesizer,
            vocabulary: Vec::new(),
        }
    }

    /// 场馆已知名称，用于落地检查
    pub fn with_vocabulary(mut self, names: Vec<String>) -> Self {
        self.vocabulary = names;
        self
    }

    pub async fn consolidate(
        &self,
        original_message: &str,
        results: &[AgentResult],
        history: &[Message],
    ) -> String {
        match results {
            [] => return EMPTY_REPLY.to_string(),
            [single] => return single.text().to_string(),
            _ => {}
        }

        let digest = build_digest(results);
        let outcome = match self.synthesizer.synthesize(original_message, &digest, history).await {
            Ok(reply) if reply.trim().is_empty() => {
                Err(AgentError::Consolidation("empty narration".to_string()))
            }
            Ok(reply) if !is_grounded(&reply, results, &self.vocabulary) => Err(AgentError::Consolidation(
                "narration mentions facts outside the results".to_string(),
            )),
            other => other,
        };

        match outcome {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "consolidation failed, concatenating results");
                let joined = concatenate(results);
                if joined.is_empty() {
                    EMPTY_REPLY.to_string()
                } else {
                    joined
                }
            }
        }
    }
}
