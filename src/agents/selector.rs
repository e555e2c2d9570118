//! Think 阶段：根据原始消息、子任务、本轮已有结果与历史，选择一个工具调用
//!
//! ToolSelector 是窄接口，测试中用确定性桩替换；LlmToolSelector 是唯一依赖推理后端的适配层。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::agents::AgentKind;
use crate::core::state::GlobalContext;
use crate::core::AgentError;
use crate::llm::{extract_json_object, LlmClient};
use crate::memory::{format_transcript, Message};
use crate::tools::{tool_decision_schema_json, ToolCall};

/// 一次工具选择所需的全部输入
pub struct SelectionRequest<'a> {
    pub agent: AgentKind,
    pub original_message: &'a str,
    pub task: &'a str,
    pub global_context: &'a GlobalContext,
    pub history: &'a [Message],
    /// 允许列表内工具的 schema（JSON）
    pub tools_schema: String,
    pub today: NaiveDate,
}

impl SelectionRequest<'_> {
    /// 本轮其它智能体已得到的结果摘要
    pub fn context_summary(&self) -> String {
        if self.global_context.is_empty() {
            return "(nothing yet)".to_string();
        }
        self.global_context
            .iter()
            .map(|(k, v)| format!("- {k}: {}", compact(v)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn compact(value: &Value) -> String {
    let s = value.to_string();
    if s.chars().count() > 600 {
        format!("{}...", s.chars().take(600).collect::<String>())
    } else {
        s
    }
}

#[async_trait]
pub trait ToolSelector: Send + Sync {
    async fn select(&self, request: &SelectionRequest<'_>) -> Result<ToolCall, AgentError>;
}

/// 解析 `{"tool_to_call": ..., "parameters": {...}}`，也接受 toolToCall / tool 与 params / args / arguments
pub fn parse_tool_decision(output: &str) -> Result<ToolCall, AgentError> {
    let json_str = extract_json_object(output)
        .ok_or_else(|| AgentError::JsonParseError(format!("no JSON object in: {output}")))?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| AgentError::JsonParseError(format!("{e}: {json_str}")))?;

    let tool = ["tool_to_call", "toolToCall", "tool"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AgentError::JsonParseError(format!("decision names no tool: {json_str}")))?;

    let args = ["parameters", "params", "args", "arguments"]
        .iter()
        .find_map(|k| value.get(*k))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    Ok(ToolCall::new(tool, args))
}

const SELECTOR_SYSTEM: &str = "You are {agent}, one specialist inside a restaurant reservation assistant. \
{description}\n\
Choose exactly ONE tool from the list below and fill in its parameters from the guest's message, \
the conversation and what other specialists already found. Use only the listed tools. \
If required information is missing, call clarify_and_respond with a short, friendly question.\n\
Dates are YYYY-MM-DD (today is {today}), times are HH:MM in 24h format.\n\n\
Available tools:\n{tools}\n\n\
Reply with a single JSON object matching this schema and nothing else:\n{schema}";

/// 基于 LLM 的工具选择器
pub struct LlmToolSelector {
    llm: Arc<dyn LlmClient>,
    system_template: String,
}

impl LlmToolSelector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            system_template: SELECTOR_SYSTEM.to_string(),
        }
    }

    /// 覆盖系统提示模板（占位符：{agent} {description} {today} {tools} {schema}）
    pub fn with_system_template(mut self, template: impl Into<String>) -> Self {
        self.system_template = template.into();
        self
    }

    fn build_messages(&self, request: &SelectionRequest<'_>) -> Vec<Message> {
        let system = self
            .system_template
            .replace("{agent}", request.agent.as_str())
            .replace("{description}", request.agent.description())
            .replace("{today}", &request.today.format("%Y-%m-%d (%A)").to_string())
            .replace("{tools}", &request.tools_schema)
            .replace("{schema}", &tool_decision_schema_json());

        let user = format!(
            "Guest's full message: {}\nYour task: {}\n\nAlready found this turn:\n{}\n\nRecent conversation:\n{}",
            request.original_message,
            request.task,
            request.context_summary(),
            format_transcript(request.history),
        );
        vec![Message::system(system), Message::user(user)]
    }
}

#[async_trait]
impl ToolSelector for LlmToolSelector {
    async fn select(&self, request: &SelectionRequest<'_>) -> Result<ToolCall, AgentError> {
        let messages = self.build_messages(request);
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::Inference)?;
        tracing::debug!(agent = %request.agent, output = %output, "tool decision");
        parse_tool_decision(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use serde_json::json;

    #[test]
    fn test_parse_decision_variants() {
        let call = parse_tool_decision(
            "```json\n{\"tool_to_call\": \"get_menu\", \"parameters\": {\"query\": \"lamb\"}}\n```",
        )
        .unwrap();
        assert_eq!(call.tool, "get_menu");
        assert_eq!(call.args, json!({"query": "lamb"}));

        let call = parse_tool_decision("{\"toolToCall\": \"get_menu\"}").unwrap();
        assert_eq!(call.args, json!({}));

        assert!(parse_tool_decision("I'd call the menu tool").is_err());
        assert!(parse_tool_decision("{\"parameters\": {}}").is_err());
    }

    #[tokio::test]
    async fn test_llm_selector_includes_context() {
        let llm = Arc::new(MockLlmClient::with_responses(vec![
            r#"{"tool_to_call": "check_availability", "parameters": {"date": "2025-08-08"}}"#,
        ]));
        let selector = LlmToolSelector::new(llm.clone());
        let mut context = GlobalContext::new();
        context.insert("info-agent".into(), json!({"message": "Open 12-22"}));
        let request = SelectionRequest {
            agent: AgentKind::Availability,
            original_message: "table for two tomorrow?",
            task: "check availability tomorrow",
            global_context: &context,
            history: &[],
            tools_schema: "[]".into(),
            today: NaiveDate::from_ymd_opt(2025, 8, 7).unwrap(),
        };
        let call = selector.select(&request).await.unwrap();
        assert_eq!(call.tool, "check_availability");

        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("table for two tomorrow?"));
        assert!(prompt.contains("Open 12-22"));
    }
}
