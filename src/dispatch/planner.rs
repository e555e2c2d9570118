//! 规划器：把一条消息分解为有序的 (智能体, 子任务) 步骤
//!
//! plan() 从不失败：推理后端不可用、输出不是 JSON、缺字段、引用未知智能体时，一律退回确定性的
//! 关键词单步计划（无命中时交给客服智能体）。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agents::AgentKind;
use crate::core::AgentError;
use crate::dispatch::plan::{ExecutionPlan, PlanStep, StepOrigin};
use crate::llm::{extract_json_array, extract_json_object, LlmClient};
use crate::memory::{format_transcript, Message};
use crate::tools::plan_schema_json;

#[async_trait]
pub trait TaskPlanner: Send + Sync {
    /// 总是返回至少一个步骤
    async fn plan(&self, message: &str, history: &[Message]) -> ExecutionPlan;
}

/// 关键词兜底：得分最高的智能体，无命中时为客服
pub fn fallback_plan(message: &str) -> ExecutionPlan {
    let agent = AgentKind::best_match(message).unwrap_or(AgentKind::Support);
    ExecutionPlan::single(agent, message.trim(), StepOrigin::Fallback)
}

fn field<'a>(item: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| item.get(*n))
}

/// 解析并校验规划器输出：非空数组，每项含 step / agentName / subTaskQuery，且智能体已注册
pub fn parse_plan(output: &str) -> Result<ExecutionPlan, AgentError> {
    let json_str = extract_json_array(output)
        .or_else(|| extract_json_object(output))
        .ok_or_else(|| AgentError::Planning("no JSON in planner output".to_string()))?;
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| AgentError::Planning(format!("invalid JSON: {e}")))?;

    // 也接受 {"steps": [...]} / {"plan": [...]}
    let items = match &value {
        Value::Array(items) => items.clone(),
        Value::Object(obj) => obj
            .get("steps")
            .or_else(|| obj.get("plan"))
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| AgentError::Planning("object without steps array".to_string()))?,
        _ => return Err(AgentError::Planning("plan is not an array".to_string())),
    };
    if items.is_empty() {
        return Err(AgentError::Planning("empty plan".to_string()));
    }

    let mut steps = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let ordinal = field(item, &["step", "ordinal"])
            .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
            .ok_or_else(|| AgentError::Planning(format!("step {index}: missing step number")))?;
        let agent = field(item, &["agentName", "agent_name", "agent"])
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::Planning(format!("step {index}: missing agentName")))?
            .parse::<AgentKind>()
            .map_err(|e| AgentError::Planning(format!("step {index}: {e}")))?;
        let sub_task = field(item, &["subTaskQuery", "sub_task_query", "subTask", "task"])
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AgentError::Planning(format!("step {index}: missing subTaskQuery")))?;
        steps.push((ordinal, PlanStep {
            ordinal: 0,
            agent,
            sub_task: sub_task.to_string(),
        }));
    }
    // 稳定排序：序号相同保持数组顺序
    steps.sort_by_key(|(ordinal, _)| *ordinal);
    Ok(ExecutionPlan::new(
        steps.into_iter().map(|(_, s)| s).collect(),
        StepOrigin::Planned,
    ))
}

const PLANNER_SYSTEM: &str = "You are the planner of a restaurant reservation assistant. \
Split the guest's message into the smallest set of focused sub-tasks and assign each to exactly one specialist.\n\n\
Specialists:\n{agents}\n\n\
Rules:\n\
- Answer informational questions (info-agent, menu-agent) before anything else.\n\
- Check availability before any reservation step; the reservation-agent only completes bookings.\n\
- Use one step per distinct request; do not invent requests the guest did not make.\n\
- If nothing fits, use support-agent.\n\n\
Reply with a JSON array matching this schema and nothing else:\n{schema}";

/// 基于 LLM 的规划器
pub struct LlmPlanner {
    llm: Arc<dyn LlmClient>,
}

impl LlmPlanner {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn build_messages(&self, message: &str, history: &[Message]) -> Vec<Message> {
        let agents = AgentKind::ALL
            .iter()
            .map(|a| format!("- {}: {}", a.as_str(), a.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let system = PLANNER_SYSTEM
            .replace("{agents}", &agents)
            .replace("{schema}", &plan_schema_json());
        let user = format!(
            "Recent conversation:\n{}\n\nGuest's message: {}",
            format_transcript(history),
            message
        );
        vec![Message::system(system), Message::user(user)]
    }

    async fn try_plan(&self, message: &str, history: &[Message]) -> Result<ExecutionPlan, AgentError> {
        let output = self
            .llm
            .complete(&self.build_messages(message, history))
            .await
            .map_err(AgentError::Inference)?;
        tracing::debug!(output = %output, "planner output");
        parse_plan(&output)
    }
}

#[async_trait]
impl TaskPlanner for LlmPlanner {
    async fn plan(&self, message: &str, history: &[Message]) -> ExecutionPlan {
        match self.try_plan(message, history).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(error = %e, "planning failed, using keyword plan");
                fallback_plan(message)
            }
        }
    }
}
