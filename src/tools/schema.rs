//! 工具决策 JSON Schema 生成（schemars 自动生成）
//!
//! 用于将「合法工具决策」的 JSON 结构注入智能体 Think 阶段的 prompt，减少 LLM 输出格式错误。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};

/// 智能体决策格式：与 agents::selector 解析的 `{"tool_to_call": "...", "parameters": {...}}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolDecisionFormat {
    /// 工具名，必须是允许列表中的一个，如 check_availability、clarify_and_respond
    pub tool_to_call: String,
    /// 工具参数，字段与所选工具的参数 schema 一致
    pub parameters: HashMap<String, serde_json::Value>,
}

/// 规划器输出格式：JSON 数组中的一项
#[allow(dead_code)]
#[derive(JsonSchema)]
#[serde(rename_all = "camelCase")]
struct PlanStepFormat {
    /// 从 1 开始的执行序号
    pub step: u32,
    /// 目标智能体名，如 availability-agent
    pub agent_name: String,
    /// 交给该智能体的聚焦子任务
    pub sub_task_query: String,
}

/// 返回工具决策的 JSON Schema 字符串，可拼入 prompt
pub fn tool_decision_schema_json() -> String {
    let schema = schema_for!(ToolDecisionFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// 返回计划数组的 JSON Schema 字符串
pub fn plan_schema_json() -> String {
    let schema = schema_for!(Vec<PlanStepFormat>);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
