//! 智能体结果：成功（含可选转交与终止事件）或失败（含面向用户的追问/致歉）

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agents::AgentKind;
use crate::core::state::ContextData;
use crate::tools::ToolOutcome;

/// 同一轮内请求另一个智能体处理剩余部分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handoff {
    pub target: AgentKind,
    pub unanswered_query: String,
}

/// 终止型业务事件：出现后编排器跳过汇总，直接返回
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    ReservationCreated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalEvent {
    #[serde(rename = "type")]
    pub kind: TerminalKind,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Collaborator,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentStatus {
    Success {
        tool_result: ToolOutcome,
        handoff: Option<Handoff>,
        terminal: Option<TerminalEvent>,
    },
    Failure {
        kind: FailureKind,
        error: String,
        /// 面向用户的文本（追问或致歉）
        reply: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentResult {
    pub agent: AgentKind,
    pub task: String,
    pub status: AgentStatus,
    pub context_data: Option<ContextData>,
}

impl AgentResult {
    pub fn success(agent: AgentKind, task: &str, tool_result: ToolOutcome) -> Self {
        Self {
            agent,
            task: task.to_string(),
            status: AgentStatus::Success {
                tool_result,
                handoff: None,
                terminal: None,
            },
            context_data: None,
        }
    }

    pub fn failure(
        agent: AgentKind,
        task: &str,
        kind: FailureKind,
        error: impl Into<String>,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            task: task.to_string(),
            status: AgentStatus::Failure {
                kind,
                error: error.into(),
                reply: reply.into(),
            },
            context_data: None,
        }
    }

    pub fn with_context(mut self, context_data: Option<ContextData>) -> Self {
        self.context_data = context_data;
        self
    }

    pub fn with_handoff(mut self, next: Option<Handoff>) -> Self {
        if let AgentStatus::Success { handoff, .. } = &mut self.status {
            *handoff = next;
        }
        self
    }

    pub fn with_terminal(mut self, event: Option<TerminalEvent>) -> Self {
        if let AgentStatus::Success { terminal, .. } = &mut self.status {
            *terminal = event;
        }
        self
    }

    /// 面向用户的文本载荷
    pub fn text(&self) -> &str {
        match &self.status {
            AgentStatus::Success { tool_result, .. } => &tool_result.message,
            AgentStatus::Failure { reply, .. } => reply,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(&self.status, AgentStatus::Success { tool_result, .. } if tool_result.success)
    }

    /// 失败视为已完成；成功时有转交请求或仍在等待用户回答则未完成
    pub fn is_task_complete(&self) -> bool {
        match &self.status {
            AgentStatus::Success { handoff, .. } => {
                handoff.is_none() && !self.context_data.as_ref().is_some_and(|c| c.awaiting_user)
            }
            AgentStatus::Failure { .. } => true,
        }
    }

    pub fn handoff(&self) -> Option<&Handoff> {
        match &self.status {
            AgentStatus::Success { handoff, .. } => handoff.as_ref(),
            AgentStatus::Failure { .. } => None,
        }
    }

    pub fn terminal(&self) -> Option<&TerminalEvent> {
        match &self.status {
            AgentStatus::Success { terminal, .. } => terminal.as_ref(),
            AgentStatus::Failure { .. } => None,
        }
    }

    /// 写入 globalContext 的原始工具结果
    pub fn tool_result_json(&self) -> Value {
        match &self.status {
            AgentStatus::Success { tool_result, .. } => {
                serde_json::to_value(tool_result).unwrap_or(Value::Null)
            }
            AgentStatus::Failure { kind, error, .. } => json!({
                "success": false,
                "kind": kind,
                "error": error,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_is_complete() {
        let result = AgentResult::failure(
            AgentKind::Menu,
            "lamb",
            FailureKind::Validation,
            "bad",
            "Which dish?",
        );
        assert!(result.is_task_complete());
        assert_eq!(result.text(), "Which dish?");
        assert_eq!(result.tool_result_json()["success"], json!(false));
    }

    #[test]
    fn test_handoff_marks_incomplete() {
        let outcome = ToolOutcome::ok("get_restaurant_info", "Open 12-22", json!({}));
        let result = AgentResult::success(AgentKind::Info, "hours", outcome).with_handoff(Some(
            Handoff {
                target: AgentKind::Menu,
                unanswered_query: "lamb chops gluten-free".into(),
            },
        ));
        assert!(!result.is_task_complete());
        assert_eq!(result.handoff().unwrap().target, AgentKind::Menu);
    }
}
