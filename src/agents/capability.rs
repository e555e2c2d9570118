//! 能力智能体：统一的 Think → Guard → Act 循环
//!
//! 每个智能体由一个 Capability（名称、允许的工具、参数准备与结果解读）加上共享的
//! ToolSelector / ToolExecutor 组成。智能体只收集数据，不生成自然语言；任何失败都在边界内
//! 转为 AgentResult::Failure，不向外抛出。

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::agents::handoff;
use crate::agents::normalize::normalize_args;
use crate::agents::selector::{SelectionRequest, ToolSelector};
use crate::agents::{AgentKind, AgentResult, FailureKind, TerminalEvent};
use crate::core::state::{ContextData, FlowState, GlobalContext, BOOKING_CONTEXT_KEY};
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::memory::Message;
use crate::tools::catalog::CLARIFY_AND_RESPOND;
use crate::tools::{ToolCall, ToolExecutor, ToolOutcome};

/// 智能体一次处理的输入
#[derive(Clone, Copy)]
pub struct AgentRequest<'a> {
    pub original_message: &'a str,
    pub task: &'a str,
    pub history: &'a [Message],
    pub restaurant_id: &'a str,
    pub global_context: &'a GlobalContext,
    pub today: NaiveDate,
}

impl<'a> AgentRequest<'a> {
    /// 编排器注入的预订流程状态
    pub fn booking_context(&self) -> Option<&'a FlowState> {
        self.global_context
            .get(BOOKING_CONTEXT_KEY)
            .and_then(Value::as_object)
    }
}

/// 准备好的调用，以及要写入 flowState 的增量
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCall {
    pub call: ToolCall,
    pub flow_delta: FlowState,
}

impl PreparedCall {
    pub fn new(call: ToolCall) -> Self {
        Self {
            call,
            flow_delta: FlowState::new(),
        }
    }

    pub fn clarify(message: impl Into<String>, flow_delta: FlowState) -> Self {
        Self {
            call: ToolCall::new(CLARIFY_AND_RESPOND, json!({ "message": message.into() })),
            flow_delta,
        }
    }

    pub fn is_clarification(&self) -> bool {
        self.call.tool == CLARIFY_AND_RESPOND
    }
}

/// 工具结果的业务解读
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpretation {
    pub context_data: Option<ContextData>,
    pub terminal: Option<TerminalEvent>,
}

/// 单个能力的领域行为
pub trait Capability: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// 专属工具（clarify_and_respond 总是额外允许）
    fn tools(&self) -> &'static [&'static str];

    /// 越权或无法决策时的追问
    fn clarify_message(&self) -> &'static str;

    /// 校验前调整调用（合并预订上下文、补全参数）；也可把调用改为追问
    fn prepare(&self, call: ToolCall, _request: &AgentRequest<'_>) -> PreparedCall {
        PreparedCall::new(call)
    }

    /// 成功执行后的解读：是否等待用户、是否终止事件
    fn interpret(
        &self,
        _prepared: &PreparedCall,
        _outcome: &ToolOutcome,
        _request: &AgentRequest<'_>,
    ) -> Interpretation {
        Interpretation::default()
    }

    /// 校验或协作服务失败时的状态提议；invalid 为校验失败的参数名
    fn on_failure(
        &self,
        _prepared: &PreparedCall,
        _invalid: &[&str],
        _request: &AgentRequest<'_>,
    ) -> Option<ContextData> {
        None
    }
}

/// 能力智能体
pub struct CapabilityAgent {
    capability: Box<dyn Capability>,
    selector: Arc<dyn ToolSelector>,
    executor: Arc<ToolExecutor>,
    recovery: RecoveryEngine,
}

impl CapabilityAgent {
    pub fn new(
        capability: Box<dyn Capability>,
        selector: Arc<dyn ToolSelector>,
        executor: Arc<ToolExecutor>,
    ) -> Self {
        Self {
            capability,
            selector,
            executor,
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn kind(&self) -> AgentKind {
        self.capability.kind()
    }

    pub fn allowed_tools(&self) -> Vec<&'static str> {
        let mut tools = self.capability.tools().to_vec();
        tools.push(CLARIFY_AND_RESPOND);
        tools
    }

    pub fn is_allowed(&self, tool: &str) -> bool {
        tool == CLARIFY_AND_RESPOND || self.capability.tools().contains(&tool)
    }

    fn clarify_call(&self) -> ToolCall {
        ToolCall::new(
            CLARIFY_AND_RESPOND,
            json!({ "message": self.capability.clarify_message() }),
        )
    }

    /// 允许列表之外的工具一律改为追问
    fn guard(&self, call: ToolCall) -> ToolCall {
        if self.is_allowed(&call.tool) {
            return call;
        }
        let err = AgentError::HallucinatedTool(call.tool.clone());
        tracing::warn!(agent = %self.kind(), error = %err, "tool outside allow-list, clarifying instead");
        self.clarify_call()
    }

    async fn think(&self, request: &AgentRequest<'_>) -> ToolCall {
        let allowed = self.allowed_tools();
        let selection = SelectionRequest {
            agent: self.kind(),
            original_message: request.original_message,
            task: request.task,
            global_context: request.global_context,
            history: request.history,
            tools_schema: self.executor.registry().schema_json_for(&allowed),
            today: request.today,
        };
        match self.selector.select(&selection).await {
            Ok(call) => call,
            Err(e) => {
                tracing::warn!(agent = %self.kind(), error = %e, "tool selection failed, clarifying instead");
                self.clarify_call()
            }
        }
    }

    fn normalize(&self, mut call: ToolCall, today: NaiveDate) -> ToolCall {
        if let Some(definition) = self.executor.registry().get(&call.tool) {
            if call.args.is_null() || call.args.is_object() {
                normalize_args(definition, call.args_mut(), today);
            }
        }
        call
    }

    /// Think → Guard → Prepare → Validate → Execute → Interpret → 完成度分析
    pub async fn process(&self, request: &AgentRequest<'_>) -> AgentResult {
        let kind = self.kind();

        let call = self.guard(self.think(request).await);
        let call = self.normalize(call, request.today);
        let mut prepared = self.capability.prepare(call, request);
        prepared.call = self.guard(prepared.call);
        tracing::debug!(agent = %kind, tool = %prepared.call.tool, args = %prepared.call.args, "act");

        if let Err(errors) = self.executor.validate(&prepared.call) {
            let invalid: Vec<&str> = errors.as_slice().iter().filter_map(|e| e.param()).collect();
            let context = self.capability.on_failure(&prepared, &invalid, request);
            let err = AgentError::Validation(errors.clone());
            let reply = self.user_text(&err);
            tracing::warn!(agent = %kind, error = %err, "tool arguments rejected");
            return AgentResult::failure(kind, request.task, FailureKind::Validation, err.to_string(), reply)
                .with_context(context);
        }

        let outcome = match self
            .executor
            .execute(&prepared.call, request.restaurant_id)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                let context = self.capability.on_failure(&prepared, &[], request);
                let err = AgentError::Collaborator(e);
                let reply = self.user_text(&err);
                tracing::warn!(agent = %kind, error = %err, "collaborator call failed");
                return AgentResult::failure(
                    kind,
                    request.task,
                    FailureKind::Collaborator,
                    err.to_string(),
                    reply,
                )
                .with_context(context);
            }
        };

        let interpretation = self.capability.interpret(&prepared, &outcome, request);
        let handoff = if interpretation.terminal.is_none() {
            handoff::analyse(kind, request.original_message)
        } else {
            None
        };
        if let Some(h) = &handoff {
            tracing::debug!(agent = %kind, target = %h.target, query = %h.unanswered_query, "handoff suggested");
        }

        AgentResult::success(kind, request.task, outcome)
            .with_handoff(handoff)
            .with_terminal(interpretation.terminal)
            .with_context(interpretation.context_data)
    }

    fn user_text(&self, err: &AgentError) -> String {
        match self.recovery.handle(err) {
            RecoveryAction::Clarify(text)
            | RecoveryAction::Apologize(text)
            | RecoveryAction::RetryTurn(text) => text,
            _ => self.capability.clarify_message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{builtin_capabilities, AgentStatus};
    use crate::services::{InMemoryVenue, Services};
    use crate::tools::builtin_registry;
    use async_trait::async_trait;

    /// 总是返回同一个决策的选择器
    struct FixedSelector(ToolCall);

    #[async_trait]
    impl ToolSelector for FixedSelector {
        async fn select(&self, _request: &SelectionRequest<'_>) -> Result<ToolCall, AgentError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSelector;

    #[async_trait]
    impl ToolSelector for BrokenSelector {
        async fn select(&self, _request: &SelectionRequest<'_>) -> Result<ToolCall, AgentError> {
            Err(AgentError::JsonParseError("garbage".into()))
        }
    }

    fn executor() -> Arc<ToolExecutor> {
        let venue = Arc::new(InMemoryVenue::demo("demo-bistro"));
        Arc::new(ToolExecutor::new(
            Arc::new(builtin_registry()),
            Services::from_venue(venue),
            5,
            "€",
        ))
    }

    fn request<'a>(message: &'a str, context: &'a GlobalContext) -> AgentRequest<'a> {
        AgentRequest {
            original_message: message,
            task: message,
            history: &[],
            restaurant_id: "demo-bistro",
            global_context: context,
            today: NaiveDate::from_ymd_opt(2025, 8, 7).unwrap(),
        }
    }

    fn executed_tool(result: &AgentResult) -> Option<&str> {
        match &result.status {
            AgentStatus::Success { tool_result, .. } => Some(tool_result.tool.as_str()),
            AgentStatus::Failure { .. } => None,
        }
    }

    #[tokio::test]
    async fn test_every_agent_contains_disallowed_tools() {
        let executor = executor();
        let context = GlobalContext::new();
        let forbidden = ToolCall::new(
            "create_reservation",
            json!({
                "date": "2025-08-08", "time": "20:00", "party_size": 2,
                "table_type": "standard", "customer_name": "Eve",
                "customer_email": "eve@example.com", "customer_phone": "900000000"
            }),
        );
        for capability in builtin_capabilities() {
            let agent = CapabilityAgent::new(
                capability,
                Arc::new(FixedSelector(ToolCall::new("drop_tables", json!({})))),
                executor.clone(),
            );
            let result = agent.process(&request("hi", &context)).await;
            let tool = executed_tool(&result).unwrap();
            assert!(agent.allowed_tools().contains(&tool), "{} ran {tool}", agent.kind());
            assert_eq!(tool, CLARIFY_AND_RESPOND);

            if agent.kind() != AgentKind::Reservation {
                let agent = CapabilityAgent::new(
                    builtin_capabilities()
                        .into_iter()
                        .find(|c| c.kind() == agent.kind())
                        .unwrap(),
                    Arc::new(FixedSelector(forbidden.clone())),
                    executor.clone(),
                );
                let result = agent.process(&request("hi", &context)).await;
                assert_eq!(executed_tool(&result), Some(CLARIFY_AND_RESPOND));
            }
        }
    }

    #[tokio::test]
    async fn test_selector_failure_becomes_clarification() {
        let capability = builtin_capabilities()
            .into_iter()
            .find(|c| c.kind() == AgentKind::Menu)
            .unwrap();
        let agent = CapabilityAgent::new(capability, Arc::new(BrokenSelector), executor());
        let context = GlobalContext::new();
        let result = agent.process(&request("menu?", &context)).await;
        assert_eq!(executed_tool(&result), Some(CLARIFY_AND_RESPOND));
        assert!(result.is_task_complete());
    }

    #[tokio::test]
    async fn test_validation_failure_is_reported_not_raised() {
        let capability = builtin_capabilities()
            .into_iter()
            .find(|c| c.kind() == AgentKind::Availability)
            .unwrap();
        let agent = CapabilityAgent::new(
            capability,
            Arc::new(FixedSelector(ToolCall::new(
                "check_availability",
                json!({"date": "2025-08-08", "time": "20:00", "party_size": 99}),
            ))),
            executor(),
        );
        let context = GlobalContext::new();
        let result = agent.process(&request("table for 99", &context)).await;
        match &result.status {
            AgentStatus::Failure { kind, .. } => assert_eq!(*kind, FailureKind::Validation),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(result.is_task_complete());
        assert_eq!(result.tool_result_json()["success"], json!(false));
    }
}
