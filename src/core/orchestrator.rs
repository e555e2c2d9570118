//! 编排器：单轮状态机
//!
//! 每条消息：取得会话租约 → 复制工作状态 → 路由（恢复 / 继续 / 打断 / 新计划）→ 按工作队列依次执行智能体
//! → 终止事件直接返回，否则交给汇总器。整轮成功才提交状态；出错或 panic 时丢弃工作副本，
//! 会话保持上一轮的已知良好状态，用户只会看到一条「请重试」。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::Serialize;

use crate::agents::{AgentKind, AgentRequest, AgentSet, TerminalEvent};
use crate::core::recovery::RETRY_REPLY;
use crate::core::state::SessionState;
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::dispatch::{
    Consolidator, ExecutionPlan, FlowClassifier, StepOrigin, TaskPlanner, WorkItem, WorkQueue,
};
use crate::memory::{recent, Message};
use crate::session::{Clock, SessionId, SessionStore};

/// 本轮的路由结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "route")]
pub enum TurnRoute {
    ResumeDetected,
    Continuation { target: AgentKind },
    Interrupted,
    FreshPlan,
}

/// handle_message 的返回
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReply {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_event: Option<TerminalEvent>,
    /// 整轮失败时为 None
    #[serde(skip)]
    pub route: Option<TurnRoute>,
}

impl TurnReply {
    fn retry(text: String) -> Self {
        Self {
            reply: text,
            terminal_event: None,
            route: None,
        }
    }
}

/// 多智能体编排器，由 OrchestratorBuilder 构建
pub struct Orchestrator {
    pub(crate) agents: AgentSet,
    pub(crate) planner: Arc<dyn TaskPlanner>,
    pub(crate) classifier: Arc<dyn FlowClassifier>,
    pub(crate) consolidator: Consolidator,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) recovery: RecoveryEngine,
    pub(crate) history_window: usize,
    pub(crate) max_steps_per_turn: usize,
}

impl Orchestrator {
    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    pub fn agents(&self) -> &AgentSet {
        &self.agents
    }

    /// 外部传入的原始会话 ID 先校验再处理
    pub async fn handle_incoming(
        &self,
        raw_session_id: &str,
        message: &str,
        history: &[Message],
        restaurant_id: &str,
    ) -> Result<TurnReply, AgentError> {
        let session_id = SessionId::parse(raw_session_id)?;
        Ok(self
            .handle_message(&session_id, message, history, restaurant_id)
            .await)
    }

    /// 处理一条用户消息；同一会话的并发调用按到达顺序串行执行
    pub async fn handle_message(
        &self,
        session_id: &SessionId,
        message: &str,
        history: &[Message],
        restaurant_id: &str,
    ) -> TurnReply {
        let lease = self.store.checkout(session_id).await;
        let mut working = lease.state().clone();

        let turn = AssertUnwindSafe(self.run_turn(&mut working, message, history, restaurant_id))
            .catch_unwind()
            .await;

        let err = match turn {
            Ok(Ok(reply)) => {
                lease.commit(working);
                return reply;
            }
            Ok(Err(e)) => e,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                AgentError::TurnPanicked(detail)
            }
        };

        tracing::error!(session = %session_id, error = %err, "turn failed, session state left unchanged");
        match self.recovery.handle(&err) {
            RecoveryAction::RetryTurn(text) => TurnReply::retry(text),
            _ => TurnReply::retry(RETRY_REPLY.to_string()),
        }
    }

    async fn run_turn(
        &self,
        state: &mut SessionState,
        message: &str,
        history: &[Message],
        restaurant_id: &str,
    ) -> Result<TurnReply, AgentError> {
        state.begin_turn();
        let history = recent(history, self.history_window);

        let (route, plan) = self.route(state, message, history).await;
        tracing::info!(route = ?route, agents = ?plan.agents(), origin = ?plan.origin(), "turn routed");
        state.inject_booking_context();

        let today = self.clock.today();
        let mut queue = WorkQueue::from_plan(&plan, self.max_steps_per_turn);
        let mut results = Vec::with_capacity(queue.len());

        while let Some(item) = queue.pop() {
            let agent = self.agents.get(item.agent).ok_or_else(|| {
                AgentError::Planning(format!("agent {} is not registered", item.agent))
            })?;

            let result = {
                let request = AgentRequest {
                    original_message: message,
                    task: &item.task,
                    history,
                    restaurant_id,
                    global_context: &state.global_context,
                    today,
                };
                agent.process(&request).await
            };
            tracing::info!(
                agent = %item.agent,
                origin = ?item.origin,
                succeeded = result.succeeded(),
                complete = result.is_task_complete(),
                "step finished"
            );

            state.record_step(item.agent, &item.task, item.origin, result.tool_result_json());
            if let Some(context) = &result.context_data {
                state.apply_context(context);
            }

            if let Some(event) = result.terminal() {
                tracing::info!(agent = %item.agent, event = ?event.kind, "terminal event, skipping consolidation");
                return Ok(TurnReply {
                    reply: result.text().to_string(),
                    terminal_event: Some(event.clone()),
                    route: Some(route),
                });
            }

            if let Some(handoff) = result.handoff() {
                let accepted = queue.push_handoff(WorkItem {
                    agent: handoff.target,
                    task: handoff.unanswered_query.clone(),
                    origin: StepOrigin::Handoff { from: item.agent },
                });
                tracing::debug!(from = %item.agent, to = %handoff.target, accepted, "handoff");
            }
            results.push(result);
        }

        let reply = self.consolidator.consolidate(message, &results, history).await;
        Ok(TurnReply {
            reply,
            terminal_event: None,
            route: Some(route),
        })
    }

    /// 恢复检测 → 待答问题的打断检测 → 规划
    async fn route(
        &self,
        state: &mut SessionState,
        message: &str,
        history: &[Message],
    ) -> (TurnRoute, ExecutionPlan) {
        if let Some(snapshot) = &state.interrupted_flow {
            let resume = match self
                .classifier
                .is_resume(message, &snapshot.flow_state, history)
                .await
            {
                Ok(resume) => resume,
                Err(e) => {
                    tracing::warn!(error = %e, "resume classification failed, treating as new request");
                    false
                }
            };
            if resume && state.resume().is_some() {
                return (
                    TurnRoute::ResumeDetected,
                    ExecutionPlan::single(AgentKind::Reservation, message, StepOrigin::Resume),
                );
            }
        }

        if let (true, Some(pending)) = (state.has_pending_question(), state.next_agent) {
            let interrupted = match self
                .classifier
                .is_interruption(message, pending, &state.flow_state, history)
                .await
            {
                Ok(interrupted) => interrupted,
                Err(e) => {
                    let action = self.recovery.handle(&e);
                    tracing::warn!(error = %e, action = ?action, "interruption classification failed");
                    action != RecoveryAction::AssumeContinuation
                }
            };

            if interrupted {
                let snapshotted = state.interrupt(self.clock.now());
                tracing::info!(pending = %pending, snapshotted, "pending question abandoned");
                return (TurnRoute::Interrupted, self.planner.plan(message, history).await);
            }
            if let Some(target) = state.take_pending() {
                return (
                    TurnRoute::Continuation { target },
                    ExecutionPlan::single(target, message, StepOrigin::Continuation),
                );
            }
        }

        (TurnRoute::FreshPlan, self.planner.plan(message, history).await)
    }
}
