//! 会话状态：多轮预订流程的全部记忆
//!
//! SessionState 由编排器独占：每轮开始时复制一份工作副本，整轮成功才提交回会话存储。
//! 不变量：新检测到的打断必须同时清除「等待用户回复」并写入 interrupted_flow；
//! 新开启的预订流程会取代尚未恢复的快照，二者不会同时处于可恢复状态。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::AgentKind;
use crate::dispatch::StepOrigin;

/// 流程内跨轮累积的键值（date、time、partySize、availableTableTypes、selectedTableType ...）
pub type FlowState = Map<String, Value>;

/// 本轮共享草稿板：智能体名 -> 该智能体最近一次工具结果；另含 bookingContext
pub type GlobalContext = Map<String, Value>;

/// globalContext 中携带预订流程状态的键
pub const BOOKING_CONTEXT_KEY: &str = "bookingContext";

/// 进行中的多轮协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveFlow {
    #[default]
    None,
    Booking,
}

/// 被打断时保存的流程快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterruptedFlow {
    pub flow_state: FlowState,
    pub interrupted_at: DateTime<Utc>,
}

/// 本轮执行过的 (智能体, 子任务)，用于观测
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delegation {
    pub agent: AgentKind,
    pub task: String,
    pub origin: StepOrigin,
}

/// 智能体提议的会话状态变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextData {
    pub active_flow: ActiveFlow,
    /// 下一条用户消息应交给的智能体（仅在 awaiting_user 时有效）
    pub next_agent: Option<AgentKind>,
    pub awaiting_user: bool,
    /// 合并进 flow_state 的增量
    pub flow_state: FlowState,
}

impl ContextData {
    /// 向用户提出了问题：下一条消息交给 next_agent，并持久化 delta
    pub fn await_reply(next_agent: AgentKind, flow_state: FlowState) -> Self {
        Self {
            active_flow: ActiveFlow::Booking,
            next_agent: Some(next_agent),
            awaiting_user: true,
            flow_state,
        }
    }

    /// 流程结束（如预订成功）：清空流程状态
    pub fn close_flow() -> Self {
        Self {
            active_flow: ActiveFlow::None,
            next_agent: None,
            awaiting_user: false,
            flow_state: FlowState::new(),
        }
    }
}

/// 每个会话一份
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub active_flow: ActiveFlow,
    pub flow_state: FlowState,
    pub is_awaiting_user_response: bool,
    pub next_agent: Option<AgentKind>,
    pub interrupted_flow: Option<InterruptedFlow>,
    pub global_context: GlobalContext,
    pub delegation_chain: Vec<Delegation>,
}

impl SessionState {
    /// 轮次作用域的字段在每轮开始时清空
    pub fn begin_turn(&mut self) {
        self.global_context.clear();
        self.delegation_chain.clear();
    }

    /// 上一轮是否以问题结束，且知道该交给谁
    pub fn has_pending_question(&self) -> bool {
        self.is_awaiting_user_response && self.next_agent.is_some()
    }

    /// 用户放弃了待答问题：非空 flow_state 存入快照，并重置流程字段；返回是否写入了快照
    pub fn interrupt(&mut self, at: DateTime<Utc>) -> bool {
        let flow_state = std::mem::take(&mut self.flow_state);
        let snapshotted = !flow_state.is_empty();
        if snapshotted {
            self.interrupted_flow = Some(InterruptedFlow {
                flow_state,
                interrupted_at: at,
            });
        }
        self.is_awaiting_user_response = false;
        self.next_agent = None;
        self.active_flow = ActiveFlow::None;
        snapshotted
    }

    /// 恢复被打断的流程；没有快照时返回 None
    pub fn resume(&mut self) -> Option<&FlowState> {
        let snapshot = self.interrupted_flow.take()?;
        self.flow_state = snapshot.flow_state;
        self.active_flow = ActiveFlow::Booking;
        self.is_awaiting_user_response = false;
        self.next_agent = None;
        Some(&self.flow_state)
    }

    /// 用户在回答待答问题：取出目标智能体并清除等待标记
    pub fn take_pending(&mut self) -> Option<AgentKind> {
        let target = self.next_agent.take();
        self.is_awaiting_user_response = false;
        target
    }

    /// 把 flow_state 暴露给本轮后续步骤
    pub fn inject_booking_context(&mut self) {
        if self.flow_state.is_empty() {
            self.global_context.remove(BOOKING_CONTEXT_KEY);
        } else {
            self.global_context.insert(
                BOOKING_CONTEXT_KEY.to_string(),
                Value::Object(self.flow_state.clone()),
            );
        }
    }

    /// 应用智能体提议的状态变更
    pub fn apply_context(&mut self, data: &ContextData) {
        match data.active_flow {
            ActiveFlow::None => self.flow_state.clear(),
            ActiveFlow::Booking => {
                if self.active_flow == ActiveFlow::None && self.interrupted_flow.take().is_some() {
                    tracing::info!("new booking flow supersedes interrupted snapshot");
                }
                for (k, v) in &data.flow_state {
                    self.flow_state.insert(k.clone(), v.clone());
                }
            }
        }
        self.active_flow = data.active_flow;
        self.is_awaiting_user_response = data.awaiting_user;
        self.next_agent = if data.awaiting_user {
            data.next_agent
        } else {
            None
        };
        self.inject_booking_context();
    }

    /// 记录一步执行：追加委派链并把工具结果写入 globalContext
    pub fn record_step(&mut self, agent: AgentKind, task: &str, origin: StepOrigin, result: Value) {
        self.delegation_chain.push(Delegation {
            agent,
            task: task.to_string(),
            origin,
        });
        self.global_context.insert(agent.as_str().to_string(), result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn booking_state() -> SessionState {
        let mut state = SessionState::default();
        state.apply_context(&ContextData::await_reply(
            AgentKind::Reservation,
            json!({"date": "2025-08-08", "time": "20:00", "partySize": 2})
                .as_object()
                .cloned()
                .unwrap(),
        ));
        state
    }

    #[test]
    fn test_await_reply_sets_pending() {
        let state = booking_state();
        assert!(state.has_pending_question());
        assert_eq!(state.active_flow, ActiveFlow::Booking);
        assert_eq!(state.global_context[BOOKING_CONTEXT_KEY]["partySize"], json!(2));
    }

    #[test]
    fn test_interrupt_then_resume_round_trip() {
        let mut state = booking_state();
        let before = state.flow_state.clone();

        assert!(state.interrupt(Utc::now()));
        assert!(!state.is_awaiting_user_response);
        assert!(state.next_agent.is_none());
        assert!(state.flow_state.is_empty());
        assert_eq!(state.active_flow, ActiveFlow::None);
        assert_eq!(state.interrupted_flow.as_ref().unwrap().flow_state, before);

        let restored = state.resume().cloned().unwrap();
        assert_eq!(restored, before);
        assert_eq!(state.flow_state, before);
        assert_eq!(state.active_flow, ActiveFlow::Booking);
        assert!(state.interrupted_flow.is_none());
    }

    #[test]
    fn test_interrupt_with_empty_flow_keeps_no_snapshot() {
        let mut state = SessionState {
            is_awaiting_user_response: true,
            next_agent: Some(AgentKind::Menu),
            ..Default::default()
        };
        assert!(!state.interrupt(Utc::now()));
        assert!(state.interrupted_flow.is_none());
        assert!(!state.has_pending_question());
    }

    #[test]
    fn test_new_flow_supersedes_snapshot() {
        let mut state = booking_state();
        state.interrupt(Utc::now());
        state.apply_context(&ContextData::await_reply(AgentKind::Reservation, FlowState::new()));
        assert!(state.interrupted_flow.is_none());
        assert!(state.has_pending_question());
    }

    #[test]
    fn test_close_flow_clears_everything() {
        let mut state = booking_state();
        state.apply_context(&ContextData::close_flow());
        assert_eq!(state.active_flow, ActiveFlow::None);
        assert!(state.flow_state.is_empty());
        assert!(!state.has_pending_question());
        assert!(!state.global_context.contains_key(BOOKING_CONTEXT_KEY));
    }
}
