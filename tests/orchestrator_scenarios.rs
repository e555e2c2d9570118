//! 编排器集成测试：用确定性的规划器 / 分类器 / 选择器 / 合成器驱动完整的多轮对话

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use concierge::agents::{AgentKind, SelectionRequest, TerminalKind, ToolSelector};
use concierge::config::AppConfig;
use concierge::core::state::{ActiveFlow, FlowState, SessionState, BOOKING_CONTEXT_KEY};
use concierge::core::{AgentError, Orchestrator, OrchestratorBuilder, TurnReply, TurnRoute, RETRY_REPLY};
use concierge::dispatch::{
    fallback_plan, ExecutionPlan, FlowClassifier, PlanStep, StepOrigin, Synthesizer, TaskPlanner,
};
use concierge::memory::Message;
use concierge::services::{InMemoryVenue, Services};
use concierge::session::{ManualClock, SessionId, SessionStore};
use concierge::tools::ToolCall;

const RESTAURANT: &str = "demo-bistro";
const MULTI_INTENT: &str = "What time do you close on Saturdays, and are your lamb chops gluten-free?";

/// 多意图消息拆成 信息 + 菜单，其余走关键词计划
struct StubPlanner;

#[async_trait]
impl TaskPlanner for StubPlanner {
    async fn plan(&self, message: &str, _history: &[Message]) -> ExecutionPlan {
        if message == MULTI_INTENT {
            return ExecutionPlan::new(
                vec![
                    PlanStep {
                        ordinal: 1,
                        agent: AgentKind::Info,
                        sub_task: "What time do you close on Saturdays?".into(),
                    },
                    PlanStep {
                        ordinal: 2,
                        agent: AgentKind::Menu,
                        sub_task: "Are the lamb chops gluten-free?".into(),
                    },
                ],
                StepOrigin::Planned,
            );
        }
        fallback_plan(message)
    }
}

/// 提到营业时间即打断；提到 continue 即恢复
struct StubClassifier;

#[async_trait]
impl FlowClassifier for StubClassifier {
    async fn is_interruption(
        &self,
        message: &str,
        _pending: AgentKind,
        _flow_state: &FlowState,
        _history: &[Message],
    ) -> Result<bool, AgentError> {
        Ok(message.contains("opening hours"))
    }

    async fn is_resume(
        &self,
        message: &str,
        _snapshot: &FlowState,
        _history: &[Message],
    ) -> Result<bool, AgentError> {
        Ok(message.contains("continue"))
    }
}

/// 按智能体返回固定决策，并记录每次看到的 bookingContext
#[derive(Default)]
struct RecordingSelector {
    seen: Mutex<Vec<(AgentKind, Option<Value>)>>,
}

impl RecordingSelector {
    fn booking_context_for(&self, agent: AgentKind) -> Option<Value> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(a, _)| *a == agent)
            .and_then(|(_, ctx)| ctx.clone())
    }
}

#[async_trait]
impl ToolSelector for RecordingSelector {
    async fn select(&self, request: &SelectionRequest<'_>) -> Result<ToolCall, AgentError> {
        self.seen.lock().unwrap().push((
            request.agent,
            request.global_context.get(BOOKING_CONTEXT_KEY).cloned(),
        ));
        let call = match request.agent {
            AgentKind::Availability => ToolCall::new(
                "check_availability",
                json!({"date": "tomorrow", "time": "8pm", "party_size": "4"}),
            ),
            AgentKind::Info => ToolCall::new("get_restaurant_info", json!({"topic": "hours"})),
            AgentKind::Menu => ToolCall::new(
                "get_menu",
                json!({"query": "lamb chops", "dietary": "gluten_free"}),
            ),
            _ => ToolCall::new(
                "clarify_and_respond",
                json!({"message": "Could you tell me a bit more?"}),
            ),
        };
        Ok(call)
    }
}

struct PanickingSelector;

#[async_trait]
impl ToolSelector for PanickingSelector {
    async fn select(&self, _request: &SelectionRequest<'_>) -> Result<ToolCall, AgentError> {
        panic!("selector exploded");
    }
}

struct StubSynthesizer {
    reply: String,
    digests: Mutex<Vec<String>>,
}

impl StubSynthesizer {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            digests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Synthesizer for StubSynthesizer {
    async fn synthesize(
        &self,
        _original_message: &str,
        digest: &str,
        _history: &[Message],
    ) -> Result<String, AgentError> {
        self.digests.lock().unwrap().push(digest.to_string());
        Ok(self.reply.clone())
    }
}

struct Harness {
    orchestrator: Orchestrator,
    store: Arc<dyn SessionStore>,
    selector: Arc<RecordingSelector>,
    synthesizer: Arc<StubSynthesizer>,
    venue: Arc<InMemoryVenue>,
    session: SessionId,
    history: Vec<Message>,
}

impl Harness {
    fn new(narration: &str) -> Self {
        Self::with_selector(narration, None)
    }

    fn with_selector(narration: &str, selector_override: Option<Arc<dyn ToolSelector>>) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 8, 7, 12, 0, 0).unwrap(),
        ));
        let venue = Arc::new(InMemoryVenue::demo(RESTAURANT));
        let selector = Arc::new(RecordingSelector::default());
        let synthesizer = Arc::new(StubSynthesizer::new(narration));
        let orchestrator = OrchestratorBuilder::new(AppConfig::default())
            .with_services(Services::from_venue(venue.clone()))
            .with_known_names(venue.catalog_names())
            .with_planner(Arc::new(StubPlanner))
            .with_classifier(Arc::new(StubClassifier))
            .with_tool_selector(selector_override.unwrap_or_else(|| selector.clone() as Arc<dyn ToolSelector>))
            .with_synthesizer(synthesizer.clone())
            .with_clock(clock)
            .build()
            .unwrap();
        Self {
            store: orchestrator.session_store(),
            orchestrator,
            selector,
            synthesizer,
            venue,
            session: SessionId::parse("session_test").unwrap(),
            history: Vec::new(),
        }
    }

    async fn send(&mut self, message: &str) -> TurnReply {
        let turn = self
            .orchestrator
            .handle_message(&self.session, message, &self.history, RESTAURANT)
            .await;
        self.history.push(Message::user(message));
        self.history.push(Message::assistant(turn.reply.clone()));
        turn
    }

    async fn state(&self) -> SessionState {
        self.store.snapshot(&self.session).await.unwrap_or_default()
    }

    async fn seed(&self, state: SessionState) {
        self.store.checkout(&self.session).await.commit(state);
    }
}

fn stored_flow() -> FlowState {
    json!({"date": "2025-08-08", "time": "20:00", "partySize": 2})
        .as_object()
        .cloned()
        .unwrap()
}

fn awaiting_reservation() -> SessionState {
    SessionState {
        active_flow: ActiveFlow::Booking,
        flow_state: stored_flow(),
        is_awaiting_user_response: true,
        next_agent: Some(AgentKind::Reservation),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_availability_check_opens_booking_flow() {
    let mut h = Harness::new("unused");
    let turn = h.send("Check availability for tomorrow at 8pm for 4 people").await;

    assert_eq!(turn.route, Some(TurnRoute::FreshPlan));
    assert!(turn.terminal_event.is_none());
    assert!(turn.reply.contains("standard"));
    assert!(turn.reply.contains("booth"));

    let state = h.state().await;
    assert!(state.is_awaiting_user_response);
    assert_eq!(state.next_agent, Some(AgentKind::Reservation));
    assert_eq!(state.active_flow, ActiveFlow::Booking);
    assert_eq!(state.flow_state["date"], json!("2025-08-08"));
    assert_eq!(state.flow_state["time"], json!("20:00"));
    assert_eq!(state.flow_state["partySize"], json!(4));
    let types: Vec<&str> = state.flow_state["availableTableTypes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["tableType"].as_str())
        .collect();
    assert_eq!(types, vec!["standard", "booth"]);
    assert_eq!(state.delegation_chain.len(), 1);
    assert_eq!(state.delegation_chain[0].agent, AgentKind::Availability);
}

#[tokio::test]
async fn test_booking_survives_interruption_and_resume() {
    let mut h = Harness::new("unused");
    h.send("Check availability for tomorrow at 8pm for 4 people").await;

    // 选择桌型：直接交给预订智能体，追问联系方式
    let turn = h.send("standard table").await;
    assert_eq!(
        turn.route,
        Some(TurnRoute::Continuation {
            target: AgentKind::Reservation
        })
    );
    assert!(turn.reply.contains("full name"));
    assert!(turn.reply.contains("email"));
    assert!(turn.reply.contains("phone"));
    let pending = h.state().await;
    assert!(pending.has_pending_question());
    assert_eq!(pending.next_agent, Some(AgentKind::Reservation));
    assert_eq!(pending.flow_state["selectedTableType"], json!("standard"));
    let before_interruption = pending.flow_state.clone();

    // 打断：快照流程，只回答营业时间
    let turn = h.send("hello, what are your opening hours?").await;
    assert_eq!(turn.route, Some(TurnRoute::Interrupted));
    assert!(turn.reply.contains("12:00-23:00"));
    assert!(!turn.reply.contains("booking"));
    let interrupted = h.state().await;
    assert_eq!(
        interrupted.interrupted_flow.as_ref().unwrap().flow_state,
        before_interruption
    );
    assert!(interrupted.flow_state.is_empty());
    assert_eq!(interrupted.active_flow, ActiveFlow::None);
    assert!(!interrupted.is_awaiting_user_response);
    assert!(interrupted.next_agent.is_none());

    // 恢复：预订智能体拿到完整上下文
    let turn = h.send("let's continue the reservation").await;
    assert_eq!(turn.route, Some(TurnRoute::ResumeDetected));
    assert!(turn.reply.contains("full name"));
    assert_eq!(
        h.selector.booking_context_for(AgentKind::Reservation),
        Some(Value::Object(before_interruption.clone()))
    );
    let resumed = h.state().await;
    assert_eq!(resumed.flow_state, before_interruption);
    assert!(resumed.interrupted_flow.is_none());
    assert_eq!(resumed.next_agent, Some(AgentKind::Reservation));

    // 联系方式齐全：创建预订，终止事件直接返回
    let turn = h.send("Ana Silva, ana@example.com, +351 912 345 678").await;
    let event = turn.terminal_event.expect("reservation should be created");
    assert_eq!(event.kind, TerminalKind::ReservationCreated);
    assert_eq!(event.payload["tableType"], json!("standard"));
    assert_eq!(event.payload["partySize"], json!(4));
    assert_eq!(event.payload["customerName"], json!("Ana Silva"));
    assert!(turn.reply.contains("confirmed"));

    let done = h.state().await;
    assert_eq!(done.active_flow, ActiveFlow::None);
    assert!(done.flow_state.is_empty());
    assert!(!done.has_pending_question());
    assert_eq!(h.venue.reservations().await.len(), 1);
    assert!(h.synthesizer.digests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_continuation_injects_stored_flow() {
    let mut h = Harness::new("unused");
    h.seed(awaiting_reservation()).await;

    let turn = h.send("standard table").await;
    assert_eq!(
        turn.route,
        Some(TurnRoute::Continuation {
            target: AgentKind::Reservation
        })
    );
    let state = h.state().await;
    assert_eq!(state.delegation_chain.len(), 1);
    assert_eq!(state.delegation_chain[0].agent, AgentKind::Reservation);
    assert_eq!(state.delegation_chain[0].origin, StepOrigin::Continuation);
    assert_eq!(
        h.selector.booking_context_for(AgentKind::Reservation),
        Some(Value::Object(stored_flow()))
    );
}

#[tokio::test]
async fn test_interruption_snapshot_round_trip() {
    let mut h = Harness::new("unused");
    h.seed(awaiting_reservation()).await;

    h.send("what are your opening hours?").await;
    let state = h.state().await;
    assert_eq!(state.interrupted_flow.as_ref().unwrap().flow_state, stored_flow());
    assert!(state.flow_state.is_empty());
    assert_eq!(state.active_flow, ActiveFlow::None);
    assert!(state.next_agent.is_none());
    assert!(!state.is_awaiting_user_response);

    let turn = h.send("let's continue the reservation").await;
    assert_eq!(turn.route, Some(TurnRoute::ResumeDetected));
    let state = h.state().await;
    assert_eq!(state.flow_state, stored_flow());
    assert!(state.interrupted_flow.is_none());
}

#[tokio::test]
async fn test_multi_intent_is_consolidated() {
    let narration = "On Saturdays we're open until 23:00, and yes, our Lamb Chops (€28.00) are gluten-free.";
    let mut h = Harness::new(narration);
    let turn = h.send(MULTI_INTENT).await;

    assert_eq!(turn.route, Some(TurnRoute::FreshPlan));
    assert_eq!(turn.reply, narration);

    let state = h.state().await;
    let agents: Vec<AgentKind> = state.delegation_chain.iter().map(|d| d.agent).collect();
    assert_eq!(agents, vec![AgentKind::Info, AgentKind::Menu]);
    assert!(state.global_context.contains_key("info-agent"));
    assert!(state.global_context.contains_key("menu-agent"));

    let digests = h.synthesizer.digests.lock().unwrap();
    assert_eq!(digests.len(), 1);
    assert!(digests[0].contains("12:00-23:00"));
    assert!(digests[0].contains("Lamb Chops"));
}

#[tokio::test]
async fn test_ungrounded_narration_is_replaced() {
    let mut h = Harness::new("Lamb chops are just €9.99 tonight and a booth is waiting for you!");
    let turn = h.send(MULTI_INTENT).await;

    assert!(!turn.reply.contains("9.99"));
    assert!(turn.reply.contains("12:00-23:00"));
    assert!(turn.reply.contains("Lamb Chops"));
    assert!(turn.reply.contains("\n\n"));
}

#[tokio::test]
async fn test_narration_naming_an_unreturned_dish_is_replaced() {
    let mut h = Harness::new("We're open until 23:00 on Saturdays, and the Seared Salmon is gluten-free too.");
    let turn = h.send(MULTI_INTENT).await;

    assert!(!turn.reply.contains("Seared Salmon"));
    assert!(turn.reply.contains("Lamb Chops"));
    assert!(turn.reply.contains("\n\n"));
}

#[tokio::test]
async fn test_single_result_reply_is_passthrough() {
    let mut h = Harness::new("unused");
    let turn = h.send("what are your opening hours?").await;
    assert_eq!(
        turn.reply,
        "Monday to Thursday 12:00-22:00, Friday and Saturday 12:00-23:00, Sunday 12:00-21:00."
    );
    assert!(h.synthesizer.digests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_turn_keeps_last_good_state() {
    let h = Harness::with_selector("unused", Some(Arc::new(PanickingSelector)));
    h.seed(awaiting_reservation()).await;
    let before = h.state().await;

    let turn = h
        .orchestrator
        .handle_message(&h.session, "standard table", &[], RESTAURANT)
        .await;
    assert_eq!(turn.reply, RETRY_REPLY);
    assert!(turn.route.is_none());
    assert_eq!(h.state().await, before);
}

#[tokio::test]
async fn test_collaborator_outage_apologises() {
    let mut h = Harness::new("unused");
    h.venue.set_offline(true);
    let turn = h.send("Check availability for tomorrow at 8pm for 4 people").await;
    assert!(turn.reply.to_lowercase().contains("sorry"));
    assert!(turn.terminal_event.is_none());
    assert!(!h.state().await.has_pending_question());
}

#[tokio::test]
async fn test_sessions_do_not_share_state() {
    let h = Harness::new("unused");
    let other = SessionId::parse("session_other").unwrap();
    h.orchestrator
        .handle_message(&h.session, "Check availability for tomorrow at 8pm for 4 people", &[], RESTAURANT)
        .await;
    assert!(h.state().await.has_pending_question());
    assert!(h.store.snapshot(&other).await.is_none());
}

#[tokio::test]
async fn test_blank_session_id_is_rejected() {
    let h = Harness::new("unused");
    let result = h
        .orchestrator
        .handle_incoming("   ", "hello", &[], RESTAURANT)
        .await;
    assert!(matches!(result, Err(AgentError::InvalidSessionId(_))));
}
