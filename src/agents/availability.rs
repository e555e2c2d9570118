//! 可用性智能体：查询空桌；有可选桌型时进入预订流程，把下一条消息交给预订智能体

use serde_json::{json, Value};

use crate::agents::capability::{AgentRequest, Capability, Interpretation, PreparedCall};
use crate::agents::AgentKind;
use crate::core::state::{ContextData, FlowState};
use crate::tools::catalog::CHECK_AVAILABILITY;
use crate::tools::{ToolCall, ToolOutcome};

/// flowState 键 -> 工具参数名
const CONTEXT_ARGS: &[(&str, &str)] = &[
    ("date", "date"),
    ("time", "time"),
    ("partySize", "party_size"),
];

pub struct AvailabilityCapability;

impl AvailabilityCapability {
    /// 已知的日期/时间/人数（来自调用参数）
    fn known_details(call: &ToolCall) -> FlowState {
        CONTEXT_ARGS
            .iter()
            .filter_map(|(key, arg)| {
                call.args
                    .get(*arg)
                    .filter(|v| !v.is_null())
                    .map(|v| (key.to_string(), v.clone()))
            })
            .collect()
    }
}

impl Capability for AvailabilityCapability {
    fn kind(&self) -> AgentKind {
        AgentKind::Availability
    }

    fn tools(&self) -> &'static [&'static str] {
        &[CHECK_AVAILABILITY]
    }

    fn clarify_message(&self) -> &'static str {
        "I'd be happy to check availability. Which date and time would you like, and for how many guests?"
    }

    fn prepare(&self, mut call: ToolCall, request: &AgentRequest<'_>) -> PreparedCall {
        if call.tool != CHECK_AVAILABILITY {
            return PreparedCall::new(call);
        }
        if let Some(booking) = request.booking_context() {
            let args = call.args_mut();
            for (key, arg) in CONTEXT_ARGS {
                let missing = args.get(*arg).map_or(true, Value::is_null);
                if let (true, Some(value)) = (missing, booking.get(*key)) {
                    args.insert(arg.to_string(), value.clone());
                }
            }
        }
        let flow_delta = Self::known_details(&call);
        PreparedCall { call, flow_delta }
    }

    fn interpret(
        &self,
        prepared: &PreparedCall,
        outcome: &ToolOutcome,
        request: &AgentRequest<'_>,
    ) -> Interpretation {
        if outcome.is_clarification() {
            // 缺少查询条件：保留已知部分，下一条消息回到本智能体
            return Interpretation {
                context_data: Some(ContextData::await_reply(
                    AgentKind::Availability,
                    prepared.flow_delta.clone(),
                )),
                terminal: None,
            };
        }

        let options = outcome.data.get("availableTableTypes").cloned().unwrap_or(json!([]));
        let has_options = options.as_array().is_some_and(|a| !a.is_empty());
        if !outcome.success || !has_options {
            return Interpretation::default();
        }

        let mut flow_state = FlowState::new();
        for key in ["date", "time", "partySize"] {
            if let Some(v) = outcome.data.get(key) {
                flow_state.insert(key.to_string(), v.clone());
            }
        }
        flow_state.insert("availableTableTypes".to_string(), options);
        flow_state.insert("restaurantId".to_string(), json!(request.restaurant_id));

        Interpretation {
            context_data: Some(ContextData::await_reply(AgentKind::Reservation, flow_state)),
            terminal: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{GlobalContext, BOOKING_CONTEXT_KEY};
    use chrono::NaiveDate;

    fn request<'a>(context: &'a GlobalContext) -> AgentRequest<'a> {
        AgentRequest {
            original_message: "and for 6 people?",
            task: "check availability for 6 people",
            history: &[],
            restaurant_id: "demo-bistro",
            global_context: context,
            today: NaiveDate::from_ymd_opt(2025, 8, 7).unwrap(),
        }
    }

    #[test]
    fn test_prepare_fills_from_booking_context() {
        let mut context = GlobalContext::new();
        context.insert(
            BOOKING_CONTEXT_KEY.into(),
            json!({"date": "2025-08-08", "time": "20:00", "partySize": 4}),
        );
        let call = ToolCall::new(CHECK_AVAILABILITY, json!({"party_size": 6}));
        let prepared = AvailabilityCapability.prepare(call, &request(&context));
        assert_eq!(
            prepared.call.args,
            json!({"date": "2025-08-08", "time": "20:00", "party_size": 6})
        );
        assert_eq!(prepared.flow_delta["partySize"], json!(6));
    }

    #[test]
    fn test_interpret_hands_next_turn_to_reservation() {
        let context = GlobalContext::new();
        let prepared = PreparedCall::new(ToolCall::new(CHECK_AVAILABILITY, json!({})));
        let outcome = ToolOutcome::ok(
            CHECK_AVAILABILITY,
            "For 4 guests...",
            json!({
                "date": "2025-08-08", "time": "20:00", "partySize": 4,
                "availableTableTypes": [{"tableType": "standard", "price": 0.0, "capacity": 4}]
            }),
        );
        let interpretation = AvailabilityCapability.interpret(&prepared, &outcome, &request(&context));
        let data = interpretation.context_data.unwrap();
        assert!(data.awaiting_user);
        assert_eq!(data.next_agent, Some(AgentKind::Reservation));
        assert_eq!(data.flow_state["restaurantId"], json!("demo-bistro"));
        assert_eq!(data.flow_state["time"], json!("20:00"));
    }

    #[test]
    fn test_no_tables_means_no_flow() {
        let context = GlobalContext::new();
        let prepared = PreparedCall::new(ToolCall::new(CHECK_AVAILABILITY, json!({})));
        let outcome = ToolOutcome::ok(
            CHECK_AVAILABILITY,
            "Unfortunately...",
            json!({"availableTableTypes": []}),
        );
        let interpretation = AvailabilityCapability.interpret(&prepared, &outcome, &request(&context));
        assert!(interpretation.context_data.is_none());
    }
}
