//! 预订智能体：在可用性查询之后完成预订
//!
//! 以 bookingContext 为基础，合并推理给出的参数与消息中识别到的桌型、姓名、邮箱、电话；
//! 信息齐全才调用 create_reservation，否则用 clarify_and_respond 追问缺少的部分，并把已收集的
//! 细节写入 flowState，使下一轮仍由本智能体接手。预订成功是终止事件。

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::agents::capability::{AgentRequest, Capability, Interpretation, PreparedCall};
use crate::agents::{AgentKind, TerminalEvent, TerminalKind};
use crate::core::state::{ContextData, FlowState};
use crate::tools::catalog::CREATE_RESERVATION;
use crate::tools::{ToolCall, ToolOutcome};

/// flowState 键 <-> create_reservation 参数名
const FIELDS: &[(&str, &str)] = &[
    ("date", "date"),
    ("time", "time"),
    ("partySize", "party_size"),
    ("selectedTableType", "table_type"),
    ("customerName", "customer_name"),
    ("customerEmail", "customer_email"),
    ("customerPhone", "customer_phone"),
    ("specialRequests", "special_requests"),
    ("occasion", "occasion"),
];

/// 由可用性查询确定、不接受推理覆盖的参数
const SLOT_ARGS: &[&str] = &["date", "time", "party_size"];

const CONTACT_ARGS: &[(&str, &str)] = &[
    ("customer_name", "your full name"),
    ("customer_email", "email address"),
    ("customer_phone", "phone number"),
];

pub struct ReservationCapability;

fn flow_key(arg: &str) -> Option<&'static str> {
    FIELDS.iter().find(|(_, a)| *a == arg).map(|(k, _)| *k)
}

fn present(details: &Map<String, Value>, arg: &str) -> bool {
    details
        .get(arg)
        .is_some_and(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.trim().is_empty()))
}

fn table_names(options: &[Value]) -> Vec<String> {
    options
        .iter()
        .filter_map(|o| o.get("tableType").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// 消息中提到的可选桌型
pub fn detect_table_type(message: &str, options: &[Value]) -> Option<String> {
    let lower = message.to_lowercase();
    table_names(options)
        .into_iter()
        .find(|name| lower.contains(&name.to_lowercase()))
}

pub fn detect_email(message: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
    re.find(message).map(|m| m.as_str().to_string())
}

/// 电话号码；日期与时刻先剔除，避免「2025-08-09 20:00」被拼成号码
pub fn detect_phone(message: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    static DATE_TIME: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\+?\d[\d\s().-]{5,}\d").unwrap());
    let date_time = DATE_TIME
        .get_or_init(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}:\d{2}\b").unwrap());
    let stripped = date_time.replace_all(message, ";");
    re.find_iter(&stripped)
        .map(|m| m.as_str().trim())
        .find(|s| (7..=15).contains(&s.chars().filter(char::is_ascii_digit).count()))
        .map(str::to_string)
}

/// 「my name is X」或与邮箱/电话一同给出的「名 姓」片段
pub fn detect_name(message: &str) -> Option<String> {
    static PHRASE: OnceLock<Regex> = OnceLock::new();
    static FULL: OnceLock<Regex> = OnceLock::new();
    let phrase = PHRASE.get_or_init(|| {
        Regex::new(r"(?i:my name is|name is|name:|under the name)\s+(\p{Lu}[\p{L}'-]*(?:\s+\p{Lu}[\p{L}'-]*){0,3})")
            .unwrap()
    });
    let full = FULL.get_or_init(|| Regex::new(r"^\p{Lu}[\p{L}'-]+(?:\s+\p{Lu}[\p{L}'-]+){1,3}$").unwrap());

    if let Some(caps) = phrase.captures(message) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    if detect_email(message).is_none() && detect_phone(message).is_none() {
        return None;
    }
    message
        .split([',', ';', '\n'])
        .map(str::trim)
        .find(|segment| full.is_match(segment))
        .map(str::to_string)
}

/// "a"、"a and b"、"a, b and c"
fn natural_join(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

impl ReservationCapability {
    /// 合并 bookingContext、推理参数与消息识别结果（按 create_reservation 参数名）
    fn collect_details(call: &ToolCall, request: &AgentRequest<'_>) -> Map<String, Value> {
        let booking = request.booking_context();
        let mut details = Map::new();
        if let Some(booking) = booking {
            for (key, arg) in FIELDS {
                if let Some(v) = booking.get(*key).filter(|v| !v.is_null()) {
                    details.insert(arg.to_string(), v.clone());
                }
            }
        }

        if call.tool == CREATE_RESERVATION {
            if let Some(args) = call.args.as_object() {
                for (arg, value) in args {
                    let known = flow_key(arg).is_some();
                    let locked = SLOT_ARGS.contains(&arg.as_str()) && present(&details, arg);
                    if known && !locked && !value.is_null() {
                        details.insert(arg.clone(), value.clone());
                    }
                }
            }
        }

        let message = request.original_message;
        let options = booking
            .and_then(|b| b.get("availableTableTypes"))
            .and_then(Value::as_array);
        if let Some(table) = options.and_then(|o| detect_table_type(message, o)) {
            details.insert("table_type".to_string(), Value::String(table));
        }
        if let Some(email) = detect_email(message) {
            details.insert("customer_email".to_string(), Value::String(email));
        }
        if let Some(phone) = detect_phone(message) {
            details.insert("customer_phone".to_string(), Value::String(phone));
        }
        if let Some(name) = detect_name(message) {
            details.insert("customer_name".to_string(), Value::String(name));
        }
        details
    }
}

impl Capability for ReservationCapability {
    fn kind(&self) -> AgentKind {
        AgentKind::Reservation
    }

    fn tools(&self) -> &'static [&'static str] {
        &[CREATE_RESERVATION]
    }

    fn clarify_message(&self) -> &'static str {
        "To complete your booking I need the date, time, number of guests and your contact details."
    }

    fn prepare(&self, call: ToolCall, request: &AgentRequest<'_>) -> PreparedCall {
        let booking = request.booking_context();
        let mut details = Self::collect_details(&call, request);

        let options: Vec<Value> = booking
            .and_then(|b| b.get("availableTableTypes"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let names = table_names(&options);

        // 选择了不可用的桌型：视为未选择
        let unavailable = details
            .get("table_type")
            .and_then(Value::as_str)
            .is_some_and(|t| !names.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(t)));
        if unavailable {
            details.remove("table_type");
        }

        let mut flow_delta = FlowState::new();
        for (key, arg) in FIELDS {
            if let Some(value) = details.get(*arg) {
                if booking.and_then(|b| b.get(*key)) != Some(value) {
                    flow_delta.insert(key.to_string(), value.clone());
                }
            }
        }

        if SLOT_ARGS.iter().any(|a| !present(&details, a)) {
            return PreparedCall::clarify(
                "Happy to book that for you! Which date and time would you like, and for how many guests? \
                 I'll check availability first.",
                flow_delta,
            );
        }

        if !present(&details, "table_type") {
            let question = if names.is_empty() {
                "Which table type would you like?".to_string()
            } else {
                let listed: Vec<&str> = names.iter().map(String::as_str).collect();
                format!("Which table type would you like: {}?", natural_join(&listed).replace(" and ", " or "))
            };
            return PreparedCall::clarify(question, flow_delta);
        }

        let missing: Vec<&str> = CONTACT_ARGS
            .iter()
            .filter(|(arg, _)| !present(&details, arg))
            .map(|(_, label)| *label)
            .collect();
        if !missing.is_empty() {
            let opener = if flow_delta.contains_key("selectedTableType") {
                "Great choice!"
            } else {
                "Thanks!"
            };
            return PreparedCall::clarify(
                format!(
                    "{opener} To complete your booking I just need {}.",
                    natural_join(&missing)
                ),
                flow_delta,
            );
        }

        let args: Map<String, Value> = details
            .into_iter()
            .filter(|(arg, _)| flow_key(arg).is_some())
            .collect();
        PreparedCall {
            call: ToolCall::new(CREATE_RESERVATION, Value::Object(args)),
            flow_delta,
        }
    }

    fn interpret(
        &self,
        prepared: &PreparedCall,
        outcome: &ToolOutcome,
        _request: &AgentRequest<'_>,
    ) -> Interpretation {
        if outcome.tool == CREATE_RESERVATION && outcome.success {
            return Interpretation {
                context_data: Some(ContextData::close_flow()),
                terminal: Some(TerminalEvent {
                    kind: TerminalKind::ReservationCreated,
                    payload: outcome.data.get("reservation").cloned().unwrap_or(Value::Null),
                }),
            };
        }
        if outcome.is_clarification() {
            return Interpretation {
                context_data: Some(ContextData::await_reply(
                    AgentKind::Reservation,
                    prepared.flow_delta.clone(),
                )),
                terminal: None,
            };
        }
        Interpretation::default()
    }

    /// 失败后仍由本智能体接手，丢弃被拒绝的字段以便用户重新提供
    fn on_failure(
        &self,
        prepared: &PreparedCall,
        invalid: &[&str],
        _request: &AgentRequest<'_>,
    ) -> Option<ContextData> {
        let mut delta = prepared.flow_delta.clone();
        for arg in invalid {
            if let Some(key) = flow_key(arg) {
                delta.remove(key);
            }
        }
        Some(ContextData::await_reply(AgentKind::Reservation, delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{GlobalContext, BOOKING_CONTEXT_KEY};
    use crate::tools::catalog::CLARIFY_AND_RESPOND;
    use chrono::NaiveDate;
    use serde_json::json;

    fn booking() -> GlobalContext {
        let mut context = GlobalContext::new();
        context.insert(
            BOOKING_CONTEXT_KEY.into(),
            json!({
                "date": "2025-08-08", "time": "20:00", "partySize": 4,
                "restaurantId": "demo-bistro",
                "availableTableTypes": [
                    {"tableType": "standard", "price": 0.0, "capacity": 4},
                    {"tableType": "booth", "price": 15.0, "capacity": 6}
                ]
            }),
        );
        context
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

    fn clarify_text(prepared: &PreparedCall) -> &str {
        prepared.call.str_arg("message").unwrap_or_default()
    }

    #[test]
    fn test_table_choice_then_asks_contact_details() {
        let context = booking();
        let call = ToolCall::new(CLARIFY_AND_RESPOND, json!({"message": "ok"}));
        let prepared = ReservationCapability.prepare(call, &request("standard table", &context));
        assert!(prepared.is_clarification());
        assert_eq!(
            clarify_text(&prepared),
            "Great choice! To complete your booking I just need your full name, email address and phone number."
        );
        assert_eq!(prepared.flow_delta, json!({"selectedTableType": "standard"}).as_object().cloned().unwrap());
    }

    #[test]
    fn test_complete_details_create_reservation() {
        let mut context = booking();
        context[BOOKING_CONTEXT_KEY]["selectedTableType"] = json!("booth");
        let call = ToolCall::new(
            CREATE_RESERVATION,
            json!({"date": "2030-01-01", "customer_name": "Ana Silva"}),
        );
        let prepared = ReservationCapability.prepare(
            call,
            &request("ana@example.com, +351 912 345 678", &context),
        );
        assert_eq!(prepared.call.tool, CREATE_RESERVATION);
        assert_eq!(prepared.call.args["date"], json!("2025-08-08"));
        assert_eq!(prepared.call.args["table_type"], json!("booth"));
        assert_eq!(prepared.call.args["customer_phone"], json!("+351 912 345 678"));
        assert_eq!(prepared.call.args["customer_name"], json!("Ana Silva"));
    }

    #[test]
    fn test_unavailable_table_is_asked_again() {
        let context = booking();
        let call = ToolCall::new(CREATE_RESERVATION, json!({"table_type": "window"}));
        let prepared = ReservationCapability.prepare(call, &request("window please", &context));
        assert_eq!(clarify_text(&prepared), "Which table type would you like: standard or booth?");
    }

    #[test]
    fn test_without_context_asks_for_slot() {
        let context = GlobalContext::new();
        let call = ToolCall::new(CLARIFY_AND_RESPOND, json!({"message": "?"}));
        let prepared = ReservationCapability.prepare(call, &request("book me in", &context));
        assert!(clarify_text(&prepared).contains("I'll check availability first"));
    }

    #[test]
    fn test_contact_detection() {
        assert_eq!(detect_email("reach me at ana@example.com please").as_deref(), Some("ana@example.com"));
        assert_eq!(detect_phone("on 2025-08-08 at 20:00"), None);
        assert_eq!(detect_phone("call 912 345 678").as_deref(), Some("912 345 678"));
        assert_eq!(detect_phone("booth please, on 2025-08-09 20:00"), None);
        assert_eq!(detect_phone("2025-08-09 20:00, 4 people"), None);
        assert_eq!(
            detect_phone("2025-08-09 at 20:00, Ana Silva, +351 912 345 678").as_deref(),
            Some("+351 912 345 678")
        );
        assert_eq!(detect_name("my name is Ana Silva").as_deref(), Some("Ana Silva"));
        assert_eq!(detect_name("Ana Silva, ana@example.com").as_deref(), Some("Ana Silva"));
        assert_eq!(detect_name("Standard Table"), None);
    }

    #[test]
    fn test_success_is_terminal_and_closes_flow() {
        let context = booking();
        let prepared = PreparedCall::new(ToolCall::new(CREATE_RESERVATION, json!({})));
        let outcome = ToolOutcome::ok(
            CREATE_RESERVATION,
            "Your reservation is confirmed!",
            json!({"reservation": {"reservationId": "R-12345678"}}),
        );
        let interpretation = ReservationCapability.interpret(&prepared, &outcome, &request("x", &context));
        let event = interpretation.terminal.unwrap();
        assert_eq!(event.kind, TerminalKind::ReservationCreated);
        assert_eq!(event.payload["reservationId"], json!("R-12345678"));
        assert_eq!(interpretation.context_data, Some(ContextData::close_flow()));
    }

    #[test]
    fn test_failure_drops_rejected_fields() {
        let context = booking();
        let mut delta = FlowState::new();
        delta.insert("customerEmail".into(), json!("not-an-email"));
        delta.insert("customerName".into(), json!("Ana"));
        let prepared = PreparedCall {
            call: ToolCall::new(CREATE_RESERVATION, json!({})),
            flow_delta: delta,
        };
        let data = ReservationCapability
            .on_failure(&prepared, &["customer_email"], &request("x", &context))
            .unwrap();
        assert!(data.awaiting_user);
        assert!(!data.flow_state.contains_key("customerEmail"));
        assert_eq!(data.flow_state["customerName"], json!("Ana"));
    }
}
