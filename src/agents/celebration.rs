//! 庆祝智能体：生日、纪念日等场合的套餐与附加服务

use serde_json::Value;

use crate::agents::capability::{AgentRequest, Capability, PreparedCall};
use crate::agents::AgentKind;
use crate::tools::catalog::GET_CELEBRATION_OPTIONS;
use crate::tools::ToolCall;

pub struct CelebrationCapability;

impl Capability for CelebrationCapability {
    fn kind(&self) -> AgentKind {
        AgentKind::Celebration
    }

    fn tools(&self) -> &'static [&'static str] {
        &[GET_CELEBRATION_OPTIONS]
    }

    fn clarify_message(&self) -> &'static str {
        "How lovely! What are you celebrating, a birthday, an anniversary or something else?"
    }

    /// 预订流程中已知人数时带上，用于筛选套餐
    fn prepare(&self, mut call: ToolCall, request: &AgentRequest<'_>) -> PreparedCall {
        if call.tool == GET_CELEBRATION_OPTIONS {
            let party_size = request
                .booking_context()
                .and_then(|b| b.get("partySize"))
                .filter(|v| v.is_i64() || v.is_u64())
                .cloned();
            let args = call.args_mut();
            if let (true, Some(size)) = (args.get("party_size").map_or(true, Value::is_null), party_size) {
                args.insert("party_size".to_string(), size);
            }
        }
        PreparedCall::new(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{GlobalContext, BOOKING_CONTEXT_KEY};
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_party_size_taken_from_booking() {
        let mut context = GlobalContext::new();
        context.insert(BOOKING_CONTEXT_KEY.into(), json!({"partySize": 4}));
        let request = AgentRequest {
            original_message: "it's her birthday",
            task: "birthday options",
            history: &[],
            restaurant_id: "demo-bistro",
            global_context: &context,
            today: NaiveDate::from_ymd_opt(2025, 8, 7).unwrap(),
        };
        let call = ToolCall::new(GET_CELEBRATION_OPTIONS, json!({"occasion": "birthday"}));
        let prepared = CelebrationCapability.prepare(call, &request);
        assert_eq!(prepared.call.args["party_size"], json!(4));
    }
}
