//! 客服智能体：取消、修改、投诉、退款及其它无法归类的请求

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::agents::capability::{AgentRequest, Capability, PreparedCall};
use crate::agents::AgentKind;
use crate::tools::catalog::HANDLE_SUPPORT;
use crate::tools::ToolCall;

pub struct SupportCapability;

/// 消息中的预订编号（R-xxxxxxxx）
fn reservation_reference(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\b[Rr]-[0-9A-Za-z]{6,}\b").unwrap());
    re.find(text)
        .map(|m| format!("R-{}", m.as_str()[2..].to_lowercase()))
}

impl Capability for SupportCapability {
    fn kind(&self) -> AgentKind {
        AgentKind::Support
    }

    fn tools(&self) -> &'static [&'static str] {
        &[HANDLE_SUPPORT]
    }

    fn clarify_message(&self) -> &'static str {
        "I'm sorry to hear that. Could you tell me a bit more about what you need help with?"
    }

    fn prepare(&self, mut call: ToolCall, request: &AgentRequest<'_>) -> PreparedCall {
        if call.tool == HANDLE_SUPPORT {
            let reference = reservation_reference(request.original_message);
            let args = call.args_mut();
            if args.get("message").map_or(true, Value::is_null) {
                args.insert(
                    "message".to_string(),
                    Value::String(request.original_message.to_string()),
                );
            }
            if let (true, Some(reference)) =
                (args.get("reservation_id").map_or(true, Value::is_null), reference)
            {
                args.insert("reservation_id".to_string(), Value::String(reference));
            }
        }
        PreparedCall::new(call)
    }
}
