//! 信息智能体：营业时间、地址、停车、联系方式与餐厅政策

use serde_json::Value;

use crate::agents::capability::{AgentRequest, Capability, PreparedCall};
use crate::agents::AgentKind;
use crate::tools::catalog::GET_RESTAURANT_INFO;
use crate::tools::ToolCall;

pub struct InfoCapability;

impl Capability for InfoCapability {
    fn kind(&self) -> AgentKind {
        AgentKind::Info
    }

    fn tools(&self) -> &'static [&'static str] {
        &[GET_RESTAURANT_INFO]
    }

    fn clarify_message(&self) -> &'static str {
        "What would you like to know about the restaurant? For example our opening hours, location or parking."
    }

    /// 把客人的原话作为 query 传给信息查询
    fn prepare(&self, mut call: ToolCall, request: &AgentRequest<'_>) -> PreparedCall {
        if call.tool == GET_RESTAURANT_INFO {
            let args = call.args_mut();
            if args.get("query").map_or(true, Value::is_null) {
                args.insert("query".to_string(), Value::String(request.task.to_string()));
            }
        }
        PreparedCall::new(call)
    }
}
