//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供智能体、分类器、汇总器与编排器决定如何降级。

use crate::core::{AgentError, RecoveryAction};
use crate::services::ServiceError;
use crate::tools::ValidationError;

/// 整轮失败时返回给用户的通用回复
pub const RETRY_REPLY: &str =
    "Sorry, something went wrong on our side while handling that. Could you please try again?";

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::Validation(errors) => {
                RecoveryAction::Clarify(clarify_for_validation(errors.as_slice()))
            }
            AgentError::Collaborator(e) => RecoveryAction::Apologize(apology_for(e)),
            AgentError::HallucinatedTool(_) => RecoveryAction::Clarify(
                "Could you tell me a bit more about what you need so I can help?".to_string(),
            ),
            AgentError::Planning(_) | AgentError::JsonParseError(_) => RecoveryAction::FallbackPlan,
            AgentError::Classification(_) => RecoveryAction::AssumeContinuation,
            AgentError::Consolidation(_) => RecoveryAction::ConcatenateResults,
            AgentError::Inference(_) => {
                RecoveryAction::RetryTurn(RETRY_REPLY.to_string())
            }
            AgentError::InvalidSessionId(_)
            | AgentError::TurnPanicked(_)
            | AgentError::ConfigError(_) => RecoveryAction::RetryTurn(RETRY_REPLY.to_string()),
        }
    }
}

/// 把校验错误翻译成面向用户的追问
fn clarify_for_validation(errors: &[ValidationError]) -> String {
    let mut missing: Vec<&str> = Vec::new();
    let mut invalid: Vec<&str> = Vec::new();
    for e in errors {
        match e {
            ValidationError::MissingRequiredParameter { param, .. } => {
                missing.push(human_label(param))
            }
            ValidationError::UnknownTool { .. } | ValidationError::UnknownParameter { .. } => {}
            other => {
                if let Some(param) = other.param() {
                    invalid.push(human_label(param));
                }
            }
        }
    }
    missing.dedup();
    invalid.dedup();

    match (missing.is_empty(), invalid.is_empty()) {
        (false, _) => format!(
            "I just need a few more details to help with that: {}.",
            missing.join(", ")
        ),
        (true, false) => format!(
            "Could you double-check the following: {}?",
            invalid.join(", ")
        ),
        (true, true) => "Could you rephrase that request for me?".to_string(),
    }
}

fn human_label(param: &str) -> &str {
    match param {
        "date" => "the date",
        "time" => "the time",
        "party_size" => "the number of guests",
        "table_type" => "the table type",
        "customer_name" => "your name",
        "customer_email" => "your email address",
        "customer_phone" => "your phone number",
        "occasion" => "the occasion",
        "topic" => "what you'd like to know about",
        "message" => "a short description",
        other => other,
    }
}

fn apology_for(err: &ServiceError) -> String {
    match err {
        ServiceError::NoCapacity => "I'm sorry, we no longer have capacity for that booking. \
             Would you like me to check another time?"
            .to_string(),
        ServiceError::PartyTooLarge { max } => format!(
            "I'm sorry, we can seat at most {max} guests in one booking. \
             For larger groups please contact the restaurant directly."
        ),
        ServiceError::NotFound(_) => {
            "I'm sorry, I couldn't find that information right now.".to_string()
        }
        ServiceError::InvalidRequest(_) => {
            "I'm sorry, I couldn't process those details. Could you check them and try again?"
                .to_string()
        }
        ServiceError::Timeout(_) | ServiceError::Unavailable(_) => {
            "I'm sorry, I couldn't reach our booking system just now. Please try again shortly."
                .to_string()
        }
    }
}
