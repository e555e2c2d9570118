//! 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 FallbackPlan / AssumeContinuation / Clarify / Apologize 等。
//! 所有错误都在本地恢复，调用方最坏只会看到一条「请重试」回复。

use thiserror::Error;

use crate::services::ServiceError;
use crate::tools::ValidationErrors;

/// 分发过程中可能出现的错误（参数校验、协作服务、规划、分类、汇总、推理）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid tool parameters: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Collaborator failed: {0}")]
    Collaborator(#[from] ServiceError),

    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Consolidation failed: {0}")]
    Consolidation(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("Turn aborted: {0}")]
    TurnPanicked(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 改用确定性的关键词单步计划
    FallbackPlan,
    /// 分类不确定时按「继续当前流程」处理，避免丢失进行中的预订
    AssumeContinuation,
    /// 汇总失败时直接拼接各结果文本
    ConcatenateResults,
    /// 向用户追问（参数不足或越权工具）
    Clarify(String),
    /// 协作服务失败，向用户致歉
    Apologize(String),
    /// 整轮失败，请用户重试
    RetryTurn(String),
}
