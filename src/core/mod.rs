//! 核心编排层：错误与恢复、会话状态、单轮状态机、构建器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod state;

pub use builder::OrchestratorBuilder;
pub use error::{AgentError, RecoveryAction};
pub use orchestrator::{Orchestrator, TurnReply, TurnRoute};
pub use recovery::{RecoveryEngine, RETRY_REPLY};
pub use state::{ActiveFlow, ContextData, FlowState, GlobalContext, InterruptedFlow, SessionState};
