//! 能力智能体层
//!
//! 六个能力（可用性、菜单、信息、庆祝、预订、客服）共用同一个 Think → Guard → Act 循环，
//! 各自只声明允许的工具与领域化的参数准备、结果解读。

pub mod availability;
pub mod capability;
pub mod celebration;
pub mod handoff;
pub mod info;
pub mod kind;
pub mod menu;
pub mod normalize;
pub mod reservation;
pub mod result;
pub mod selector;
pub mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

pub use availability::AvailabilityCapability;
pub use capability::{AgentRequest, Capability, CapabilityAgent, Interpretation, PreparedCall};
pub use celebration::CelebrationCapability;
pub use info::InfoCapability;
pub use kind::AgentKind;
pub use menu::MenuCapability;
pub use reservation::ReservationCapability;
pub use result::{AgentResult, AgentStatus, FailureKind, Handoff, TerminalEvent, TerminalKind};
pub use selector::{parse_tool_decision, LlmToolSelector, SelectionRequest, ToolSelector};
pub use support::SupportCapability;

use crate::tools::ToolExecutor;

/// 全部内置能力
pub fn builtin_capabilities() -> Vec<Box<dyn Capability>> {
    vec![
        Box::new(AvailabilityCapability),
        Box::new(MenuCapability),
        Box::new(InfoCapability),
        Box::new(CelebrationCapability),
        Box::new(ReservationCapability),
        Box::new(SupportCapability),
    ]
}

/// 按名称索引的智能体集合
#[derive(Default)]
pub struct AgentSet {
    agents: BTreeMap<AgentKind, CapabilityAgent>,
}

impl AgentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用同一个选择器与执行器构建全部内置智能体
    pub fn builtin(selector: Arc<dyn ToolSelector>, executor: Arc<ToolExecutor>) -> Self {
        let mut set = Self::new();
        for capability in builtin_capabilities() {
            set.insert(CapabilityAgent::new(capability, selector.clone(), executor.clone()));
        }
        set
    }

    pub fn insert(&mut self, agent: CapabilityAgent) {
        self.agents.insert(agent.kind(), agent);
    }

    pub fn get(&self, kind: AgentKind) -> Option<&CapabilityAgent> {
        self.agents.get(&kind)
    }

    pub fn kinds(&self) -> Vec<AgentKind> {
        self.agents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
