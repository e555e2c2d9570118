//! 编排器构建器：统一的初始化逻辑
//!
//! 未显式注入的组件按配置创建：LLM 后端、工具注册表与执行器、六个能力智能体、
//! 规划器 / 分类器 / 合成器、时钟与内存会话存储。提示词可用 config/prompts/*.md 覆盖。

use std::sync::Arc;

use crate::agents::{AgentSet, LlmToolSelector, ToolSelector};
use crate::config::AppConfig;
use crate::core::{AgentError, Orchestrator, RecoveryEngine};
use crate::dispatch::{
    Consolidator, FlowClassifier, LlmFlowClassifier, LlmPlanner, LlmSynthesizer, Synthesizer,
    TaskPlanner,
};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::services::Services;
use crate::session::{Clock, MemorySessionStore, SessionStore, SystemClock};
use crate::tools::{builtin_registry, ToolExecutor};

/// 从 config/prompts 读取提示词覆盖
fn load_prompt(name: &str) -> Option<String> {
    [
        format!("config/prompts/{name}.md"),
        format!("../config/prompts/{name}.md"),
    ]
    .into_iter()
    .find_map(|p| std::fs::read_to_string(p).ok())
    .filter(|s| !s.trim().is_empty())
}

pub struct OrchestratorBuilder {
    config: AppConfig,
    services: Option<Services>,
    llm: Option<Arc<dyn LlmClient>>,
    planner: Option<Arc<dyn TaskPlanner>>,
    classifier: Option<Arc<dyn FlowClassifier>>,
    selector: Option<Arc<dyn ToolSelector>>,
    synthesizer: Option<Arc<dyn Synthesizer>>,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn SessionStore>>,
    known_names: Vec<String>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            services: None,
            llm: None,
            planner: None,
            classifier: None,
            selector: None,
            synthesizer: None,
            clock: None,
            store: None,
            known_names: Vec::new(),
        }
    }

    /// 协作服务（必需）
    pub fn with_services(mut self, services: Services) -> Self {
        self.services = Some(services);
        self
    }

    /// 所有默认 LLM 组件共用的推理后端；不设置时按配置创建
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_planner(mut self, planner: Arc<dyn TaskPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FlowClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_tool_selector(mut self, selector: Arc<dyn ToolSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 场馆已知名称（桌型、菜品、套餐），汇总时回复里提到的名称必须出自本轮结果
    pub fn with_known_names(mut self, names: Vec<String>) -> Self {
        self.known_names = names;
        self
    }

    pub fn build(self) -> Result<Orchestrator, AgentError> {
        let Self {
            config,
            services,
            llm,
            planner,
            classifier,
            selector,
            synthesizer,
            clock,
            store,
            known_names,
        } = self;

        let services = services
            .ok_or_else(|| AgentError::ConfigError("collaborator services not configured".to_string()))?;
        if config.dispatch.max_steps_per_turn == 0 {
            return Err(AgentError::ConfigError(
                "dispatch.max_steps_per_turn must be at least 1".to_string(),
            ));
        }

        let llm = llm.unwrap_or_else(|| create_llm_from_config(&config));
        let clock: Arc<dyn Clock> = clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store: Arc<dyn SessionStore> = store.unwrap_or_else(|| {
            Arc::new(MemorySessionStore::new(config.session.ttl_secs, clock.clone()))
        });

        let executor = Arc::new(ToolExecutor::new(
            Arc::new(builtin_registry()),
            services,
            config.dispatch.tool_timeout_secs,
            config.venue.currency.clone(),
        ));

        let selector = selector.unwrap_or_else(|| {
            let mut selector = LlmToolSelector::new(llm.clone());
            if let Some(template) = load_prompt("selector") {
                selector = selector.with_system_template(template);
            }
            Arc::new(selector)
        });
        let planner = planner.unwrap_or_else(|| Arc::new(LlmPlanner::new(llm.clone())));
        let classifier = classifier.unwrap_or_else(|| {
            Arc::new(
                LlmFlowClassifier::new(llm.clone()).with_fast_match(config.dispatch.fast_match),
            )
        });
        let synthesizer = synthesizer.unwrap_or_else(|| {
            let mut synthesizer = LlmSynthesizer::new(llm.clone());
            if let Some(prompt) = load_prompt("narrator") {
                synthesizer = synthesizer.with_system_prompt(prompt);
            }
            Arc::new(synthesizer)
        });

        let agents = AgentSet::builtin(selector, executor);
        tracing::info!(agents = ?agents.kinds(), "orchestrator ready");

        Ok(Orchestrator {
            agents,
            planner,
            classifier,
            consolidator: Consolidator::new(synthesizer).with_vocabulary(known_names),
            store,
            clock,
            recovery: RecoveryEngine::new(),
            history_window: config.app.history_window,
            max_steps_per_turn: config.dispatch.max_steps_per_turn,
        })
    }
}
