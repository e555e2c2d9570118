//! 分发层：规划、流程分类、结果汇总，以及单轮工作队列

pub mod classifier;
pub mod narrator;
pub mod plan;
pub mod planner;

pub use classifier::{fast_continuation, fast_resume, FlowClassifier, LlmFlowClassifier};
pub use narrator::{build_digest, concatenate, is_grounded, Consolidator, LlmSynthesizer, Synthesizer, EMPTY_REPLY};
pub use plan::{ExecutionPlan, PlanStep, StepOrigin, WorkItem, WorkQueue};
pub use planner::{fallback_plan, parse_plan, LlmPlanner, TaskPlanner};
