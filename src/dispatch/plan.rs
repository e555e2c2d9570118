//! 执行计划与单轮工作队列
//!
//! 规划器的步骤与智能体发起的转交共用一个 FIFO 队列：计划步骤按序号原样入队（规划器明确重复的
//! 智能体不去重）；转交只接受本轮尚未执行或排队的智能体；总步数受 max_steps_per_turn 约束。

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::agents::AgentKind;

/// 一个步骤的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StepOrigin {
    /// 规划器输出
    Planned,
    /// 规划失败后的关键词兜底
    Fallback,
    /// 回答上一轮的问题
    Continuation,
    /// 恢复被打断的流程
    Resume,
    /// 由另一个智能体转交
    Handoff { from: AgentKind },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    pub ordinal: usize,
    #[serde(rename = "agentName")]
    pub agent: AgentKind,
    #[serde(rename = "subTaskQuery")]
    pub sub_task: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    steps: Vec<PlanStep>,
    origin: StepOrigin,
}

impl ExecutionPlan {
    /// 步骤按给定顺序重新编号（从 1 开始）
    pub fn new(steps: Vec<PlanStep>, origin: StepOrigin) -> Self {
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| PlanStep {
                ordinal: i + 1,
                ..step
            })
            .collect();
        Self { steps, origin }
    }

    pub fn single(agent: AgentKind, sub_task: impl Into<String>, origin: StepOrigin) -> Self {
        Self::new(
            vec![PlanStep {
                ordinal: 1,
                agent,
                sub_task: sub_task.into(),
            }],
            origin,
        )
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn origin(&self) -> StepOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn agents(&self) -> Vec<AgentKind> {
        self.steps.iter().map(|s| s.agent).collect()
    }
}

/// 队列中的一项工作
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub agent: AgentKind,
    pub task: String,
    pub origin: StepOrigin,
}

/// 单轮工作队列
#[derive(Debug)]
pub struct WorkQueue {
    items: VecDeque<WorkItem>,
    /// 本轮已排队或执行过的智能体
    seen: BTreeSet<AgentKind>,
    accepted: usize,
    capacity: usize,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            seen: BTreeSet::new(),
            accepted: 0,
            capacity: capacity.max(1),
        }
    }

    /// 计划步骤全部入队（超出容量的部分丢弃）
    pub fn from_plan(plan: &ExecutionPlan, capacity: usize) -> Self {
        let mut queue = Self::new(capacity);
        for step in plan.steps() {
            let item = WorkItem {
                agent: step.agent,
                task: step.sub_task.clone(),
                origin: plan.origin(),
            };
            if !queue.push(item) {
                tracing::warn!(ordinal = step.ordinal, agent = %step.agent, "plan step dropped: step budget exhausted");
            }
        }
        queue
    }

    fn push(&mut self, item: WorkItem) -> bool {
        if self.accepted >= self.capacity {
            return false;
        }
        self.seen.insert(item.agent);
        self.items.push_back(item);
        self.accepted += 1;
        true
    }

    /// 转交：目标已在本轮出现过或预算用尽时拒绝
    pub fn push_handoff(&mut self, item: WorkItem) -> bool {
        if self.seen.contains(&item.agent) {
            return false;
        }
        self.push(item)
    }

    pub fn pop(&mut self) -> Option<WorkItem> {
        self.items.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
