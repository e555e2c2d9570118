//! Concierge - 餐厅预订多智能体分发与会话状态机
//!
//! 模块划分：
//! - **agents**: 六个能力智能体（可用性、菜单、信息、庆祝、预订、客服）与统一的 Think → Act 循环
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、会话状态、单轮状态机、构建器
//! - **dispatch**: 规划器、打断/恢复分类器、汇总器、单轮工作队列
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 对话消息与有界历史
//! - **observability**: 日志初始化
//! - **services**: 协作服务接口与内存演示场馆
//! - **session**: 会话 ID、时钟、带 TTL 的会话存储
//! - **tools**: 工具目录、参数校验与执行器

pub mod agents;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod services;
pub mod session;
pub mod tools;
