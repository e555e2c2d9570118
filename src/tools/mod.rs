//! 工具层：静态工具目录、参数校验、决策 schema、执行器

pub mod catalog;
pub mod executor;
pub mod registry;
pub mod schema;
pub mod validation;

pub use catalog::builtin_registry;
pub use executor::{ToolExecutor, ToolOutcome};
pub use registry::{ParamFormat, ParamSpec, ParamType, ToolCall, ToolDefinition, ToolRegistry};
pub use schema::{plan_schema_json, tool_decision_schema_json};
pub use validation::{ValidationError, ValidationErrors};
