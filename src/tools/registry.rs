//! 工具注册表
//!
//! 每个工具是一份静态 ToolDefinition（名称、描述、参数 schema），进程启动时注册一次、之后只读。
//! 参数 schema 描述每个参数的类型（string / integer / boolean / array）、是否必填、枚举取值、数值范围与格式；
//! 校验逻辑见 validation.rs，执行逻辑见 executor.rs。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// 参数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Array,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
        }
    }

    /// 运行时 JSON 值是否符合声明类型（integer 不接受小数与数字字符串）
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
        }
    }
}

/// 字符串格式约束
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamFormat {
    /// YYYY-MM-DD
    Date,
    /// HH:MM（24 小时制）
    Time,
    Email,
}

impl ParamFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamFormat::Date => "date (YYYY-MM-DD)",
            ParamFormat::Time => "time (HH:MM, 24h)",
            ParamFormat::Email => "email",
        }
    }
}

/// 单个参数的声明
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub description: &'static str,
    pub required: bool,
    pub allowed: Option<&'static [&'static str]>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub format: Option<ParamFormat>,
}

impl ParamSpec {
    fn new(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            description,
            required: false,
            allowed: None,
            min: None,
            max: None,
            format: None,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    pub fn array(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ParamType::Array, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.allowed = Some(values);
        self
    }

    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn format(mut self, format: ParamFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn to_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.ty.as_str()));
        schema.insert("description".into(), json!(self.description));
        if let Some(values) = self.allowed {
            schema.insert("enum".into(), json!(values));
        }
        if let Some(min) = self.min {
            schema.insert("minimum".into(), json!(min));
        }
        if let Some(max) = self.max {
            schema.insert("maximum".into(), json!(max));
        }
        if let Some(format) = self.format {
            schema.insert("format".into(), json!(format.as_str()));
        }
        Value::Object(schema)
    }
}

/// 工具定义：不可变，进程启动时构建
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl ToolDefinition {
    pub fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// JSON Schema 形式（供 LLM 生成正确的参数格式）
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.to_string(), p.to_schema()))
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }
}

/// 一次工具调用：工具名 + JSON 参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }

    pub fn str_arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(Value::as_str)
    }

    pub fn int_arg(&self, name: &str) -> Option<i64> {
        self.args.get(name).and_then(Value::as_i64)
    }

    /// 可变参数表；args 不是对象（如 null）时替换为空对象
    pub fn args_mut(&mut self) -> &mut Map<String, Value> {
        if !self.args.is_object() {
            self.args = Value::Object(Map::new());
        }
        match &mut self.args {
            Value::Object(map) => map,
            _ => unreachable!("args was just replaced with an object"),
        }
    }
}

/// 工具注册表：按名称有序存储，保证 prompt 中的工具顺序稳定
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ToolDefinition) {
        self.tools.insert(definition.name, definition);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    /// 指定子集的 schema JSON（未注册的名字被忽略），用于智能体 Think 阶段
    pub fn schema_json_for(&self, names: &[&str]) -> String {
        let tools: Vec<Value> = names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_type_matches() {
        assert!(ParamType::Integer.matches(&json!(4)));
        assert!(!ParamType::Integer.matches(&json!("4")));
        assert!(!ParamType::Integer.matches(&json!(4.5)));
        assert!(ParamType::Boolean.matches(&json!(true)));
        assert!(ParamType::Array.matches(&json!(["a"])));
        assert!(!ParamType::String.matches(&Value::Null));
    }

    #[test]
    fn test_parameters_schema_lists_required() {
        let def = ToolDefinition::new("demo", "Demo tool")
            .param(ParamSpec::string("a", "first").required())
            .param(ParamSpec::integer("b", "second").range(1, 3));
        let schema = def.parameters_schema();
        assert_eq!(schema["required"], json!(["a"]));
        assert_eq!(schema["properties"]["b"]["maximum"], json!(3));
    }

    #[test]
    fn test_schema_json_for_skips_unknown() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDefinition::new("demo", "Demo tool"));
        let text = registry.schema_json_for(&["demo", "missing"]);
        let parsed: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_args_mut_replaces_null() {
        let mut call = ToolCall::new("demo", Value::Null);
        call.args_mut().insert("x".into(), json!(1));
        assert_eq!(call.int_arg("x"), Some(1));
    }
}
