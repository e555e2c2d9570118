//! 工具参数校验
//!
//! validate(tool, args) 是纯函数：收集所有违规项（不短路），一次报告全部问题。

use std::fmt;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::tools::{ParamFormat, ParamSpec, ToolRegistry};

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

/// 单条校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown tool `{tool}`")]
    UnknownTool { tool: String },

    #[error("`{tool}` is missing required parameter `{param}`")]
    MissingRequiredParameter { tool: String, param: String },

    #[error("`{tool}` does not accept parameter `{param}`")]
    UnknownParameter { tool: String, param: String },

    #[error("`{param}` must be {expected}, got {found}")]
    TypeMismatch {
        param: String,
        expected: String,
        found: String,
    },

    #[error("`{param}` must be one of [{allowed}], got {value}")]
    EnumViolation {
        param: String,
        value: String,
        allowed: String,
    },

    #[error("`{param}` must be between {min} and {max}, got {value}")]
    RangeViolation {
        param: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("`{param}` must be a valid {expected}, got {value}")]
    FormatViolation {
        param: String,
        value: String,
        expected: String,
    },
}

impl ValidationError {
    /// 稳定的错误码（日志与测试使用）
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnknownTool { .. } => "UnknownTool",
            ValidationError::MissingRequiredParameter { .. } => "MissingRequiredParameter",
            ValidationError::UnknownParameter { .. } => "UnknownParameter",
            ValidationError::TypeMismatch { .. } => "TypeMismatch",
            ValidationError::EnumViolation { .. } => "EnumViolation",
            ValidationError::RangeViolation { .. } => "RangeViolation",
            ValidationError::FormatViolation { .. } => "FormatViolation",
        }
    }

    pub fn param(&self) -> Option<&str> {
        match self {
            ValidationError::UnknownTool { .. } => None,
            ValidationError::MissingRequiredParameter { param, .. }
            | ValidationError::UnknownParameter { param, .. }
            | ValidationError::TypeMismatch { param, .. }
            | ValidationError::EnumViolation { param, .. }
            | ValidationError::RangeViolation { param, .. }
            | ValidationError::FormatViolation { param, .. } => Some(param),
        }
    }
}

/// 一次校验收集到的全部错误（非空）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn as_slice(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn codes(&self) -> Vec<&'static str> {
        self.0.iter().map(ValidationError::code).collect()
    }

    pub fn has(&self, code: &str) -> bool {
        self.0.iter().any(|e| e.code() == code)
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(|e| e.to_string()).collect()
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_format(format: ParamFormat, value: &str) -> bool {
    match format {
        ParamFormat::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        ParamFormat::Time => value.len() == 5 && NaiveTime::parse_from_str(value, "%H:%M").is_ok(),
        ParamFormat::Email => EMAIL_RE
            .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
            .is_match(value),
    }
}

fn check_value(spec: &ParamSpec, value: &Value, errors: &mut Vec<ValidationError>) {
    if !spec.ty.matches(value) {
        errors.push(ValidationError::TypeMismatch {
            param: spec.name.to_string(),
            expected: spec.ty.as_str().to_string(),
            found: json_type_name(value).to_string(),
        });
        return;
    }

    if let Some(allowed) = spec.allowed {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !allowed.contains(&rendered.as_str()) {
            errors.push(ValidationError::EnumViolation {
                param: spec.name.to_string(),
                value: rendered,
                allowed: allowed.join(", "),
            });
        }
    }

    if let Some(n) = value.as_i64() {
        let below = spec.min.is_some_and(|min| n < min);
        let above = spec.max.is_some_and(|max| n > max);
        if below || above {
            errors.push(ValidationError::RangeViolation {
                param: spec.name.to_string(),
                value: n,
                min: spec.min.unwrap_or(i64::MIN),
                max: spec.max.unwrap_or(i64::MAX),
            });
        }
    }

    if let (Some(format), Some(s)) = (spec.format, value.as_str()) {
        if !check_format(format, s) {
            errors.push(ValidationError::FormatViolation {
                param: spec.name.to_string(),
                value: s.to_string(),
                expected: format.as_str().to_string(),
            });
        }
    }
}

impl ToolRegistry {
    /// 校验一次工具调用的参数；args 为 null 视作空参数表
    pub fn validate(&self, tool: &str, args: &Value) -> Result<(), ValidationErrors> {
        let Some(definition) = self.get(tool) else {
            return Err(vec![ValidationError::UnknownTool {
                tool: tool.to_string(),
            }]
            .into());
        };

        let empty = serde_json::Map::new();
        let map = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return Err(vec![ValidationError::TypeMismatch {
                    param: "arguments".to_string(),
                    expected: "object".to_string(),
                    found: json_type_name(other).to_string(),
                }]
                .into());
            }
        };

        let mut errors = Vec::new();

        for spec in definition.params.iter().filter(|p| p.required) {
            if map.get(spec.name).map_or(true, Value::is_null) {
                errors.push(ValidationError::MissingRequiredParameter {
                    tool: tool.to_string(),
                    param: spec.name.to_string(),
                });
            }
        }

        for (key, value) in map {
            match definition.spec(key) {
                None => errors.push(ValidationError::UnknownParameter {
                    tool: tool.to_string(),
                    param: key.clone(),
                }),
                // null 视为未提供；必填项已在上面报告缺失
                Some(_) if value.is_null() => {}
                Some(spec) => check_value(spec, value, &mut errors),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }
}
