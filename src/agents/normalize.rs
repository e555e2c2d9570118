//! 参数规范化：在校验前把推理输出整理成工具期望的形式
//!
//! - 键名：`partySize` / `party-size` -> `party_size`（仅当工具声明了该参数）
//! - 日期：today / tonight / tomorrow / 星期名 -> YYYY-MM-DD
//! - 时间：8pm、8:30 pm、noon -> HH:MM
//! - 整数：`"4"`、`4.0` -> 4

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use serde_json::{Map, Value};

use crate::tools::{ParamFormat, ParamType, ToolDefinition};

/// 按工具定义规范化参数表
pub fn normalize_args(definition: &ToolDefinition, args: &mut Map<String, Value>, today: NaiveDate) {
    canonicalize_keys(definition, args);

    for spec in &definition.params {
        let Some(value) = args.get_mut(spec.name) else {
            continue;
        };
        match (spec.ty, spec.format) {
            (ParamType::String, Some(ParamFormat::Date)) => {
                if let Some(date) = value.as_str().and_then(|s| normalize_date(s, today)) {
                    *value = Value::String(date);
                }
            }
            (ParamType::String, Some(ParamFormat::Time)) => {
                if let Some(time) = value.as_str().and_then(normalize_time) {
                    *value = Value::String(time);
                }
            }
            (ParamType::String, Some(ParamFormat::Email)) => {
                if let Some(s) = value.as_str() {
                    *value = Value::String(s.trim().to_string());
                }
            }
            (ParamType::String, None) => {
                if let Some(s) = value.as_str() {
                    if spec.allowed.is_some() {
                        *value = Value::String(s.trim().to_lowercase().replace([' ', '-'], "_"));
                    }
                }
            }
            (ParamType::Integer, _) => {
                if let Some(n) = coerce_integer(value) {
                    *value = Value::from(n);
                }
            }
            _ => {}
        }
    }
}

fn canonicalize_keys(definition: &ToolDefinition, args: &mut Map<String, Value>) {
    let renames: Vec<(String, &'static str)> = args
        .keys()
        .filter(|k| definition.spec(k).is_none())
        .filter_map(|k| {
            let snake = to_snake_case(k);
            definition
                .spec(&snake)
                .filter(|_| !args.contains_key(&snake))
                .map(|spec| (k.clone(), spec.name))
        })
        .collect();
    for (from, to) in renames {
        if let Some(value) = args.remove(&from) {
            args.insert(to.to_string(), value);
        }
    }
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '-' || c == ' ' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => None,
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// 相对日期与星期名解析为 ISO 日期；已是 ISO 或无法识别时返回 None（保持原样）
pub fn normalize_date(raw: &str, today: NaiveDate) -> Option<String> {
    let lower = raw.trim().to_lowercase();
    if NaiveDate::parse_from_str(&lower, "%Y-%m-%d").is_ok() {
        return None;
    }
    let date = match lower.as_str() {
        "today" | "tonight" | "this evening" | "now" => today,
        "tomorrow" | "tomorrow night" | "tomorrow evening" => today + Duration::days(1),
        "day after tomorrow" | "the day after tomorrow" => today + Duration::days(2),
        other => {
            if let Ok(d) = NaiveDate::parse_from_str(other, "%Y/%m/%d") {
                d
            } else {
                next_weekday(other, today)?
            }
        }
    };
    Some(date.format("%Y-%m-%d").to_string())
}

/// "saturday" / "this saturday" / "next saturday" -> 今天起最近的该星期几（next 至少往后一天）
fn next_weekday(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let (strict, name) = match text.strip_prefix("next ") {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix("this ").unwrap_or(text)),
    };
    let weekday: Weekday = name.trim_end_matches('s').parse().ok()?;
    let mut ahead = (7 + weekday.num_days_from_monday() as i64
        - today.weekday().num_days_from_monday() as i64)
        % 7;
    if strict && ahead == 0 {
        ahead = 7;
    }
    Some(today + Duration::days(ahead))
}

/// 12 小时制与口语时间转为 HH:MM；无法识别时返回 None（保持原样）
pub fn normalize_time(raw: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(?:at\s+)?(\d{1,2})(?:[:.](\d{2}))?\s*(am|pm|a\.m\.|p\.m\.|h)?$").unwrap()
    });

    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "noon" | "midday" => return Some("12:00".to_string()),
        "midnight" => return Some("00:00".to_string()),
        _ => {}
    }

    let caps = re.captures(&lower)?;
    let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
    match caps.get(3).map(|m| m.as_str()) {
        Some("pm") | Some("p.m.") if hour < 12 => hour += 12,
        Some("am") | Some("a.m.") if hour == 12 => hour = 0,
        _ => {}
    }
    if hour > 23 || minute > 59 {
        return None;
    }
    let normalized = format!("{hour:02}:{minute:02}");
    (normalized != lower).then_some(normalized)
}
