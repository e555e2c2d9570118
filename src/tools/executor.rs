//! 工具执行器
//!
//! 持有工具注册表、协作服务句柄与全局超时；execute(call, restaurant_id) 在超时内调用对应服务，
//! 返回结构化 ToolOutcome（含确定性模板生成的文本载荷，不调用 LLM）。
//! 超时映射为 ServiceError::Timeout；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::services::{MenuQuery, ReservationRequest, ServiceError, Services, TableOption};
use crate::tools::catalog::{
    CHECK_AVAILABILITY, CLARIFY_AND_RESPOND, CREATE_RESERVATION, GET_CELEBRATION_OPTIONS,
    GET_MENU, GET_RESTAURANT_INFO, HANDLE_SUPPORT,
};
use crate::tools::{ToolCall, ToolRegistry, ValidationErrors};

/// 工具执行的原始结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool: String,
    pub success: bool,
    /// 面向用户的文本载荷（由数据模板化生成）
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl ToolOutcome {
    pub fn ok(tool: &str, message: impl Into<String>, data: Value) -> Self {
        Self {
            tool: tool.to_string(),
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failed(tool: &str, message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            success: false,
            message: message.into(),
            data: json!({ "error": error.into() }),
        }
    }

    pub fn is_clarification(&self) -> bool {
        self.tool == CLARIFY_AND_RESPOND
    }
}

/// 工具执行器：对每次调用施加超时，并将结果映射为 ToolOutcome / ServiceError
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    services: Services,
    timeout: Duration,
    currency: String,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        services: Services,
        timeout_secs: u64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            services,
            timeout: Duration::from_secs(timeout_secs.max(1)),
            currency: currency.into(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn validate(&self, call: &ToolCall) -> Result<(), ValidationErrors> {
        self.registry.validate(&call.tool, &call.args)
    }

    /// 执行已校验的工具调用；输出 JSON 审计日志
    pub async fn execute(
        &self,
        call: &ToolCall,
        restaurant_id: &str,
    ) -> Result<ToolOutcome, ServiceError> {
        let start = Instant::now();
        let result = match timeout(self.timeout, self.dispatch(call, restaurant_id)).await {
            Ok(inner) => inner,
            Err(_) => Err(ServiceError::Timeout(self.timeout.as_secs())),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ServiceError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        let audit = json!({
            "event": "tool_audit",
            "tool": call.tool,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&call.args),
        });
        tracing::info!(audit = %audit, "tool");

        result
    }

    async fn dispatch(&self, call: &ToolCall, restaurant_id: &str) -> Result<ToolOutcome, ServiceError> {
        match call.tool.as_str() {
            CHECK_AVAILABILITY => self.check_availability(call, restaurant_id).await,
            GET_MENU => self.get_menu(call, restaurant_id).await,
            GET_RESTAURANT_INFO => self.get_info(call, restaurant_id).await,
            GET_CELEBRATION_OPTIONS => self.get_celebrations(call, restaurant_id).await,
            CREATE_RESERVATION => self.create_reservation(call, restaurant_id).await,
            HANDLE_SUPPORT => self.handle_support(call, restaurant_id).await,
            CLARIFY_AND_RESPOND => {
                let message = required_str(call, "message")?;
                Ok(ToolOutcome::ok(
                    CLARIFY_AND_RESPOND,
                    message,
                    json!({ "question": message }),
                ))
            }
            other => Err(ServiceError::InvalidRequest(format!("unknown tool {other}"))),
        }
    }

    async fn check_availability(
        &self,
        call: &ToolCall,
        restaurant_id: &str,
    ) -> Result<ToolOutcome, ServiceError> {
        let date = parse_date(required_str(call, "date")?)?;
        let time = parse_time(required_str(call, "time")?)?;
        let party_size = required_u32(call, "party_size")?;

        let max = self.services.availability.max_capacity(restaurant_id).await?;
        if party_size > max {
            return Err(ServiceError::PartyTooLarge { max });
        }

        let options = self
            .services
            .availability
            .available_table_types(restaurant_id, date, time, party_size)
            .await?;

        let when = format!("{} at {}", date, time.format("%H:%M"));
        let message = if options.is_empty() {
            format!("Unfortunately we have no tables for {party_size} guests on {when}.")
        } else {
            let listed: Vec<String> = options.iter().map(|o| self.describe_table(o)).collect();
            format!(
                "For {party_size} guests on {when} we have: {}. Which table type would you like?",
                listed.join(", ")
            )
        };

        Ok(ToolOutcome::ok(
            CHECK_AVAILABILITY,
            message,
            json!({
                "date": date.to_string(),
                "time": time.format("%H:%M").to_string(),
                "partySize": party_size,
                "availableTableTypes": options,
            }),
        ))
    }

    fn describe_table(&self, option: &TableOption) -> String {
        let surcharge = if option.price > 0.0 {
            format!("{} surcharge", self.price(option.price))
        } else {
            "no surcharge".to_string()
        };
        format!(
            "{} table ({surcharge}, seats up to {})",
            option.table_type, option.capacity
        )
    }

    async fn get_menu(&self, call: &ToolCall, restaurant_id: &str) -> Result<ToolOutcome, ServiceError> {
        let query = MenuQuery {
            query: call.str_arg("query").map(String::from),
            category: call.str_arg("category").map(String::from),
            dietary: call.str_arg("dietary").map(String::from),
        };
        let items = self.services.menu.search_menu(restaurant_id, &query).await?;

        let message = if items.is_empty() {
            "I couldn't find any matching dishes on our menu.".to_string()
        } else {
            items
                .iter()
                .map(|i| {
                    let tags = if i.dietary.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", i.dietary.join(", ").replace('_', " "))
                    };
                    format!("{} ({}): {}{}", i.name, self.price(i.price), i.description, tags)
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        Ok(ToolOutcome::ok(GET_MENU, message, json!({ "items": items })))
    }

    async fn get_info(&self, call: &ToolCall, restaurant_id: &str) -> Result<ToolOutcome, ServiceError> {
        let topic = required_str(call, "topic")?;
        let entries = self
            .services
            .info
            .lookup(restaurant_id, topic, call.str_arg("query"))
            .await?;
        let message = entries
            .iter()
            .map(|e| e.details.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ToolOutcome::ok(
            GET_RESTAURANT_INFO,
            message,
            json!({ "topic": topic, "entries": entries }),
        ))
    }

    async fn get_celebrations(
        &self,
        call: &ToolCall,
        restaurant_id: &str,
    ) -> Result<ToolOutcome, ServiceError> {
        let occasion = required_str(call, "occasion")?;
        let party_size = call.int_arg("party_size").and_then(|n| u32::try_from(n).ok());
        let packages = self
            .services
            .celebrations
            .packages(restaurant_id, occasion, party_size)
            .await?;
        let message = if packages.is_empty() {
            format!("We don't have a dedicated {occasion} package, but we're happy to note it on your booking.")
        } else {
            packages
                .iter()
                .map(|p| format!("{} ({}): {}", p.name, self.price(p.price), p.description))
                .collect::<Vec<_>>()
                .join("\n")
        };
        Ok(ToolOutcome::ok(
            GET_CELEBRATION_OPTIONS,
            message,
            json!({ "occasion": occasion, "packages": packages }),
        ))
    }

    async fn create_reservation(
        &self,
        call: &ToolCall,
        restaurant_id: &str,
    ) -> Result<ToolOutcome, ServiceError> {
        let request = ReservationRequest {
            restaurant_id: restaurant_id.to_string(),
            date: parse_date(required_str(call, "date")?)?,
            time: parse_time(required_str(call, "time")?)?,
            party_size: required_u32(call, "party_size")?,
            table_type: required_str(call, "table_type")?.to_string(),
            customer_name: required_str(call, "customer_name")?.to_string(),
            customer_email: required_str(call, "customer_email")?.to_string(),
            customer_phone: required_str(call, "customer_phone")?.to_string(),
            special_requests: call.str_arg("special_requests").map(String::from),
            occasion: call.str_arg("occasion").map(String::from),
        };
        let reservation = self.services.reservations.create_reservation(request).await?;
        let message = format!(
            "Your reservation is confirmed! Reference {}: {} table for {} on {} at {} under {}.",
            reservation.reservation_id,
            reservation.table_type,
            reservation.party_size,
            reservation.date,
            reservation.time.format("%H:%M"),
            reservation.customer_name
        );
        Ok(ToolOutcome::ok(
            CREATE_RESERVATION,
            message,
            json!({ "reservation": reservation }),
        ))
    }

    async fn handle_support(
        &self,
        call: &ToolCall,
        restaurant_id: &str,
    ) -> Result<ToolOutcome, ServiceError> {
        let topic = required_str(call, "topic")?;
        let ticket = self
            .services
            .support
            .open_ticket(
                restaurant_id,
                topic,
                required_str(call, "message")?,
                call.str_arg("reservation_id"),
            )
            .await?;
        let message = format!(
            "I've passed your {} request to our team (ticket {}). {}",
            topic, ticket.ticket_id, ticket.follow_up
        );
        Ok(ToolOutcome::ok(HANDLE_SUPPORT, message, json!({ "ticket": ticket })))
    }

    fn price(&self, amount: f64) -> String {
        format!("{}{:.2}", self.currency, amount)
    }
}

fn required_str<'a>(call: &'a ToolCall, name: &str) -> Result<&'a str, ServiceError> {
    call.str_arg(name)
        .ok_or_else(|| ServiceError::InvalidRequest(format!("missing argument {name}")))
}

fn required_u32(call: &ToolCall, name: &str) -> Result<u32, ServiceError> {
    call.int_arg(name)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| ServiceError::InvalidRequest(format!("missing argument {name}")))
}

fn parse_date(value: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ServiceError::InvalidRequest(format!("bad date {value}")))
}

fn parse_time(value: &str) -> Result<NaiveTime, ServiceError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ServiceError::InvalidRequest(format!("bad time {value}")))
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryVenue;
    use crate::tools::catalog::builtin_registry;

    fn executor() -> (ToolExecutor, Arc<InMemoryVenue>) {
        let venue = Arc::new(InMemoryVenue::demo("demo-bistro"));
        let executor = ToolExecutor::new(
            Arc::new(builtin_registry()),
            Services::from_venue(venue.clone()),
            5,
            "€",
        );
        (executor, venue)
    }

    #[tokio::test]
    async fn test_check_availability_lists_options() {
        let (executor, _) = executor();
        let call = ToolCall::new(
            CHECK_AVAILABILITY,
            json!({"date": "2025-08-08", "time": "20:00", "party_size": 4}),
        );
        let outcome = executor.execute(&call, "demo-bistro").await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.data["availableTableTypes"].as_array().unwrap().len(), 2);
        assert!(outcome.message.contains("booth table (€15.00 surcharge, seats up to 6)"));
        assert!(outcome.message.ends_with("Which table type would you like?"));
    }

    #[tokio::test]
    async fn test_party_too_large() {
        let (executor, _) = executor();
        let call = ToolCall::new(
            CHECK_AVAILABILITY,
            json!({"date": "2025-08-08", "time": "20:00", "party_size": 12}),
        );
        assert_eq!(
            executor.execute(&call, "demo-bistro").await.unwrap_err(),
            ServiceError::PartyTooLarge { max: 6 }
        );
    }

    #[tokio::test]
    async fn test_create_reservation_message() {
        let (executor, venue) = executor();
        let call = ToolCall::new(
            CREATE_RESERVATION,
            json!({
                "date": "2025-08-08", "time": "20:00", "party_size": 2,
                "table_type": "standard", "customer_name": "Ana Silva",
                "customer_email": "ana@example.com", "customer_phone": "912000000"
            }),
        );
        let outcome = executor.execute(&call, "demo-bistro").await.unwrap();
        assert!(outcome.message.starts_with("Your reservation is confirmed!"));
        assert_eq!(venue.reservations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_backend_is_error() {
        let (executor, venue) = executor();
        venue.set_offline(true);
        let call = ToolCall::new(GET_RESTAURANT_INFO, json!({"topic": "hours"}));
        assert!(matches!(
            executor.execute(&call, "demo-bistro").await,
            Err(ServiceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = json!({ "text": "x".repeat(500) });
        assert!(args_preview(&long).ends_with("..."));
        assert_eq!(args_preview(&json!({})), "{}");
    }
}
