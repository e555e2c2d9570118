//! 外部协作服务接口
//!
//! 可用性查询、预订写入、菜单/信息/庆祝套餐查询、客服工单。数据存储与桌位计算都封装在实现内部，
//! 分发核心只依赖这些 trait；memory.rs 提供一个内存演示实现（终端程序与测试使用）。

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryVenue;

/// 协作服务错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("no capacity left for the requested slot")]
    NoCapacity,

    #[error("party exceeds the maximum of {max} guests")]
    PartyTooLarge { max: u32 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("service call timed out after {0}s")]
    Timeout(u64),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// 某时段可选的桌型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOption {
    pub table_type: String,
    pub price: f64,
    pub capacity: u32,
}

#[async_trait]
pub trait AvailabilityService: Send + Sync {
    async fn available_table_types(
        &self,
        restaurant_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        party_size: u32,
    ) -> Result<Vec<TableOption>, ServiceError>;

    async fn max_capacity(&self, restaurant_id: &str) -> Result<u32, ServiceError>;
}

/// 创建预订所需的全部信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub restaurant_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: u32,
    pub table_type: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub special_requests: Option<String>,
    pub occasion: Option<String>,
}

/// 已确认的预订
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub reservation_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: u32,
    pub table_type: String,
    pub customer_name: String,
}

#[async_trait]
pub trait ReservationService: Send + Sync {
    async fn create_reservation(
        &self,
        request: ReservationRequest,
    ) -> Result<Reservation, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    pub dietary: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuQuery {
    pub query: Option<String>,
    pub category: Option<String>,
    pub dietary: Option<String>,
}

#[async_trait]
pub trait MenuService: Send + Sync {
    async fn search_menu(
        &self,
        restaurant_id: &str,
        query: &MenuQuery,
    ) -> Result<Vec<MenuItem>, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoEntry {
    pub topic: String,
    pub details: String,
}

#[async_trait]
pub trait InfoService: Send + Sync {
    async fn lookup(
        &self,
        restaurant_id: &str,
        topic: &str,
        query: Option<&str>,
    ) -> Result<Vec<InfoEntry>, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CelebrationPackage {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub occasions: Vec<String>,
}

#[async_trait]
pub trait CelebrationService: Send + Sync {
    async fn packages(
        &self,
        restaurant_id: &str,
        occasion: &str,
        party_size: Option<u32>,
    ) -> Result<Vec<CelebrationPackage>, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub ticket_id: String,
    pub topic: String,
    pub follow_up: String,
}

#[async_trait]
pub trait SupportService: Send + Sync {
    async fn open_ticket(
        &self,
        restaurant_id: &str,
        topic: &str,
        message: &str,
        reservation_id: Option<&str>,
    ) -> Result<SupportTicket, ServiceError>;
}

/// 全部协作服务的句柄集合，由 ToolExecutor 持有
#[derive(Clone)]
pub struct Services {
    pub availability: Arc<dyn AvailabilityService>,
    pub reservations: Arc<dyn ReservationService>,
    pub menu: Arc<dyn MenuService>,
    pub info: Arc<dyn InfoService>,
    pub celebrations: Arc<dyn CelebrationService>,
    pub support: Arc<dyn SupportService>,
}

impl Services {
    /// 所有接口都由同一个内存场馆实现
    pub fn from_venue(venue: Arc<InMemoryVenue>) -> Self {
        Self {
            availability: venue.clone(),
            reservations: venue.clone(),
            menu: venue.clone(),
            info: venue.clone(),
            celebrations: venue.clone(),
            support: venue,
        }
    }
}
