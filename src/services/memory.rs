//! 内存演示场馆：实现全部协作服务接口
//!
//! 桌位按类型计数；同一日期 + 时间的已确认预订会占用对应桌型。可切换为离线状态以模拟下游故障。

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tokio::sync::RwLock;

use super::{
    AvailabilityService, CelebrationPackage, CelebrationService, InfoEntry, InfoService, MenuItem,
    MenuQuery, MenuService, Reservation, ReservationRequest, ReservationService, ServiceError,
    SupportService, SupportTicket, TableOption,
};

/// 一类桌位：容量、数量、附加费
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub table_type: String,
    pub capacity: u32,
    pub count: u32,
    pub price: f64,
}

impl TableSpec {
    pub fn new(table_type: &str, capacity: u32, count: u32, price: f64) -> Self {
        Self {
            table_type: table_type.to_string(),
            capacity,
            count,
            price,
        }
    }
}

/// 内存场馆
pub struct InMemoryVenue {
    restaurant_id: String,
    tables: Vec<TableSpec>,
    /// 接受预订的时段 [first_seating, last_seating]
    first_seating: NaiveTime,
    last_seating: NaiveTime,
    menu: Vec<MenuItem>,
    info: Vec<InfoEntry>,
    packages: Vec<CelebrationPackage>,
    reservations: RwLock<Vec<Reservation>>,
    tickets: RwLock<Vec<SupportTicket>>,
    offline: AtomicBool,
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

fn item(name: &str, description: &str, category: &str, price: f64, dietary: &[&str]) -> MenuItem {
    MenuItem {
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        price,
        dietary: dietary.iter().map(|d| d.to_string()).collect(),
    }
}

fn info(topic: &str, details: &str) -> InfoEntry {
    InfoEntry {
        topic: topic.to_string(),
        details: details.to_string(),
    }
}

fn package(name: &str, description: &str, price: f64, occasions: &[&str]) -> CelebrationPackage {
    CelebrationPackage {
        name: name.to_string(),
        description: description.to_string(),
        price,
        occasions: occasions.iter().map(|o| o.to_string()).collect(),
    }
}

impl InMemoryVenue {
    pub fn new(restaurant_id: impl Into<String>, tables: Vec<TableSpec>) -> Self {
        Self {
            restaurant_id: restaurant_id.into(),
            tables,
            first_seating: hm(12, 0),
            last_seating: hm(22, 0),
            menu: Vec::new(),
            info: Vec::new(),
            packages: Vec::new(),
            reservations: RwLock::new(Vec::new()),
            tickets: RwLock::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// 演示数据：一家小酒馆
    pub fn demo(restaurant_id: impl Into<String>) -> Self {
        let mut venue = Self::new(
            restaurant_id,
            vec![
                TableSpec::new("standard", 4, 6, 0.0),
                TableSpec::new("window", 2, 4, 10.0),
                TableSpec::new("booth", 6, 2, 15.0),
            ],
        );
        venue.menu = vec![
            item("Burrata", "Creamy burrata with heirloom tomatoes and basil", "starters", 12.0, &["vegetarian", "gluten_free"]),
            item("Lamb Chops", "Grilled lamb chops with rosemary jus and roasted potatoes", "mains", 28.0, &["gluten_free", "dairy_free"]),
            item("Seared Salmon", "Salmon fillet with lemon butter and greens", "mains", 24.0, &["gluten_free"]),
            item("Mushroom Risotto", "Arborio rice with wild mushrooms and parmesan", "mains", 19.5, &["vegetarian", "gluten_free"]),
            item("Lentil Curry", "Red lentil curry with coconut and jasmine rice", "mains", 17.0, &["vegan", "gluten_free", "dairy_free"]),
            item("Chocolate Fondant", "Warm chocolate fondant with vanilla ice cream", "desserts", 9.0, &["vegetarian"]),
            item("House Red", "Glass of Douro red", "drinks", 7.0, &["vegan"]),
        ];
        venue.info = vec![
            info("hours", "Monday to Thursday 12:00-22:00, Friday and Saturday 12:00-23:00, Sunday 12:00-21:00."),
            info("location", "Rua das Flores 12, Porto, next to the São Bento station."),
            info("parking", "Public parking at Trindade garage, a 5 minute walk away."),
            info("contact", "Phone +351 220 000 000, email hello@demo-bistro.example."),
            info("policies", "Tables are held for 15 minutes. Cancellations are free up to 24 hours before."),
            info("accessibility", "Step-free entrance and an accessible restroom on the ground floor."),
        ];
        venue.packages = vec![
            package("Birthday Cake", "Custom cake with candles served at your table", 25.0, &["birthday"]),
            package("Anniversary Bubbles", "Bottle of sparkling wine and rose petals", 45.0, &["anniversary", "proposal"]),
            package("Private Booth Decoration", "Balloons and table decoration in a booth", 30.0, &["birthday", "anniversary", "corporate", "other"]),
        ];
        venue
    }

    /// 场馆已知名称：桌型、菜品、庆祝套餐
    pub fn catalog_names(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|t| t.table_type.clone())
            .chain(self.menu.iter().map(|i| i.name.clone()))
            .chain(self.packages.iter().map(|p| p.name.clone()))
            .collect()
    }

    /// 切换离线状态：离线时所有调用返回 Unavailable
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn reservations(&self) -> Vec<Reservation> {
        self.reservations.read().await.clone()
    }

    fn ensure_online(&self, restaurant_id: &str) -> Result<(), ServiceError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable("venue backend offline".to_string()));
        }
        if restaurant_id != self.restaurant_id {
            return Err(ServiceError::NotFound(format!("restaurant {restaurant_id}")));
        }
        Ok(())
    }

    async fn free_tables(&self, date: NaiveDate, time: NaiveTime, party_size: u32) -> Vec<TableOption> {
        if time < self.first_seating || time > self.last_seating {
            return Vec::new();
        }
        let booked = self.reservations.read().await;
        self.tables
            .iter()
            .filter(|t| t.capacity >= party_size)
            .filter(|t| {
                let taken = booked
                    .iter()
                    .filter(|r| r.date == date && r.time == time && r.table_type == t.table_type)
                    .count() as u32;
                taken < t.count
            })
            .map(|t| TableOption {
                table_type: t.table_type.clone(),
                price: t.price,
                capacity: t.capacity,
            })
            .collect()
    }
}

#[async_trait]
impl AvailabilityService for InMemoryVenue {
    async fn available_table_types(
        &self,
        restaurant_id: &str,
        date: NaiveDate,
        time: NaiveTime,
        party_size: u32,
    ) -> Result<Vec<TableOption>, ServiceError> {
        self.ensure_online(restaurant_id)?;
        Ok(self.free_tables(date, time, party_size).await)
    }

    async fn max_capacity(&self, restaurant_id: &str) -> Result<u32, ServiceError> {
        self.ensure_online(restaurant_id)?;
        Ok(self.tables.iter().map(|t| t.capacity).max().unwrap_or(0))
    }
}

#[async_trait]
impl ReservationService for InMemoryVenue {
    async fn create_reservation(
        &self,
        request: ReservationRequest,
    ) -> Result<Reservation, ServiceError> {
        self.ensure_online(&request.restaurant_id)?;
        let free = self
            .free_tables(request.date, request.time, request.party_size)
            .await;
        if !free
            .iter()
            .any(|t| t.table_type.eq_ignore_ascii_case(&request.table_type))
        {
            return Err(ServiceError::NoCapacity);
        }

        let reservation = Reservation {
            reservation_id: format!("R-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
            date: request.date,
            time: request.time,
            party_size: request.party_size,
            table_type: request.table_type.to_lowercase(),
            customer_name: request.customer_name,
        };
        self.reservations.write().await.push(reservation.clone());
        tracing::info!(reservation_id = %reservation.reservation_id, "reservation stored");
        Ok(reservation)
    }
}

#[async_trait]
impl MenuService for InMemoryVenue {
    async fn search_menu(
        &self,
        restaurant_id: &str,
        query: &MenuQuery,
    ) -> Result<Vec<MenuItem>, ServiceError> {
        self.ensure_online(restaurant_id)?;
        let terms: Vec<String> = query
            .query
            .as_deref()
            .unwrap_or("")
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 3)
            .map(String::from)
            .collect();

        Ok(self
            .menu
            .iter()
            .filter(|i| query.category.as_ref().map_or(true, |c| &i.category == c))
            .filter(|i| query.dietary.as_ref().map_or(true, |d| i.dietary.contains(d)))
            .filter(|i| {
                let haystack = format!("{} {}", i.name, i.description).to_lowercase();
                terms.is_empty() || terms.iter().any(|t| haystack.contains(t.as_str()))
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl InfoService for InMemoryVenue {
    async fn lookup(
        &self,
        restaurant_id: &str,
        topic: &str,
        _query: Option<&str>,
    ) -> Result<Vec<InfoEntry>, ServiceError> {
        self.ensure_online(restaurant_id)?;
        let entries: Vec<InfoEntry> = if topic == "general" {
            self.info.clone()
        } else {
            self.info.iter().filter(|e| e.topic == topic).cloned().collect()
        };
        if entries.is_empty() {
            return Err(ServiceError::NotFound(format!("info topic {topic}")));
        }
        Ok(entries)
    }
}

#[async_trait]
impl CelebrationService for InMemoryVenue {
    async fn packages(
        &self,
        restaurant_id: &str,
        occasion: &str,
        _party_size: Option<u32>,
    ) -> Result<Vec<CelebrationPackage>, ServiceError> {
        self.ensure_online(restaurant_id)?;
        Ok(self
            .packages
            .iter()
            .filter(|p| p.occasions.iter().any(|o| o == occasion))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SupportService for InMemoryVenue {
    async fn open_ticket(
        &self,
        restaurant_id: &str,
        topic: &str,
        message: &str,
        reservation_id: Option<&str>,
    ) -> Result<SupportTicket, ServiceError> {
        self.ensure_online(restaurant_id)?;
        let mut tickets = self.tickets.write().await;
        let ticket = SupportTicket {
            ticket_id: format!("T-{:04}", tickets.len() + 1),
            topic: topic.to_string(),
            follow_up: match reservation_id {
                Some(id) => format!("Our team will follow up about reservation {id} within 24 hours."),
                None => "Our team will follow up within 24 hours.".to_string(),
            },
        };
        tracing::info!(ticket_id = %ticket.ticket_id, topic, len = message.len(), "support ticket opened");
        tickets.push(ticket.clone());
        Ok(ticket)
    }
}
