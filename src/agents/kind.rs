//! 六个能力智能体的标识
//!
//! 名称即对外约定（规划器输出、globalContext 的键、nextAgent），关键词用于兜底规划与完成度分析。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentKind {
    #[serde(rename = "availability-agent")]
    Availability,
    #[serde(rename = "menu-agent")]
    Menu,
    #[serde(rename = "info-agent")]
    Info,
    #[serde(rename = "celebration-agent")]
    Celebration,
    #[serde(rename = "reservation-agent")]
    Reservation,
    #[serde(rename = "support-agent")]
    Support,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Availability,
        AgentKind::Menu,
        AgentKind::Info,
        AgentKind::Celebration,
        AgentKind::Reservation,
        AgentKind::Support,
    ];

    /// 关键词打平时的优先顺序
    const PRIORITY: [AgentKind; 6] = [
        AgentKind::Support,
        AgentKind::Reservation,
        AgentKind::Availability,
        AgentKind::Celebration,
        AgentKind::Menu,
        AgentKind::Info,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Availability => "availability-agent",
            AgentKind::Menu => "menu-agent",
            AgentKind::Info => "info-agent",
            AgentKind::Celebration => "celebration-agent",
            AgentKind::Reservation => "reservation-agent",
            AgentKind::Support => "support-agent",
        }
    }

    /// 规划器 prompt 中的一行能力描述
    pub fn description(&self) -> &'static str {
        match self {
            AgentKind::Availability => {
                "Checks which tables are free for a date, time and party size."
            }
            AgentKind::Menu => "Answers questions about dishes, prices, ingredients and dietary needs.",
            AgentKind::Info => {
                "Answers questions about opening hours, location, parking, contact details and policies."
            }
            AgentKind::Celebration => {
                "Suggests packages and extras for birthdays, anniversaries and other occasions."
            }
            AgentKind::Reservation => {
                "Completes a booking once a table type is chosen: collects contact details and creates the reservation."
            }
            AgentKind::Support => {
                "Handles cancellations, changes to existing bookings, complaints, refunds and anything else."
            }
        }
    }

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            AgentKind::Availability => &[
                "availability",
                "available",
                "free table",
                "table for",
                "party of",
                "people",
                "guests",
                "seats",
            ],
            AgentKind::Menu => &[
                "menu",
                "dish",
                "food",
                "vegan",
                "vegetarian",
                "gluten",
                "dairy",
                "nuts",
                "nut-free",
                "peanut",
                "allerg",
                "dessert",
                "drink",
                "wine",
                "starter",
            ],
            AgentKind::Info => &[
                "hour",
                "open",
                "close",
                "location",
                "address",
                "parking",
                "directions",
                "contact",
                "phone number",
                "policy",
                "wheelchair",
                "accessib",
            ],
            AgentKind::Celebration => &[
                "birthday",
                "anniversary",
                "celebrat",
                "proposal",
                "cake",
                "decoration",
                "surprise",
                "occasion",
            ],
            AgentKind::Reservation => &["book", "reserve", "reservation", "confirm"],
            AgentKind::Support => &[
                "cancel",
                "refund",
                "complain",
                "problem",
                "issue",
                "modify",
                "change my booking",
            ],
        }
    }

    /// 文本命中的关键词数
    pub fn relevance(&self, text: &str) -> usize {
        let lower = text.to_lowercase();
        self.keywords().iter().filter(|k| lower.contains(*k)).count()
    }

    /// 关键词得分最高的智能体；全部为 0 时返回 None
    pub fn best_match(text: &str) -> Option<AgentKind> {
        let mut best: Option<(AgentKind, usize)> = None;
        for kind in Self::PRIORITY {
            let score = kind.relevance(text);
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((kind, score));
            }
        }
        best.map(|(kind, _)| kind)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 宽松解析：`availability-agent`、`availability`、`AvailabilityAgent`、`availability_agent` 均可
impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let key = key.strip_suffix("agent").unwrap_or(&key);
        match key {
            "availability" => Ok(AgentKind::Availability),
            "menu" => Ok(AgentKind::Menu),
            "info" | "information" => Ok(AgentKind::Info),
            "celebration" => Ok(AgentKind::Celebration),
            "reservation" | "booking" => Ok(AgentKind::Reservation),
            "support" => Ok(AgentKind::Support),
            _ => Err(format!("unknown agent: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_parse() {
        assert_eq!("availability-agent".parse::<AgentKind>(), Ok(AgentKind::Availability));
        assert_eq!("MenuAgent".parse::<AgentKind>(), Ok(AgentKind::Menu));
        assert_eq!("info_agent".parse::<AgentKind>(), Ok(AgentKind::Info));
        assert!("weather-agent".parse::<AgentKind>().is_err());
    }

    #[test]
    fn test_best_match() {
        assert_eq!(
            AgentKind::best_match("Check availability for tomorrow at 8pm for 4 people"),
            Some(AgentKind::Availability)
        );
        assert_eq!(
            AgentKind::best_match("are your lamb chops gluten-free"),
            Some(AgentKind::Menu)
        );
        assert_eq!(
            AgentKind::best_match("I want to cancel my reservation"),
            Some(AgentKind::Support)
        );
        assert_eq!(AgentKind::best_match("qwerty"), None);
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&AgentKind::Reservation).unwrap();
        assert_eq!(json, "\"reservation-agent\"");
    }
}
