//! 会话：标识、时钟与存储

pub mod clock;
pub mod store;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{MemorySessionStore, SessionLease, SessionStore};

const MAX_SESSION_ID_LEN: usize = 128;

/// 会话 ID：非空、无控制字符、不超过 128 字符
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(raw: &str) -> Result<Self, AgentError> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.chars().count() > MAX_SESSION_ID_LEN
            || trimmed.chars().any(char::is_control)
        {
            return Err(AgentError::InvalidSessionId(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// 新会话（终端程序使用）
    pub fn generate() -> Self {
        Self(format!("session_{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
