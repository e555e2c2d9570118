//! 会话存储
//!
//! checkout 返回持有该会话互斥锁的租约：同一会话的并发请求被串行化，不同会话互不阻塞。
//! 租约 commit 后状态才写回；未 commit 就丢弃租约（轮次失败）时保留上一次的已知良好状态。
//! 活跃时间只在 commit 时刷新；超过 TTL 未成功完成一轮的会话在 checkout 时重置，
//! 并由 cleanup_expired 周期性移除。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::clock::Clock;
use super::SessionId;
use crate::core::state::SessionState;

const MAX_TTL_SECS: i64 = 100 * 365 * 24 * 3600;

/// 单个会话槽
#[derive(Debug)]
pub struct SessionSlot {
    state: SessionState,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
    /// 已被清理任务移出映射；持有旧 Arc 的等待者需重新查找
    evicted: bool,
}

impl SessionSlot {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: SessionState::default(),
            created_at: now,
            last_active: now,
            evicted: false,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_active > ttl
    }
}

/// 会话租约：持有期间独占该会话
pub struct SessionLease {
    id: SessionId,
    guard: OwnedMutexGuard<SessionSlot>,
    clock: Arc<dyn Clock>,
}

impl SessionLease {
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.guard.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.guard.created_at
    }

    /// 写回本轮的最终状态
    pub fn commit(mut self, state: SessionState) {
        self.guard.state = state;
        self.guard.last_active = self.clock.now();
    }
}

/// 会话存储接口
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// 取得（必要时创建）会话的独占租约
    async fn checkout(&self, id: &SessionId) -> SessionLease;

    /// 会话当前状态的副本（不存在时 None）
    async fn snapshot(&self, id: &SessionId) -> Option<SessionState>;

    /// 移除过期会话，返回移除数量
    async fn cleanup_expired(&self) -> usize;

    /// 当前会话数
    async fn active_count(&self) -> usize;
}

/// 内存会话存储
pub struct MemorySessionStore {
    slots: RwLock<HashMap<SessionId, Arc<Mutex<SessionSlot>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX).min(MAX_TTL_SECS)),
            clock,
        }
    }

    async fn slot(&self, id: &SessionId) -> Arc<Mutex<SessionSlot>> {
        if let Some(slot) = self.slots.read().await.get(id) {
            return slot.clone();
        }
        let now = self.clock.now();
        self.slots
            .write()
            .await
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(session = %id, "session created");
                Arc::new(Mutex::new(SessionSlot::new(now)))
            })
            .clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn checkout(&self, id: &SessionId) -> SessionLease {
        loop {
            let slot = self.slot(id).await;
            let mut guard = slot.lock_owned().await;
            if guard.evicted {
                continue;
            }
            let now = self.clock.now();
            if guard.is_expired(now, self.ttl) {
                tracing::info!(session = %id, "session expired, starting fresh");
                *guard = SessionSlot::new(now);
            }
            return SessionLease {
                id: id.clone(),
                guard,
                clock: self.clock.clone(),
            };
        }
    }

    async fn snapshot(&self, id: &SessionId) -> Option<SessionState> {
        let slot = self.slots.read().await.get(id).cloned()?;
        let guard = slot.lock().await;
        if guard.evicted {
            None
        } else {
            Some(guard.state.clone())
        }
    }

    async fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|id, slot| {
            // 正在处理中的会话不清理
            let Ok(mut guard) = slot.try_lock() else {
                return true;
            };
            if guard.is_expired(now, self.ttl) {
                guard.evicted = true;
                tracing::debug!(session = %id, "session evicted");
                false
            } else {
                true
            }
        });
        before - slots.len()
    }

    async fn active_count(&self) -> usize {
        self.slots.read().await.len()
    }
}
