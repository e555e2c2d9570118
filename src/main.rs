//! Concierge - 终端对话入口
//!
//! 加载配置、初始化日志，在内存演示场馆上构建编排器，然后逐行读取标准输入并打印回复。

use std::sync::Arc;

use anyhow::Context;
use concierge::config::{load_config, AppConfig};
use concierge::core::OrchestratorBuilder;
use concierge::memory::ConversationMemory;
use concierge::observability;
use concierge::services::{InMemoryVenue, Services};
use concierge::session::SessionId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let restaurant_id = cfg.venue.restaurant_id.clone();
    let venue = Arc::new(InMemoryVenue::demo(restaurant_id.clone()));
    let orchestrator = OrchestratorBuilder::new(cfg.clone())
        .with_known_names(venue.catalog_names())
        .with_services(Services::from_venue(venue))
        .build()
        .context("Failed to build orchestrator")?;

    // 过期会话定期清理
    let store = orchestrator.session_store();
    let cleanup_secs = cfg.session.cleanup_interval_secs.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(cleanup_secs));
        interval.tick().await;
        loop {
            interval.tick().await;
            let expired = store.cleanup_expired().await;
            if expired > 0 {
                tracing::info!("Cleaned up {} expired sessions", expired);
            }
        }
    });

    let session_id = SessionId::generate();
    let mut memory = ConversationMemory::new(cfg.app.max_context_turns);
    tracing::info!(session = %session_id, restaurant = %restaurant_id, "chat started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout
        .write_all(b"Welcome! Ask about tables, the menu or opening hours. Type /quit to leave.\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let message = line.trim();
        match message {
            "" => {}
            "/quit" | "/exit" => break,
            "/clear" => {
                memory.clear();
                stdout.write_all(b"(history cleared)\n").await?;
            }
            _ => {
                let turn = orchestrator
                    .handle_message(&session_id, message, memory.messages(), &restaurant_id)
                    .await;
                let mut output = turn.reply.clone();
                if let Some(event) = &turn.terminal_event {
                    output.push_str(&format!("\n[{}]", serde_json::to_string(event)?));
                }
                stdout.write_all(format!("{output}\n").as_bytes()).await?;
                memory.record_turn(message, turn.reply);
            }
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
