//! 对话历史
//!
//! 调用方持有完整历史；推理只截取最近若干条（history_window），并渲染为纯文本 transcript 拼进 prompt。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 取最近 n 条消息（不足 n 条时返回全部）
pub fn recent(history: &[Message], n: usize) -> &[Message] {
    &history[history.len().saturating_sub(n)..]
}

/// 渲染为 "User: ..." / "Assistant: ..." 行；空历史返回 "(no previous messages)"
pub fn format_transcript(history: &[Message]) -> String {
    if history.is_empty() {
        return "(no previous messages)".to_string();
    }
    history
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 终端会话使用的有界历史：保留最近 max_turns 轮（每轮 user + assistant）
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// 记录一轮完整交互
    pub fn record_turn(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.messages.push(Message::user(user));
        self.messages.push(Message::assistant(assistant));
        let keep = self.max_turns * 2;
        if self.messages.len() > keep {
            self.messages.drain(..self.messages.len() - keep);
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_turn_prunes_oldest() {
        let mut memory = ConversationMemory::new(2);
        memory.record_turn("a", "1");
        memory.record_turn("b", "2");
        memory.record_turn("c", "3");
        assert_eq!(memory.len(), 4);
        assert_eq!(memory.messages()[0].content, "b");
    }

    #[test]
    fn test_recent_and_transcript() {
        let history = vec![
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("menu?"),
        ];
        assert_eq!(recent(&history, 2).len(), 2);
        assert_eq!(recent(&history, 10).len(), 3);
        let text = format_transcript(recent(&history, 2));
        assert_eq!(text, "Assistant: hello\nUser: menu?");
        assert_eq!(format_transcript(&[]), "(no previous messages)");
    }
}
