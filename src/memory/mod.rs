//! 对话记忆：消息类型与有界历史

pub mod conversation;

pub use conversation::{format_transcript, recent, ConversationMemory, Message, Role};
