//! 记忆层：LLM 消息与进程内执行历史

pub mod history;
pub mod message;

pub use history::{HistoryStore, InMemoryHistory};
pub use message::{last_user_content, Message, Role};
