//! LLM 层：生成能力的客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock / 超时包装）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod timeout;
pub mod traits;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage, DEFAULT_TEMPERATURE};
pub use timeout::TimeoutLlmClient;
pub use traits::{LlmClient, LlmError};
