//! DeepSeek 后端（OpenAI 兼容格式）
//!
//! - Base URL: https://api.deepseek.com
//! - 代码生成默认用 deepseek-chat，可由 DEEPSEEK_MODEL 或 [llm.deepseek].model 覆盖

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 创建 DeepSeek 客户端
///
/// Key 取 `DEEPSEEK_API_KEY`，其次 `OPENAI_API_KEY`；模型依次取参数、`DEEPSEEK_MODEL`、deepseek-chat。
pub fn create_deepseek_client(model: Option<&str>, temperature: f32) -> OpenAiClient {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_else(|| "sk-placeholder".to_string());

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());

    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), &model, Some(api_key.as_str()))
        .with_temperature(temperature)
}
