//! 超时包装：给任意 LlmClient 加单次请求的截止时间
//!
//! 可选加固项，由 [llm.timeouts].request 控制（0 表示不包装）；超时转为 LlmError::Timeout，不重试。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

pub struct TimeoutLlmClient {
    inner: Arc<dyn LlmClient>,
    limit: Duration,
}

impl TimeoutLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl LlmClient for TimeoutLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        match timeout(self.limit, self.inner.complete(messages)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(limit_secs = self.limit.as_secs(), "LLM request timed out");
                Err(LlmError::Timeout(self.limit.as_secs()))
            }
        }
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}
