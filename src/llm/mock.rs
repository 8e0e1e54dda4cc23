//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! 默认按 prompt 类型给出固定回复：规划/分析返回 JSON 块，代码生成返回打印任务描述的 Lua 程序。
//! 测试可用 `with_responder` 注入任意脚本化回复（含失败）。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{last_user_content, Message};

type Responder = Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>;

/// Mock 客户端：根据最后一条 user 消息计算回复，并记录收到的 prompt
pub struct MockLlmClient {
    responder: Responder,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::with_responder(default_response)
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// 默认脚本：按 prompt 类型给出固定回复，便于在自定义 responder 中回退
    pub fn default_response(prompt: &str) -> Result<String, LlmError> {
        default_response(prompt)
    }

    /// 对任何 prompt 都返回同一段文本
    pub fn fixed(response: impl Into<String>) -> Self {
        let response = response.into();
        Self::with_responder(move |_| Ok(response.clone()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLlmClient")
            .field("calls", &self.call_count())
            .finish()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let prompt = last_user_content(messages).unwrap_or("(no input)");
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        (self.responder)(prompt)
    }
}

fn default_response(prompt: &str) -> Result<String, LlmError> {
    if prompt.contains("task planning expert") {
        Ok(r#"```json
{"approach": "Mock plan", "steps": ["print the task"], "tools": ["print"]}
```"#
            .to_string())
    } else if prompt.contains("Lua code generator") {
        let task = prompt
            .lines()
            .find_map(|l| l.trim().strip_prefix("Task:"))
            .unwrap_or("")
            .trim();
        Ok(format!(
            "```lua\nprint({})\n```",
            serde_json::Value::String(format!("Mock executed: {task}"))
        ))
    } else if prompt.contains("execution result analyst") {
        Ok(r#"```json
{"summary": "Mock analysis", "insights": "n/a", "quality": "good", "recommendations": [], "next_steps": []}
```"#
            .to_string())
    } else {
        Ok(format!("Echo from Mock: {prompt}"))
    }
}
