//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 在超时内调用 registry.execute，
//! 超时转为 PipelineError::ToolTimeout；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::PipelineError;
use crate::tools::ToolRegistry;

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn execute(
        &self,
        tool_name: &str,
        args: serde_json::Value,
    ) -> Result<String, PipelineError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, args)).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(PipelineError::ToolNotFound(_))) => "not_found",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Ok(inner) => inner,
            Err(_) => Err(PipelineError::ToolTimeout(tool_name.to_string())),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{CodeInterpreter, RunCodeTool, Tool};
    use async_trait::async_trait;
    use serde_json::Value;

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "Sleeps for a minute"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("woke".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_tool_timeout() {
        let mut registry = ToolRegistry::new();
        registry.register(Sleepy);
        let executor = ToolExecutor::new(registry, 1);

        let err = executor
            .execute("sleepy", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolTimeout(ref n) if n == "sleepy"));
    }

    #[tokio::test]
    async fn test_run_code_respects_tool_timeout() {
        let mut registry = ToolRegistry::new();
        // 解释器自身 3s 截止，保证阻塞线程最终退出
        registry.register(RunCodeTool::new(CodeInterpreter::with_timeout_secs(3)));
        let executor = ToolExecutor::new(registry, 1);

        let start = Instant::now();
        let err = executor
            .execute("run_code", serde_json::json!({"code": "while true do end"}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolTimeout(ref n) if n == "run_code"));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let executor = ToolExecutor::new(ToolRegistry::new(), 5);
        let err = executor
            .execute("nope", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown tool: nope");
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = serde_json::json!({ "code": "x".repeat(500) });
        let preview = args_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 203);
    }
}
