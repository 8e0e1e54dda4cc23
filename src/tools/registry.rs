//! 工具注册表
//!
//! 管线能力（run_code / file_read / file_write）都实现 Tool trait，由 ToolRegistry 按名注册，
//! ToolExecutor 调用时加超时并统一转 PipelineError。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::PipelineError;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// 工具描述，含参数格式
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认不限参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 按名称存储 Arc<dyn Tool>；BTreeMap 保证列举顺序稳定
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名工具后注册者覆盖前者
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<String, PipelineError> {
        let tool = self
            .get(name)
            .ok_or_else(|| PipelineError::ToolNotFound(name.to_string()))?;
        tool.execute(args)
            .await
            .map_err(PipelineError::ToolExecutionFailed)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 所有工具的 name / description / parameters，JSON 数组
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase. Args: {\"text\": \"...\"}"
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            args.get("text")
                .and_then(|v| v.as_str())
                .map(str::to_uppercase)
                .ok_or_else(|| "missing text".to_string())
        }
    }

    #[tokio::test]
    async fn test_register_and_execute() {
        let mut registry = ToolRegistry::new();
        registry.register(Upper);
        assert_eq!(registry.tool_names(), vec!["upper"]);

        let out = registry
            .execute("upper", serde_json::json!({"text": "abc"}))
            .await
            .unwrap();
        assert_eq!(out, "ABC");

        let schema: Value = serde_json::from_str(&registry.to_schema_json()).unwrap();
        assert_eq!(schema[0]["name"], "upper");
        assert_eq!(schema[0]["parameters"]["type"], "object");
    }

    #[tokio::test]
    async fn test_errors_are_mapped() {
        let mut registry = ToolRegistry::new();
        registry.register(Upper);

        let err = registry
            .execute("missing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolNotFound(ref n) if n == "missing"));

        let err = registry
            .execute("upper", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ToolExecutionFailed(ref m) if m == "missing text"));
    }
}
