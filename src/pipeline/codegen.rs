use std::sync::Arc;

use crate::core::PipelineError;
use crate::llm::LlmClient;
use crate::pipeline::parse::extract_code;
use crate::pipeline::types::ExecutionPlan;

pub struct CodeGenerator {
    llm: Arc<dyn LlmClient>,
}

impl CodeGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 返回提取出的程序文本（去首尾空白），不做语法校验
    pub async fn generate(&self, task: &str, plan: &ExecutionPlan) -> Result<String, PipelineError> {
        let plan_json = serde_json::to_string_pretty(plan).unwrap_or_else(|_| "{}".to_string());
        let prompt = format!(
            r#"You are an expert Lua code generator.

Task: {task}
Plan: {plan_json}

Write a complete, self-contained Lua 5.4 program that:
1. Accomplishes the task completely
2. Handles errors gracefully (pcall where useful)
3. Prints its results with print()
4. Is clean and readable

Available globals: print, len, str, int, float, list, dict, set, tuple, pairs, ipairs, next, select, type, tostring, tonumber, error, assert, pcall, string, table, math, utf8.
There is no io, os, require or load.

Return ONLY the Lua code in a ```lua fenced block, without explanations."#
        );
        tracing::debug!(prompt_len = prompt.len(), "Code generation prompt built");

        let response = self.llm.generate(&prompt).await?;
        Ok(extract_code(&response, "lua"))
    }
}
