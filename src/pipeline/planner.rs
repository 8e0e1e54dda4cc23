use std::sync::Arc;

use crate::core::PipelineError;
use crate::llm::LlmClient;
use crate::pipeline::parse::parse_document;
use crate::pipeline::types::{ExecutionPlan, TaskContext};

pub struct PlanGenerator {
    llm: Arc<dyn LlmClient>,
}

impl PlanGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 一次生成调用；回复无法解析为 JSON 对象时返回兜底计划
    pub async fn plan(
        &self,
        task: &str,
        context: &TaskContext,
    ) -> Result<ExecutionPlan, PipelineError> {
        let prompt = self.build_prompt(task, context);
        tracing::debug!(prompt_len = prompt.len(), "Planning prompt built");

        let response = self.llm.generate(&prompt).await?;

        Ok(match parse_document(&response) {
            Some(fields) => ExecutionPlan::from_map(fields),
            None => {
                tracing::warn!(task = %task, "Plan response is not a JSON object, using fallback plan");
                ExecutionPlan::fallback(&response)
            }
        })
    }

    fn build_prompt(&self, task: &str, context: &TaskContext) -> String {
        let context_json =
            serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string());
        format!(
            r#"You are an autonomous task planning expert.

Task: {task}
Context: {context_json}

Create a detailed execution plan with:
1. High-level approach
2. Step-by-step breakdown
3. Required tools and builtins
4. Expected outputs
5. Potential challenges and solutions

Respond with a single JSON object with the keys "approach", "steps", "tools", "expected_outputs" and "challenges", inside a ```json fenced block."#
        )
    }
}
