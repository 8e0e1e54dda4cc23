use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::PipelineError;
use crate::llm::LlmClient;
use crate::pipeline::types::TaskResult;

/// 送入回顾 prompt 的最近记录条数
pub const REVIEW_WINDOW: usize = 10;

pub const EMPTY_HISTORY_MESSAGE: &str = "No execution history to analyze";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImprovementReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_date: Option<DateTime<Utc>>,
    pub executions_analyzed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 生成能力给出的自由文本建议；历史为空时为空串
    pub suggestions: String,
}

pub struct SelfImprover {
    llm: Arc<dyn LlmClient>,
}

impl SelfImprover {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// recent 为最近的记录（旧的在前），total 为历史总条数
    pub async fn review(
        &self,
        recent: &[Arc<TaskResult>],
        total: usize,
    ) -> Result<ImprovementReport, PipelineError> {
        if recent.is_empty() {
            return Ok(ImprovementReport {
                analysis_date: None,
                executions_analyzed: 0,
                message: Some(EMPTY_HISTORY_MESSAGE.to_string()),
                suggestions: String::new(),
            });
        }

        let window = &recent[recent.len().saturating_sub(REVIEW_WINDOW)..];
        let records: Vec<&TaskResult> = window.iter().map(|r| r.as_ref()).collect();
        let history_json =
            serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string());

        let prompt = format!(
            r#"You are a self-improving task execution system.

Analyze the following execution history and provide improvement suggestions:
{history_json}

Identify:
1. Common patterns in successful executions
2. Frequent error patterns
3. Code quality improvements
4. Performance optimizations
5. New capabilities to add

Provide actionable suggestions for self-improvement."#
        );

        let suggestions = self.llm.generate(&prompt).await?;
        tracing::info!(executions = total, "Self-improvement review generated");

        Ok(ImprovementReport {
            analysis_date: Some(Utc::now()),
            executions_analyzed: total,
            message: None,
            suggestions,
        })
    }
}
