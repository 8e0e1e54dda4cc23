//! 管线错误类型
//!
//! 只有 PipelineError 会中止单个任务（记录为 Failure）；结构化解析失败走兜底记录，
//! 解释器错误写入 ExecutionOutcome.errors，均不在此处出现。

use thiserror::Error;

use crate::llm::LlmError;

/// 管线步骤、工具与工作区可能产生的错误
#[derive(Error, Debug)]
pub enum PipelineError {
    /// 生成能力调用失败（网络、鉴权、配额、超时），不做重试
    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    /// 仅在 interpretation_failure_is_fatal = true 时出现
    #[error("Interpretation failed: {0}")]
    Interpretation(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),
}
