//! 任务管线：规划 → 生成代码 → 执行 → 分析 → 记录
//!
//! 每次 run_task 恰好向历史追加一条 TaskResult 并返回它；任一步骤出错都记为 Failure
//! （带出错阶段），不重试，也不保留已完成步骤的部分结果。

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::{PipelineError, PipelinePhase};
use crate::llm::LlmClient;
use crate::memory::HistoryStore;
use crate::pipeline::analyzer::ResultAnalyzer;
use crate::pipeline::codegen::CodeGenerator;
use crate::pipeline::planner::PlanGenerator;
use crate::pipeline::types::{TaskContext, TaskOutcome, TaskResult};
use crate::tools::CodeInterpreter;

/// 管线行为开关
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelinePolicy {
    /// 为 true 时，执行失败在分析前中止任务（记为 Execution 阶段的 Failure）
    pub interpretation_failure_is_fatal: bool,
}

pub struct TaskPipeline {
    planner: PlanGenerator,
    codegen: CodeGenerator,
    interpreter: CodeInterpreter,
    analyzer: ResultAnalyzer,
    history: Arc<dyn HistoryStore>,
    policy: PipelinePolicy,
    workspace: Option<PathBuf>,
}

impl TaskPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        interpreter: CodeInterpreter,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            planner: PlanGenerator::new(Arc::clone(&llm)),
            codegen: CodeGenerator::new(Arc::clone(&llm)),
            interpreter,
            analyzer: ResultAnalyzer::new(llm),
            history,
            policy: PipelinePolicy::default(),
            workspace: None,
        }
    }

    pub fn with_policy(mut self, policy: PipelinePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 记录进每条 TaskResult 的工作区路径
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    pub fn policy(&self) -> PipelinePolicy {
        self.policy
    }

    pub async fn run_task(&self, task: &str, context: &TaskContext) -> Arc<TaskResult> {
        tracing::info!(task = %task, "Pipeline executing task");

        let outcome = match self.execute_steps(task, context).await {
            Ok(outcome) => {
                tracing::info!(task = %task, "Task completed successfully");
                outcome
            }
            Err((phase, e)) => {
                tracing::error!(task = %task, phase = %phase, error = %e, "Task failed");
                TaskOutcome::Failure {
                    error: e.to_string(),
                    phase,
                }
            }
        };

        let result = Arc::new(TaskResult::new(task, outcome, self.workspace.clone()));
        self.history.append(Arc::clone(&result));
        result
    }

    async fn execute_steps(
        &self,
        task: &str,
        context: &TaskContext,
    ) -> Result<TaskOutcome, (PipelinePhase, PipelineError)> {
        let mut phase = PipelinePhase::Start.next();

        let plan = self
            .planner
            .plan(task, context)
            .await
            .map_err(|e| (phase, e))?;
        phase = phase.next();

        let code = self
            .codegen
            .generate(task, &plan)
            .await
            .map_err(|e| (phase, e))?;
        phase = phase.next();

        let execution = self.interpreter.execute_blocking(&code).await;
        if !execution.succeeded() && self.policy.interpretation_failure_is_fatal {
            let message = execution.errors().join("; ");
            return Err((phase, PipelineError::Interpretation(message)));
        }
        phase = phase.next();

        let analysis = self
            .analyzer
            .analyze(&execution)
            .await
            .map_err(|e| (phase, e))?;

        Ok(TaskOutcome::Success {
            plan,
            code,
            execution,
            analysis,
        })
    }
}
