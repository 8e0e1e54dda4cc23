//! Agent：管线、批量执行、历史、自我回顾与工具的唯一持有者
//!
//! 由 AgentBuilder 在进程启动时构造一次，调用方持有其引用或 Arc；每个任务完成时（含批量中的任务）
//! 立即上报遥测，批量结束后再上报汇总指标。

use std::sync::Arc;

use serde_json::{json, Value};

use crate::core::PipelineError;
use crate::memory::HistoryStore;
use crate::observability::Telemetry;
use crate::pipeline::{
    BatchRunner, ExecutionStats, ImprovementReport, SelfImprover, TaskContext, TaskPipeline,
    TaskResult, TemplatedTask,
};
use crate::tools::{ToolExecutor, WorkspaceStore};

pub struct Agent {
    pipeline: Arc<TaskPipeline>,
    batch: BatchRunner,
    improver: SelfImprover,
    executor: ToolExecutor,
    workspace: WorkspaceStore,
    telemetry: Telemetry,
}

impl Agent {
    pub(crate) fn new(
        pipeline: Arc<TaskPipeline>,
        batch: BatchRunner,
        improver: SelfImprover,
        executor: ToolExecutor,
        workspace: WorkspaceStore,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            pipeline,
            batch,
            improver,
            executor,
            workspace,
            telemetry,
        }
    }

    /// 运行单个任务；结果已追加进历史
    pub async fn run_task(&self, task: &str, context: &TaskContext) -> Arc<TaskResult> {
        let result = self.pipeline.run_task(task, context).await;
        self.report_task(&result).await;
        result
    }

    pub async fn run_template(&self, template: &TemplatedTask) -> Arc<TaskResult> {
        self.run_task(&template.task, &template.context).await
    }

    pub async fn run_batch(&self, tasks: &[String], context: &TaskContext) -> Vec<Arc<TaskResult>> {
        let results = self
            .batch
            .run_batch_with(tasks, context, move |result| async move {
                self.report_task(&result).await;
            })
            .await;

        let stats = ExecutionStats::from_results(&results);
        self.telemetry
            .metric("batch_total_tasks", stats.total as f64)
            .await;
        self.telemetry
            .metric("batch_successful_tasks", stats.successful as f64)
            .await;
        self.telemetry
            .metric("batch_success_rate", stats.success_rate)
            .await;
        results
    }

    /// 最近 limit 条记录（旧的在前）；None 返回全部
    pub fn history(&self, limit: Option<usize>) -> Vec<Arc<TaskResult>> {
        self.pipeline.history().recent(limit)
    }

    pub fn clear_history(&self) {
        self.pipeline.history().clear();
        tracing::info!("Execution history cleared");
    }

    pub fn stats(&self) -> ExecutionStats {
        ExecutionStats::from_results(&self.history(None))
    }

    pub async fn self_improve(&self) -> Result<ImprovementReport, PipelineError> {
        let history = self.pipeline.history();
        let recent = history.recent(Some(crate::pipeline::improve::REVIEW_WINDOW));
        self.improver.review(&recent, history.len()).await
    }

    pub fn tools(&self) -> &ToolExecutor {
        &self.executor
    }

    pub async fn call_tool(&self, name: &str, args: Value) -> Result<String, PipelineError> {
        self.executor.execute(name, args).await
    }

    pub fn workspace(&self) -> &WorkspaceStore {
        &self.workspace
    }

    async fn report_task(&self, result: &TaskResult) {
        if !self.telemetry.is_enabled() {
            return;
        }
        let succeeded = result.is_success();
        self.telemetry
            .metric("task_success", if succeeded { 1.0 } else { 0.0 })
            .await;
        let record = json!({
            "task": result.task(),
            "success": succeeded,
            "timestamp": result.timestamp().to_rfc3339(),
            "error": result.error(),
        });
        self.telemetry.record("task_result", &record).await;
    }
}
