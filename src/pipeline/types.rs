use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::core::PipelinePhase;

/// 任务上下文：任意键值，原样序列化进规划 prompt
pub type TaskContext = Map<String, Value>;

/// 执行计划：半结构化文档，不强制 schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionPlan(Map<String, Value>);

impl ExecutionPlan {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// 解析失败时的固定兜底计划，details 保存原始回复
    pub fn fallback(raw_response: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("approach".into(), json!("Generate and execute Lua code"));
        fields.insert(
            "steps".into(),
            json!([
                "Analyze task requirements",
                "Generate appropriate code",
                "Execute code in the interpreter",
                "Validate results"
            ]),
        );
        fields.insert("tools".into(), json!(["Lua 5.4", "Interpreter builtins"]));
        fields.insert("details".into(), json!(raw_response));
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn approach(&self) -> Option<&str> {
        self.0.get("approach").and_then(Value::as_str)
    }

    /// steps 中的字符串项；非数组或缺失时为空
    pub fn steps(&self) -> Vec<&str> {
        self.0
            .get("steps")
            .and_then(Value::as_array)
            .map(|steps| steps.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// 结果分析：同样是半结构化文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisRecord(Map<String, Value>);

impl AnalysisRecord {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fallback(raw_response: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("summary".into(), json!("Task executed"));
        fields.insert("insights".into(), json!(raw_response));
        fields.insert("quality".into(), json!("good"));
        fields.insert("recommendations".into(), json!([]));
        fields.insert("next_steps".into(), json!([]));
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn summary(&self) -> Option<&str> {
        self.0.get("summary").and_then(Value::as_str)
    }

    pub fn quality(&self) -> Option<&str> {
        self.0.get("quality").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// 解释器执行结果。errors 非空当且仅当 succeeded 为 false，只能经 success / failure 构造。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    succeeded: bool,
    captured_output: String,
    errors: Vec<String>,
    source_code: String,
    /// 程序定义的顶层变量（字符串化），仅成功时记录
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    variables: BTreeMap<String, String>,
}

impl ExecutionOutcome {
    pub fn success(
        source_code: impl Into<String>,
        captured_output: impl Into<String>,
        variables: BTreeMap<String, String>,
    ) -> Self {
        Self {
            succeeded: true,
            captured_output: captured_output.into(),
            errors: Vec::new(),
            source_code: source_code.into(),
            variables,
        }
    }

    pub fn failure(
        source_code: impl Into<String>,
        captured_output: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = "unknown interpreter error".to_string();
        }
        Self {
            succeeded: false,
            captured_output: captured_output.into(),
            errors: vec![error],
            source_code: source_code.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn captured_output(&self) -> &str {
        &self.captured_output
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }
}

/// 单次管线运行的结局，构造后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success {
        plan: ExecutionPlan,
        code: String,
        execution: ExecutionOutcome,
        analysis: AnalysisRecord,
    },
    Failure {
        error: String,
        /// 出错时所处的阶段
        phase: PipelinePhase,
    },
}

/// 一次管线运行的记录；追加进历史后只以 Arc 共享读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    id: Uuid,
    task: String,
    outcome: TaskOutcome,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workspace: Option<PathBuf>,
}

impl TaskResult {
    pub fn new(task: impl Into<String>, outcome: TaskOutcome, workspace: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: task.into(),
            outcome,
            timestamp: Utc::now(),
            workspace,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn outcome(&self) -> &TaskOutcome {
        &self.outcome
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Success { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Failure { error, .. } => Some(error),
            TaskOutcome::Success { .. } => None,
        }
    }

    pub fn execution(&self) -> Option<&ExecutionOutcome> {
        match &self.outcome {
            TaskOutcome::Success { execution, .. } => Some(execution),
            TaskOutcome::Failure { .. } => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Success { code, .. } => Some(code),
            TaskOutcome::Failure { .. } => None,
        }
    }
}

/// 成功率等派生统计（批量结果或整段历史）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    /// 最近 5 个任务描述，旧的在前
    pub recent_tasks: Vec<String>,
}

impl ExecutionStats {
    const RECENT_TASKS: usize = 5;

    pub fn from_results(results: &[Arc<TaskResult>]) -> Self {
        let total = results.len();
        let successful = results.iter().filter(|r| r.is_success()).count();
        let success_rate = if total == 0 {
            0.0
        } else {
            successful as f64 / total as f64
        };
        let recent_tasks = results
            .iter()
            .skip(total.saturating_sub(Self::RECENT_TASKS))
            .map(|r| r.task().to_string())
            .collect();

        Self {
            total,
            successful,
            failed: total - successful,
            success_rate,
            recent_tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(task: &str) -> Arc<TaskResult> {
        Arc::new(TaskResult::new(
            task,
            TaskOutcome::Failure {
                error: "boom".to_string(),
                phase: PipelinePhase::Planning,
            },
            None,
        ))
    }

    fn success(task: &str) -> Arc<TaskResult> {
        Arc::new(TaskResult::new(
            task,
            TaskOutcome::Success {
                plan: ExecutionPlan::fallback("raw"),
                code: "print(1)".to_string(),
                execution: ExecutionOutcome::success("print(1)", "1\n", BTreeMap::new()),
                analysis: AnalysisRecord::fallback("raw"),
            },
            None,
        ))
    }

    #[test]
    fn test_outcome_error_invariant() {
        let ok = ExecutionOutcome::success("x = 1", "", BTreeMap::new());
        assert!(ok.succeeded());
        assert!(ok.errors().is_empty());

        let failed = ExecutionOutcome::failure("x(", "partial\n", "");
        assert!(!failed.succeeded());
        assert_eq!(failed.errors().len(), 1);
        assert_eq!(failed.captured_output(), "partial\n");
    }

    #[test]
    fn test_plan_fallback_shape() {
        let plan = ExecutionPlan::fallback("free text plan");
        assert_eq!(plan.approach(), Some("Generate and execute Lua code"));
        assert_eq!(plan.steps().len(), 4);
        assert_eq!(plan.get("details"), Some(&json!("free text plan")));
    }

    #[test]
    fn test_analysis_fallback_shape() {
        let analysis = AnalysisRecord::fallback("looks fine");
        assert_eq!(analysis.summary(), Some("Task executed"));
        assert_eq!(analysis.quality(), Some("good"));
        assert_eq!(analysis.get("insights"), Some(&json!("looks fine")));
        assert_eq!(analysis.get("recommendations"), Some(&json!([])));
        assert_eq!(analysis.get("next_steps"), Some(&json!([])));
    }

    #[test]
    fn test_task_result_serializes_tagged() {
        let result = failure("t1");
        let value = serde_json::to_value(result.as_ref()).unwrap();
        assert_eq!(value["task"], "t1");
        assert_eq!(value["outcome"]["status"], "failure");
        assert_eq!(value["outcome"]["phase"], "planning");
        assert!(value.get("workspace").is_none());
    }

    #[test]
    fn test_stats_counts_and_recent() {
        let results: Vec<_> = (0..7)
            .map(|i| {
                if i % 2 == 0 {
                    success(&format!("t{i}"))
                } else {
                    failure(&format!("t{i}"))
                }
            })
            .collect();
        let stats = ExecutionStats::from_results(&results);
        assert_eq!(stats.total, 7);
        assert_eq!(stats.successful, 4);
        assert_eq!(stats.failed, 3);
        assert!((stats.success_rate - 4.0 / 7.0).abs() < 1e-9);
        assert_eq!(stats.recent_tasks, vec!["t2", "t3", "t4", "t5", "t6"]);
    }

    #[test]
    fn test_stats_empty() {
        let stats = ExecutionStats::from_results(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert!(stats.recent_tasks.is_empty());
    }
}
