//! 批量执行
//!
//! 顺序模式：逐个运行，任务之间暂停 pause（最后一个之后不暂停），追加顺序即输入顺序。
//! 并行模式（max_concurrency > 1）：buffered 保持输入顺序返回，不暂停；历史追加由存储的锁串行化。
//! 单个任务失败不会中止批量。run_batch_with 在每个任务完成（已追加进历史）时立即回调。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};

use crate::pipeline::runner::TaskPipeline;
use crate::pipeline::types::{TaskContext, TaskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub pause: Duration,
    pub max_concurrency: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            pause: Duration::from_secs(1),
            max_concurrency: 1,
        }
    }
}

pub struct BatchRunner {
    pipeline: Arc<TaskPipeline>,
    policy: BatchPolicy,
}

impl BatchRunner {
    pub fn new(pipeline: Arc<TaskPipeline>, policy: BatchPolicy) -> Self {
        Self { pipeline, policy }
    }

    pub fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// 返回与输入等长、同序的结果
    pub async fn run_batch(&self, tasks: &[String], context: &TaskContext) -> Vec<Arc<TaskResult>> {
        self.run_batch_with(tasks, context, |_| async {}).await
    }

    pub async fn run_batch_with<F, Fut>(
        &self,
        tasks: &[String],
        context: &TaskContext,
        on_done: F,
    ) -> Vec<Arc<TaskResult>>
    where
        F: Fn(Arc<TaskResult>) -> Fut,
        Fut: Future<Output = ()>,
    {
        tracing::info!(
            count = tasks.len(),
            max_concurrency = self.policy.max_concurrency,
            "Running batch"
        );

        let results = if self.policy.max_concurrency <= 1 {
            self.run_sequential(tasks, context, &on_done).await
        } else {
            stream::iter(tasks.iter().map(|task| self.run_one(task, context, &on_done)))
                .buffered(self.policy.max_concurrency)
                .collect::<Vec<_>>()
                .await
        };

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        tracing::info!(total = results.len(), succeeded, "Batch finished");
        results
    }

    async fn run_sequential<F, Fut>(
        &self,
        tasks: &[String],
        context: &TaskContext,
        on_done: &F,
    ) -> Vec<Arc<TaskResult>>
    where
        F: Fn(Arc<TaskResult>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut results = Vec::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if i > 0 && !self.policy.pause.is_zero() {
                tokio::time::sleep(self.policy.pause).await;
            }
            results.push(self.run_one(task, context, on_done).await);
        }
        results
    }

    async fn run_one<F, Fut>(&self, task: &str, context: &TaskContext, on_done: &F) -> Arc<TaskResult>
    where
        F: Fn(Arc<TaskResult>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let result = self.pipeline.run_task(task, context).await;
        on_done(Arc::clone(&result)).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockLlmClient};
    use crate::memory::InMemoryHistory;
    use crate::tools::CodeInterpreter;
    use tokio::time::Instant;

    fn runner(mock: MockLlmClient, policy: BatchPolicy) -> BatchRunner {
        let pipeline = TaskPipeline::new(
            Arc::new(mock),
            CodeInterpreter::new(),
            Arc::new(InMemoryHistory::new()),
        );
        BatchRunner::new(Arc::new(pipeline), policy)
    }

    fn tasks(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_pauses_between_tasks_only() {
        let runner = runner(
            MockLlmClient::new(),
            BatchPolicy {
                pause: Duration::from_secs(1),
                max_concurrency: 1,
            },
        );
        let start = Instant::now();
        let results = runner
            .run_batch(&tasks(&["a", "b", "c"]), &TaskContext::new())
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_failure_does_not_halt_batch() {
        let mock = MockLlmClient::with_responder(|prompt| {
            if prompt.contains("Task: bad") {
                Err(LlmError::ApiError("boom".into()))
            } else {
                MockLlmClient::default_response(prompt)
            }
        });
        let runner = runner(
            mock,
            BatchPolicy {
                pause: Duration::ZERO,
                max_concurrency: 1,
            },
        );
        let results = runner
            .run_batch(&tasks(&["bad", "good"]), &TaskContext::new())
            .await;
        assert!(!results[0].is_success());
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn test_parallel_preserves_input_order() {
        let runner = runner(
            MockLlmClient::new(),
            BatchPolicy {
                pause: Duration::from_secs(5),
                max_concurrency: 3,
            },
        );
        let names = ["p1", "p2", "p3", "p4", "p5"];
        let results = runner.run_batch(&tasks(&names), &TaskContext::new()).await;
        let got: Vec<&str> = results.iter().map(|r| r.task()).collect();
        assert_eq!(got, names);
        assert_eq!(runner.pipeline.history().len(), 5);
    }

    #[tokio::test]
    async fn test_on_done_called_per_task_in_order() {
        let runner = runner(
            MockLlmClient::new(),
            BatchPolicy {
                pause: Duration::ZERO,
                max_concurrency: 1,
            },
        );
        let seen = std::sync::Mutex::new(Vec::new());
        let history = Arc::clone(runner.pipeline.history());
        runner
            .run_batch_with(&tasks(&["x", "y"]), &TaskContext::new(), |result| {
                // 回调时该任务已在历史中
                seen.lock().unwrap().push((result.task().to_string(), history.len()));
                async {}
            })
            .await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("x".to_string(), 1), ("y".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let runner = runner(MockLlmClient::new(), BatchPolicy::default());
        assert!(runner.run_batch(&[], &TaskContext::new()).await.is_empty());
    }
}
