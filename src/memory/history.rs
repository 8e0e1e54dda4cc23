//! 执行历史：进程生命周期内的有序 TaskResult 序列
//!
//! 插入顺序即时间顺序，不淘汰、不持久化，只能整体 clear。
//! HistoryStore 只暴露 append / recent / clear，后续若需持久化可换实现而不动管线。

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::pipeline::TaskResult;

/// 历史存储 trait：append 是唯一的增量修改
pub trait HistoryStore: Send + Sync {
    fn append(&self, result: Arc<TaskResult>);

    /// 最近 limit 条（旧的在前）；None 返回全部
    fn recent(&self, limit: Option<usize>) -> Vec<Arc<TaskResult>>;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 内存实现：RwLock 串行化写入，并行批量下追加不会交错
#[derive(Default)]
pub struct InMemoryHistory {
    entries: RwLock<Vec<Arc<TaskResult>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    // 写者 panic 不会留下半条记录，锁中毒后继续使用内部数据
    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<TaskResult>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<TaskResult>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl HistoryStore for InMemoryHistory {
    fn append(&self, result: Arc<TaskResult>) {
        self.write().push(result);
    }

    fn recent(&self, limit: Option<usize>) -> Vec<Arc<TaskResult>> {
        let entries = self.read();
        let start = match limit {
            Some(n) => entries.len().saturating_sub(n),
            None => 0,
        };
        entries[start..].to_vec()
    }

    fn clear(&self) {
        self.write().clear();
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelinePhase;
    use crate::pipeline::TaskOutcome;

    fn record(task: &str) -> Arc<TaskResult> {
        Arc::new(TaskResult::new(
            task,
            TaskOutcome::Failure {
                error: "x".to_string(),
                phase: PipelinePhase::CodeGeneration,
            },
            None,
        ))
    }

    fn tasks(results: &[Arc<TaskResult>]) -> Vec<&str> {
        results.iter().map(|r| r.task()).collect()
    }

    #[test]
    fn test_recent_suffix() {
        let history = InMemoryHistory::new();
        for t in ["a", "b", "c"] {
            history.append(record(t));
        }
        assert_eq!(tasks(&history.recent(None)), vec!["a", "b", "c"]);
        assert_eq!(tasks(&history.recent(Some(2))), vec!["b", "c"]);
        assert_eq!(tasks(&history.recent(Some(10))), vec!["a", "b", "c"]);
        assert!(history.recent(Some(0)).is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let history = InMemoryHistory::new();
        history.append(record("a"));
        history.clear();
        assert!(history.recent(None).is_empty());
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }

    #[test]
    fn test_append_shares_record() {
        let history = InMemoryHistory::new();
        let result = record("shared");
        history.append(Arc::clone(&result));
        assert!(Arc::ptr_eq(&history.recent(Some(1))[0], &result));
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let history = Arc::new(InMemoryHistory::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let history = Arc::clone(&history);
            handles.push(tokio::spawn(async move {
                history.append(record(&format!("t{i}")));
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(history.len(), 16);
    }
}
