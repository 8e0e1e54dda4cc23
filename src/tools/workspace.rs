//! 工作区文件存储
//!
//! WorkspaceStore 绑定根目录，所有相对路径都在词法上限定在根下（拒绝 `..` 与绝对路径），
//! 再对路径中最深的已存在祖先做 canonicalize 校验，防止经符号链接目录写到根外。
//! FileReadTool / FileWriteTool 基于它提供 file_read / file_write 能力。

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::core::PipelineError;
use crate::tools::Tool;

#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    /// 打开（必要时创建）工作区根目录
    pub fn open(root: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| {
            PipelineError::Workspace(format!("Cannot create {}: {}", root.display(), e))
        })?;
        let root = root
            .canonicalize()
            .map_err(|e| PipelineError::Workspace(format!("Cannot resolve {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 把相对路径解析为根下的绝对路径
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PipelineError> {
        let mut full = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => full.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(PipelineError::PathEscape(relative.to_string()));
                }
            }
        }
        if full == self.root {
            return Err(PipelineError::Workspace(format!("Not a file path: '{relative}'")));
        }
        self.confine(&full, relative)?;
        Ok(full)
    }

    /// 最深的已存在祖先（含自身）解析后必须仍在根下；悬空符号链接无法解析，直接拒绝
    fn confine(&self, full: &Path, relative: &str) -> Result<(), PipelineError> {
        let existing = full
            .ancestors()
            .find(|p| p.symlink_metadata().is_ok())
            .unwrap_or(&self.root);
        let canonical = existing
            .canonicalize()
            .map_err(|_| PipelineError::PathEscape(relative.to_string()))?;
        if !canonical.starts_with(&self.root) {
            return Err(PipelineError::PathEscape(relative.to_string()));
        }
        Ok(())
    }

    pub fn read_file(&self, relative: &str) -> Result<String, PipelineError> {
        let path = self.resolve(relative)?;
        std::fs::read_to_string(&path).map_err(|e| {
            tracing::error!(path = %relative, error = %e, "Failed to read workspace file");
            PipelineError::Workspace(format!("Read failed: {}", e))
        })
    }

    /// 写入文件（自动创建父目录）；失败只记录日志并返回 false
    pub fn write_file(&self, relative: &str, content: &str) -> bool {
        let result = self.resolve(relative).and_then(|path| {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PipelineError::Workspace(format!("Create dir failed: {}", e)))?;
            }
            std::fs::write(&path, content)
                .map_err(|e| PipelineError::Workspace(format!("Write failed: {}", e)))
        });
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(path = %relative, error = %e, "Failed to write workspace file");
                false
            }
        }
    }
}

/// file_read 工具：读取工作区文件
pub struct FileReadTool {
    store: WorkspaceStore,
}

impl FileReadTool {
    pub fn new(store: WorkspaceStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a workspace file. Args: {\"path\": \"file path relative to workspace\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        tracing::info!(path = %path, "file_read tool execute");
        self.store.read_file(path).map_err(|e| e.to_string())
    }
}

/// file_write 工具：写入工作区文件
pub struct FileWriteTool {
    store: WorkspaceStore,
}

impl FileWriteTool {
    pub fn new(store: WorkspaceStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write a workspace file. Args: {\"path\": \"relative path\", \"content\": \"text\"}"
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let content = args.get("content").and_then(|v| v.as_str()).unwrap_or("");
        tracing::info!(path = %path, bytes = content.len(), "file_write tool execute");
        if self.store.write_file(path, content) {
            Ok(format!("Wrote {} bytes to {}", content.len(), path))
        } else {
            Err(format!("Failed to write {}", path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_nested() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        assert!(store.write_file("reports/out.txt", "42"));
        assert_eq!(store.read_file("reports/out.txt").unwrap(), "42");
        assert_eq!(store.read_file("./reports/out.txt").unwrap(), "42");
    }

    #[test]
    fn test_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.resolve("../etc/passwd"),
            Err(PipelineError::PathEscape(_))
        ));
        assert!(matches!(
            store.resolve("/etc/passwd"),
            Err(PipelineError::PathEscape(_))
        ));
        assert!(!store.write_file("a/../../x.txt", "nope"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_dir_cannot_receive_new_files() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("target.txt"),
            dir.path().join("dangling"),
        )
        .unwrap();

        assert!(!store.write_file("link/pwned.txt", "x"));
        assert!(!store.write_file("link/deeper/pwned.txt", "x"));
        assert!(!store.write_file("dangling", "x"));
        assert!(!outside.path().join("pwned.txt").exists());
        assert!(!outside.path().join("deeper").exists());
        assert!(!outside.path().join("target.txt").exists());
        assert!(matches!(
            store.resolve("link/pwned.txt"),
            Err(PipelineError::PathEscape(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        assert!(store.write_file("alias/ok.txt", "fine"));
        assert_eq!(store.read_file("real/ok.txt").unwrap(), "fine");
    }

    #[test]
    fn test_read_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.read_file("missing.txt"),
            Err(PipelineError::Workspace(_))
        ));
    }

    #[test]
    fn test_open_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/workspace");
        let store = WorkspaceStore::open(&root).unwrap();
        assert!(store.root().is_dir());
    }

    #[tokio::test]
    async fn test_file_tools() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        let writer = FileWriteTool::new(store.clone());
        let reader = FileReadTool::new(store);

        let msg = writer
            .execute(serde_json::json!({"path": "note.md", "content": "hi"}))
            .await
            .unwrap();
        assert!(msg.contains("2 bytes"));
        let text = reader
            .execute(serde_json::json!({"path": "note.md"}))
            .await
            .unwrap();
        assert_eq!(text, "hi");
        assert!(reader
            .execute(serde_json::json!({"path": "../escape"}))
            .await
            .is_err());
    }
}
