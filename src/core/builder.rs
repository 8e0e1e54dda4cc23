//! Agent 构建器：从 AppConfig 组装 LLM、解释器、历史、工具与遥测
//!
//! 所有组件在进程启动时构造一次，通过 Agent 句柄传给调用方，不使用全局单例。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::Agent;
use crate::config::{load_config, AppConfig};
use crate::core::PipelineError;
use crate::llm::{
    create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient, TimeoutLlmClient,
    DEEPSEEK_CHAT, DEFAULT_TEMPERATURE,
};
use crate::memory::{HistoryStore, InMemoryHistory};
use crate::observability::Telemetry;
use crate::pipeline::{BatchRunner, SelfImprover, TaskPipeline};
use crate::tools::{
    CodeInterpreter, FileReadTool, FileWriteTool, RunCodeTool, ToolExecutor, ToolRegistry,
    WorkspaceStore,
};

/// 按 [llm].provider 选择后端；缺少 API Key 时退回 Mock。
/// [llm.timeouts].request > 0 时包一层 TimeoutLlmClient。
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let has_deepseek_key = std::env::var("DEEPSEEK_API_KEY").is_ok();
    let has_openai_key = std::env::var("OPENAI_API_KEY").is_ok();

    let client: Arc<dyn LlmClient> = match provider.as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
        "deepseek" if has_deepseek_key || has_openai_key => {
            let model = cfg
                .llm
                .deepseek
                .model
                .clone()
                .unwrap_or_else(|| cfg.llm.model.clone());
            let model = if model.is_empty() {
                DEEPSEEK_CHAT.to_string()
            } else {
                model
            };
            tracing::info!("Using DeepSeek LLM ({})", model);
            Arc::new(create_deepseek_client(Some(&model), DEFAULT_TEMPERATURE))
        }
        "openai" if has_openai_key => {
            let model = cfg
                .llm
                .openai
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string());
            tracing::info!("Using OpenAI LLM ({})", model);
            Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), &model, None))
        }
        other => {
            tracing::warn!(provider = %other, "No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    };

    with_request_timeout(client, cfg.llm.timeouts.request)
}

/// secs = 0 时原样返回
fn with_request_timeout(client: Arc<dyn LlmClient>, secs: u64) -> Arc<dyn LlmClient> {
    match secs {
        0 => client,
        secs => Arc::new(TimeoutLlmClient::new(client, Duration::from_secs(secs))),
    }
}

pub struct AgentBuilder {
    config: AppConfig,
    workspace: Option<PathBuf>,
    llm: Option<Arc<dyn LlmClient>>,
    history: Option<Arc<dyn HistoryStore>>,
    telemetry: Option<Telemetry>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            workspace: None,
            llm: None,
            history: None,
            telemetry: None,
        }
    }

    /// 覆盖 [app].workspace_root
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    /// 注入 LLM 客户端（测试中常用 MockLlmClient）；不再按配置选择后端
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build_interpreter(&self) -> CodeInterpreter {
        CodeInterpreter::with_timeout_secs(self.config.interpreter.timeout_secs)
    }

    /// run_code / file_read / file_write 三个工具，共享同一工作区
    pub fn build_tool_registry(&self, workspace: &WorkspaceStore) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(RunCodeTool::new(self.build_interpreter()));
        tools.register(FileReadTool::new(workspace.clone()));
        tools.register(FileWriteTool::new(workspace.clone()));
        tools
    }

    pub fn build(self) -> Result<Agent, PipelineError> {
        let root = self
            .workspace
            .clone()
            .unwrap_or_else(|| self.config.app.workspace_root.clone());
        let workspace = WorkspaceStore::open(&root)?;

        let llm = self
            .llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(&self.config));
        let history = self
            .history
            .clone()
            .unwrap_or_else(|| Arc::new(InMemoryHistory::new()));
        let telemetry = self
            .telemetry
            .clone()
            .unwrap_or_else(|| Telemetry::from_config(&self.config.telemetry));

        let pipeline = Arc::new(
            TaskPipeline::new(Arc::clone(&llm), self.build_interpreter(), history)
                .with_policy(self.config.interpreter.pipeline_policy())
                .with_workspace(workspace.root()),
        );
        let batch = BatchRunner::new(Arc::clone(&pipeline), self.config.batch.policy());
        let executor = ToolExecutor::new(
            self.build_tool_registry(&workspace),
            self.config.tools.tool_timeout_secs,
        );

        tracing::info!(
            workspace = %workspace.root().display(),
            tools = ?executor.tool_names(),
            "Agent built"
        );

        Ok(Agent::new(
            pipeline,
            batch,
            SelfImprover::new(llm),
            executor,
            workspace,
            telemetry,
        ))
    }
}

/// 便捷函数：加载配置（失败时用默认值）并创建 AgentBuilder
pub fn create_agent_builder(config_path: Option<PathBuf>) -> AgentBuilder {
    let config = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    AgentBuilder::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::llm::LlmError;

    #[test]
    fn test_zero_request_timeout_leaves_client_unwrapped() {
        let client: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new());
        let same = with_request_timeout(Arc::clone(&client), 0);
        assert!(Arc::ptr_eq(&client, &same));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_maps_overrun() {
        let fast = with_request_timeout(Arc::new(MockLlmClient::fixed("quick")), 1);
        assert_eq!(fast.generate("hi").await.unwrap(), "quick");

        let stalled = with_request_timeout(Arc::new(StalledClient), 1);
        assert_eq!(stalled.generate("hi").await.unwrap_err(), LlmError::Timeout(1));
    }

    struct StalledClient;

    #[async_trait::async_trait]
    impl LlmClient for StalledClient {
        async fn complete(
            &self,
            _messages: &[crate::memory::Message],
        ) -> Result<String, LlmError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_mock_provider_from_config() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".into();
        cfg.llm.timeouts.request = 5;
        let llm = create_llm_from_config(&cfg);
        assert!(llm.generate("plain prompt").await.is_ok());
    }

    #[tokio::test]
    async fn test_build_registers_tools() {
        let dir = tempfile::tempdir().unwrap();
        let agent = AgentBuilder::new(AppConfig::default())
            .with_workspace(dir.path())
            .with_llm(Arc::new(MockLlmClient::new()))
            .build()
            .unwrap();

        assert_eq!(
            agent.tools().tool_names(),
            vec!["file_read", "file_write", "run_code"]
        );
        assert!(agent.workspace().root().is_dir());
    }
}
