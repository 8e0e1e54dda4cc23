//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MANUS__*` 覆盖（双下划线表示嵌套，如 `MANUS__LLM__PROVIDER=mock`）。
//! 每个段都有完整的默认值，缺失的段或键按默认处理。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::pipeline::{BatchPolicy, PipelinePolicy};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "MANUS";

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub interpreter: InterpreterSection,
    pub batch: BatchSection,
    pub telemetry: TelemetrySection,
    pub tools: ToolsSection,
}

/// [app] 段：应用名与工作区根目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub workspace_root: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "manus".to_string(),
            workspace_root: PathBuf::from("./workspace"),
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// deepseek / openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub deepseek: LlmDeepSeekSection,
    pub openai: LlmOpenAiSection,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "deepseek".to_string(),
            model: "deepseek-chat".to_string(),
            base_url: None,
            deepseek: LlmDeepSeekSection::default(),
            openai: LlmOpenAiSection::default(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmDeepSeekSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LlmOpenAiSection {
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒），0 表示不限
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 0 }
    }
}

/// [interpreter] 段
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InterpreterSection {
    /// 单次执行的墙钟上限（秒），0 表示不限
    pub timeout_secs: u64,
    pub interpretation_failure_is_fatal: bool,
}

impl InterpreterSection {
    pub fn pipeline_policy(&self) -> PipelinePolicy {
        PipelinePolicy {
            interpretation_failure_is_fatal: self.interpretation_failure_is_fatal,
        }
    }
}

/// [batch] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub pause_ms: u64,
    pub max_concurrency: usize,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            pause_ms: 1000,
            max_concurrency: 1,
        }
    }
}

impl BatchSection {
    pub fn policy(&self) -> BatchPolicy {
        BatchPolicy {
            pause: Duration::from_millis(self.pause_ms),
            max_concurrency: self.max_concurrency,
        }
    }
}

/// [telemetry] 段：实验追踪
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    pub enabled: bool,
    /// 未设置时遥测只输出到 tracing
    pub endpoint: Option<String>,
    pub project_name: String,
    pub api_key: Option<String>,
    /// 单次上报请求超时（秒）
    pub request_timeout_secs: u64,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            project_name: "manus".to_string(),
            api_key: None,
            request_timeout_secs: 5,
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// 从 config 目录加载配置，环境变量 MANUS__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MANUS__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
