//! 实验追踪遥测
//!
//! TelemetrySink 接收计数指标与 JSON 记录；TracingSink 输出结构化 tracing 事件，
//! HttpTelemetrySink 以 JSON POST 到追踪服务。Telemetry 包装器吞掉所有 sink 错误（仅 warn!），
//! 遥测失败永远不影响任务结果。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::TelemetrySection;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Telemetry transport error: {0}")]
    Transport(String),

    #[error("Telemetry endpoint rejected the event with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn increment(&self, metric: &str, value: f64) -> Result<(), TelemetryError>;

    async fn log_record(&self, name: &str, record: &Value) -> Result<(), TelemetryError>;
}

/// 以 tracing 事件输出遥测（target = "telemetry"）
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    async fn increment(&self, metric: &str, value: f64) -> Result<(), TelemetryError> {
        tracing::info!(target: "telemetry", metric = %metric, value, "metric");
        Ok(())
    }

    async fn log_record(&self, name: &str, record: &Value) -> Result<(), TelemetryError> {
        tracing::info!(target: "telemetry", name = %name, record = %record, "record");
        Ok(())
    }
}

/// JSON POST 到追踪端点；api_key 存在时用 Bearer 鉴权。
/// 每个请求都有超时，端点不响应时任务只会多等这段时间。
pub struct HttpTelemetrySink {
    client: reqwest::Client,
    endpoint: String,
    project_name: String,
    api_key: Option<String>,
}

impl HttpTelemetrySink {
    pub fn new(
        endpoint: impl Into<String>,
        project_name: impl Into<String>,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            project_name: project_name.into(),
            api_key,
        })
    }

    async fn post(&self, event: Value) -> Result<(), TelemetryError> {
        let mut request = self.client.post(&self.endpoint).json(&event);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let resp = request
            .send()
            .await
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TelemetryError::Rejected(resp.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn increment(&self, metric: &str, value: f64) -> Result<(), TelemetryError> {
        self.post(json!({
            "project": self.project_name,
            "kind": "metric",
            "name": metric,
            "value": value,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .await
    }

    async fn log_record(&self, name: &str, record: &Value) -> Result<(), TelemetryError> {
        self.post(json!({
            "project": self.project_name,
            "kind": "record",
            "name": name,
            "data": record,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .await
    }
}

/// 可选遥测：未配置 sink 时所有调用为空操作
#[derive(Clone, Default)]
pub struct Telemetry {
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl Telemetry {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// enabled = false → 关闭；有 endpoint → HTTP；否则（或 HTTP 客户端构建失败）输出到 tracing
    pub fn from_config(cfg: &TelemetrySection) -> Self {
        if !cfg.enabled {
            return Self::disabled();
        }
        let Some(endpoint) = cfg.endpoint.as_deref().filter(|e| !e.trim().is_empty()) else {
            return Self::new(Arc::new(TracingSink));
        };
        match HttpTelemetrySink::new(
            endpoint,
            cfg.project_name.clone(),
            cfg.api_key.clone(),
            Duration::from_secs(cfg.request_timeout_secs.max(1)),
        ) {
            Ok(sink) => Self::new(Arc::new(sink)),
            Err(e) => {
                tracing::warn!(error = %e, "Telemetry HTTP client unavailable, logging to tracing");
                Self::new(Arc::new(TracingSink))
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub async fn metric(&self, name: &str, value: f64) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.increment(name, value).await {
                tracing::warn!(metric = %name, error = %e, "Telemetry metric dropped");
            }
        }
    }

    pub async fn record(&self, name: &str, record: &Value) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.log_record(name, record).await {
                tracing::warn!(record = %name, error = %e, "Telemetry record dropped");
            }
        }
    }
}
