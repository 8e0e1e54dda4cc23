//! 可观测性：日志订阅器与实验追踪遥测

pub mod telemetry;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use telemetry::{HttpTelemetrySink, Telemetry, TelemetryError, TelemetrySink, TracingSink};

/// 安装全局 tracing 订阅器：默认 info 级，RUST_LOG 覆盖；重复调用无副作用
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}
