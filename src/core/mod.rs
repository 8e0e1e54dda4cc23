//! 核心层：错误类型、管线阶段与 Agent 构建

pub mod builder;
pub mod error;
pub mod state;

pub use builder::{create_agent_builder, create_llm_from_config, AgentBuilder};
pub use error::PipelineError;
pub use state::PipelinePhase;
