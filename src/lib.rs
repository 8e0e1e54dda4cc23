//! Manus - Rust 自主任务执行管线
//!
//! 模块划分：
//! - **agent**: 唯一持有者 Agent（管线、批量、历史、自我回顾、工具、遥测）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、管线阶段、AgentBuilder
//! - **llm**: 生成能力客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock / 超时包装）
//! - **memory**: LLM 消息与执行历史
//! - **observability**: tracing 订阅器与实验追踪遥测
//! - **pipeline**: 规划、代码生成、执行、分析、批量与模板
//! - **tools**: 代码解释器、工作区文件、工具注册表与执行器

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod tools;

pub use agent::Agent;
pub use crate::core::{AgentBuilder, PipelineError};
pub use pipeline::{TaskContext, TaskOutcome, TaskResult};
