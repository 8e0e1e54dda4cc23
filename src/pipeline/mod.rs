//! 自主任务执行管线：规划、代码生成、解释执行、结果分析与批量运行

pub mod analyzer;
pub mod batch;
pub mod codegen;
pub mod improve;
pub mod parse;
pub mod planner;
pub mod runner;
pub mod templates;
pub mod types;

pub use analyzer::ResultAnalyzer;
pub use batch::{BatchPolicy, BatchRunner};
pub use codegen::CodeGenerator;
pub use improve::{ImprovementReport, SelfImprover};
pub use parse::{extract_code, parse_document};
pub use planner::PlanGenerator;
pub use runner::{PipelinePolicy, TaskPipeline};
pub use templates::TemplatedTask;
pub use types::{
    AnalysisRecord, ExecutionOutcome, ExecutionPlan, ExecutionStats, TaskContext, TaskOutcome,
    TaskResult,
};
