//! 管线阶段：线性状态机
//!
//! Start → Planning → CodeGeneration → Execution → Analysis → Recorded，
//! 任一阶段出错直接跳到 Recorded（Failure），不会回到之前的阶段。

use serde::{Deserialize, Serialize};

/// 单个任务在管线中所处的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Start,
    Planning,
    CodeGeneration,
    Execution,
    Analysis,
    Recorded,
}

impl PipelinePhase {
    /// 成功路径上的下一阶段；Recorded 为终态
    pub fn next(self) -> Self {
        match self {
            PipelinePhase::Start => PipelinePhase::Planning,
            PipelinePhase::Planning => PipelinePhase::CodeGeneration,
            PipelinePhase::CodeGeneration => PipelinePhase::Execution,
            PipelinePhase::Execution => PipelinePhase::Analysis,
            PipelinePhase::Analysis => PipelinePhase::Recorded,
            PipelinePhase::Recorded => PipelinePhase::Recorded,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == PipelinePhase::Recorded
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelinePhase::Start => "start",
            PipelinePhase::Planning => "planning",
            PipelinePhase::CodeGeneration => "code_generation",
            PipelinePhase::Execution => "execution",
            PipelinePhase::Analysis => "analysis",
            PipelinePhase::Recorded => "recorded",
        }
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
