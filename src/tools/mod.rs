pub mod executor;
pub mod interpreter;
pub mod registry;
pub mod workspace;

pub use executor::ToolExecutor;
pub use interpreter::{CodeInterpreter, RunCodeTool};
pub use registry::{Tool, ToolRegistry};
pub use workspace::{FileReadTool, FileWriteTool, WorkspaceStore};
