//! 常用任务模板：生成任务描述与配套上下文，交给 TaskPipeline::run_task

use serde_json::json;

use crate::pipeline::types::TaskContext;

pub const DEFAULT_ANALYSIS_TYPE: &str = "exploratory";
pub const DEFAULT_LANGUAGE: &str = "lua";

#[derive(Debug, Clone, PartialEq)]
pub struct TemplatedTask {
    pub task: String,
    pub context: TaskContext,
}

pub fn data_analysis(data_description: &str, analysis_type: Option<&str>) -> TemplatedTask {
    let analysis_type = analysis_type.unwrap_or(DEFAULT_ANALYSIS_TYPE);
    let task = format!(
        "Perform {analysis_type} data analysis on: {data_description}\n\n\
         Requirements:\n\
         1. Load or generate the data\n\
         2. Perform appropriate analysis\n\
         3. Provide summary statistics\n\
         4. Return actionable insights"
    );

    let mut context = TaskContext::new();
    context.insert("analysis_type".into(), json!(analysis_type));
    context.insert("data_description".into(), json!(data_description));
    context.insert("output_format".into(), json!("structured"));
    TemplatedTask { task, context }
}

pub fn code_generation(requirement: &str, language: Option<&str>, include_tests: bool) -> TemplatedTask {
    let language = language.unwrap_or(DEFAULT_LANGUAGE);
    let mut requirements = vec![
        "Write clean, well-documented code",
        "Add error handling",
    ];
    if include_tests {
        requirements.push("Include tests that print their results");
    }
    requirements.push("Follow best practices");

    let listed: Vec<String> = requirements
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r))
        .collect();
    let task = format!(
        "Generate {language} code for: {requirement}\n\nRequirements:\n{}",
        listed.join("\n")
    );

    let mut context = TaskContext::new();
    context.insert("language".into(), json!(language));
    context.insert("include_tests".into(), json!(include_tests));
    context.insert("requirement".into(), json!(requirement));
    TemplatedTask { task, context }
}
