use std::sync::Arc;

use crate::core::PipelineError;
use crate::llm::LlmClient;
use crate::pipeline::parse::parse_document;
use crate::pipeline::types::{AnalysisRecord, ExecutionOutcome};

pub struct ResultAnalyzer {
    llm: Arc<dyn LlmClient>,
}

impl ResultAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn analyze(&self, outcome: &ExecutionOutcome) -> Result<AnalysisRecord, PipelineError> {
        let outcome_json =
            serde_json::to_string_pretty(outcome).unwrap_or_else(|_| "{}".to_string());
        let prompt = format!(
            r#"You are an expert execution result analyst.

Analyze the following execution result:
{outcome_json}

Provide:
1. Summary of what was accomplished
2. Key insights from the output
3. Quality assessment
4. Recommendations for improvement
5. Next steps (if any)

Respond with a single JSON object with the keys "summary", "insights", "quality", "recommendations" and "next_steps", inside a ```json fenced block."#
        );

        let response = self.llm.generate(&prompt).await?;

        Ok(match parse_document(&response) {
            Some(fields) => AnalysisRecord::from_map(fields),
            None => {
                tracing::warn!("Analysis response is not a JSON object, using fallback record");
                AnalysisRecord::fallback(&response)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_analyze_embeds_outcome() {
        let mock = Arc::new(MockLlmClient::new());
        let analyzer = ResultAnalyzer::new(mock.clone());
        let outcome = ExecutionOutcome::success("print(5)", "5\n", BTreeMap::new());

        let analysis = analyzer.analyze(&outcome).await.unwrap();
        assert_eq!(analysis.summary(), Some("Mock analysis"));
        assert!(mock.prompts()[0].contains("\"captured_output\": \"5\\n\""));
    }

    #[tokio::test]
    async fn test_analyze_fallback_on_prose() {
        let analyzer = ResultAnalyzer::new(Arc::new(MockLlmClient::fixed("Looks great.")));
        let outcome = ExecutionOutcome::failure("x(", "", "syntax error");

        let analysis = analyzer.analyze(&outcome).await.unwrap();
        assert_eq!(analysis, AnalysisRecord::fallback("Looks great."));
    }
}
