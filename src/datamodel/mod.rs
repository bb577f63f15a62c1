//! Schema types shared by every pipeline stage.
//!
//! All types serialize to the JSON shapes models are asked to produce, so the
//! same structs are used for prompt rendering and response decoding.

mod chart;
mod generation;
mod goal;
mod summary;

pub use chart::{
    Aspect, AspectEvaluation, ChartExecutorResponse, DimensionScore, Evaluation, Explanation,
    ExplanationSection, SectionKind,
};
pub use generation::TextGenerationConfig;
pub use goal::{Goal, Persona, DEFAULT_PERSONA};
pub use summary::{Dtype, Field, FieldProperties, Summary};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sales_summary() -> Summary {
        Summary {
            name: "sales".to_string(),
            file_name: "sales.csv".to_string(),
            dataset_description: "Monthly sales".to_string(),
            fields: vec![
                Field {
                    column: "Category".to_string(),
                    properties: FieldProperties {
                        dtype: Dtype::Category,
                        std: None,
                        min: None,
                        max: None,
                        samples: vec![json!("A"), json!("B")],
                        num_unique_values: 2,
                        semantic_type: String::new(),
                        description: String::new(),
                    },
                },
                Field {
                    column: "Sales".to_string(),
                    properties: FieldProperties {
                        dtype: Dtype::Number,
                        std: Some(1.5),
                        min: Some(json!(1)),
                        max: Some(json!(9)),
                        samples: vec![json!(1), json!(9)],
                        num_unique_values: 2,
                        semantic_type: "currency".to_string(),
                        description: String::new(),
                    },
                },
            ],
        }
    }

    #[test]
    fn test_goal_referenced_columns() {
        let summary = sales_summary();
        let goal = Goal::new(
            "Which category sells most?",
            "bar chart of Sales by Category",
            "",
        );
        assert_eq!(goal.referenced_columns(&summary), vec!["Category", "Sales"]);

        let vague = Goal::from_question("show me something nice");
        assert!(vague.referenced_columns(&summary).is_empty());
    }

    #[test]
    fn test_goal_missing_rationale_is_schema_error() {
        let result: Result<Goal, _> =
            serde_json::from_value(json!({"question": "q", "visualization": "v"}));
        assert!(result.is_err());

        let goal: Goal = serde_json::from_value(
            json!({"question": "q", "visualization": "v", "rationale": "r"}),
        )
        .unwrap();
        assert_eq!(goal.index, 0);
    }

    #[test]
    fn test_summary_roundtrips_through_prompt_text() {
        let summary = sales_summary();
        let text = summary.to_prompt_text();
        let decoded: Summary = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded, summary);
        assert!(!text.contains("\"std\": null"));
    }

    #[test]
    fn test_summary_context_text() {
        let text = sales_summary().to_context_text();
        assert!(text.starts_with("Dataset: sales\n"));
        assert!(text.contains("- Sales: number"));
        assert!(text.contains("Semantic Type: currency"));
        assert!(text.contains("Samples: A, B"));
    }

    #[test]
    fn test_default_persona() {
        assert_eq!(Persona::default().persona, DEFAULT_PERSONA);
    }
}
