//! Goal and persona exploration.

use tracing::{info, warn};

use super::{complete, first_parsed};
use crate::datamodel::{Goal, Persona, Summary, TextGenerationConfig};
use crate::error::{VizError, VizResult};
use crate::llm::TextGenerator;
use crate::parser::parse_list;
use crate::prompts::{goal_messages, persona_messages, Stage};

/// Proposes analytical goals for a summarized dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoalExplorer;

impl GoalExplorer {
    pub const AGENT_NAME: &'static str = "goal_explorer";

    /// Generates at most `n` goals, steered by `persona` or the default one.
    ///
    /// The first candidate that parses is used. Goals keep the order the
    /// model emitted them in and are renumbered `0..len`. A batch is never
    /// padded: the caller sees the true count.
    pub async fn generate(
        &self,
        generator: &TextGenerator,
        summary: &Summary,
        n: usize,
        persona: Option<&Persona>,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<Goal>> {
        if n == 0 {
            return Err(VizError::InvalidInput("goal count must be at least 1".to_string()));
        }
        let default_persona = Persona::default();
        let persona = persona.unwrap_or(&default_persona);

        let mut goals = complete(
            generator,
            Stage::Goals,
            goal_messages(summary, n, persona),
            config,
        )
        .await?
        .parse(|raws| first_parsed(Stage::Goals, raws, parse_list::<Goal>))?;

        if goals.len() > n {
            warn!(requested = n, received = goals.len(), "Truncating extra goals");
            goals.truncate(n);
        }
        for (index, goal) in goals.iter_mut().enumerate() {
            goal.index = index;
            if goal.referenced_columns(summary).is_empty() {
                warn!(
                    index,
                    visualization = %goal.visualization,
                    "Goal does not reference any dataset column"
                );
            }
        }

        info!(requested = n, count = goals.len(), persona = %persona.persona, "Generated goals");
        Ok(goals)
    }
}

/// Proposes stakeholder personas for a summarized dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonaExplorer;

impl PersonaExplorer {
    pub const AGENT_NAME: &'static str = "persona_explorer";

    /// Generates at most `n` personas, most relevant first.
    pub async fn generate(
        &self,
        generator: &TextGenerator,
        summary: &Summary,
        n: usize,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<Persona>> {
        if n == 0 {
            return Err(VizError::InvalidInput(
                "persona count must be at least 1".to_string(),
            ));
        }
        let mut personas = complete(
            generator,
            Stage::Personas,
            persona_messages(summary, n),
            config,
        )
        .await?
        .parse(|raws| first_parsed(Stage::Personas, raws, parse_list::<Persona>))?;
        personas.truncate(n);
        info!(requested = n, count = personas.len(), "Generated personas");
        Ok(personas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::fixtures::{generator, sales_summary};
    use crate::datamodel::DEFAULT_PERSONA;
    use crate::llm::ScriptedProvider;

    const GOALS: &str = r#"```json
[
  {"index": 5, "question": "What is the total Sales per Category?", "visualization": "bar chart of Sales by Category", "rationale": "Compares categories."},
  {"index": 9, "question": "How are Sales distributed?", "visualization": "histogram of Sales", "rationale": "Shows spread."},
  {"index": 2, "question": "Which months peak?", "visualization": "line chart of Month", "rationale": "Seasonality."}
]
```"#;

    #[tokio::test]
    async fn test_goals_renumbered_in_emission_order() {
        let (gen, provider) = generator(ScriptedProvider::single("mock", GOALS));
        let goals = GoalExplorer
            .generate(&gen, &sales_summary(), 3, None, &TextGenerationConfig::default())
            .await
            .unwrap();

        assert_eq!(goals.len(), 3);
        let indices: Vec<usize> = goals.iter().map(|g| g.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(goals[1].visualization, "histogram of Sales");

        let request = provider.last_request().unwrap();
        assert!(request.messages[1].text().contains(DEFAULT_PERSONA));
    }

    #[tokio::test]
    async fn test_goals_truncated_never_padded() {
        let (gen, _) = generator(ScriptedProvider::single("mock", GOALS));
        let goals = GoalExplorer
            .generate(&gen, &sales_summary(), 2, None, &TextGenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(goals.len(), 2);

        let one = r#"{"question": "q", "visualization": "bar chart of Sales", "rationale": "r"}"#;
        let (gen, _) = generator(ScriptedProvider::single("mock", one));
        let goals = GoalExplorer
            .generate(&gen, &sales_summary(), 5, None, &TextGenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(goals.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_candidate_falls_through_to_next() {
        let (gen, _) = generator(ScriptedProvider::new(
            "mock",
            vec![vec!["not json", GOALS]],
        ));
        let config = TextGenerationConfig::default().with_n(2);
        let goals = GoalExplorer
            .generate(&gen, &sales_summary(), 3, None, &config)
            .await
            .unwrap();
        assert_eq!(goals.len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_goals_fail_with_raw_text() {
        let (gen, _) = generator(ScriptedProvider::single("mock", "not json"));
        let err = GoalExplorer
            .generate(&gen, &sales_summary(), 3, None, &TextGenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VizError::Generation { stage: Stage::Goals, .. }));
        assert_eq!(err.raw_output(), Some("not json"));
    }

    #[tokio::test]
    async fn test_goal_without_rationale_is_schema_mismatch() {
        let reply = r#"[{"question": "q", "visualization": "v"}]"#;
        let (gen, _) = generator(ScriptedProvider::single("mock", reply));
        let err = GoalExplorer
            .generate(&gen, &sales_summary(), 1, None, &TextGenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VizError::Generation {
                kind: crate::parser::FailureKind::SchemaMismatch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_custom_persona_in_prompt() {
        let (gen, provider) = generator(ScriptedProvider::single("mock", GOALS));
        let persona = Persona::from("regional sales manager");
        GoalExplorer
            .generate(&gen, &sales_summary(), 3, Some(&persona), &TextGenerationConfig::default())
            .await
            .unwrap();
        let request = provider.last_request().unwrap();
        assert!(request.messages[1].text().contains("'regional sales manager' persona"));
    }

    #[tokio::test]
    async fn test_personas() {
        let reply = r#"[{"persona": "CFO", "rationale": "owns revenue"}, {"persona": "Analyst", "rationale": "explores data"}]"#;
        let (gen, _) = generator(ScriptedProvider::single("mock", reply));
        let personas = PersonaExplorer
            .generate(&gen, &sales_summary(), 1, &TextGenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(personas, vec![Persona::new("CFO", "owns revenue")]);
    }
}
