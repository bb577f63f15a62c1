//! Three-section code explanations.

use serde::Deserialize;
use tracing::info;

use super::{complete, first_parsed};
use crate::datamodel::{Explanation, ExplanationSection, SectionKind, TextGenerationConfig};
use crate::error::{VizError, VizResult};
use crate::llm::TextGenerator;
use crate::parser::{parse_list, ResponseError};
use crate::prompts::{explain_messages, Stage};
use crate::scaffold::ChartLibrary;

/// Section as emitted by the model; `code` is often omitted or `null` for
/// the accessibility section.
#[derive(Debug, Deserialize)]
struct RawSection {
    section: SectionKind,
    #[serde(default)]
    code: Option<String>,
    explanation: String,
}

/// Explains chart code for accessibility, transformation and visualization.
#[derive(Debug, Clone, Copy, Default)]
pub struct VizExplainer;

impl VizExplainer {
    pub const AGENT_NAME: &'static str = "viz_explainer";

    /// Returns a validated explanation: exactly one section of each kind, in
    /// [`SectionKind::ALL`] order.
    pub async fn explain(
        &self,
        generator: &TextGenerator,
        code: &str,
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Explanation> {
        if code.trim().is_empty() {
            return Err(VizError::InvalidInput("code to explain is empty".to_string()));
        }
        let explanation = complete(
            generator,
            Stage::Explain,
            explain_messages(code, library),
            config,
        )
        .await?
        .parse(|raws| first_parsed(Stage::Explain, raws, parse_explanation))?;
        info!(library = %library, "Explained visualization code");
        Ok(explanation)
    }
}

fn parse_explanation(raw: &str) -> Result<Explanation, ResponseError> {
    let sections = parse_list::<RawSection>(raw)?;
    if sections.len() != SectionKind::ALL.len() {
        return Err(ResponseError::schema(
            format!("expected 3 sections, found {}", sections.len()),
            raw,
        ));
    }

    let mut ordered = Vec::with_capacity(SectionKind::ALL.len());
    for kind in SectionKind::ALL {
        let mut matching = sections.iter().filter(|s| s.section == kind);
        let section = matching.next().ok_or_else(|| {
            ResponseError::schema(format!("missing {} section", kind.as_str()), raw)
        })?;
        if matching.next().is_some() {
            return Err(ResponseError::schema(
                format!("duplicate {} section", kind.as_str()),
                raw,
            ));
        }
        ordered.push(ExplanationSection {
            section: kind,
            code: normalize_excerpt(section.code.as_deref()),
            explanation: section.explanation.trim().to_string(),
        });
    }
    Ok(Explanation { sections: ordered })
}

/// Models write "None" or "null" where no excerpt applies.
fn normalize_excerpt(code: Option<&str>) -> String {
    match code.map(str::trim) {
        None | Some("None") | Some("null") => String::new(),
        Some(code) => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::fixtures::generator;
    use crate::llm::ScriptedProvider;
    use crate::parser::FailureKind;

    const REPLY: &str = r#"```json
[
  {"section": "visualization", "code": "sns.barplot(data=data, x='Category', y='Sales')", "explanation": "Draws one bar per category."},
  {"section": "accessibility", "code": "None", "explanation": "A bar chart of sales by category."},
  {"section": "transformation", "code": "data = data.dropna()", "explanation": "Drops missing rows."}
]
```"#;

    #[tokio::test]
    async fn test_sections_ordered_canonically() {
        let (gen, provider) = generator(ScriptedProvider::single("mock", REPLY));
        let explanation = VizExplainer
            .explain(&gen, "def plot(data): ...", ChartLibrary::Seaborn, &TextGenerationConfig::default())
            .await
            .unwrap();

        let kinds: Vec<SectionKind> = explanation.sections.iter().map(|s| s.section).collect();
        assert_eq!(kinds, SectionKind::ALL.to_vec());
        assert_eq!(explanation.sections[0].code, "");
        assert_eq!(
            explanation.section(SectionKind::Transformation).unwrap().code,
            "data = data.dropna()"
        );

        let roles: Vec<String> = provider
            .last_request()
            .unwrap()
            .messages
            .iter()
            .map(|m| m.role.clone())
            .collect();
        assert_eq!(roles, vec!["system", "assistant", "user"]);
    }

    #[test]
    fn test_missing_code_field_accepted() {
        let raw = r#"[
          {"section": "accessibility", "explanation": "a"},
          {"section": "transformation", "code": null, "explanation": "t"},
          {"section": "visualization", "code": "x", "explanation": "v"}
        ]"#;
        let explanation = parse_explanation(raw).unwrap();
        assert_eq!(explanation.sections[1].code, "");
    }

    #[test]
    fn test_wrong_section_sets_rejected() {
        let two = r#"[{"section": "accessibility", "explanation": "a"}, {"section": "visualization", "explanation": "v"}]"#;
        assert_eq!(parse_explanation(two).unwrap_err().kind(), FailureKind::SchemaMismatch);

        let duplicate = r#"[
          {"section": "accessibility", "explanation": "a"},
          {"section": "accessibility", "explanation": "b"},
          {"section": "visualization", "explanation": "v"}
        ]"#;
        let err = parse_explanation(duplicate).unwrap_err();
        assert_eq!(err.kind(), FailureKind::SchemaMismatch);

        let unknown = r#"[
          {"section": "accessibility", "explanation": "a"},
          {"section": "styling", "explanation": "s"},
          {"section": "visualization", "explanation": "v"}
        ]"#;
        assert_eq!(parse_explanation(unknown).unwrap_err().kind(), FailureKind::SchemaMismatch);
    }

    #[tokio::test]
    async fn test_malformed_explanation_fails() {
        let (gen, _) = generator(ScriptedProvider::single("mock", "not json"));
        let err = VizExplainer
            .explain(&gen, "code", ChartLibrary::Seaborn, &TextGenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VizError::Generation {
                stage: Stage::Explain,
                kind: FailureKind::Malformed,
                ..
            }
        ));
    }
}
