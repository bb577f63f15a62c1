//! Chart code generation and editing.

use tracing::info;

use super::complete;
use crate::datamodel::{Goal, Summary, TextGenerationConfig};
use crate::error::{VizError, VizResult};
use crate::llm::TextGenerator;
use crate::parser::Candidates;
use crate::prompts::{edit_messages, generate_messages, Stage};
use crate::scaffold::{normalize_code, ChartLibrary};

/// Generates chart programs that answer a goal.
#[derive(Debug, Clone, Copy, Default)]
pub struct VizGenerator;

impl VizGenerator {
    pub const AGENT_NAME: &'static str = "viz_generator";

    /// Returns one normalized program per usable candidate.
    ///
    /// Every program defines `plot(data)` and ends with the scaffold entry
    /// point. Candidates without a `plot(` definition are dropped; if none
    /// survives the call fails with the first candidate's raw text.
    pub async fn generate(
        &self,
        generator: &TextGenerator,
        summary: &Summary,
        goal: &Goal,
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<String>> {
        let code = complete(
            generator,
            Stage::Visualize,
            generate_messages(summary, goal, library),
            config,
        )
        .await?
        .parse(|raws| {
            Candidates::parse(Stage::Visualize, raws.iter().map(String::as_str), normalize_code)
                .into_result()
        })?;
        info!(
            library = %library,
            goal = goal.index,
            count = code.len(),
            "Generated visualization code"
        );
        Ok(code)
    }
}

/// Applies natural-language edits to existing chart code.
#[derive(Debug, Clone, Copy, Default)]
pub struct VizEditor;

impl VizEditor {
    pub const AGENT_NAME: &'static str = "viz_editor";

    /// Returns the edited program for every usable candidate.
    pub async fn edit(
        &self,
        generator: &TextGenerator,
        code: &str,
        summary: &Summary,
        instructions: &[String],
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<String>> {
        if code.trim().is_empty() {
            return Err(VizError::InvalidInput("code to edit is empty".to_string()));
        }
        let instructions: Vec<String> = instructions
            .iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect();
        if instructions.is_empty() {
            return Err(VizError::InvalidInput(
                "at least one edit instruction is required".to_string(),
            ));
        }

        let edited = complete(
            generator,
            Stage::Edit,
            edit_messages(code, summary, &instructions, library),
            config,
        )
        .await?
        .parse(|raws| {
            Candidates::parse(Stage::Edit, raws.iter().map(String::as_str), normalize_code)
                .into_result()
        })?;
        info!(
            library = %library,
            instructions = instructions.len(),
            count = edited.len(),
            "Edited visualization code"
        );
        Ok(edited)
    }
}
