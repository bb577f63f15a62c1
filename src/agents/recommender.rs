//! Alternative visualization recommendations.

use tracing::{info, warn};

use super::complete;
use crate::datamodel::{Summary, TextGenerationConfig};
use crate::error::{VizError, VizResult};
use crate::llm::TextGenerator;
use crate::parser::{fenced_blocks, Candidates, ResponseError};
use crate::prompts::{recommend_messages, Stage};
use crate::scaffold::{normalize_code, ChartLibrary, PLOT_SIGNATURE};

/// Recommends diverse alternatives to an existing chart.
#[derive(Debug, Clone, Copy, Default)]
pub struct VizRecommender;

impl VizRecommender {
    pub const AGENT_NAME: &'static str = "viz_recommender";

    /// Returns at most `n` programs, in emission order.
    ///
    /// One completion may hold several fenced programs; each is normalized
    /// separately. Programs from all candidates are pooled before taking `n`.
    pub async fn recommend(
        &self,
        generator: &TextGenerator,
        code: &str,
        summary: &Summary,
        n: usize,
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<String>> {
        if n == 0 {
            return Err(VizError::InvalidInput(
                "recommendation count must be at least 1".to_string(),
            ));
        }
        let batches = complete(
            generator,
            Stage::Recommend,
            recommend_messages(code, summary, n, library),
            config,
        )
        .await?
        .parse(|raws| {
            Candidates::parse(Stage::Recommend, raws.iter().map(String::as_str), split_programs)
                .into_result()
        })?;
        let mut programs: Vec<String> = batches.into_iter().flatten().collect();
        if programs.len() < n {
            warn!(requested = n, received = programs.len(), "Fewer recommendations than requested");
        }
        programs.truncate(n);
        info!(library = %library, count = programs.len(), "Recommended visualizations");
        Ok(programs)
    }
}

/// Splits one completion into its normalized programs.
fn split_programs(raw: &str) -> Result<Vec<String>, ResponseError> {
    let blocks = fenced_blocks(raw);
    if blocks.is_empty() {
        return normalize_code(raw).map(|code| vec![code]);
    }

    let programs: Vec<String> = blocks
        .iter()
        .filter(|b| b.body.contains(PLOT_SIGNATURE))
        .filter_map(|b| normalize_code(&b.body).ok())
        .collect();
    if programs.is_empty() {
        return Err(ResponseError::schema(
            "no fenced block defines plot(data)",
            raw,
        ));
    }
    Ok(programs)
}
