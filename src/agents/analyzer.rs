//! Retrieval-augmented chart analysis.

use tracing::{debug, info};

use super::{complete, image_data_url};
use crate::datamodel::{ChartExecutorResponse, TextGenerationConfig};
use crate::error::{VizError, VizResult};
use crate::llm::TextGenerator;
use crate::parser::ResponseError;
use crate::prompts::{analysis_messages, Stage};
use crate::retrieval::ContextStore;

/// Default number of context chunks placed in the prompt.
pub const DEFAULT_CONTEXT_CHUNKS: usize = 3;

/// Writes a prose analysis of a rendered chart, grounded in retrieved
/// context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartAnalyzer;

impl ChartAnalyzer {
    pub const AGENT_NAME: &'static str = "chart_analyzer";

    /// The chart's raster as a data URL, or why it cannot be analyzed.
    pub fn chart_image(chart: &ChartExecutorResponse) -> VizResult<String> {
        if let Some(error) = &chart.error {
            return Err(VizError::Execution {
                code: chart.code.clone(),
                error: error.clone(),
            });
        }
        let raster = chart.raster.as_deref().ok_or_else(|| {
            VizError::InvalidInput("chart has no rendered image to analyze".to_string())
        })?;
        image_data_url(raster)
    }

    /// Analyzes `chart` for `query` using the `k` nearest chunks in `store`.
    ///
    /// The chart must have executed successfully and carry a raster.
    pub async fn analyze(
        &self,
        generator: &TextGenerator,
        store: &ContextStore,
        chart: &ChartExecutorResponse,
        query: &str,
        k: usize,
        config: &TextGenerationConfig,
    ) -> VizResult<String> {
        let image_url = Self::chart_image(chart)?;

        let context: Vec<String> = store
            .retrieve(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.chunk.content)
            .collect();
        debug!(k, retrieved = context.len(), "Built analysis context");

        let analysis = complete(
            generator,
            Stage::Analyze,
            analysis_messages(&chart.code, &image_url, query, &context),
            config,
        )
        .await?
        .parse(|raws| {
            raws.iter()
                .map(|raw| raw.trim().to_string())
                .find(|raw| !raw.is_empty())
                .ok_or_else(|| {
                    VizError::from_response(
                        Stage::Analyze,
                        ResponseError::malformed("analysis is empty", ""),
                    )
                })
        })?;

        info!(
            library = %chart.library,
            context = context.len(),
            length = analysis.len(),
            "Analyzed chart"
        );
        Ok(analysis)
    }
}
