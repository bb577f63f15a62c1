//! Retrieval-augmented chart analysis prompt.
//!
//! The only stage whose output is prose; nothing here asks for JSON.

use crate::llm::Message;

const ANALYSIS_SYSTEM: &str = "You are a SENIOR DATA ANALYST. You interpret rendered charts together with the code that produced them and the background context you are given, and you write clear, well-structured analyses for decision makers.";

const ANALYSIS_SECTIONS: &str = r#"Write the analysis with the following sections:
1. Chart Description: what the chart shows, its type, axes and encodings.
2. Key Trends: the most important patterns, peaks, dips and outliers, with values where visible.
3. Time-based Breakdown: how the measures evolve over time, if the data has a time dimension.
4. Contextual Insights: how the background context explains or qualifies what the chart shows.
5. External Influences: outside factors that plausibly affect the observed patterns.
6. Recommendations: concrete, actionable next steps grounded in the findings.
End with a short Conclusion.

Do not mention anything about an inability to see or render the image. Base the analysis on the image, the code and the context."#;

/// Messages asking a vision model to analyze a rendered chart.
pub fn analysis_messages(code: &str, image_url: &str, query: &str, context: &[String]) -> Vec<Message> {
    let context_text = if context.is_empty() {
        "No additional context is available.".to_string()
    } else {
        context.join("\n\n")
    };
    let text = format!(
        "Analyze the chart image provided.\n\n\
         The chart was produced by this code:\n\n```python\n{}\n```\n\n\
         The user's question is: {}\n\n\
         Background context retrieved for this question:\n\n{}\n\n{}",
        code.trim(),
        query.trim(),
        context_text,
        ANALYSIS_SECTIONS
    );
    vec![
        Message::system(ANALYSIS_SYSTEM),
        Message::user_with_image(text, image_url),
    ]
}
