//! Prompt contracts for every pipeline stage.
//!
//! A prompt contract is a pure function from a stage and its typed inputs to
//! an ordered message sequence. System instructions always come first, then
//! the serialized inputs, then the output format. JSON stages describe the
//! exact shape expected inside a fenced block and end with
//! [`JSON_ONLY_RULE`]. Code stages ask for a fenced program following the
//! library scaffold.
//!
//! # Usage
//!
//! ```ignore
//! use vizforge::prompts::{PromptRequest, Stage};
//!
//! let request = PromptRequest::Goals { summary: &summary, n: 3, persona: &persona };
//! assert_eq!(request.stage(), Stage::Goals);
//! let messages = request.messages();
//! ```

pub mod analysis;
pub mod goals;
pub mod review;
pub mod summary;
pub mod visualization;

use serde::{Deserialize, Serialize};

use crate::datamodel::{Goal, Persona, Summary};
use crate::llm::Message;
use crate::scaffold::ChartLibrary;

pub use analysis::analysis_messages;
pub use goals::{goal_messages, persona_messages};
pub use review::{evaluate_messages, explain_messages};
pub use summary::enrich_messages;
pub use visualization::{edit_messages, generate_messages, recommend_messages};

/// Closing line of every JSON format instruction.
pub const JSON_ONLY_RULE: &str = "THE OUTPUT SHOULD ONLY USE THE JSON FORMAT ABOVE.";

/// Pipeline stage identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Summarize,
    Goals,
    Personas,
    Visualize,
    Edit,
    Explain,
    Evaluate,
    Recommend,
    Analyze,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Summarize => "summarize",
            Stage::Goals => "goals",
            Stage::Personas => "personas",
            Stage::Visualize => "visualize",
            Stage::Edit => "edit",
            Stage::Explain => "explain",
            Stage::Evaluate => "evaluate",
            Stage::Recommend => "recommend",
            Stage::Analyze => "analyze",
        }
    }

    /// Whether the stage output is decoded as JSON.
    pub fn expects_json(&self) -> bool {
        matches!(
            self,
            Stage::Summarize | Stage::Goals | Stage::Personas | Stage::Explain | Stage::Evaluate
        )
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stage identifier together with its typed inputs.
#[derive(Debug, Clone)]
pub enum PromptRequest<'a> {
    Summarize {
        summary: &'a Summary,
    },
    Goals {
        summary: &'a Summary,
        n: usize,
        persona: &'a Persona,
    },
    Personas {
        summary: &'a Summary,
        n: usize,
    },
    Visualize {
        summary: &'a Summary,
        goal: &'a Goal,
        library: ChartLibrary,
    },
    Edit {
        code: &'a str,
        summary: &'a Summary,
        instructions: &'a [String],
        library: ChartLibrary,
    },
    Explain {
        code: &'a str,
        library: ChartLibrary,
    },
    Evaluate {
        code: &'a str,
        goal: &'a Goal,
        library: ChartLibrary,
        image_url: &'a str,
    },
    Recommend {
        code: &'a str,
        summary: &'a Summary,
        n: usize,
        library: ChartLibrary,
    },
    Analyze {
        code: &'a str,
        image_url: &'a str,
        query: &'a str,
        context: &'a [String],
    },
}

impl PromptRequest<'_> {
    pub fn stage(&self) -> Stage {
        match self {
            PromptRequest::Summarize { .. } => Stage::Summarize,
            PromptRequest::Goals { .. } => Stage::Goals,
            PromptRequest::Personas { .. } => Stage::Personas,
            PromptRequest::Visualize { .. } => Stage::Visualize,
            PromptRequest::Edit { .. } => Stage::Edit,
            PromptRequest::Explain { .. } => Stage::Explain,
            PromptRequest::Evaluate { .. } => Stage::Evaluate,
            PromptRequest::Recommend { .. } => Stage::Recommend,
            PromptRequest::Analyze { .. } => Stage::Analyze,
        }
    }

    /// Builds the message sequence for this request.
    pub fn messages(&self) -> Vec<Message> {
        match *self {
            PromptRequest::Summarize { summary } => enrich_messages(summary),
            PromptRequest::Goals {
                summary,
                n,
                persona,
            } => goal_messages(summary, n, persona),
            PromptRequest::Personas { summary, n } => persona_messages(summary, n),
            PromptRequest::Visualize {
                summary,
                goal,
                library,
            } => generate_messages(summary, goal, library),
            PromptRequest::Edit {
                code,
                summary,
                instructions,
                library,
            } => edit_messages(code, summary, instructions, library),
            PromptRequest::Explain { code, library } => explain_messages(code, library),
            PromptRequest::Evaluate {
                code,
                goal,
                library,
                image_url,
            } => evaluate_messages(code, goal, library, image_url),
            PromptRequest::Recommend {
                code,
                summary,
                n,
                library,
            } => recommend_messages(code, summary, n, library),
            PromptRequest::Analyze {
                code,
                image_url,
                query,
                context,
            } => analysis_messages(code, image_url, query, context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::fixtures::sales_summary;

    #[test]
    fn test_stage_display_is_lowercase() {
        assert_eq!(Stage::Explain.to_string(), "explain");
        assert_eq!(Stage::Goals.to_string(), "goals");
        assert!(!Stage::Analyze.expects_json());
        assert!(Stage::Evaluate.expects_json());
    }

    #[test]
    fn test_every_contract_starts_with_system() {
        let summary = sales_summary();
        let persona = Persona::default();
        let goal = Goal::new("q", "bar chart of Sales by Category", "r");
        let instructions = vec!["make the bars red".to_string()];
        let context = vec!["Sales are in USD".to_string()];
        let image = "data:image/png;base64,iVBORw0KGgo=";

        let requests = vec![
            PromptRequest::Summarize { summary: &summary },
            PromptRequest::Goals {
                summary: &summary,
                n: 3,
                persona: &persona,
            },
            PromptRequest::Personas {
                summary: &summary,
                n: 2,
            },
            PromptRequest::Visualize {
                summary: &summary,
                goal: &goal,
                library: ChartLibrary::Seaborn,
            },
            PromptRequest::Edit {
                code: "def plot(data): ...",
                summary: &summary,
                instructions: &instructions,
                library: ChartLibrary::Seaborn,
            },
            PromptRequest::Explain {
                code: "def plot(data): ...",
                library: ChartLibrary::Seaborn,
            },
            PromptRequest::Evaluate {
                code: "def plot(data): ...",
                goal: &goal,
                library: ChartLibrary::Seaborn,
                image_url: image,
            },
            PromptRequest::Recommend {
                code: "def plot(data): ...",
                summary: &summary,
                n: 2,
                library: ChartLibrary::Seaborn,
            },
            PromptRequest::Analyze {
                code: "def plot(data): ...",
                image_url: image,
                query: "what stands out?",
                context: &context,
            },
        ];

        for request in requests {
            let messages = request.messages();
            assert!(!messages.is_empty(), "{}", request.stage());
            assert_eq!(messages[0].role, "system", "{}", request.stage());
            // Deterministic: same inputs, same messages.
            assert_eq!(messages, request.messages(), "{}", request.stage());

            if request.stage().expects_json() {
                let all_text: String = messages.iter().map(|m| m.text()).collect();
                assert!(all_text.contains(JSON_ONLY_RULE), "{}", request.stage());
            }
        }
    }
}
