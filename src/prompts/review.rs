//! Explanation and evaluation prompts.

use crate::datamodel::{Aspect, Goal};
use crate::llm::Message;
use crate::scaffold::ChartLibrary;

use super::JSON_ONLY_RULE;

const EXPLAIN_SYSTEM: &str = r#"You are a helpful assistant highly skilled in providing helpful, structured explanations of visualization code for the plot(data) method. You provide explanations for three sections of the code:
- accessibility: describe the physical appearance of the chart (chart type, colors, axes) and its goal, written for a reader who cannot see it.
- transformation: describe every data transformation applied to data before plotting.
- visualization: step by step, describe how the plotting code encodes the data.
Each section appears exactly once. Do not add other sections."#;

const EXPLAIN_FORMAT: &str = r#"Your output MUST be a code snippet of a perfect JSON list that uses the following format:

```json
[
  {"section": "accessibility", "code": "None", "explanation": "..."},
  {"section": "transformation", "code": "...", "explanation": "..."},
  {"section": "visualization", "code": "...", "explanation": "..."}
]
```

The list must contain EXACTLY 3 objects, one per section. Do not include any other text before or after the list."#;

const EVALUATE_SYSTEM: &str = r#"You are a helpful assistant highly skilled in evaluating the quality of a given visualization, using both its code and its rendered image. You score each dimension on a scale of 1 (bad) to 10 (good), with a short rationale for every score.

The code aspect has these dimensions:
- bugs: are there bugs, syntax errors or typos? Would the code fail to compile or run?
- transformation: is the data transformed appropriately for the visualization type?
- compliance: how well does the code meet the specified visualization goal?
- encoding: is the data encoded appropriately for the visualization type?
- performance: is the code efficient for the size of the data?

The visual aspect has these dimensions:
- clarity: is the chart clear and easy to understand?
- aesthetics: are the aesthetics of the chart appropriate for the visualization type and the data?
- readability: are the labels, legends and axes legible?
- compliance: does the rendered chart answer the goal?

You must judge the rendered image as supplied. Think step by step."#;

fn evaluate_format() -> String {
    let dims = |aspect: Aspect| {
        aspect
            .dimensions()
            .iter()
            .map(|d| format!("{{\"dimension\": \"{}\", \"score\": x, \"rationale\": \"...\"}}", d))
            .collect::<Vec<_>>()
            .join(",\n        ")
    };
    format!(
        "Your OUTPUT MUST BE A VALID JSON LIST OF OBJECTS IN THE FORMAT:\n\n```json\n[\n  {{\"aspect\": \"code\", \"evaluations\": [\n        {}\n    ], \"average\": x}},\n  {{\"aspect\": \"visual\", \"evaluations\": [\n        {}\n    ], \"average\": x}}\n]\n```\n\n{}",
        dims(Aspect::Code),
        dims(Aspect::Visual),
        JSON_ONLY_RULE
    )
}

/// Messages asking for a three-section explanation of `code`.
pub fn explain_messages(code: &str, library: ChartLibrary) -> Vec<Message> {
    vec![
        Message::system(EXPLAIN_SYSTEM),
        Message::assistant(format!(
            "The {} code to explain is:\n\n```python\n{}\n```",
            library,
            code.trim()
        )),
        Message::user(format!("{}\n{}", EXPLAIN_FORMAT, JSON_ONLY_RULE)),
    ]
}

/// Messages asking for a scored review of `code` and its rendered image.
pub fn evaluate_messages(
    code: &str,
    goal: &Goal,
    library: ChartLibrary,
    image_url: &str,
) -> Vec<Message> {
    let text = format!(
        "Generate an evaluation given the goal, the {} code and the rendered chart image.\n\n\
         The goal is: {}\nThe intended visualization is: {}\n\n\
         The code is:\n\n```python\n{}\n```\n\n{}",
        library,
        goal.question,
        goal.visualization,
        code.trim(),
        evaluate_format()
    );
    vec![
        Message::system(EVALUATE_SYSTEM),
        Message::user_with_image(text, image_url),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explain_puts_code_in_assistant_turn() {
        let messages = explain_messages("def plot(data): ...", ChartLibrary::Seaborn);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "assistant", "user"]);
        assert!(messages[1].text().contains("def plot(data)"));
        assert!(messages[2].text().contains("EXACTLY 3 objects"));
    }

    #[test]
    fn test_evaluation_embeds_image_and_dimensions() {
        let goal = Goal::new("q", "bar chart of Sales", "r");
        let messages = evaluate_messages(
            "code",
            &goal,
            ChartLibrary::Plotly,
            "data:image/png;base64,AAAA",
        );
        assert_eq!(messages[1].content.image_count(), 1);
        let text = messages[1].text();
        for dimension in Aspect::Code.dimensions().iter().chain(Aspect::Visual.dimensions()) {
            assert!(text.contains(&format!("\"dimension\": \"{}\"", dimension)));
        }
        assert!(text.contains(JSON_ONLY_RULE));
    }
}
