//! Goal and persona prompts.

use crate::datamodel::{Persona, Summary};
use crate::llm::Message;

use super::JSON_ONLY_RULE;

const GOALS_SYSTEM: &str = r#"You are a DATA ANALYST EXPERT who can efficiently generate a given number of INSIGHTFUL GOALS about data, when given a summary of the data and a specified persona.

## Goal structure
Each goal must include:
1. "question": a meaningful question a data analyst might ask about the dataset.
2. "visualization": the best-practice visualization that answers the question. THE VISUALIZATION MUST REFERENCE THE EXACT COLUMN FIELDS FROM THE SUMMARY.
3. "rationale": which dataset fields are used and why, what the chart reveals, and which decisions it supports.

## Writing the rationale
- Name the data type of every field used (numerical, datetime, categorical, binary).
- Explain why the chosen chart type fits the question, in simple language.
- Describe what we learn from the chart and the practical actions it enables.

## Visualization best practices
- Use bar charts instead of pie charts for comparing quantities.
- Plot longitude and latitude on maps where appropriate.
- Use histograms with an overlaid density estimate for distributions.
- Use line charts for trends over time, with forecast intervals where a prediction is meaningful.

## Rules
- Explicitly mention dataset column fields in each goal.
- Avoid redundant or generic goals such as "Show total sales."
- Prefer goals a non-specialist can understand that still carry analytical value."#;

const GOALS_FORMAT: &str = r#"THE OUTPUT MUST BE A CODE SNIPPET OF A VALID LIST OF JSON OBJECTS. IT MUST USE THE FOLLOWING FORMAT:

```json
[
  {"index": 0, "question": "What is the distribution of X?", "visualization": "histogram of X", "rationale": "This tells about ..."},
  {"index": 1, "question": "Which Y has the highest X?", "visualization": "bar chart of X by Y", "rationale": "Comparing X across Y helps ..."}
]
```"#;

const PERSONAS_SYSTEM: &str = r#"You are an experienced data analyst who can take a dataset summary and generate a list of n personas (e.g. a CEO or accountant for finance data, an economist for population or GDP data, a doctor for health data, or simply users) that might be critical stakeholders in exploring the data, and describe the rationale for why they are critical. Prioritize the personas by their relevance to the data. Think step by step."#;

const PERSONAS_FORMAT: &str = r#"THE OUTPUT MUST BE A CODE SNIPPET OF A VALID LIST OF JSON OBJECTS. IT MUST USE THE FOLLOWING FORMAT:

```json
[
  {"persona": "persona1", "rationale": "..."},
  {"persona": "persona2", "rationale": "..."}
]
```"#;

/// Messages asking for `n` goals steered by `persona`.
pub fn goal_messages(summary: &Summary, n: usize, persona: &Persona) -> Vec<Message> {
    let user = format!(
        "The number of GOALS to generate is {n}. The goals should be based on the data summary below.\n\n{summary}\n\n\
         The generated goals SHOULD BE FOCUSED ON THE INTERESTS AND PERSPECTIVE of a '{persona}' persona.\n\n\
         {format}\n{rule}\n\nThe generated {n} goals are:",
        n = n,
        summary = summary.to_prompt_text(),
        persona = persona.persona,
        format = GOALS_FORMAT,
        rule = JSON_ONLY_RULE,
    );
    vec![Message::system(GOALS_SYSTEM), Message::user(user)]
}

/// Messages asking for `n` personas relevant to the dataset.
pub fn persona_messages(summary: &Summary, n: usize) -> Vec<Message> {
    let user = format!(
        "The number of PERSONAS to generate is {n}. Generate {n} personas in the right format given the data summary below.\n\n{summary}\n\n{format}\n{rule}",
        n = n,
        summary = summary.to_prompt_text(),
        format = PERSONAS_FORMAT,
        rule = JSON_ONLY_RULE,
    );
    vec![Message::system(PERSONAS_SYSTEM), Message::user(user)]
}
