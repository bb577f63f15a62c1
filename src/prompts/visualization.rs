//! Code generation, editing and recommendation prompts.

use crate::datamodel::{Goal, Summary};
use crate::llm::Message;
use crate::scaffold::{ChartLibrary, ENTRY_POINT};

const GENERATE_SYSTEM: &str = r#"You are an experienced data visualization developer who can generate code based on data summaries. The code you generate MUST FOLLOW VISUALIZATION BEST PRACTICES, i.e. meet the specified goal, apply the right transformation, use the right visualization type, use the right data encoding, and use the right aesthetics (e.g. ensure axes are legible). The transformations you apply MUST be correct and the fields you use MUST be correct. The visualization CODE MUST BE CORRECT and MUST NOT CONTAIN ANY SYNTAX OR LOGIC ERRORS (e.g. it must consider the field types and use them correctly). You MUST first generate a brief plan for how you would solve the task, e.g. what transformations you would apply if you need to construct a new column, what fields you would use for what visualization types, what aesthetics you would use, etc."#;

const EDIT_SYSTEM: &str = r#"You are a highly skilled visualization assistant that can modify provided visualization code based on a set of instructions. You MUST return a FULL program. DO NOT include any preamble text. Do not include explanations or prose. The modified code MUST keep the plot(data) function and MUST end with the line chart = plot(data)."#;

const RECOMMEND_SYSTEM: &str = r#"You are a helpful assistant highly skilled in recommending a DIVERSE set of visualizations given some code and a dataset summary. Each recommendation must explore the data from a different angle (a different chart type, different fields, or a different transformation) while staying faithful to the fields in the summary. Every recommendation MUST be a FULL program in its own fenced code block that follows the template, defines plot(data) and ends with the line chart = plot(data). Do not include any explanation."#;

fn code_format(template: &str) -> String {
    format!(
        "You MUST return a FULL PYTHON PROGRAM ENCLOSED IN BACKTICKS ``` that starts with an import statement. DO NOT add any explanation.\n\n\
         THE GENERATED CODE SOLUTION SHOULD BE CREATED BY MODIFYING THE SPECIFIED PARTS OF THE TEMPLATE BELOW\n\n{}\n\n\
         The FINAL COMPLETED CODE BASED ON THE TEMPLATE ABOVE is ...",
        template
    )
}

/// Messages asking for code that answers `goal` with `library`.
pub fn generate_messages(summary: &Summary, goal: &Goal, library: ChartLibrary) -> Vec<Message> {
    vec![
        Message::system(GENERATE_SYSTEM),
        Message::system(format!(
            "The dataset summary is: {}\n\nThe visualization type to produce is: {}",
            summary.to_prompt_text(),
            goal.visualization
        )),
        library.instructions(goal),
        Message::user(code_format(&library.template(goal))),
    ]
}

/// Messages asking for `code` modified by a numbered list of instructions.
pub fn edit_messages(
    code: &str,
    summary: &Summary,
    instructions: &[String],
    library: ChartLibrary,
) -> Vec<Message> {
    let numbered = instructions
        .iter()
        .enumerate()
        .map(|(i, instruction)| format!("{}. {}", i + 1, instruction.trim()))
        .collect::<Vec<_>>()
        .join("\n");

    vec![
        Message::system(EDIT_SYSTEM),
        Message::system(format!(
            "The dataset summary is: {}\n\n{}",
            summary.to_prompt_text(),
            library.return_assertion()
        )),
        Message::user(format!(
            "The code to be modified is:\n\n```python\n{}\n```\n\n\
             Modify the code above to meet the following instructions:\n{}\n\n\
             Return the FULL modified program in a single fenced code block, ending with {}.",
            code.trim(),
            numbered,
            ENTRY_POINT
        )),
    ]
}

/// Messages asking for `n` alternative programs based on `code`.
pub fn recommend_messages(
    code: &str,
    summary: &Summary,
    n: usize,
    library: ChartLibrary,
) -> Vec<Message> {
    let template = library.template(&Goal::new(
        "<title>",
        "<visualization>",
        "",
    ));
    vec![
        Message::system(RECOMMEND_SYSTEM),
        Message::system(format!(
            "The dataset summary is: {}\n\nThe charting library is {}. {}",
            summary.to_prompt_text(),
            library,
            library.return_assertion()
        )),
        Message::user(format!(
            "The existing visualization code is:\n\n```python\n{}\n```\n\n\
             Recommend {} DIVERSE visualizations. Each MUST be a FULL program enclosed in its own ``` block, created by modifying the template below:\n\n{}",
            code.trim(),
            n,
            template
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::fixtures::sales_summary;
    use crate::scaffold::STUB_MARKER;

    fn goal() -> Goal {
        Goal::new(
            "What is the total Sales per Category?",
            "bar chart of Sales by Category",
            "compares Sales",
        )
    }

    #[test]
    fn test_generation_message_order() {
        let messages = generate_messages(&sales_summary(), &goal(), ChartLibrary::Seaborn);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "system", "system", "user"]);
        assert!(messages[1].text().contains("bar chart of Sales by Category"));
        assert!(messages[2].text().contains("seaborn chart"));
        let user = messages[3].text();
        assert!(user.contains(STUB_MARKER));
        assert!(user.contains(ENTRY_POINT));
    }

    #[test]
    fn test_edit_instructions_are_numbered() {
        let instructions = vec!["make the bars red".to_string(), " add a legend ".to_string()];
        let messages = edit_messages(
            "def plot(data):\n    return plt",
            &sales_summary(),
            &instructions,
            ChartLibrary::Matplotlib,
        );
        let user = messages.last().unwrap().text();
        assert!(user.contains("1. make the bars red\n2. add a legend"));
        assert!(user.contains("```python\ndef plot(data):"));
    }

    #[test]
    fn test_recommend_asks_for_count() {
        let messages = recommend_messages("code", &sales_summary(), 4, ChartLibrary::Altair);
        let user = messages.last().unwrap().text();
        assert!(user.contains("Recommend 4 DIVERSE visualizations"));
        assert!(user.contains("import altair as alt"));
    }
}
