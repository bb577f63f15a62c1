//! Summary enrichment prompt.

use crate::datamodel::Summary;
use crate::llm::Message;

use super::JSON_ONLY_RULE;

const ENRICH_SYSTEM: &str = r#"You are an experienced data analyst that can annotate datasets. Your instructions are as follows:
i) ALWAYS generate the dataset_description of the dataset.
ii) ALWAYS generate a description for every field.
iii) ALWAYS generate a semantic_type (a single word) for every field given its values, e.g. company, city, number, supplier, location, gender, longitude, latitude, url, ip address, zip code, email.
iv) DO NOT change column names, dtypes, samples or statistics. They were computed from the data and are exact.
You must return the updated JSON object without any preamble or explanation."#;

const ENRICH_FORMAT: &str = r#"THE OUTPUT MUST BE A CODE SNIPPET OF A VALID JSON OBJECT WITH THE SAME STRUCTURE AS THE INPUT:

```json
{
  "name": "...",
  "file_name": "...",
  "dataset_description": "one or two sentences describing the dataset",
  "fields": [
    {"column": "...", "properties": {"dtype": "...", "samples": [...], "num_unique_values": 0, "semantic_type": "...", "description": "..."}}
  ]
}
```"#;

/// Messages asking the model to annotate a deterministic summary.
pub fn enrich_messages(summary: &Summary) -> Vec<Message> {
    vec![
        Message::system(ENRICH_SYSTEM),
        Message::user(format!(
            "Annotate the dataset summary below.\n\n{}\n\n{}\n{}",
            summary.to_prompt_text(),
            ENRICH_FORMAT,
            JSON_ONLY_RULE
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::fixtures::sales_summary;

    #[test]
    fn test_enrichment_embeds_summary() {
        let messages = enrich_messages(&sales_summary());
        assert_eq!(messages.len(), 2);
        let user = messages[1].text();
        assert!(user.contains("\"column\": \"Category\""));
        assert!(user.ends_with(JSON_ONLY_RULE));
    }
}
