//! Normalizing generated chart code to the scaffold contract.

use super::{ENTRY_POINT, IMPORTS_MARKER, PLOT_SIGNATURE, STUB_MARKER};
use crate::parser::{fenced_blocks, strip_fences, ResponseError};

/// Turns one completion into a runnable program.
///
/// - picks the fenced block defining `plot(`, else the first block, else
///   the whole text
/// - removes leftover `<imports>`/`<stub>` markers
/// - drops everything after the entry-point line, or appends the line when
///   it is missing
///
/// A completion without a `plot(` definition is a schema mismatch.
pub fn normalize_code(raw: &str) -> Result<String, ResponseError> {
    let blocks = fenced_blocks(raw);
    let code = blocks
        .iter()
        .find(|b| b.body.contains(PLOT_SIGNATURE))
        .or_else(|| blocks.first())
        .map(|b| b.body.clone())
        .unwrap_or_else(|| strip_fences(raw));

    if code.trim().is_empty() {
        return Err(ResponseError::malformed("completion contains no code", raw));
    }
    if !code.contains(PLOT_SIGNATURE) {
        return Err(ResponseError::schema(
            "code does not define plot(data)",
            raw,
        ));
    }

    let mut lines: Vec<String> = Vec::new();
    let mut has_entry_point = false;

    for line in code.lines() {
        let trimmed = line.trim();
        if trimmed == IMPORTS_MARKER || trimmed == STUB_MARKER {
            continue;
        }
        if trimmed.starts_with(ENTRY_POINT) && !line.starts_with(char::is_whitespace) {
            lines.push(ENTRY_POINT.to_string());
            has_entry_point = true;
            break;
        }
        lines.push(line.replace(IMPORTS_MARKER, "").replace(STUB_MARKER, ""));
    }

    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let mut normalized = lines.join("\n");
    if !has_entry_point {
        normalized.push_str("\n\n");
        normalized.push_str(ENTRY_POINT);
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::FailureKind;

    #[test]
    fn test_truncates_after_entry_point() {
        let raw = "```python\nimport seaborn as sns\ndef plot(data):\n    sns.barplot(data=data)\n    return plt\n\nchart = plot(data) # always include\nprint(chart)\n```";
        let code = normalize_code(raw).unwrap();
        assert!(code.ends_with("\nchart = plot(data)"));
        assert!(!code.contains("print(chart)"));
    }

    #[test]
    fn test_appends_missing_entry_point() {
        let raw = "```python\ndef plot(data):\n    return data.plot()\n```";
        let code = normalize_code(raw).unwrap();
        assert_eq!(code, "def plot(data):\n    return data.plot()\n\nchart = plot(data)");
    }

    #[test]
    fn test_strips_markers() {
        let raw = "import altair as alt\n<imports>\ndef plot(data):\n    chart = alt.Chart(data) <stub>\n    return chart\nchart = plot(data)";
        let code = normalize_code(raw).unwrap();
        assert!(!code.contains("<imports>"));
        assert!(!code.contains("<stub>"));
        assert!(code.contains("chart = alt.Chart(data)"));
    }

    #[test]
    fn test_prefers_block_with_plot_function() {
        let raw = "```bash\npip install seaborn\n```\n```python\ndef plot(data):\n    return plt\n```";
        let code = normalize_code(raw).unwrap();
        assert!(code.starts_with("def plot(data):"));
    }

    #[test]
    fn test_indented_entry_point_is_not_the_entry_point() {
        let raw = "def plot(data):\n    chart = plot(data)\n    return plt";
        let code = normalize_code(raw).unwrap();
        assert!(code.contains("    return plt"));
        assert!(code.ends_with("\n\nchart = plot(data)"));
    }

    #[test]
    fn test_missing_plot_function_rejected() {
        let err = normalize_code("```python\nprint('hello')\n```").unwrap_err();
        assert_eq!(err.kind(), FailureKind::SchemaMismatch);

        let err = normalize_code("   ").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Malformed);
    }
}
