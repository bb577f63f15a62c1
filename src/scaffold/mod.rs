//! Chart scaffolds per charting library.
//!
//! Every library supplies a code template with two fill-in markers
//! (`<imports>` and `<stub>`) and ends with the fixed entry-point line
//! [`ENTRY_POINT`]. External executors rely on that line: they run the code
//! with `data` bound to the dataset and read the `chart` variable.

mod normalize;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::datamodel::Goal;
use crate::error::VizError;
use crate::llm::Message;

pub use normalize::normalize_code;

/// Line every generated program must end with.
pub const ENTRY_POINT: &str = "chart = plot(data)";

/// Signature the fill-in code must define.
pub const PLOT_SIGNATURE: &str = "def plot(";

/// Marker for additional imports in a template.
pub const IMPORTS_MARKER: &str = "<imports>";

/// Marker for the plotting body in a template.
pub const STUB_MARKER: &str = "<stub>";

const ENTRY_POINT_COMMENT: &str = " # data already contains the data to be plotted. Always include this line. No additional code beyond this line.";

const GENERAL_INSTRUCTIONS: &str = r#"You are a helpful and professional assistant with expertise in generating optimized code templates for data visualizations.
1. Analyze the dataset: column names and data types, numerical versus categorical fields, missing values.
2. Pick the visualization best practice: time series as line charts, category comparisons as bar charts, distributions as histograms with an overlaid density estimate.
3. Generate the code accordingly.
4. Expected output:
   i) ALWAYS make sure the x-axis and y-axis labels are legible (rotate x-axis labels when needed).
   ii) ONLY modify the <imports> AND <stub> sections of the template.
   iii) Given the dataset summary, the plot(data) method must generate a {library} chart ({visualization}) that directly addresses this goal: {question}.
   iv) NEVER WRITE ANY CODE TO LOAD THE DATA. The data is already loaded and available in the variable data."#;

/// Supported charting libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartLibrary {
    Matplotlib,
    Seaborn,
    Ggplot,
    Altair,
    Plotly,
}

impl ChartLibrary {
    pub const ALL: [ChartLibrary; 5] = [
        ChartLibrary::Matplotlib,
        ChartLibrary::Seaborn,
        ChartLibrary::Ggplot,
        ChartLibrary::Altair,
        ChartLibrary::Plotly,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChartLibrary::Matplotlib => "matplotlib",
            ChartLibrary::Seaborn => "seaborn",
            ChartLibrary::Ggplot => "ggplot",
            ChartLibrary::Altair => "altair",
            ChartLibrary::Plotly => "plotly",
        }
    }

    /// What `plot(data)` must return for this library.
    pub fn return_assertion(&self) -> &'static str {
        match self {
            ChartLibrary::Matplotlib | ChartLibrary::Seaborn => {
                "The plot method must return a matplotlib object (plt). DO NOT include plt.show()."
            }
            ChartLibrary::Ggplot => "The plot method must return a plotnine ggplot object (chart).",
            ChartLibrary::Altair => "The plot method must return an altair chart object (chart).",
            ChartLibrary::Plotly => {
                "The plot method must return a plotly figure object (fig). DO NOT include fig.show()."
            }
        }
    }

    /// Library-specific guidance appended to the general instructions.
    fn library_notes(&self) -> &'static str {
        match self {
            ChartLibrary::Matplotlib | ChartLibrary::Seaborn => {
                "Use Cartopy for charts that require a map. Think step by step."
            }
            ChartLibrary::Ggplot => "Think step by step.",
            ChartLibrary::Altair => {
                "Always add a type BASED on semantic_type to each field such as :Q, :O, :N, :T, :G. Use :T if semantic_type is year or date. Think step by step."
            }
            ChartLibrary::Plotly => {
                "When calculating metrics such as mean, median or mode ALWAYS use numeric_only=True where available. AVOID visualizations that require the nbformat library. Think step by step."
            }
        }
    }

    /// Code template for `goal`, with the fill-in markers and entry point.
    pub fn template(&self, goal: &Goal) -> String {
        let title = escape_single_quoted(&goal.question);
        let body = match self {
            ChartLibrary::Matplotlib => format!(
                "import matplotlib.pyplot as plt\nimport pandas as pd\n{IMPORTS_MARKER}\n# plan -\ndef plot(data: pd.DataFrame):\n    {STUB_MARKER} # only modify this section\n    plt.title('{title}', wrap=True)\n    return plt\n"
            ),
            ChartLibrary::Seaborn => format!(
                "import seaborn as sns\nimport pandas as pd\nimport matplotlib.pyplot as plt\n{IMPORTS_MARKER}\n# solution plan\n# i.  ..\ndef plot(data: pd.DataFrame):\n\n    {STUB_MARKER} # only modify this section\n    plt.title('{title}', wrap=True)\n    return plt\n"
            ),
            ChartLibrary::Ggplot => format!(
                "import plotnine as p9\nimport pandas as pd\n{IMPORTS_MARKER}\ndef plot(data: pd.DataFrame):\n    chart = {STUB_MARKER}\n\n    return chart\n"
            ),
            ChartLibrary::Altair => format!(
                "import altair as alt\nimport pandas as pd\n{IMPORTS_MARKER}\ndef plot(data: pd.DataFrame):\n    {STUB_MARKER} # only modify this section\n    return chart\n"
            ),
            ChartLibrary::Plotly => format!(
                "import plotly.express as px\nimport pandas as pd\n{IMPORTS_MARKER}\ndef plot(data: pd.DataFrame):\n    fig = {STUB_MARKER} # only modify this section\n\n    return fig\n"
            ),
        };
        format!("{}\n{}{}", body, ENTRY_POINT, ENTRY_POINT_COMMENT)
    }

    /// Instruction message placed before the template in generation prompts.
    pub fn instructions(&self, goal: &Goal) -> Message {
        let general = GENERAL_INSTRUCTIONS
            .replace("{library}", self.name())
            .replace("{visualization}", &goal.visualization)
            .replace("{question}", &goal.question);
        Message::system(format!(
            "{}\n{} {}",
            general,
            self.return_assertion(),
            self.library_notes()
        ))
    }
}

impl std::fmt::Display for ChartLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ChartLibrary {
    type Err = VizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "matplotlib" => Ok(ChartLibrary::Matplotlib),
            "seaborn" => Ok(ChartLibrary::Seaborn),
            "ggplot" | "plotnine" => Ok(ChartLibrary::Ggplot),
            "altair" => Ok(ChartLibrary::Altair),
            "plotly" => Ok(ChartLibrary::Plotly),
            other => Err(VizError::Configuration(format!(
                "unsupported library '{}', choose from matplotlib, seaborn, ggplot, altair, plotly",
                other
            ))),
        }
    }
}

fn escape_single_quoted(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal() -> Goal {
        Goal::new(
            "What's the total Sales per Category?",
            "bar chart of Sales by Category",
            "",
        )
    }

    #[test]
    fn test_every_template_has_markers_and_entry_point() {
        for library in ChartLibrary::ALL {
            let template = library.template(&goal());
            assert!(template.contains(IMPORTS_MARKER), "{}", library);
            assert!(template.contains(STUB_MARKER), "{}", library);
            assert!(template.contains(PLOT_SIGNATURE), "{}", library);
            let last = template.lines().last().unwrap();
            assert!(last.starts_with(ENTRY_POINT), "{}", library);
            assert_eq!(template.matches(ENTRY_POINT).count(), 1, "{}", library);
        }
    }

    #[test]
    fn test_title_is_escaped() {
        let template = ChartLibrary::Seaborn.template(&goal());
        assert!(template.contains(r"plt.title('What\'s the total Sales per Category?'"));
    }

    #[test]
    fn test_unknown_library_is_configuration_error() {
        let err = "bokeh".parse::<ChartLibrary>().unwrap_err();
        assert!(matches!(err, VizError::Configuration(_)));
        assert_eq!(
            "Seaborn".parse::<ChartLibrary>().unwrap(),
            ChartLibrary::Seaborn
        );
    }

    #[test]
    fn test_instructions_mention_goal_and_return_type() {
        let message = ChartLibrary::Plotly.instructions(&goal());
        let text = message.text();
        assert_eq!(message.role, "system");
        assert!(text.contains("plotly chart (bar chart of Sales by Category)"));
        assert!(text.contains("plotly figure object"));
    }
}
