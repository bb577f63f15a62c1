//! Executor backed by an external interpreter process.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{check_contract, ChartExecutor};
use crate::data::DataFrame;
use crate::datamodel::{ChartExecutorResponse, Summary};
use crate::scaffold::ChartLibrary;

/// Default wall-clock limit for one program.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const DATA_FILE: &str = "data.csv";
const SCRIPT_FILE: &str = "chart.py";
const OUTPUT_FILE: &str = "chart.png";

/// Runs each program as `<command> <args..> chart.py` in a scratch directory.
///
/// The script binds `data` from `data.csv`, runs the program unchanged, and
/// saves `chart` to `chart.png`. The interpreter is expected to have pandas
/// and the chosen charting library installed; nothing is sandboxed.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl ProcessExecutor {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Adds arguments placed before the script path.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run_one(
        &self,
        program: &str,
        data: &DataFrame,
        library: ChartLibrary,
    ) -> ChartExecutorResponse {
        if let Err(error) = check_contract(program) {
            return ChartExecutorResponse::failure(program, error, library.name());
        }
        match self.render(program, data, library).await {
            Ok(raster) => ChartExecutorResponse::success(program, Some(raster), library.name()),
            Err(error) => {
                warn!(library = %library, error = %error, "Chart execution failed");
                ChartExecutorResponse::failure(program, error, library.name())
            }
        }
    }

    /// Runs one program and returns the base64 PNG it rendered.
    async fn render(
        &self,
        program: &str,
        data: &DataFrame,
        library: ChartLibrary,
    ) -> Result<String, String> {
        let workdir = tempfile::tempdir().map_err(|e| format!("scratch directory: {}", e))?;
        let dir = workdir.path();

        let file = std::fs::File::create(dir.join(DATA_FILE))
            .map_err(|e| format!("writing dataset: {}", e))?;
        data.write_csv(file)
            .map_err(|e| format!("writing dataset: {}", e))?;
        std::fs::write(dir.join(SCRIPT_FILE), harness(program, library))
            .map_err(|e| format!("writing script: {}", e))?;

        let mut cmd = Command::new(&self.command);
        cmd.current_dir(dir)
            .args(&self.args)
            .arg(SCRIPT_FILE)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(command = %self.command, dir = %dir.display(), "Spawning chart process");
        let child = cmd
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {}", self.command, e))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("process error: {}", e)),
            Err(_) => return Err(format!("timed out after {:?}", self.timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output");
            return Err(format!(
                "exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                last.trim()
            ));
        }

        read_raster(&dir.join(OUTPUT_FILE))
    }
}

#[async_trait]
impl ChartExecutor for ProcessExecutor {
    async fn execute(
        &self,
        code: &[String],
        data: &DataFrame,
        _summary: &Summary,
        library: ChartLibrary,
    ) -> Vec<ChartExecutorResponse> {
        let mut responses = Vec::with_capacity(code.len());
        for program in code {
            responses.push(self.run_one(program, data, library).await);
        }
        info!(
            library = %library,
            count = responses.len(),
            failed = responses.iter().filter(|r| !r.is_success()).count(),
            "Executed chart programs"
        );
        responses
    }

    fn name(&self) -> &str {
        &self.command
    }
}

fn read_raster(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|_| "program did not produce an image".to_string())?;
    if bytes.is_empty() {
        return Err("program produced an empty image".to_string());
    }
    Ok(STANDARD.encode(bytes))
}

/// Statement that saves the `chart` variable as `chart.png`.
fn save_statement(library: ChartLibrary) -> String {
    match library {
        ChartLibrary::Matplotlib | ChartLibrary::Seaborn => {
            format!("chart.savefig('{}', dpi=100, bbox_inches='tight')", OUTPUT_FILE)
        }
        ChartLibrary::Ggplot => format!("chart.save('{}', dpi=100, verbose=False)", OUTPUT_FILE),
        ChartLibrary::Altair => format!("chart.save('{}')", OUTPUT_FILE),
        ChartLibrary::Plotly => format!("chart.write_image('{}')", OUTPUT_FILE),
    }
}

/// Wraps `program` so it runs with `data` bound and saves its chart.
fn harness(program: &str, library: ChartLibrary) -> String {
    let prelude = match library {
        ChartLibrary::Matplotlib | ChartLibrary::Seaborn => {
            "import matplotlib\nmatplotlib.use('Agg')\nimport pandas as pd\n"
        }
        _ => "import pandas as pd\n",
    };
    format!(
        "{}data = pd.read_csv('{}')\n\n{}\n\n{}\n",
        prelude,
        DATA_FILE,
        program.trim_end(),
        save_statement(library)
    )
}
