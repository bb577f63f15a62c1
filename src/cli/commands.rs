//! CLI command definitions for vizforge.
//!
//! Each subcommand drives one pipeline operation against a local dataset or
//! the context store and prints the result as pretty JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::agents::SummaryMethod;
use crate::config::VizConfig;
use crate::datamodel::{Persona, TextGenerationConfig};
use crate::executor::ProcessExecutor;
use crate::manager::{Manager, Session};
use crate::retrieval::{embedder_from_config, ContextStore, Source};
use crate::scaffold::ChartLibrary;

/// Default number of goals requested.
const DEFAULT_GOALS: usize = 3;

/// Default number of chunks returned by `retrieve`.
const DEFAULT_TOP_K: usize = 3;

/// LLM-driven chart recommendation for tabular datasets.
#[derive(Parser)]
#[command(name = "vizforge")]
#[command(about = "Summarize datasets, propose analysis goals and generate chart code")]
#[command(version)]
#[command(
    long_about = "vizforge turns a CSV or JSON dataset into a summary, a set of analysis goals and chart programs, and keeps a local context store for retrieval.\n\nExample usage:\n  vizforge goals cars.csv -n 5\n  vizforge code cars.csv --goal-index 0 --library seaborn"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// YAML configuration file. Environment variables are used when absent.
    #[arg(short, long, global = true, env = "VIZFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Provider override (openai, openrouter, gemini, ...).
    #[arg(short, long, global = true)]
    pub provider: Option<String>,

    /// Model override.
    #[arg(short, long, global = true)]
    pub model: Option<String>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Summarize a dataset.
    Summarize(SummarizeArgs),

    /// Propose analysis goals for a dataset.
    Goals(GoalsArgs),

    /// Generate chart code for one goal.
    #[command(alias = "visualize")]
    Code(CodeArgs),

    /// Explain a chart program.
    Explain(ExplainArgs),

    /// Add a document, a directory of documents or web text to the context store.
    Ingest(IngestArgs),

    /// Query the context store.
    Retrieve(RetrieveArgs),
}

/// Arguments for `vizforge summarize`.
#[derive(Parser, Debug)]
pub struct SummarizeArgs {
    /// Dataset file (.csv or .json).
    pub file: PathBuf,

    /// Summary method: default, llm or columns.
    #[arg(long, default_value = "default")]
    pub method: String,
}

/// Arguments for `vizforge goals`.
#[derive(Parser, Debug)]
pub struct GoalsArgs {
    /// Dataset file (.csv or .json).
    pub file: PathBuf,

    /// Number of goals to request.
    #[arg(short = 'n', long, default_value_t = DEFAULT_GOALS)]
    pub n: usize,

    /// Persona the goals should serve.
    #[arg(long)]
    pub persona: Option<String>,

    /// Summary method used before goal generation.
    #[arg(long, default_value = "default")]
    pub method: String,
}

/// Arguments for `vizforge code`.
#[derive(Parser, Debug)]
pub struct CodeArgs {
    /// Dataset file (.csv or .json).
    pub file: PathBuf,

    /// Index of the generated goal to visualize.
    #[arg(long, default_value_t = 0)]
    pub goal_index: usize,

    /// Charting library.
    #[arg(long, default_value = "seaborn")]
    pub library: String,

    /// Render the programs with this interpreter instead of only checking them.
    #[arg(long)]
    pub execute_with: Option<String>,
}

/// Arguments for `vizforge explain`.
#[derive(Parser, Debug)]
pub struct ExplainArgs {
    /// File containing the chart program.
    pub code_file: PathBuf,

    /// Charting library the program uses.
    #[arg(long, default_value = "seaborn")]
    pub library: String,
}

/// Arguments for `vizforge ingest`.
#[derive(Parser, Debug)]
pub struct IngestArgs {
    /// Text file or directory of .txt/.md files.
    #[arg(required_unless_present = "url", conflicts_with = "url")]
    pub path: Option<PathBuf>,

    /// Source URL of web text.
    #[arg(long, requires = "text")]
    pub url: Option<String>,

    /// Web text fetched from `--url`.
    #[arg(long, requires = "url")]
    pub text: Option<String>,
}

/// Arguments for `vizforge retrieve`.
#[derive(Parser, Debug)]
pub struct RetrieveArgs {
    /// Query text.
    pub query: String,

    /// Number of chunks to return.
    #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub k: usize,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// Context store commands never contact a model, so they run without
/// provider credentials.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Summarize(args) => {
            let (manager, generation) = pipeline(&config)?;
            run_summarize_command(&manager, &generation, args).await
        }
        Commands::Goals(args) => {
            let (manager, generation) = pipeline(&config)?;
            run_goals_command(&manager, &generation, args).await
        }
        Commands::Code(args) => {
            let (manager, generation) = pipeline(&config)?;
            run_code_command(manager, &generation, args).await
        }
        Commands::Explain(args) => {
            let (manager, generation) = pipeline(&config)?;
            run_explain_command(&manager, &generation, args).await
        }
        Commands::Ingest(args) => run_ingest_command(&open_store(&config)?, args).await,
        Commands::Retrieve(args) => run_retrieve_command(&open_store(&config)?, args).await,
    }
}

/// Builds the manager and the generation settings every model call uses.
fn pipeline(config: &VizConfig) -> anyhow::Result<(Manager, TextGenerationConfig)> {
    let manager = Manager::from_config(config).context("failed to build pipeline")?;
    let mut generation = TextGenerationConfig::default().with_provider(config.provider.clone());
    if let Some(model) = &config.model {
        generation = generation.with_model(model.clone());
    }
    Ok((manager, generation))
}

fn open_store(config: &VizConfig) -> anyhow::Result<ContextStore> {
    let embedder = embedder_from_config(config)?;
    ContextStore::from_config(config, embedder).with_context(|| {
        format!("failed to open context store at {}", config.store_dir.display())
    })
}

fn load_config(cli: &Cli) -> anyhow::Result<VizConfig> {
    let mut config = match &cli.config {
        Some(path) => VizConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => VizConfig::from_env().context("invalid VIZFORGE_* environment")?,
    };
    if let Some(provider) = &cli.provider {
        config.provider = provider.clone();
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Dataset Commands
// ============================================================================

async fn run_summarize_command(
    manager: &Manager,
    generation: &TextGenerationConfig,
    args: SummarizeArgs,
) -> anyhow::Result<()> {
    let method: SummaryMethod = args.method.parse()?;
    let mut session = load_session(&args.file)?;
    let summary = manager.summarize(&mut session, method, generation).await?;
    print_json(&summary)
}

async fn run_goals_command(
    manager: &Manager,
    generation: &TextGenerationConfig,
    args: GoalsArgs,
) -> anyhow::Result<()> {
    let method: SummaryMethod = args.method.parse()?;
    let persona = args.persona.as_deref().map(Persona::from);
    let mut session = load_session(&args.file)?;

    manager.summarize(&mut session, method, generation).await?;
    let goals = manager
        .goals(&mut session, None, args.n, persona.as_ref(), generation)
        .await?;
    print_json(&goals)
}

async fn run_code_command(
    manager: Manager,
    generation: &TextGenerationConfig,
    args: CodeArgs,
) -> anyhow::Result<()> {
    let library: ChartLibrary = args.library.parse()?;
    let manager = match args.execute_with {
        Some(command) => manager.with_executor(Arc::new(ProcessExecutor::new(command))),
        None => manager,
    };
    let mut session = load_session(&args.file)?;

    let summary = manager
        .summarize(&mut session, SummaryMethod::Default, generation)
        .await?;
    let goals = manager
        .goals(&mut session, None, args.goal_index + 1, None, generation)
        .await?;
    let goal = goals.get(args.goal_index).with_context(|| {
        format!(
            "goal index {} requested but only {} goals were generated",
            args.goal_index,
            goals.len()
        )
    })?;
    info!(question = %goal.question, library = %library, "Generating chart code");

    let charts = manager
        .visualize(&mut session, &summary, goal, library, generation)
        .await?;
    print_json(&charts)
}

async fn run_explain_command(
    manager: &Manager,
    generation: &TextGenerationConfig,
    args: ExplainArgs,
) -> anyhow::Result<()> {
    let library: ChartLibrary = args.library.parse()?;
    let code = std::fs::read_to_string(&args.code_file)
        .with_context(|| format!("failed to read {}", args.code_file.display()))?;
    let explanation = manager.explain(&code, library, generation).await?;
    print_json(&explanation)
}

fn load_session(path: &Path) -> anyhow::Result<Session> {
    Session::load(path).with_context(|| format!("failed to load dataset {}", path.display()))
}

// ============================================================================
// Context Store Commands
// ============================================================================

async fn run_ingest_command(store: &ContextStore, args: IngestArgs) -> anyhow::Result<()> {
    if let (Some(url), Some(text)) = (args.url, args.text) {
        let report = store.ingest(Source::web(url, text)).await?;
        store.persist().await?;
        return print_json(&report);
    }

    let path = args
        .path
        .context("either a path or --url with --text is required")?;
    if path.is_dir() {
        let reports = store.update_knowledge_base(&path).await?;
        store.persist().await?;
        return print_json(&reports);
    }

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let report = store.ingest(Source::document(id, text)).await?;
    store.persist().await?;
    print_json(&report)
}

async fn run_retrieve_command(store: &ContextStore, args: RetrieveArgs) -> anyhow::Result<()> {
    let results = store.retrieve(&args.query, args.k).await?;
    print_json(&results)
}
