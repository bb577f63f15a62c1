//! Pipeline orchestrator.
//!
//! The [`Manager`] composes the stage executors, the chart executor and the
//! context store. Per-dataset state lives in a caller-owned [`Session`]; the
//! only state the manager itself mutates is its provider binding, which is
//! serialized behind a mutex.
//!
//! ```ignore
//! use vizforge::manager::{Manager, Session};
//! use vizforge::agents::SummaryMethod;
//! use vizforge::scaffold::ChartLibrary;
//!
//! let manager = Manager::from_config(&VizConfig::from_env()?)?;
//! let mut session = Session::load("cars.csv")?;
//! let config = TextGenerationConfig::default();
//!
//! let summary = manager.summarize(&mut session, SummaryMethod::Llm, &config).await?;
//! let goals = manager.goals(&mut session, Some(&summary), 3, None, &config).await?;
//! let charts = manager
//!     .visualize(&mut session, &summary, &goals[0], ChartLibrary::Seaborn, &config)
//!     .await?;
//! ```

mod session;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::agents::{
    ChartAnalyzer, GoalExplorer, PersonaExplorer, Summarizer, SummaryMethod, VizEditor,
    VizEvaluator, VizExplainer, VizGenerator, VizRecommender,
};
use crate::config::VizConfig;
use crate::data::DataFrame;
use crate::datamodel::{
    ChartExecutorResponse, Evaluation, Explanation, Goal, Persona, Summary, TextGenerationConfig,
};
use crate::error::{VizError, VizResult};
use crate::executor::{ChartExecutor, DryRunExecutor};
use crate::llm::{
    CacheConfig, EnvProviderFactory, LlmProvider, ProviderFactory, ProviderKind, ResponseCache,
    SharedResponseCache, TextGenerator,
};
use crate::prompts::Stage;
use crate::retrieval::{
    embedder_from_config, ContextStore, IngestReport, RetrievedChunk, Source,
};
use crate::scaffold::ChartLibrary;

pub use session::{Session, SessionState};

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Retries after a retryable stage failure. 0 disables retrying.
    pub max_generation_retries: u32,
    /// Samples kept per column by the summarizer.
    pub n_samples: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_generation_retries: 0,
            n_samples: 3,
        }
    }
}

impl From<&VizConfig> for ManagerConfig {
    fn from(config: &VizConfig) -> Self {
        Self {
            max_generation_retries: config.max_generation_retries,
            n_samples: config.n_samples,
        }
    }
}

/// Sequences the pipeline stages for any number of sessions.
pub struct Manager {
    binding: Mutex<TextGenerator>,
    factory: Arc<dyn ProviderFactory>,
    cache: SharedResponseCache,
    executor: Arc<dyn ChartExecutor>,
    store: Arc<ContextStore>,
    config: ManagerConfig,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("executor", &self.executor.name())
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Manager {
    /// A manager bound to `provider`, with the dry-run executor, an
    /// environment provider factory and a default response cache.
    pub fn new(provider: Arc<dyn LlmProvider>, store: Arc<ContextStore>) -> Self {
        let cache: SharedResponseCache = Arc::new(ResponseCache::default());
        Self {
            binding: Mutex::new(TextGenerator::new(provider, cache.clone())),
            factory: Arc::new(EnvProviderFactory::new()),
            cache,
            executor: Arc::new(DryRunExecutor),
            store,
            config: ManagerConfig::default(),
        }
    }

    /// Builds a manager from runtime configuration: provider from the
    /// environment, hash embedder, and the context store in `store_dir`.
    pub fn from_config(config: &VizConfig) -> VizResult<Self> {
        let kind: ProviderKind = config.provider.parse()?;
        let factory = Arc::new(EnvProviderFactory::new());
        let provider = factory.create(kind, config.model.as_deref())?;
        let store = ContextStore::from_config(config, embedder_from_config(config)?)?;
        let cache = Arc::new(ResponseCache::with_config(
            CacheConfig::new(config.cache_capacity).with_ttl(config.cache_ttl()),
        ));

        Ok(Self::new(provider, Arc::new(store))
            .with_factory(factory)
            .with_cache(cache)
            .with_config(ManagerConfig::from(config)))
    }

    pub fn with_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn ChartExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replaces the response cache, rebinding the current provider to it.
    pub fn with_cache(mut self, cache: SharedResponseCache) -> Self {
        let generator = self.binding.get_mut();
        let provider = generator.provider();
        *generator = TextGenerator::new(provider, cache.clone());
        self.cache = cache;
        self
    }

    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &Arc<ContextStore> {
        &self.store
    }

    pub fn cache(&self) -> &SharedResponseCache {
        &self.cache
    }

    /// Name of the currently bound provider.
    pub async fn provider_name(&self) -> String {
        self.binding.lock().await.provider_name().to_string()
    }

    /// Resolves the generator for `config`, rebinding when it names a
    /// different provider.
    ///
    /// A config without a provider adopts the bound one. The returned config
    /// always names the provider actually used.
    pub async fn check_provider(
        &self,
        config: &TextGenerationConfig,
    ) -> VizResult<(TextGenerator, TextGenerationConfig)> {
        let mut binding = self.binding.lock().await;
        let bound = binding.provider_name().to_string();
        let mut resolved = config.clone();

        match config.provider.as_deref().map(str::trim) {
            None | Some("") => resolved.provider = Some(bound),
            Some(requested) if requested.eq_ignore_ascii_case(&bound) => {}
            Some(requested) => {
                let kind: ProviderKind = requested.parse()?;
                if kind.name() != bound {
                    let provider = self.factory.create(kind, config.model.as_deref())?;
                    *binding = TextGenerator::new(provider, self.cache.clone());
                    info!(from = %bound, to = %kind, "Rebound model provider");
                }
                resolved.provider = Some(kind.name().to_string());
            }
        }

        Ok((binding.clone(), resolved))
    }

    /// Runs `op`, retrying retryable failures up to the configured limit.
    ///
    /// Retries bypass the response cache so they reach the provider.
    async fn with_retries<T, F, Fut>(
        &self,
        stage: Stage,
        config: &TextGenerationConfig,
        mut op: F,
    ) -> VizResult<T>
    where
        F: FnMut(TextGenerationConfig) -> Fut,
        Fut: Future<Output = VizResult<T>>,
    {
        let max = self.config.max_generation_retries;
        let mut attempt = 0;
        loop {
            let attempt_config = if attempt == 0 {
                config.clone()
            } else {
                config.clone().with_cache(false)
            };
            match op(attempt_config).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max => {
                    attempt += 1;
                    warn!(stage = %stage, attempt, max, error = %err, "Retrying stage");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Summarizes the session's dataset and records the summary.
    pub async fn summarize(
        &self,
        session: &mut Session,
        method: SummaryMethod,
        config: &TextGenerationConfig,
    ) -> VizResult<Summary> {
        let data = require_data(session)?;
        let file_name = session.file_name().to_string();
        let (generator, config) = self.check_provider(config).await?;
        let summarizer = &Summarizer::new(self.config.n_samples);

        let generator = &generator;
        let data = data.as_ref();
        let file_name = file_name.as_str();
        let summary = self
            .with_retries(Stage::Summarize, &config, |config| async move {
                summarizer
                    .summarize(generator, data, file_name, method, &config)
                    .await
            })
            .await?;

        session.record_summary(summary.clone());
        Ok(summary)
    }

    /// Generates at most `n` goals and records them on the session.
    ///
    /// When `summary` is `None` the session's last summary is used.
    pub async fn goals(
        &self,
        session: &mut Session,
        summary: Option<&Summary>,
        n: usize,
        persona: Option<&Persona>,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<Goal>> {
        let summary = resolve_summary(session, summary)?;
        let (generator, config) = self.check_provider(config).await?;

        let generator = &generator;
        let summary_ref = &summary;
        let goals = self
            .with_retries(Stage::Goals, &config, |config| async move {
                GoalExplorer
                    .generate(generator, summary_ref, n, persona, &config)
                    .await
            })
            .await?;

        session.record_goals(goals.clone());
        Ok(goals)
    }

    /// Generates at most `n` personas for `summary`.
    pub async fn personas(
        &self,
        summary: &Summary,
        n: usize,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<Persona>> {
        let (generator, config) = self.check_provider(config).await?;
        let generator = &generator;
        self.with_retries(Stage::Personas, &config, |config| async move {
            PersonaExplorer.generate(generator, summary, n, &config).await
        })
        .await
    }

    /// Generates code for `goal` and runs it through the chart executor.
    pub async fn visualize(
        &self,
        session: &mut Session,
        summary: &Summary,
        goal: &Goal,
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<ChartExecutorResponse>> {
        let data = require_data(session)?;
        let (generator, config) = self.check_provider(config).await?;
        let charts = self
            .visualize_goal(&generator, &data, summary, goal, library, &config)
            .await?;
        session.record_visualized();
        Ok(charts)
    }

    /// Runs one independent visualize pipeline per goal, concurrently.
    ///
    /// Results are in goal order; a failed goal does not affect the others.
    pub async fn visualize_many(
        &self,
        session: &mut Session,
        summary: &Summary,
        goals: &[Goal],
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<VizResult<Vec<ChartExecutorResponse>>>> {
        let data = require_data(session)?;
        let (generator, config) = self.check_provider(config).await?;

        let results = join_all(goals.iter().map(|goal| {
            self.visualize_goal(&generator, &data, summary, goal, library, &config)
        }))
        .await;

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        if succeeded > 0 {
            session.record_visualized();
        }
        info!(goals = goals.len(), succeeded, library = %library, "Visualized goals");
        Ok(results)
    }

    async fn visualize_goal(
        &self,
        generator: &TextGenerator,
        data: &DataFrame,
        summary: &Summary,
        goal: &Goal,
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<ChartExecutorResponse>> {
        let code = self
            .with_retries(Stage::Visualize, config, |config| async move {
                VizGenerator
                    .generate(generator, summary, goal, library, &config)
                    .await
            })
            .await?;
        Ok(self.executor.execute(&code, data, summary, library).await)
    }

    /// Runs existing code through the chart executor.
    pub async fn execute(
        &self,
        session: &Session,
        code: &[String],
        summary: &Summary,
        library: ChartLibrary,
    ) -> VizResult<Vec<ChartExecutorResponse>> {
        let data = require_data(session)?;
        Ok(self.executor.execute(code, &data, summary, library).await)
    }

    /// Edits `code` following `instructions`, then executes the result.
    pub async fn edit(
        &self,
        session: &Session,
        code: &str,
        summary: &Summary,
        instructions: &[String],
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<ChartExecutorResponse>> {
        let data = require_data(session)?;
        let (generator, config) = self.check_provider(config).await?;
        let generator = &generator;
        let edited = self
            .with_retries(Stage::Edit, &config, |config| async move {
                VizEditor
                    .edit(generator, code, summary, instructions, library, &config)
                    .await
            })
            .await?;
        Ok(self.executor.execute(&edited, &data, summary, library).await)
    }

    /// Recommends at most `n` alternatives to `code`, then executes them.
    pub async fn recommend(
        &self,
        session: &Session,
        code: &str,
        summary: &Summary,
        n: usize,
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Vec<ChartExecutorResponse>> {
        let data = require_data(session)?;
        let (generator, config) = self.check_provider(config).await?;
        let generator = &generator;
        let programs = self
            .with_retries(Stage::Recommend, &config, |config| async move {
                VizRecommender
                    .recommend(generator, code, summary, n, library, &config)
                    .await
            })
            .await?;
        Ok(self.executor.execute(&programs, &data, summary, library).await)
    }

    /// Explains `code` in three sections.
    pub async fn explain(
        &self,
        code: &str,
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Explanation> {
        let (generator, config) = self.check_provider(config).await?;
        let generator = &generator;
        self.with_retries(Stage::Explain, &config, |config| async move {
            VizExplainer.explain(generator, code, library, &config).await
        })
        .await
    }

    /// Scores `code` and its rendered `image` against `goal`.
    pub async fn evaluate(
        &self,
        code: &str,
        goal: &Goal,
        image: &str,
        library: ChartLibrary,
        config: &TextGenerationConfig,
    ) -> VizResult<Evaluation> {
        let (generator, config) = self.check_provider(config).await?;
        let generator = &generator;
        self.with_retries(Stage::Evaluate, &config, |config| async move {
            VizEvaluator
                .evaluate(generator, code, goal, image, library, &config)
                .await
        })
        .await
    }

    /// Ingests `source` into the context store, persisting when the store
    /// has a directory.
    pub async fn ingest(&self, source: Source) -> VizResult<IngestReport> {
        let report = self.store.ingest(source).await?;
        if self.store.dir().is_some() && !report.doc_ids.is_empty() {
            self.store.persist().await?;
        }
        Ok(report)
    }

    /// The `k` stored chunks nearest to `query`.
    pub async fn retrieve(&self, query: &str, k: usize) -> VizResult<Vec<RetrievedChunk>> {
        self.store.retrieve(query, k).await
    }

    /// Ingests every `.txt`/`.md` file under `dir`.
    pub async fn update_knowledge_base(&self, dir: impl AsRef<Path>) -> VizResult<Vec<IngestReport>> {
        let reports = self.store.update_knowledge_base(dir).await?;
        if self.store.dir().is_some() && !reports.is_empty() {
            self.store.persist().await?;
        }
        Ok(reports)
    }

    /// Analyzes a rendered chart with retrieved context.
    ///
    /// The summary (the given one, else the session's last) and the
    /// session's cleaned dataset description are ingested first so they can
    /// be retrieved alongside other sources.
    pub async fn analyze(
        &self,
        session: &Session,
        chart: &ChartExecutorResponse,
        query: &str,
        k: usize,
        summary: Option<&Summary>,
        config: &TextGenerationConfig,
    ) -> VizResult<String> {
        ChartAnalyzer::chart_image(chart)?;
        if let Some(summary) = summary.or(session.summary()) {
            self.ingest(Source::summary(summary)).await?;
        }
        if let Some(data) = session.data() {
            self.ingest(Source::dataframe(data)).await?;
        }

        let (generator, config) = self.check_provider(config).await?;
        let generator = &generator;
        let store = self.store.as_ref();
        self.with_retries(Stage::Analyze, &config, |config| async move {
            ChartAnalyzer
                .analyze(generator, store, chart, query, k, &config)
                .await
        })
        .await
    }
}

fn require_data(session: &Session) -> VizResult<Arc<DataFrame>> {
    session
        .data()
        .cloned()
        .ok_or_else(|| VizError::InvalidInput("session has no dataset loaded".to_string()))
}

fn resolve_summary(session: &Session, summary: Option<&Summary>) -> VizResult<Summary> {
    summary
        .or(session.summary())
        .cloned()
        .ok_or_else(|| {
            VizError::InvalidInput("no summary given and the session has not been summarized".to_string())
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::agents::fixtures::PNG_BASE64;
    use crate::llm::ScriptedProvider;
    use crate::retrieval::{DistanceMetric, HashEmbedder, TextChunker};
    use serde_json::json;

    /// Factory handing out scripted providers named after the kind.
    #[derive(Default)]
    struct ScriptedFactory {
        created: StdMutex<Vec<ProviderKind>>,
    }

    impl ProviderFactory for ScriptedFactory {
        fn create(
            &self,
            kind: ProviderKind,
            _model: Option<&str>,
        ) -> Result<Arc<dyn LlmProvider>, VizError> {
            self.created.lock().expect("created lock poisoned").push(kind);
            Ok(Arc::new(ScriptedProvider::single(kind.name(), "[]")))
        }
    }

    fn store() -> Arc<ContextStore> {
        Arc::new(ContextStore::new(
            Arc::new(HashEmbedder::new(64)),
            TextChunker::default(),
            DistanceMetric::Cosine,
        ))
    }

    fn session() -> Session {
        let data = DataFrame::new(
            "sales",
            vec!["Category".to_string(), "Sales".to_string()],
            vec![
                vec![json!("A"), json!(10)],
                vec![json!("B"), json!(20)],
                vec![json!("A"), json!(30)],
                vec![json!("A"), json!(15)],
                vec![json!("B"), json!(25)],
            ],
        )
        .unwrap();
        Session::with_data(data, "sales.csv")
    }

    const GOAL_REPLY: &str = r#"[{"question": "Sales per Category?", "visualization": "bar chart of Sales by Category", "rationale": "r"}]"#;
    const CODE_REPLY: &str = "```python\nimport seaborn as sns\ndef plot(data):\n    sns.barplot(data=data, x='Category', y='Sales')\n    return plt\n\nchart = plot(data)\n```";

    #[tokio::test]
    async fn test_provider_adopted_then_rebound() {
        let factory = Arc::new(ScriptedFactory::default());
        let manager = Manager::new(Arc::new(ScriptedProvider::single("openai", "[]")), store())
            .with_factory(factory.clone());

        let (_, resolved) = manager
            .check_provider(&TextGenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(resolved.provider.as_deref(), Some("openai"));

        let (generator, resolved) = manager
            .check_provider(&TextGenerationConfig::default().with_provider("openrouter"))
            .await
            .unwrap();
        assert_eq!(generator.provider_name(), "openrouter");
        assert_eq!(resolved.provider.as_deref(), Some("openrouter"));
        assert_eq!(manager.provider_name().await, "openrouter");

        manager
            .check_provider(&TextGenerationConfig::default().with_provider("OpenRouter"))
            .await
            .unwrap();
        assert_eq!(factory.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_configuration_error() {
        let manager = Manager::new(Arc::new(ScriptedProvider::single("openai", "[]")), store());
        let err = manager
            .check_provider(&TextGenerationConfig::default().with_provider("carrier-pigeon"))
            .await
            .unwrap_err();
        assert!(matches!(err, VizError::Configuration(_)));
        assert_eq!(manager.provider_name().await, "openai");
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let provider = ScriptedProvider::new("mock", vec![vec![GOAL_REPLY], vec![CODE_REPLY]]);
        let manager = Manager::new(Arc::new(provider), store());
        let mut session = session();
        let config = TextGenerationConfig::default();

        let summary = manager
            .summarize(&mut session, SummaryMethod::Default, &config)
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Summarized);

        let goals = manager.goals(&mut session, None, 2, None, &config).await.unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(session.state(), SessionState::GoalsReady);

        let charts = manager
            .visualize(&mut session, &summary, &goals[0], ChartLibrary::Seaborn, &config)
            .await
            .unwrap();
        assert_eq!(charts.len(), 1);
        assert!(charts[0].is_success());
        assert_eq!(session.state(), SessionState::Visualized);
    }

    #[tokio::test]
    async fn test_goals_without_summary_is_invalid() {
        let manager = Manager::new(Arc::new(ScriptedProvider::single("mock", GOAL_REPLY)), store());
        let err = manager
            .goals(&mut session(), None, 3, None, &TextGenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VizError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_generation_failure_short_circuits_execution() {
        let provider = Arc::new(ScriptedProvider::single("mock", "not code"));
        let manager = Manager::new(provider.clone(), store());
        let mut session = session();
        let summary = Summarizer::default().base_summary(session.data().unwrap(), "sales.csv");

        let err = manager
            .visualize(
                &mut session,
                &summary,
                &Goal::from_question("Sales"),
                ChartLibrary::Seaborn,
                &TextGenerationConfig::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VizError::Generation { .. }));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_bypass_cache() {
        let provider = Arc::new(ScriptedProvider::new(
            "mock",
            vec![vec!["not json"], vec![GOAL_REPLY]],
        ));
        let manager = Manager::new(provider.clone(), store()).with_config(ManagerConfig {
            max_generation_retries: 2,
            n_samples: 3,
        });
        let mut session = session();
        let summary = Summarizer::default().base_summary(session.data().unwrap(), "sales.csv");

        let goals = manager
            .goals(&mut session, Some(&summary), 1, None, &TextGenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_caller_retry_after_parse_failure_reaches_provider() {
        let provider = Arc::new(ScriptedProvider::new(
            "mock",
            vec![vec!["not json"], vec![GOAL_REPLY]],
        ));
        let manager = Manager::new(provider.clone(), store());
        let mut session = session();
        let summary = Summarizer::default().base_summary(session.data().unwrap(), "sales.csv");
        let config = TextGenerationConfig::default();
        assert!(config.use_cache);

        let first = manager.goals(&mut session, Some(&summary), 1, None, &config).await;
        assert!(matches!(first, Err(VizError::Generation { .. })));
        assert!(manager.cache().is_empty());

        let goals = manager
            .goals(&mut session, Some(&summary), 1, None, &config)
            .await
            .unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(provider.calls(), 2);
        assert_eq!(manager.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_visualize_many_is_per_goal() {
        let provider = Arc::new(ScriptedProvider::single("mock", CODE_REPLY));
        let manager = Manager::new(provider.clone(), store());
        let mut session = session();
        let summary = Summarizer::default().base_summary(session.data().unwrap(), "sales.csv");
        let goals = vec![
            Goal::from_question("Sales by Category"),
            Goal::from_question("Sales distribution"),
        ];

        let results = manager
            .visualize_many(
                &mut session,
                &summary,
                &goals,
                ChartLibrary::Seaborn,
                &TextGenerationConfig::default().with_cache(false),
            )
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_analyze_ingests_summary_and_dataset() {
        let provider = Arc::new(ScriptedProvider::single("mock", "Conclusion: A leads."));
        let manager = Manager::new(provider.clone(), store());
        let mut session = session();
        let summary = manager
            .summarize(&mut session, SummaryMethod::Default, &TextGenerationConfig::default())
            .await
            .unwrap();

        let chart = ChartExecutorResponse::success(CODE_REPLY, Some(PNG_BASE64.to_string()), "seaborn");
        let analysis = manager
            .analyze(&session, &chart, "Which category leads?", 3, None, &TextGenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(analysis, "Conclusion: A leads.");
        assert_eq!(manager.store().len().await, 2);
        assert!(manager.store().get(&format!("summary_{}", summary.name)).await.is_some());

        let prompt = provider.last_request().unwrap().messages[1].text();
        assert!(prompt.contains("Dataset: sales"));
    }

    #[tokio::test]
    async fn test_analyze_rejects_failed_chart_before_ingesting() {
        let provider = Arc::new(ScriptedProvider::single("mock", "unused"));
        let manager = Manager::new(provider.clone(), store());
        let mut session = session();
        manager
            .summarize(&mut session, SummaryMethod::Default, &TextGenerationConfig::default())
            .await
            .unwrap();

        let failed = ChartExecutorResponse::failure(CODE_REPLY, "NameError: plt", "seaborn");
        let err = manager
            .analyze(&session, &failed, "q", 3, None, &TextGenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VizError::Execution { .. }));

        let blank = ChartExecutorResponse::success(CODE_REPLY, None, "seaborn");
        let err = manager
            .analyze(&session, &blank, "q", 3, None, &TextGenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VizError::InvalidInput(_)));

        assert!(manager.store().is_empty().await);
        assert_eq!(provider.calls(), 0);
    }
}
