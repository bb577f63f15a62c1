//! Integration tests against a live provider.
//!
//! These tests make real API calls.
//! Run with: OPENAI_API_KEY=your_key cargo test --test llm_integration -- --ignored

use std::sync::Arc;

use vizforge::agents::SummaryMethod;
use vizforge::datamodel::TextGenerationConfig;
use vizforge::llm::{
    EnvProviderFactory, GenerationRequest, LlmProvider, Message, ProviderFactory, ProviderKind,
};
use vizforge::retrieval::{
    embedder_from_config, ContextStore, DistanceMetric, HashEmbedder, Source, TextChunker,
};
use vizforge::scaffold::ChartLibrary;
use vizforge::{Manager, Session, VizConfig};

fn provider() -> Arc<dyn LlmProvider> {
    EnvProviderFactory::new()
        .create(ProviderKind::OpenAi, None)
        .expect("OPENAI_API_KEY environment variable must be set for integration tests")
}

#[tokio::test]
#[ignore] // Run with: cargo test --test llm_integration -- --ignored
async fn test_simple_generation() {
    let request = GenerationRequest::new(
        "",
        vec![
            Message::system("You are a helpful assistant. Reply concisely."),
            Message::user("What is 2 + 2? Reply with just the number."),
        ],
    )
    .with_max_tokens(10)
    .with_temperature(0.0);

    let response = provider().generate(request).await;
    assert!(response.is_ok(), "Generation failed: {:?}", response.err());

    let content = response
        .expect("Should have response")
        .first_content()
        .expect("Should have content");
    assert!(content.contains('4'), "Response should contain '4', got: {}", content);
}

#[tokio::test]
#[ignore]
async fn test_goals_and_code_for_small_dataset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("sales.csv");
    std::fs::write(&path, "Category,Sales\nA,10\nB,20\nA,30\nB,25\nA,15\n").expect("write csv");

    let store = Arc::new(ContextStore::new(
        Arc::new(HashEmbedder::default()),
        TextChunker::default(),
        DistanceMetric::Cosine,
    ));
    let manager = Manager::new(provider(), store);
    let config = TextGenerationConfig::default().with_temperature(0.0);
    let mut session = Session::load(&path).expect("load dataset");

    let summary = manager
        .summarize(&mut session, SummaryMethod::Llm, &config)
        .await
        .expect("summary");
    let goals = manager
        .goals(&mut session, None, 2, None, &config)
        .await
        .expect("goals");
    assert!(!goals.is_empty() && goals.len() <= 2);

    let charts = manager
        .visualize(&mut session, &summary, &goals[0], ChartLibrary::Matplotlib, &config)
        .await
        .expect("charts");
    assert!(charts.iter().any(|c| c.is_success()), "{:?}", charts);
}

#[tokio::test]
#[ignore]
async fn test_remote_embedder_retrieves_ingested_document() {
    let config = VizConfig::default().with_embedding_model("text-embedding-3-small", 1536);
    let embedder = embedder_from_config(&config).expect("remote embedder");
    let store = ContextStore::new(embedder, TextChunker::default(), DistanceMetric::Cosine);

    store
        .ingest(Source::document("north.txt", "Sales in the north region doubled in December."))
        .await
        .expect("ingest");
    store
        .ingest(Source::document("clinic.txt", "Patients reported lower blood pressure."))
        .await
        .expect("ingest");

    let hits = store.retrieve("winter revenue in the north", 1).await.expect("retrieve");
    assert_eq!(hits[0].chunk.doc_id, "doc_north.txt_0");
}
