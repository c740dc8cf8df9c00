//! docqa quickstart: ingest a few documents and ask questions about them.
//!
//! Runs entirely offline with the mock embedding provider and model.
//! Set `RUST_LOG=docqa_rag=debug` to watch the pipeline work.

use std::sync::Arc;

use docqa_rag::{
    AnswerEvent, Document, InMemoryVectorStore, MockEmbeddingProvider, MockGenerativeModel,
    RagConfig, RagPipeline,
};
use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HANDBOOK: &str = "\
Vacation policy. Full-time employees receive 25 vacation days per calendar year. \
Unused vacation days carry over until the end of March of the following year.

Remote work. Employees may work remotely up to three days per week after \
agreeing a schedule with their manager.

Expenses. Travel expenses must be submitted within 30 days with receipts attached.";

const OFFICES: &str = "\
city,country,employees
Lisbon,Portugal,120
Kyoto,Japan,45
Toronto,Canada,80
";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docqa_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== docqa quickstart ===\n");

    let config = RagConfig::builder()
        .chunk_size(200)
        .chunk_overlap(40)
        .top_k(3)
        .embedding_model("mock-embedding")
        .generation_model("mock-model")
        .build()?;

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(256)))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .generative_model(Arc::new(MockGenerativeModel::new()))
        .build()?;
    pipeline.initialize().await?;
    println!("✓ pipeline initialized");

    let documents = vec![
        Document::from_text("handbook", "handbook.txt", HANDBOOK),
        Document::new("offices", "offices.csv", "text/csv", OFFICES.as_bytes().to_vec()),
    ];
    for summary in pipeline.ingest_batch(&documents).await? {
        println!("✓ ingested {} ({} chunks)", summary.document_id, summary.chunks_created);
    }

    let info = pipeline.collection_info().await?;
    println!("✓ collection '{}' holds {} records\n", info.name, info.record_count);

    let question = "How many vacation days do employees get?";
    let retrieved = pipeline.retrieve(question, 2).await?;
    println!("Q: {question}");
    for chunk in retrieved.iter() {
        println!("  [{:.3}] {} (chunk {})", chunk.score, chunk.filename, chunk.chunk_index);
    }

    let answer = pipeline.answer_text(question, &retrieved, true).await?;
    println!("A: {}", answer.text);
    let sources: Vec<&str> = answer.sources.iter().map(|s| s.filename.as_str()).collect();
    println!("   sources: {}\n", sources.join(", "));

    let question = "Which office is in Japan?";
    let retrieved = pipeline.query(question).await?;
    println!("Q: {question}");
    print!("A: ");
    let mut stream = pipeline.answer_stream(question, &retrieved, true).await?;
    while let Some(event) = stream.next().await {
        match event? {
            AnswerEvent::Delta(text) => print!("{text}"),
            AnswerEvent::Done { sources, metadata } => {
                println!("\n   model: {}, sources: {}", metadata.model, sources.len());
            }
        }
    }

    pipeline.delete_collection().await?;
    println!("\n✓ collection cleared");
    Ok(())
}
