use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use servicegraph::chat::Assistant;
use servicegraph::config::{Config, StoreKind};
use servicegraph::db::qdrant::QdrantStore;
use servicegraph::db::{Db, VectorStore};
use servicegraph::embedder::gemini::GeminiEmbedder;
use servicegraph::generator::gemini::GeminiGenerator;
use servicegraph::indexer::core::Indexer;
use servicegraph::indexer::layout::SourceLayout;
use servicegraph::retriever::Retriever;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const PREVIEW_CHARS: usize = 300;
const QUERY_RESULTS_SHOWN: usize = 10;

#[derive(Parser)]
#[command(name = "servicegraph", version, about = "Multi-hop code Q&A over a microservices tree")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index every service project under a root directory
    Index { root: PathBuf },

    /// Print the ranked chunks retrieved for a question
    Query {
        question: String,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long)]
        depth: Option<usize>,

        /// Only search chunks from this service initially
        #[arg(long)]
        service: Option<String>,
    },

    /// Ask questions interactively
    Chat {
        #[arg(long)]
        service: Option<String>,
    },
}

fn open_store(config: &Config) -> Result<Box<dyn VectorStore>> {
    let store: Box<dyn VectorStore> = match config.store {
        StoreKind::Qdrant => Box::new(
            QdrantStore::new(
                &config.qdrant_url,
                config.qdrant_api_key.clone(),
                &config.collection_name,
                config.vector_size,
                config.request_timeout(),
            )
            .context("failed to create Qdrant client")?,
        ),
        StoreKind::Sqlite => Box::new(
            Db::open(&config.db_path, &config.collection_name, config.vector_size)
                .context("failed to open database")?,
        ),
    };
    Ok(store)
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    let api_key = config.api_key()?;
    let embedder = GeminiEmbedder::new(
        &config.api_base,
        api_key.clone(),
        &config.embedding.model,
        config.vector_size,
        config.request_timeout(),
    )
    .context("failed to create embedder")?;
    let store = open_store(&config)?;

    match cli.command {
        Command::Index { root } => {
            let indexer = Indexer::new(&embedder, store.as_ref(), SourceLayout::from(&config.layout));
            let stats = indexer
                .index_root(&root)
                .with_context(|| format!("indexing {} failed", root.display()))?;

            let mut roles: Vec<_> = stats.chunks_by_role.iter().collect();
            roles.sort_by_key(|(role, _)| role.as_str());
            for (role, n) in roles {
                info!("  {role}: {n} chunks");
            }
            println!(
                "Indexed {} files from {} projects into {} chunks ({} skipped)",
                stats.files_indexed, stats.projects, stats.chunks_written, stats.files_skipped
            );
        }

        Command::Query {
            question,
            top_k,
            depth,
            service,
        } => {
            let retriever = Retriever::new(&embedder, store.as_ref())
                .with_related_limit(config.retrieval.related_limit)
                .with_score_decay(config.retrieval.score_decay);
            let ranked = retriever.query(
                &question,
                top_k.unwrap_or(config.retrieval.search_top_k),
                depth.unwrap_or(config.retrieval.max_depth),
                service.as_deref(),
            )?;

            for (i, chunk) in ranked.iter().take(QUERY_RESULTS_SHOWN).enumerate() {
                println!("[{}] Score: {:.4}", i + 1, chunk.score);
                println!(
                    "Type: {} | File: {} | Service: {}",
                    chunk.role, chunk.file_path, chunk.service_name
                );
                println!("{}\n", preview(&chunk.content));
            }
        }

        Command::Chat { service } => {
            let generator = GeminiGenerator::new(
                &config.api_base,
                api_key,
                &config.generation.model,
                config.request_timeout(),
            )
            .context("failed to create generator")?;

            let mut assistant =
                Assistant::from_config(&embedder, store.as_ref(), &generator, &config)
                    .with_service(service);
            assistant.run(io::stdin().lock(), io::stdout().lock())?;
        }
    }

    Ok(())
}
