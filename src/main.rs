use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::io::{self, BufReader, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ragbot_cli::{
    AppConfig, ChatSession, ConversationalAgent, LineSource, TerminalInput, display_banner,
};
use ragbot_core::LanguageModelClient;
use ragbot_groq::{GroqClient, GroqConfig};
use ragbot_rag::{
    DirectoryLoader, IndexOrigin, PersistentVectorStore, VectorIndex, build_embedder,
};

#[derive(Parser)]
#[command(name = "ragbot")]
#[command(about = "Chat with a language model grounded in your local documents", long_about = None)]
struct Cli {
    /// Directory holding the documents to index
    #[arg(short, long)]
    documents: Option<PathBuf>,

    /// Directory where the vector index is persisted
    #[arg(short, long)]
    storage: Option<PathBuf>,

    /// Collection name inside the storage directory
    #[arg(long)]
    collection: Option<String>,

    /// Number of chunks retrieved per question
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Groq model to answer with
    #[arg(short, long)]
    model: Option<String>,

    /// Answer one question and exit
    #[arg(short, long)]
    query: Option<String>,

    /// Discard the persisted index and build it again
    #[arg(long)]
    rebuild: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // The credential is checked before any other work.
    let mut groq_config = GroqConfig::from_env().context("Groq configuration")?;
    if let Some(model) = cli.model {
        groq_config.model = model;
    }

    let mut config = AppConfig::from_env().context("RAGbot configuration")?;
    if let Some(documents) = cli.documents {
        config.documents_dir = documents;
    }
    if let Some(storage) = cli.storage {
        config.storage_dir = storage;
    }
    if let Some(collection) = cli.collection {
        config.collection = collection;
    }
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }
    config.validate()?;

    let embedder = build_embedder(&config.embedding).context("embedding provider")?;
    let (model_name, dimensions) = (embedder.model_name(), embedder.dimensions());
    let store = if cli.rebuild {
        info!(collection = %config.collection, "rebuilding index");
        PersistentVectorStore::open_fresh(&config.storage_dir, &config.collection, model_name, dimensions)
    } else {
        PersistentVectorStore::open(&config.storage_dir, &config.collection, model_name, dimensions)
    }
    .with_context(|| format!("opening vector store in {}", config.storage_dir.display()))?;

    let loader = DirectoryLoader::new(&config.documents_dir);
    let index = VectorIndex::initialize(Arc::new(store), embedder, &loader, &config.indexing)
        .await
        .context("initializing the vector index")?;

    match index.origin() {
        IndexOrigin::Loaded => println!(
            "{} Loaded existing index ({} chunks)",
            "✓".green(),
            index.len()
        ),
        IndexOrigin::Built => println!(
            "{} Indexed documents from {} ({} chunks)",
            "✓".green(),
            config.documents_dir.display(),
            index.len()
        ),
    }

    let mut client = GroqClient::new(groq_config).context("Groq client")?;
    match client.connect().await {
        Ok(()) => info!(model = client.model_id(), "connected to Groq"),
        Err(e) if e.is_fatal() => return Err(e).context("Groq rejected the API key"),
        Err(e) => warn!(error = %e, "could not verify Groq connection, continuing"),
    }
    let model_id = client.model_id().to_string();

    let engine = index.as_query_engine(config.search_config());
    let session = ChatSession::new(engine, ConversationalAgent::new(client));

    if let Some(question) = cli.query {
        let reply = session.process_turn(&question).await?;
        println!("{} {}", "RAGbot:".green().bold(), reply);
        return Ok(());
    }

    let mut stdout = io::stdout();
    let summary = if io::stdin().is_terminal() {
        display_banner(
            &model_id,
            &config.documents_dir.display().to_string(),
            index.len(),
        );
        session.run(&mut TerminalInput::new(), &mut stdout).await?
    } else {
        let mut input = LineSource::new(BufReader::new(io::stdin()));
        session.run(&mut input, &mut stdout).await?
    };

    info!(turns = summary.turns, failures = summary.failures, "bye");
    Ok(())
}
