use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use satwire_common::Config;
use satwire_ingest::sources::builtin_sources;
use satwire_ingest::translator::OpenAiTranslator;
use satwire_ingest::{FetchEngine, RunState};
use satwire_store::FeedStore;

use satwire_ingest::traits::{ProgressSink, Translator};

#[derive(Parser)]
#[command(name = "satwire-ingest", about = "Bitcoin news ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and process all sources, or one source.
    Run {
        /// Registry key of a single source to run.
        #[arg(long)]
        source: Option<String>,
    },
    /// List registered sources.
    Sources,
    /// Show the last run outcome recorded per source.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("satwire=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Sources => {
            for name in builtin_sources().iter().map(|s| s.name().to_string()) {
                println!("{name}");
            }
            Ok(())
        }
        Command::Run { source } => run(source).await,
        Command::Status => status().await,
    }
}

async fn status() -> Result<()> {
    let config = Config::from_env();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = FeedStore::new(pool);

    for connector in builtin_sources() {
        let name = connector.name().to_string();
        match store.source_status(&name).await? {
            Some(status) => {
                let last_success = status
                    .last_success_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                let last_error = match (&status.last_error_at, &status.last_error_message) {
                    (Some(at), Some(msg)) => format!("{} ({msg})", at.to_rfc3339()),
                    (Some(at), None) => at.to_rfc3339(),
                    _ => "never".to_string(),
                };
                println!("{name}: last success {last_success}, last error {last_error}");
            }
            None => println!("{name}: no runs recorded"),
        }
    }
    Ok(())
}

async fn run(source: Option<String>) -> Result<()> {
    info!("satwire ingest starting...");

    let config = Config::from_env();

    let translator = OpenAiTranslator::new(config.openai_api_key.clone());
    if config.translation_required && !translator.is_available() {
        bail!("TRANSLATION_REQUIRED is set but OPENAI_API_KEY is missing");
    }
    let translator: Option<Arc<dyn Translator>> = if translator.is_available() {
        Some(Arc::new(translator))
    } else {
        info!("No OpenAI API key configured, translation disabled");
        None
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(FeedStore::new(pool));

    let state = RunState::new();
    let engine = FetchEngine::new(
        store,
        translator,
        builtin_sources(),
        config.fetch_window_hours,
        config.translation_required,
    )
    .with_progress(Arc::new(state.clone()) as Arc<dyn ProgressSink>);

    state.begin_run();
    let summary = match source {
        Some(name) => engine.run_source(&name).await?,
        None => engine.run_all().await,
    };
    state.finish_run(None);

    info!("{summary}");

    if !summary.success {
        bail!("one or more sources failed");
    }
    Ok(())
}
