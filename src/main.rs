//! policyrag - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use policyrag::cli::{Args, Commands, Verbosity};
use policyrag::config::Config;
use policyrag::types::QueryResultSet;
use policyrag::{CancelHandle, ClientError, GenerationClient, RetrievalClient, SummaryObserver};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity();
    init_tracing(verbosity);

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    tracing::debug!(
        retrieval = %config.retrieval.base_url,
        generation = %config.generation.base_url,
        model = %config.generation.model,
        "configuration loaded"
    );

    let retrieval = RetrievalClient::from_config(&config)?;

    let outcome = match &args.command {
        Commands::Status => {
            let generation = GenerationClient::from_config(&config)?;
            show_status(&retrieval, &generation).await;
            Ok(())
        }
        Commands::Docs => {
            show_documents(&retrieval).await;
            Ok(())
        }
        Commands::Topics => show_topics(&retrieval).await,
        Commands::Upload { file } => upload(&retrieval, file).await,
        Commands::Query {
            text,
            max_responses,
            summarize,
        } => {
            let limit = max_responses.unwrap_or(retrieval.max_responses());
            match run_query(&retrieval, text, limit, verbosity).await {
                Ok(results) if *summarize => {
                    let generation = GenerationClient::from_config(&config)?;
                    stream_summary(&generation, &results, text).await
                }
                Ok(_) => Ok(()),
                Err(err) => Err(err),
            }
        }
    };

    if let Err(err) = outcome {
        eprintln!("{} {}", "Error:".red().bold(), err);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn spinner(message: &str, verbosity: Verbosity) -> Option<ProgressBar> {
    if !verbosity.show_progress() {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

async fn show_status(retrieval: &RetrievalClient, generation: &GenerationClient) {
    let catalog = retrieval.list_documents().await;
    println!(
        "{} {} ({} documents)",
        "Retrieval:".bold(),
        retrieval.base_url(),
        catalog.len()
    );

    let reachable = if generation.health_check().await {
        "reachable".green()
    } else {
        "unreachable".red()
    };
    println!(
        "{} {} [{}] {}",
        "Generation:".bold(),
        generation.base_url(),
        generation.model(),
        reachable
    );
}

async fn show_documents(retrieval: &RetrievalClient) {
    let catalog = retrieval.list_documents().await;
    if !catalog.has_documents() {
        println!("{}", "No documents uploaded yet. Start with: policyrag upload <FILE>".yellow());
        return;
    }

    println!("{}", "Your documents:".bold());
    for file in &catalog.files {
        println!("  • {}", file);
    }
}

async fn show_topics(retrieval: &RetrievalClient) -> Result<(), ClientError> {
    for topic in retrieval.topics().await? {
        println!("{}", topic);
    }
    Ok(())
}

async fn upload(retrieval: &RetrievalClient, path: &Path) -> Result<(), ClientError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    policyrag::retrieval::validate_upload_name(&file_name)?;

    let content = tokio::fs::read(path)
        .await
        .map_err(|e| ClientError::Input(format!("Could not read {}: {}", path.display(), e)))?;

    let receipt = retrieval.upload_document(content, &file_name).await?;
    println!(
        "{} {} (Document ID: {})",
        "✓".green(),
        receipt.message,
        receipt.document_id
    );
    Ok(())
}

async fn run_query(
    retrieval: &RetrievalClient,
    text: &str,
    limit: usize,
    verbosity: Verbosity,
) -> Result<QueryResultSet, ClientError> {
    let pb = spinner("Searching documents...", verbosity);
    let results = retrieval.query(text, limit).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let results = results?;

    if results.is_empty() {
        println!("{}", "No matching passages.".yellow());
        return Ok(results);
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{} {} {}",
            format!("{}.", rank + 1).bold(),
            format!("[{:.2}]", result.score).cyan(),
            result.source.dimmed()
        );
        println!("   {}", result.statement);
        if !result.topics.is_empty() {
            println!("   {}", result.topics.join(", ").dimmed());
        }
    }
    Ok(results)
}

async fn stream_summary(
    generation: &GenerationClient,
    results: &QueryResultSet,
    query: &str,
) -> Result<(), ClientError> {
    println!("\n{}", "Summary:".bold());

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let observer = SummaryObserver::new().on_token(|token| {
        print!("{}", token);
        let _ = std::io::stdout().flush();
    });

    match generation
        .summarize(results.as_slice(), query, observer, cancel)
        .await
    {
        Ok(_) => {
            println!();
            Ok(())
        }
        Err(ClientError::Cancelled) => {
            println!("\n{}", "(summary cancelled)".dimmed());
            Ok(())
        }
        Err(err) => {
            println!();
            Err(err)
        }
    }
}
