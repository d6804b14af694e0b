//! firs-storage - inspect and maintain FIRS multi-tier storage
//!
//! Every command prints pretty JSON on stdout. Logs go to stderr.

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use firs_storage::cli::{
    parse_document_type_arg, parse_fingerprint_arg, parse_namespace_arg, resolve_config, Cli,
    Command,
};
use firs_storage::StorageManager;

/// Installs the fmt subscriber; `--log-level` wins over RUST_LOG, default `info`
fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = resolve_config(&cli)?;
    let mut manager = StorageManager::new(config)?;

    match cli.command {
        Command::Stats => print_json(&manager.get_storage_stats())?,
        Command::Cleanup => print_json(&manager.cleanup_expired_data())?,
        Command::Clear { namespace } => {
            let cleared = match namespace {
                Some(ns) => manager.cache().clear(Some(parse_namespace_arg(&ns)?)),
                None => manager.clear_all_storage(),
            };
            print_json(&serde_json::json!({ "cleared": cleared }))?;
            if !cleared {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Get {
            namespace,
            fingerprint,
        } => {
            let namespace = parse_namespace_arg(&namespace)?;
            let fingerprint = parse_fingerprint_arg(&fingerprint);
            match manager.cache().get(namespace, &fingerprint, None) {
                Some(entry) => print_json(&entry)?,
                None => {
                    eprintln!("No fresh entry in namespace '{}'", namespace);
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Search {
            query,
            ticker,
            document_type,
            limit,
        } => {
            let document_type = document_type
                .as_deref()
                .map(parse_document_type_arg)
                .transpose()?;
            manager.initialize().await?;
            if !manager.vector_storage_enabled() {
                eprintln!("Vector database is unavailable");
                return Ok(ExitCode::FAILURE);
            }
            let hits = manager
                .search_documents(&query, ticker.as_deref(), document_type, limit)
                .await;
            print_json(&hits)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
