//! Quotebook command-line entry point.
//!
//! # Responsibility
//! - Load config, start logging, open the quote store.
//! - Map each subcommand onto one `quotebook_core` use-case.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use log::warn;
use quotebook_core::db::open_db;
use quotebook_core::{
    default_config_path, init_logging, HttpQuoteSource, ImportMode, QuoteBook, QuotebookConfig,
    SqliteQuoteStore, SyncDriver,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

type Book = QuoteBook<SqliteQuoteStore>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = QuotebookConfig::load_or_default(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    if let Some(db) = cli.db.clone() {
        config.storage.db_path = db;
    }

    // Logging failures are reported but never block the command.
    if let Err(err) = init_logging(&config.logging.level, &config.logging.dir) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let conn = open_db(&config.storage.db_path).with_context(|| {
        format!(
            "opening quote store at {}",
            config.storage.db_path.display()
        )
    })?;
    let store = SqliteQuoteStore::try_new(conn)?;
    let mut book = QuoteBook::load(store)?;

    match cli.command {
        Commands::Show { category } => {
            if let Some(category) = category {
                book.select_category(Some(category.as_str()))?;
            }
            print_random(&book);
        }
        Commands::List => {
            for quote in book.filtered() {
                println!("\"{}\" - {}", quote.text, quote.category);
            }
        }
        Commands::Add {
            text,
            category,
            push,
        } => {
            let quote = book.add_quote(&text, &category)?;
            println!("Added quote to {}.", quote.category);
            if push {
                push_collection(book, &config).await;
            }
        }
        Commands::Categories => {
            let selected = book.selected_category();
            let marker = |active: bool| if active { "*" } else { " " };
            println!("{} all", marker(selected.is_none()));
            for category in book.categories() {
                println!("{} {}", marker(selected == Some(category.as_str())), category);
            }
        }
        Commands::Filter { category } => {
            book.select_category(Some(category.as_str()))?;
            match book.selected_category() {
                Some(selected) => println!("Filter set to {selected}."),
                None => println!("Filter cleared."),
            }
            print_random(&book);
        }
        Commands::Export { path } => {
            let count = book
                .export_to_file(&path)
                .with_context(|| format!("exporting to {}", path.display()))?;
            println!("Exported {count} quotes to {}.", path.display());
        }
        Commands::Import { path, append, push } => {
            let mode = if append {
                ImportMode::Append
            } else {
                ImportMode::Replace
            };
            match book.import_from_file(&path, mode) {
                Ok(count) => println!("Quotes imported successfully! ({count} quotes)"),
                Err(err) => anyhow::bail!("Error importing quotes: {err}"),
            }
            if push {
                push_collection(book, &config).await;
            }
        }
        Commands::Sync => {
            let driver = build_driver(book, &config);
            let status = driver.sync_now().await;
            println!("{}", status.message());
        }
        Commands::Watch => {
            let driver = Arc::new(build_driver(book, &config));
            let mut statuses = driver.subscribe();
            let (shutdown_tx, shutdown_rx) = watch::channel(false);

            let runner = tokio::spawn({
                let driver = Arc::clone(&driver);
                async move { driver.run(shutdown_rx).await }
            });
            let printer = tokio::spawn(async move {
                while statuses.changed().await.is_ok() {
                    println!("{}", statuses.borrow_and_update().message());
                }
            });

            tokio::signal::ctrl_c()
                .await
                .context("waiting for interrupt signal")?;
            let _ = shutdown_tx.send(true);
            runner.await.context("sync driver task failed")?;
            printer.abort();
            println!("Stopped syncing.");
        }
    }

    Ok(())
}

fn print_random(book: &Book) {
    match book.random_quote(&mut rand::thread_rng()) {
        Some(quote) => println!("\"{}\"\n  - {}", quote.text, quote.category),
        None => println!("No quotes found in this category."),
    }
}

fn build_driver(book: Book, config: &QuotebookConfig) -> SyncDriver<SqliteQuoteStore> {
    let remote = Arc::new(HttpQuoteSource::new(config.http_source_settings()));
    SyncDriver::new(
        Arc::new(Mutex::new(book)),
        remote,
        config.reconcile_options(),
        config.sync_settings(),
    )
}

async fn push_collection(book: Book, config: &QuotebookConfig) {
    let driver = build_driver(book, config);
    match driver.push_now().await {
        Ok(()) => println!("Quotes uploaded to server."),
        Err(err) => {
            warn!("event=remote_push module=cli status=error code={}", err.code);
            println!("Upload failed: {err}. Working offline.");
        }
    }
}
