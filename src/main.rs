//! # Knowledge Assistant CLI (`kba`)
//!
//! ## Usage
//!
//! ```bash
//! kba --config ./config/kba.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kba serve` | Start the HTTP API |
//! | `kba ingest <paths..>` | Extract, chunk and store documents |
//! | `kba scan` | Ingest files in the upload folder not yet stored |
//! | `kba search "<query>"` | Show the nearest chunks |
//! | `kba ask "<question>"` | Answer a question from stored documents |
//! | `kba list` | List stored documents |
//! | `kba remove <document>` | Remove a stored document |
//! | `kba clear` | Remove every stored document |
//! | `kba info` | Collection summary |
//! | `kba stats <file>` | Size statistics for a file without storing it |
//! | `kba completions <shell>` | Print shell completions |
//!
//! Logs go to stderr; set `RUST_LOG` (e.g. `RUST_LOG=knowledge_assistant=debug`)
//! to adjust verbosity.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use knowledge_assistant::chat::ChatHandler;
use knowledge_assistant::config::{self, Config};
use knowledge_assistant::embedding::create_provider;
use knowledge_assistant::ingest::DocumentProcessor;
use knowledge_assistant::llm::{LanguageModel, ServingEndpoint};
use knowledge_assistant::server::{self, AppState};
use knowledge_assistant::store::KnowledgeStore;

/// Knowledge Assistant: chat with your PDF and Word documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(name = "kba", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kba.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API.
    ///
    /// Scans the upload folder in the background on startup.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Extract, chunk and store one or more documents.
    ///
    /// A document already in the store is replaced.
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Ingest every supported file in a folder that is not yet stored.
    Scan {
        /// Folder to scan. Defaults to the configured upload folder.
        folder: Option<PathBuf>,
    },

    /// Show the chunks nearest to a query.
    Search {
        query: String,

        #[arg(long, short = 'k', default_value_t = 5)]
        limit: usize,
    },

    /// Answer a question from the stored documents.
    Ask {
        question: String,

        /// Use the extractive fallback instead of the language model.
        #[arg(long)]
        no_llm: bool,
    },

    /// List stored documents.
    List,

    /// Remove a stored document by name.
    Remove { document: String },

    /// Remove every stored document.
    Clear,

    /// Show a summary of the collection.
    Info,

    /// Show size statistics for a file without storing it.
    Stats { file: PathBuf },

    /// Print shell completions.
    Completions { shell: Shell },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "kba", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Serve { bind } => {
            let mut server_cfg = cfg.server.clone();
            if let Some(bind) = bind {
                server_cfg.bind = bind;
            }
            // Blocking clients are built before the runtime starts.
            let state = AppState::from_config(&cfg)?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(server::run_server(state, &server_cfg))?;
        }
        Commands::Ingest { paths } => {
            let store = open_store(&cfg)?;
            let processor = DocumentProcessor::from_config(&cfg.chunking)?;
            let mut failed = 0usize;
            for path in &paths {
                match processor.ingest_file(path, &store) {
                    Ok(chunks) => println!("{}: {} chunks", path.display(), chunks),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {}", path.display(), e);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} documents failed", failed, paths.len());
            }
        }
        Commands::Scan { folder } => {
            let store = open_store(&cfg)?;
            let processor = DocumentProcessor::from_config(&cfg.chunking)?;
            let folder = folder.unwrap_or_else(|| cfg.storage.upload_dir());
            let report = processor.process_folder(&folder, &store)?;

            println!("scan {}", folder.display());
            println!("  processed: {}", report.processed_files.len());
            for name in &report.processed_files {
                println!("    {}", name);
            }
            println!("  skipped:   {}", report.skipped_files.len());
            println!("  errors:    {}", report.errors.len());
            for err in &report.errors {
                println!("    {}", err);
            }
            println!("  chunks:    {}", report.total_chunks);
        }
        Commands::Search { query, limit } => {
            let store = open_store(&cfg)?;
            let hits = store.search_similar(&query, limit)?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!("{}. [{:.3}] {}", i + 1, hit.distance, hit.document_id);
                println!("    {}", preview(&hit.text, 160));
                println!();
            }
        }
        Commands::Ask { question, no_llm } => {
            let store = Arc::new(open_store(&cfg)?);
            let model: Option<Arc<dyn LanguageModel>> = if no_llm {
                None
            } else {
                ServingEndpoint::from_config(&cfg.llm)?
                    .map(|endpoint| Arc::new(endpoint) as Arc<dyn LanguageModel>)
            };
            let chat = ChatHandler::new(store, model, cfg.chat.clone());
            let answer = chat.generate_response(&question, !no_llm && cfg.chat.use_llm)?;

            println!("{}", answer.response);
            if !answer.sources.is_empty() {
                println!();
                println!("Sources: {}", answer.sources.join(", "));
            }
        }
        Commands::List => {
            let docs = open_store(&cfg)?.list_documents()?;
            if docs.is_empty() {
                println!("No documents.");
            } else {
                println!("{:<40} {:>8} {:>10}", "DOCUMENT", "CHUNKS", "CHARS");
                for doc in docs {
                    println!(
                        "{:<40} {:>8} {:>10}",
                        doc.document_id, doc.chunk_count, doc.total_size
                    );
                }
            }
        }
        Commands::Remove { document } => {
            let removed = open_store(&cfg)?.remove_document(&document)?;
            if removed == 0 {
                println!("{}: not stored", document);
            } else {
                println!("{}: removed {} chunks", document, removed);
            }
        }
        Commands::Clear => {
            open_store(&cfg)?.clear_all()?;
            println!("All documents cleared.");
        }
        Commands::Info => {
            let store = open_store(&cfg)?;
            let info = store.collection_info()?;
            println!("Knowledge Assistant: Collection Info");
            println!("====================================");
            println!("  Storage:     {} ({})", store.location(), info.storage_type);
            println!("  Model:       {}", info.embedding_model);
            println!("  Documents:   {}", info.total_documents);
            println!("  Chunks:      {}", info.total_chunks);
        }
        Commands::Stats { file } => {
            let processor = DocumentProcessor::from_config(&cfg.chunking)?;
            let stats = processor.document_stats(&file)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn open_store(cfg: &Config) -> anyhow::Result<KnowledgeStore> {
    let embedder = create_provider(&cfg.embedding)?;
    Ok(KnowledgeStore::open_dir(
        &cfg.storage.data_dir(),
        Arc::from(embedder),
    )?)
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
