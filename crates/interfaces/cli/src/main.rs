mod notes_cmds;
mod session;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use docrag_config::AppConfig;
use docrag_llm::{list_ollama_models, list_openrouter_models};
use docrag_notes::NoteStore;
use docrag_runtime::App;

const CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Parser)]
#[command(
    name = "docrag",
    version,
    about = "Document workspace with LLM summaries and notes"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Copy a source directory into a workspace and open an interactive session.
    Session {
        /// Directory to ingest.
        source: Option<PathBuf>,
        /// Destination directory (defaults to a fresh temp directory).
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Inspect and manage stored notes.
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },
    /// One-shot chat against the configured provider.
    Chat {
        prompt: String,
        #[arg(long)]
        servicer: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        stream: bool,
    },
    /// List models offered by a provider.
    Models {
        #[arg(long, value_enum, default_value = "all")]
        provider: CliModelProvider,
    },
}

#[derive(Debug, Subcommand)]
enum NotesCommands {
    /// List notes, newest first.
    List {
        /// Only notes linked to this document.
        #[arg(long)]
        document: Option<String>,
    },
    Show {
        id: String,
    },
    Search {
        term: String,
    },
    Delete {
        id: String,
    },
    /// Rebuild the index from the note files on disk.
    Reconcile,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliModelProvider {
    All,
    Ollama,
    Openrouter,
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.telemetry.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;
    init_tracing(&config);

    match cli.command {
        Commands::Session { source, dest } => {
            let source = source.unwrap_or_else(|| PathBuf::from(&config.ingest.default_source_path));
            let app = App::new(config).await?;
            session::run_session(&app, source, dest).await?;
        }
        Commands::Notes { command } => {
            let store = NoteStore::open(&config.notes.directory).await?;
            match command {
                NotesCommands::List { document } => notes_cmds::run_notes_list(&store, document.as_deref()).await,
                NotesCommands::Show { id } => notes_cmds::run_notes_show(&store, &id).await?,
                NotesCommands::Search { term } => notes_cmds::run_notes_search(&store, &term).await,
                NotesCommands::Delete { id } => notes_cmds::run_notes_delete(&store, &id).await?,
                NotesCommands::Reconcile => notes_cmds::run_notes_reconcile(&store).await?,
            }
        }
        Commands::Chat {
            prompt,
            servicer,
            model,
            stream,
        } => {
            let app = App::new(config).await?;
            let target = app.chat_target(servicer.as_deref(), model.as_deref())?;
            if stream {
                let mut chunks = app.chat().chat_stream(&prompt, &target).await?;
                let mut stdout = std::io::stdout();
                while let Some(chunk) = chunks.next_chunk().await {
                    print!("{chunk}");
                    stdout.flush()?;
                }
                println!();
            } else {
                println!("{}", app.chat().chat(&prompt, &target).await?);
            }
        }
        Commands::Models { provider } => {
            if matches!(provider, CliModelProvider::All | CliModelProvider::Ollama) {
                println!("ollama ({}):", config.llm.ollama_base_url);
                match list_ollama_models(&config.llm.ollama_base_url).await {
                    Ok(models) if models.is_empty() => println!("  (none installed)"),
                    Ok(models) => models.iter().for_each(|model| println!("  {model}")),
                    Err(err) => println!("  unavailable: {err}"),
                }
            }
            if matches!(provider, CliModelProvider::All | CliModelProvider::Openrouter) {
                println!("openrouter:");
                match list_openrouter_models().await {
                    Ok(models) => models.iter().for_each(|model| println!("  {model}")),
                    Err(err) => println!("  unavailable: {err}"),
                }
            }
        }
    }

    Ok(())
}
