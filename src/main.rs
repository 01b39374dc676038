use askdocs::Result;
use askdocs::commands::{ask_question, ingest_document, serve, show_status};
use askdocs::config::{run_interactive_config, show_config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "askdocs")]
#[command(about = "A retrieval-augmented question answering system over local documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest a document file into the collection
    Ingest {
        /// Path to the document file
        file: PathBuf,
        /// Document id (generated if omitted; re-using an id overwrites)
        #[arg(long)]
        id: Option<String>,
    },
    /// Ask a question against the ingested documents
    Ask {
        /// The question to answer
        question: String,
        /// Number of passages to retrieve as context
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Start the JSON-RPC query server
    Serve {
        /// Address to listen on (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Show connectivity and collection status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest { file, id } => {
            ingest_document(file, id).await?;
        }
        Commands::Ask { question, limit } => {
            ask_question(question, limit).await?;
        }
        Commands::Serve { host, port } => {
            serve(host, port).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
