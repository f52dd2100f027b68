use clap::{Parser, Subcommand};
use docs_rag::Result;
use docs_rag::commands::{
    ask, reindex_all, reindex_change_request, reindex_file, shared_services, show_status,
};
use docs_rag::config::{get_config_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "Index repository documentation into a vector store and answer questions from it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the documentation source and Ollama connection
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Re-index documentation into the vector store
    Reindex {
        #[command(subcommand)]
        target: ReindexTarget,
    },
    /// Ask a question about the indexed documentation
    Ask {
        /// The question to answer
        question: String,
    },
    /// Show stored chunk counts and backend health
    Status {
        /// Also count the chunks stored for this source URL
        #[arg(long)]
        url: Option<String>,
    },
}

#[derive(Subcommand)]
enum ReindexTarget {
    /// Everything under the documentation root
    All,
    /// Files changed by a pull request
    Pr {
        /// Pull request number
        number: u64,
    },
    /// A single repository file, e.g. "docs/core/entity.md"
    File {
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_dir = get_config_dir().map_err(anyhow::Error::from)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Reindex { target } => {
            let services = shared_services(&config_dir).await?;
            match target {
                ReindexTarget::All => {
                    reindex_all(services).await?;
                }
                ReindexTarget::Pr { number } => {
                    reindex_change_request(services, number).await?;
                }
                ReindexTarget::File { path } => {
                    reindex_file(services, &path).await?;
                }
            }
        }
        Commands::Ask { question } => {
            ask(shared_services(&config_dir).await?, question).await?;
        }
        Commands::Status { url } => {
            show_status(shared_services(&config_dir).await?, url.as_deref()).await?;
        }
    }

    Ok(())
}
