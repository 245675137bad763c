use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use datachat::{
    config::Config,
    create_router,
    files::{summarize, FileHandle},
    utils::init_tracing,
    visualization::render_document,
    AppState,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Overrides PORT from the environment
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the summary payload for a local file as JSON
    Summarize { path: PathBuf },
    /// Render the HTML visualization for a local CSV file
    Visualize {
        csv: PathBuf,
        /// Output file; defaults to stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    let _log_guard = init_tracing(&config.logging);

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Summarize { path } => {
            let file = FileHandle::from_path(&path).await?;
            let outcome = summarize(&file);
            if let Some(reason) = &outcome.failure {
                tracing::warn!(path = %path.display(), error = %reason, "Summary is degraded");
            }
            println!("{}", serde_json::to_string_pretty(&outcome.payload)?);
            Ok(())
        }
        Command::Visualize { csv, out } => {
            let file = FileHandle::from_path(&csv).await?;
            let document = render_document(&file.name, file.read_text()?)?;
            match out {
                Some(target) => {
                    tokio::fs::write(&target, document).await?;
                    info!(path = %target.display(), "Visualization written");
                }
                None => println!("{}", document),
            }
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!(
        host = %config.server.host,
        port = config.server.port,
        provider = %config.llm.default_provider,
        model = %config.llm.default_model,
        "Configuration loaded"
    );

    let ip: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(ip, config.server.port);

    let state = AppState::new(config)?;
    let app = create_router(state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
