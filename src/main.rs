use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use todo_api::{create_app, init_logging, serve, AppState, Settings, SqliteStore};

/// Account, session and todo HTTP service
#[derive(Parser)]
#[command(name = "todo_api")]
#[command(version)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(long, env = "TODO_API_CONFIG", default_value = "config.json")]
    config: PathBuf,
}

async fn run_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::connect(&settings.backend).await?;
    let state = AppState::new(Arc::new(store), &settings.backend);

    let listener = settings.server.listener().await?;
    serve(listener, create_app(state)).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging();

    let settings = match Settings::load(&args.config) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_server(settings).await {
        tracing::error!("run server error: {e}");
        std::process::exit(1);
    }
}
