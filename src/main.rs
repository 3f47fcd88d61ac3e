use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use svdrec::services::serving::{routes::create_router, ServingService};
use svdrec::utils::validation::validate_config;
use svdrec::{init_tracing, Config, TrainedState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve movie recommendations over HTTP", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    let config = Config::load_or_default(&args.config)?;
    validate_config(&config)?;
    info!("Starting svdrec server with config: {:?}", config.server);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> Result<()> {
    let build_config = config.clone();
    let state = tokio::task::spawn_blocking(move || TrainedState::build(&build_config)).await??;
    info!(
        "Model ready: RMSE {:.4}, MAE {:.4}",
        state.report.rmse, state.report.mae
    );

    let service = Arc::new(ServingService::new(
        state.model,
        state.dataset,
        config.recommendation.clone(),
    ));
    let app = create_router(service);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
