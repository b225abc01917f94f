use clap::Parser;
use match_signaling::server::{create_router, init_telemetry, shutdown_telemetry, Config};
use match_signaling::session::SessionSupervisor;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_telemetry(config.log_json)?;

    let supervisor = SessionSupervisor::spawn(config.supervisor_config());
    let app = create_router(supervisor, config.allowed_origin()?);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        allowed_origin = %config.allowed_origin,
        pairing_timeout_ms = config.pairing_timeout_ms,
        "Signaling server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Signaling server stopped");
    shutdown_telemetry();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
