use clap::Parser;
use streamcall_server::{
    CliArgs, ServerConfig, serve_with_incoming, server::telemetry::init_telemetry,
};
use tokio::{net::TcpListener, signal};
use tokio_stream::wrappers::TcpListenerStream;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let res = if config.uds {
        serve_uds(config).await
    } else {
        let addr = config.server_addr.clone();
        let tcp = TcpListener::bind(&addr).await?;
        log_startup_info(&addr, &config);
        serve_with_incoming(TcpListenerStream::new(tcp), config, shutdown_signal()).await
    };

    providers.shutdown();
    res
}

#[cfg(unix)]
async fn serve_uds(config: ServerConfig) -> anyhow::Result<()> {
    use tokio::net::UnixListener;
    use tokio_stream::wrappers::UnixListenerStream;

    let path = config.server_addr.clone();
    let uds = UnixListener::bind(&path)?;
    log_startup_info(&path, &config);
    let res = serve_with_incoming(UnixListenerStream::new(uds), config, shutdown_signal()).await;
    // TODO: a panic still leaves the socket file behind.
    let _ = std::fs::remove_file(&path);
    res
}

#[cfg(not(unix))]
async fn serve_uds(_config: ServerConfig) -> anyhow::Result<()> {
    anyhow::bail!("Unix domain sockets are not supported on this platform");
}

fn log_startup_info(addr: &str, config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting streamcall on {addr} with full config: {config:#?}");
    } else {
        tracing::info!(
            "Starting streamcall on {addr} ({} greetings every {:?})",
            config.greet_repeat_count,
            config.greet_interval
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }
}
