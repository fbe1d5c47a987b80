use std::sync::Arc;

use eyre::WrapErr;
use mimalloc::MiMalloc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use simple_http_server::api::DemoHandler;
use simple_http_server::{AnyResult, Server, ServerConfig};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    run().await
}

async fn run() -> AnyResult<()> {
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
    let port = match std::env::var("PORT") {
        Ok(port) => port.parse().wrap_err_with(|| format!("invalid PORT {port:?}"))?,
        Err(_) => 8888,
    };
    let file = std::env::var("SEND_FILE").unwrap_or_else(|_| "Cargo.toml".to_owned());

    let mut server = Server::new().with_config(ServerConfig::from_env());
    server
        .add_handler(Arc::new(DemoHandler::new(file)))?
        .add_default_response_headers([
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Methods", "*"),
        ]);

    // systemfd / catflap hand over a bound socket as fd 3
    let mut listenfd = listenfd::ListenFd::from_env();
    match listenfd.take_tcp_listener(0)? {
        Some(listener) => server.start_with_listener(listener)?,
        None => server.start(&host, port).await?,
    }
    info!("Serving on {}", server.bind_address_description());

    server
        .serve_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("unable to listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
