//! reflex - live counter demo.
//!
//! Serves a counter page whose state lives on the server. Each browser tab
//! gets its own counter; clicks travel over a WebSocket and the server sends
//! back the re-rendered `#app` element.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser as ClapParser;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reflex::config::ReflexConfig;
use reflex::{Event, Page, Template};

const COUNTER_TEMPLATE: &str = include_str!("../demos/counter.html");

/// reflex - live counter demo
#[derive(ClapParser, Debug)]
#[command(name = "reflex", version, about, long_about = None)]
struct Cli {
    /// Address to bind the HTTP/WebSocket server (overrides the config file)
    #[arg(long, env = "REFLEX_BIND")]
    bind: Option<SocketAddr>,

    /// Template to serve instead of the built-in counter page
    #[arg(long)]
    template: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(long, env = "REFLEX_CONFIG", default_value = "reflex.toml")]
    config: PathBuf,
}

#[derive(Debug, Default, Serialize)]
struct Counter {
    #[serde(rename = "Count")]
    count: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = ReflexConfig::load(&cli.config)?.unwrap_or_default();
    let bind = cli.bind.unwrap_or(config.server.bind);

    let template = match &cli.template {
        Some(path) => Template::from_file(path)?,
        None => Template::parse(COUNTER_TEMPLATE),
    };

    let transport = config.transport;
    let live = template
        .setup(move || {
            Page::new("app", Counter::default())
                .transport(transport)
                .on("increment", |c: &mut Counter| c.count += 1)
                .on("add", |c: &mut Counter, by: i64, e: Event| {
                    tracing::debug!(by, kind = %e.kind, "add");
                    c.count += by;
                })
                .on("reset", |c: &mut Counter| c.count = 0)
        })
        .context("invalid counter page")?;

    let app = live
        .router(&config.server.path)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!(addr = %bind, path = %config.server.path, "reflex listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received Ctrl+C");
    })
    .await?;

    tracing::info!("reflex exiting");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "reflex=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
