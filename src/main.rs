use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use speedtest_server::server::Server;

#[derive(Parser, Debug)]
#[command(name = "speedtest-server")]
#[command(about = "WebSocket internet speed test server")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    Server::bind(cli.bind).await?.run().await
}
