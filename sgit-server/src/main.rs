//! SGit Server - whole-repository sync over HTTP
//!
//! Serves any number of named repositories from one base directory.

use anyhow::Result;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use sgit_http::{Config, SyncHandler};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// SGit Server Configuration
#[derive(Parser, Debug)]
#[command(name = "sgit-server")]
#[command(author = "SGit Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Multi-repository sync server for sgit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server
    Start {
        /// Listen address (e.g., 0.0.0.0:3003)
        #[arg(short, long, default_value = "0.0.0.0:3003")]
        addr: String,

        /// Directory holding the served repositories
        #[arg(short, long, default_value = "./remote-repos")]
        base_path: PathBuf,

        /// Maximum accepted request body, in bytes
        #[arg(long, default_value_t = Config::default().max_body_size)]
        max_body_size: usize,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            addr,
            base_path,
            max_body_size,
            debug,
        } => {
            let env_filter = if debug {
                tracing_subscriber::EnvFilter::new("debug")
            } else {
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::INFO.into())
            };

            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer())
                .with(env_filter)
                .init();

            info!("Starting sgit server on {}", addr);

            let config = Config {
                base_path,
                max_body_size,
                debug,
            };
            let handler = Arc::new(SyncHandler::with_config(config)?);

            let addr: SocketAddr = addr.parse()?;
            let listener = TcpListener::bind(addr).await?;

            info!("Server listening on {}", addr);
            info!("Endpoints: GET /, POST /{{repo}}/push, GET /{{repo}}/pull, GET /{{repo}}/status");

            loop {
                let (stream, peer) = listener.accept().await?;
                let handler = handler.clone();
                let io = TokioIo::new(stream);

                tokio::spawn(async move {
                    if let Err(e) = http1::Builder::new()
                        .serve_connection(
                            io,
                            service_fn(move |req| handle_request(req, handler.clone())),
                        )
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", peer, e);
                    }
                });
            }
        }
    }
}

/// Handle incoming HTTP request
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    handler: Arc<SyncHandler>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!("Request: {} {}", method, uri);

    let response = match handler.handle(req).await {
        Ok(resp) => resp,
        Err(e) => {
            error!("Request error: {}", e);
            e.into_response()
        }
    };

    info!("{} {} -> {}", method, uri, response.status());
    Ok(response)
}
