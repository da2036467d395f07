//! MarchéHub notification server
//!
//! Hosts the notification-creation endpoint as a standalone service.
//!
//! Environment variables:
//! - `MARCHEHUB_URL`: base URL of the backend project (required)
//! - `MARCHEHUB_SERVICE_KEY`: key used for `notifications` inserts (required)
//! - `NOTIFY_PORT`: port to listen on (default: 8787)

use std::net::SocketAddr;

use log::{error, info};
use marchehub::notify::{self, NotifyState};
use marchehub::MarcheHub;

struct Config {
    url: String,
    key: String,
    port: u16,
}

impl Config {
    fn from_env() -> Result<Self, String> {
        let url = std::env::var("MARCHEHUB_URL")
            .map_err(|_| String::from("MARCHEHUB_URL must be set"))?;
        let key = std::env::var("MARCHEHUB_SERVICE_KEY")
            .map_err(|_| String::from("MARCHEHUB_SERVICE_KEY must be set"))?;
        let port = std::env::var("NOTIFY_PORT")
            .ok()
            .and_then(|port| port.parse().ok())
            .unwrap_or(8787);

        Ok(Self { url, key, port })
    }
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };

    let hub = MarcheHub::new(&config.url, &config.key);
    let app = notify::router(NotifyState::new(hub));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {}: {}", addr, err);
            std::process::exit(1);
        }
    };

    info!("notification server listening on {}", addr);
    if let Err(err) = axum::serve(listener, app).await {
        error!("server error: {}", err);
        std::process::exit(1);
    }
}
