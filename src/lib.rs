pub mod adapters;
mod app;
pub mod config;
pub mod ports;
pub mod push;
pub mod state;
pub mod types;

use std::net::SocketAddr;

pub use app::app;
pub use push::{NotifyError, PushService, generate_vapid_credentials};

pub async fn serve(addr: SocketAddr, state: state::AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app(state)).await
}
