mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod loader;
    pub mod pagination;
    pub mod schema;
    pub mod validation;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod cache {
    pub mod sessions;
}

pub mod config;
pub mod constants;
pub mod error;
pub mod media;
pub mod routes;
pub mod state;

pub use authentication::*;
pub use cache::sessions;
pub use database::*;

use std::net::SocketAddr;

use state::SharedState;

/// Runs the HTTP server until ctrl-c.
pub async fn serve(state: SharedState) -> Result<(), error::Error> {
    let address: SocketAddr = state.config.bind_address;
    let routes = routes::routes(state);

    let (address, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(address, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
            }
            log::info!("Shutting down");
        })
        .map_err(|e| {
            error::HtmlError::InternalServerError.new(&format!("Cannot bind {address}: {e}"))
        })?;

    log::info!("Listening on http://{address}");
    server.await;

    Ok(())
}
