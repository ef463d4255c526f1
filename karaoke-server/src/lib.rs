mod auth;
mod context;
mod docs;
mod errors;
mod gateway;
mod rooms;
mod schemas;
mod serialized;

use std::{
    io,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::{routing::get, Router};
use karaoke_collab::Collab;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::ServerContext;
pub use errors::*;
pub use gateway::Gateway;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

/// Starts the karaoke server, routing collab events to the gateway
pub async fn run_server(collab: Arc<Collab>, port: u16) -> io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let gateway = Gateway::new();
    gateway.start_routing(collab.clone());

    let context = ServerContext { collab, gateway };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/rooms", rooms::router())
        .nest("/gateway", gateway::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, root_router.into_make_service()).await
}
