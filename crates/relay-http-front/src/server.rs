//! Accept loop binding an [`AppState`] to a TCP socket. One task per
//! connection, one `route` call per request on that connection.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::router::{route, AppState};

pub async fn serve(bind_address: SocketAddr, app: Arc<AppState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    info!(%bind_address, "gateway HTTP front end listening");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        debug!(%peer_addr, "accepted connection");

        let app = app.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let app = app.clone();
                async move { route(req, app).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                let err_str = err.to_string();
                if err_str.contains("connection closed before message completed") {
                    debug!(%peer_addr, "client disconnected");
                } else {
                    error!(%peer_addr, error = %err, "error serving connection");
                }
            }
        });
    }
}
