use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use relay_http_front::router::AppState;
use relay_oauth::OAuthProvider;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::combined::route;

pub async fn serve(
    bind_address: SocketAddr,
    app: Arc<AppState>,
    oauth: Arc<dyn OAuthProvider>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    info!(%bind_address, "gateway listening");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        debug!(%peer_addr, "accepted connection");

        let app = app.clone();
        let oauth = oauth.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| route(req, app.clone(), oauth.clone()));

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
