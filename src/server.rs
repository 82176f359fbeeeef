//! HTTP server loop: accepts connections and drives each through the
//! dispatcher against a shared [`Server`](crate::app::Server).

use std::sync::Arc;

use hyper::{Request, server::conn::http1, service::service_fn};
use tokio::net::TcpListener;

use crate::app::Server;
use crate::dispatch::dispatch;
use crate::types::BoxError;

pub async fn serve(listener: TcpListener, server: Arc<Server>) -> Result<(), BoxError> {
    tracing::info!(
        target: "relaycache",
        addr = %listener.local_addr()?,
        "{}", crate::signals::ids::SERVER_STARTED
    );

    loop {
        let (stream, addr) = listener.accept().await?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let server = server.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req: Request<_>| {
                let server = server.clone();
                async move { dispatch(req, server, addr).await }
            });

            let mut http = http1::Builder::new();
            http.keep_alive(true);

            if let Err(err) = http.serve_connection(io, svc).with_upgrades().await {
                tracing::debug!(error = %err, "connection error");
            }
        });
    }
}
