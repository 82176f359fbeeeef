#![cfg(feature = "tls")]

//! TLS-terminating variant of the server loop, using rustls.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use hyper::{Request, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, pkcs8_private_keys};
use tokio::net::TcpListener;
use tokio_rustls::{TlsAcceptor, rustls::ServerConfig};

use crate::app::Server;
use crate::dispatch::dispatch;
use crate::error::StartupError;

pub async fn serve_tls(
    listener: TcpListener,
    server: Arc<Server>,
    cert_path: &Path,
    key_path: &Path,
) -> Result<(), StartupError> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| StartupError::Tls(e.to_string()))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    let acceptor = TlsAcceptor::from(Arc::new(config));

    let local_addr = listener
        .local_addr()
        .map_err(|source| StartupError::Bind {
            addr: "<unknown>".to_string(),
            source,
        })?;
    tracing::info!(
        target: "relaycache",
        addr = %local_addr,
        "{}", crate::signals::ids::SERVER_STARTED
    );

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::error!(error = %err, "accept failed");
                continue;
            }
        };
        let acceptor = acceptor.clone();
        let server = server.clone();

        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(err) => {
                    tracing::debug!(error = %err, "TLS handshake failed");
                    return;
                }
            };

            let io = TokioIo::new(tls_stream);
            let svc = service_fn(move |req: Request<_>| {
                let server = server.clone();
                async move { dispatch(req, server, addr).await }
            });

            let mut h1 = http1::Builder::new();
            h1.keep_alive(true);

            if let Err(err) = h1.serve_connection(io, svc).with_upgrades().await {
                tracing::debug!(error = %err, "connection error");
            }
        });
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, StartupError> {
    let file = File::open(path).map_err(|source| StartupError::Bind {
        addr: path.display().to_string(),
        source,
    })?;
    let mut rd = BufReader::new(file);
    certs(&mut rd)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| StartupError::Tls(format!("bad certificate in {}: {e}", path.display())))
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, StartupError> {
    let file = File::open(path).map_err(|source| StartupError::Bind {
        addr: path.display().to_string(),
        source,
    })?;
    let mut rd = BufReader::new(file);
    pkcs8_private_keys(&mut rd)
        .next()
        .ok_or_else(|| StartupError::Tls(format!("no private key found in {}", path.display())))?
        .map(Into::into)
        .map_err(|e| StartupError::Tls(format!("bad private key in {}: {e}", path.display())))
}
