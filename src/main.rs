use clap::Parser;
use relaycache::{Server, config::Cli, logging, serve};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let server = match Server::build(&cli).await {
        Ok(server) => server,
        Err(error) => {
            tracing::error!(%error, "startup failed");
            return std::process::ExitCode::FAILURE;
        }
    };

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(source) => {
            tracing::error!(error = %source, addr, "failed to bind");
            return std::process::ExitCode::FAILURE;
        }
    };

    let run_result = if let Some((cert, key)) = cli.tls_config() {
        #[cfg(feature = "tls")]
        {
            run_tls(listener, server.clone(), cert.clone(), key.clone()).await
        }
        #[cfg(not(feature = "tls"))]
        {
            let _ = (cert, key);
            tracing::error!("TLS requested but this binary was built without the tls feature");
            return std::process::ExitCode::FAILURE;
        }
    } else {
        run_plain(listener, server.clone()).await
    };

    server.shutdown().await;

    match run_result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "server loop exited with an error");
            std::process::ExitCode::FAILURE
        }
    }
}

/// Runs the accept loop until it errors or `ctrl_c` is received, in which
/// case a clean shutdown is signalled rather than an error reported.
async fn run_plain(listener: TcpListener, server: std::sync::Arc<Server>) -> Result<(), String> {
    tokio::select! {
        result = serve(listener, server) => result.map_err(|e| e.to_string()),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
            Ok(())
        }
    }
}

#[cfg(feature = "tls")]
async fn run_tls(
    listener: TcpListener,
    server: std::sync::Arc<Server>,
    cert: std::path::PathBuf,
    key: std::path::PathBuf,
) -> Result<(), String> {
    tokio::select! {
        result = relaycache::serve_tls(listener, server, &cert, &key) => result.map_err(|e| e.to_string()),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
            Ok(())
        }
    }
}
