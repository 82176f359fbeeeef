//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

/// Progressive, chunked-transfer object cache for live-streaming media.
#[derive(Parser, Debug)]
#[command(name = "relaycached", version, about)]
pub struct Cli {
    /// Base filesystem path for on-disk objects.
    #[arg(long, default_value = "./content")]
    pub content_path: PathBuf,

    /// Listen port.
    #[arg(long, default_value_t = 9094)]
    pub port: u16,

    /// TLS certificate file. Requires --tls-key.
    #[arg(long, requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key file. Requires --tls-cert.
    #[arg(long, requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// CORS policy as JSON; falls back to the built-in default policy.
    #[arg(long)]
    pub cors_config: Option<PathBuf>,

    /// Disable disk spill; objects are served from memory only.
    #[arg(long)]
    pub ram_only: bool,

    /// Disable the waiting-GET rendezvous; absent names miss immediately.
    #[arg(long)]
    pub no_wait_for_data: bool,

    /// Disable the TTL eviction loop.
    #[arg(long)]
    pub no_ttl_cleanup: bool,

    /// Disable EDGE/OLD_S URL translation.
    #[arg(long)]
    pub no_url_translator: bool,

    /// Raise log verbosity to DEBUG.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn tls_config(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }
}
