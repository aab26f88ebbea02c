//! Skinned-mesh viewer with QUIC pose synchronization.
//!
//! Runs the windowed viewer by default; `--serve` starts a headless pose
//! relay instead.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use emberview::app::{ViewerOptions, ViewerSettings, run_viewer};
use emberview::net::relay;

/// Skinned-mesh viewer with QUIC pose sync
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run as a headless pose relay instead of the viewer
    #[arg(long, default_value_t = false)]
    serve: bool,

    /// Port the relay binds to
    #[arg(long, default_value_t = 4433)]
    port: u16,

    /// Relay address to join, e.g. 127.0.0.1:4433
    #[arg(long)]
    connect: Option<String>,

    /// Directory holding ca.crt / server.crt / server.key (see certgen)
    #[arg(long, default_value = "./certs")]
    certs: PathBuf,

    /// Server name the client validates against the certificate
    #[arg(long, default_value = "localhost")]
    domain: String,

    /// Username announced to the relay
    #[arg(long, default_value = "viewer")]
    username: String,

    /// Albedo texture file; a procedural checker is used when omitted
    #[arg(long)]
    albedo: Option<PathBuf>,

    /// Settings file; defaults apply when it does not exist
    #[arg(long, default_value = "emberview.json")]
    settings: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    if args.serve {
        let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!("Failed to start runtime: {}", e);
                std::process::exit(1);
            }
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
        tracing::info!(%addr, "starting pose relay");
        if let Err(e) = runtime.block_on(relay::run(addr, &args.certs)) {
            tracing::error!("Relay failed: {}", e);
            std::process::exit(1);
        }
        return;
    }

    tracing::info!("Starting emberview viewer...");
    let options = ViewerOptions {
        connect: args.connect,
        certs_dir: args.certs,
        domain: args.domain,
        username: args.username,
        albedo_path: args.albedo,
        settings: ViewerSettings::load(&args.settings),
    };
    if let Err(e) = run_viewer(options) {
        tracing::error!("Viewer failed: {}", e);
        std::process::exit(1);
    }
}
