//! Generate the development CA and server certificate pair consumed by
//! the QUIC transport.

use std::path::PathBuf;

use clap::Parser;

/// Generate a local CA plus a CA-signed server certificate
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory the PEM files are written to
    #[arg(default_value = "./certs")]
    output_dir: PathBuf,

    /// Domain placed in the server certificate SANs (plus its wildcard
    /// and the loopback addresses)
    #[arg(default_value = "localhost")]
    domain: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    match emberview::certs::generate(&args.output_dir, &args.domain) {
        Ok(files) => {
            for file in files {
                println!("{}", file.display());
            }
        }
        Err(e) => {
            eprintln!("Certificate generation failed: {}", e);
            std::process::exit(1);
        }
    }
}
