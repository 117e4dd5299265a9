//! h2lens binary: argument parsing, logging setup, and the accept loop.

use clap::{Parser, ValueEnum};
use h2lens::output::{self, HumanSink, JsonSink, SharedSink};
use h2lens::proxy::{self, ProxyConfig};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "h2lens")]
#[command(version)]
#[command(about = "Analyzing HTTP/2 proxy: relays traffic to an origin and dumps every frame")]
struct Args {
    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = 443)]
    port: u16,

    /// IP address to listen on
    #[arg(short = 'i', long, default_value = "127.0.0.1")]
    ip: IpAddr,

    /// Listen in plaintext (h2c) instead of terminating TLS
    #[arg(long)]
    direct: bool,

    /// Origin port
    #[arg(short = 'P', long)]
    origin_port: u16,

    /// Origin host
    #[arg(short = 'H', long)]
    origin_host: String,

    /// Connect to the origin in plaintext
    #[arg(long)]
    origin_direct: bool,

    /// Server certificate file (PEM); required unless --direct
    #[arg(short = 'c', long)]
    cert: Option<PathBuf>,

    /// Server private key file (PEM); required unless --direct
    #[arg(short = 'k', long)]
    key: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "default")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Colored terminal output
    Default,
    /// One JSON object per line
    Json,
}

fn main() {
    let args = Args::parse();

    // Records go to stdout; diagnostics stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if !args.direct && (args.cert.is_none() || args.key.is_none()) {
        eprintln!("--cert and --key are required unless --direct is set");
        std::process::exit(1);
    }

    let sink: SharedSink = match args.output {
        OutputFormat::Default => output::shared(HumanSink::stdout()),
        OutputFormat::Json => output::shared(JsonSink::stdout()),
    };

    let config = ProxyConfig {
        listen_ip: args.ip,
        listen_port: args.port,
        direct: args.direct,
        origin_host: args.origin_host,
        origin_port: args.origin_port,
        origin_direct: args.origin_direct,
        cert: args.cert,
        key: args.key,
    };

    if let Err(err) = proxy::run(config, sink) {
        tracing::error!(error = %err, "proxy error");
        std::process::exit(1);
    }
}
