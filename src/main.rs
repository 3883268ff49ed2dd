use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dnssec_signer::dns::DomainName;
use dnssec_signer::dnssec::{DnskeyResponder, KeyPair};
use dnssec_signer::{SignerConfig, SigningMetrics};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Load DNSSEC keys and answer DNSKEY queries with signatures
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every configured key and print its key tag
    Check {
        /// TOML config file; DNSSEC_* environment variables override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the DNSKEY reply for a zone in presentation format
    Dnskey {
        /// Zone the keys are served for
        #[arg(short, long)]
        zone: DomainName,

        /// Request signatures, as the DO bit does
        #[arg(short, long)]
        dnssec_ok: bool,

        /// TOML config file; DNSSEC_* environment variables override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Check { config } => check(SignerConfig::load(config.as_deref())?),
        Command::Dnskey {
            zone,
            dnssec_ok,
            config,
        } => dnskey(SignerConfig::load(config.as_deref())?, zone, dnssec_ok).await,
    }
}

fn check(config: SignerConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut failed = 0;
    for files in &config.keys {
        match KeyPair::load(files) {
            Ok(pair) => {
                let algorithm = pair.signer().algorithm();
                if !algorithm.is_recommended() {
                    warn!(
                        "{}: {} is not a recommended signing algorithm (RFC 8624)",
                        files.display_name(),
                        algorithm
                    );
                }
                println!(
                    "{}\talgorithm {} ({})\tflags {}\tkey tag {}",
                    files.display_name(),
                    pair.algorithm(),
                    algorithm,
                    pair.public_key().flags,
                    pair.key_tag()
                );
            }
            Err(e) => {
                error!("{}: {}", files.display_name(), e);
                failed += 1;
            }
        }
    }

    info!("{} key(s) checked, {} failed", config.keys.len(), failed);
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn dnskey(
    config: SignerConfig,
    zone: DomainName,
    dnssec_ok: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let keys = Arc::new(config.load_keys()?);
    let metrics = Arc::new(SigningMetrics::new()?);
    let responder = DnskeyResponder::new(keys, config.response_policy()?, metrics);

    let reply = responder.respond_bounded(&zone, dnssec_ok).await?;
    for record in &reply.answers {
        println!("{}", record);
    }
    for failure in &reply.failures {
        error!("{}", failure);
    }

    info!("DNSKEY reply for {} is {}", zone, reply.status);
    Ok(ExitCode::SUCCESS)
}
