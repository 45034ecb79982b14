//! tcpsnap - dump TCP connection snapshots as JSON.

use clap::Parser;
use tcpsnap::message::KernelErrorPolicy;
use tcpsnap::{AddressFamily, DumpOptions, fetch_snapshots};

#[derive(Parser)]
#[command(name = "tcpsnap")]
#[command(about = "Dump TCP connection snapshots via NETLINK_SOCK_DIAG", long_about = None)]
#[command(version)]
struct Cli {
    /// Dump IPv4 sockets only.
    #[arg(short = '4', long)]
    ipv4: bool,

    /// Dump IPv6 sockets only.
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Skip connections whose endpoints are both local.
    #[arg(long)]
    skip_local: bool,

    /// Log kernel-reported errors and keep dumping instead of aborting.
    #[arg(long)]
    continue_on_error: bool,

    /// Pretty-print the JSON output.
    #[arg(short, long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let options = DumpOptions {
        skip_local: cli.skip_local,
        kernel_error_policy: if cli.continue_on_error {
            KernelErrorPolicy::LogAndContinue
        } else {
            KernelErrorPolicy::Abort
        },
    };

    // Default to both families when neither is selected.
    let mut families = Vec::new();
    if cli.ipv4 || !cli.ipv6 {
        families.push(AddressFamily::Inet);
    }
    if cli.ipv6 || !cli.ipv4 {
        families.push(AddressFamily::Inet6);
    }

    let mut snapshots = Vec::new();
    for family in families {
        snapshots.extend(fetch_snapshots(family, &options).await?);
    }

    let stdout = std::io::stdout().lock();
    if cli.pretty {
        serde_json::to_writer_pretty(stdout, &snapshots)?;
    } else {
        serde_json::to_writer(stdout, &snapshots)?;
    }
    println!();

    Ok(())
}
