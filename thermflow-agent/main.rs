use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use thermflow::{MsrRegistry, Sampler, SamplerConfig, Topology};

#[derive(Parser, Debug)]
#[command(name = "thermflow")]
#[command(about = "Thermal and power telemetry from per-CPU MSRs")]
struct Args {
    #[arg(long, default_value_t = 1000, help = "Sampling interval in milliseconds")]
    interval_ms: u64,

    #[arg(long, help = "Stop after this many samples (default: run until signalled)")]
    samples: Option<u64>,

    #[arg(
        long,
        help = "Dump every thermal status/interrupt field per unit, not just core temperatures"
    )]
    full: bool,

    #[arg(long, help = "Append per-socket package/DRAM power columns (RAPL)")]
    rapl: bool,

    #[arg(long, help = "Override detected socket count")]
    sockets: Option<usize>,

    #[arg(long, help = "Override detected cores per socket")]
    cores_per_socket: Option<usize>,

    #[arg(long, help = "Override detected threads per core")]
    threads_per_core: Option<usize>,

    #[arg(short, long, help = "Enable verbose logging (shows device discovery and MSR traffic)")]
    verbose: bool,
}

fn check_permissions() {
    // A friendlier message than the discovery error for the common case of
    // a missing kernel module.
    if std::fs::metadata("/dev/cpu/0").is_err() {
        eprintln!(
            "ERROR: /dev/cpu/0 does not exist.\n\n\
             The msr (or msr-safe) kernel module may not be loaded.\n\
             Run: sudo modprobe msr\n"
        );
        std::process::exit(1);
    }
}

fn resolve_topology(args: &Args) -> anyhow::Result<Topology> {
    match (args.sockets, args.cores_per_socket, args.threads_per_core) {
        (None, None, None) => {
            tracing::info!("Probing CPU topology...");
            Ok(Topology::detect()?)
        }
        (Some(sockets), Some(cores), Some(threads)) => {
            tracing::info!(
                "Using configured topology: {sockets} socket(s) x {cores} core(s) x {threads} thread(s)"
            );
            Ok(Topology::new(sockets, cores, threads)?)
        }
        _ => anyhow::bail!(
            "--sockets, --cores-per-socket and --threads-per-core must be given together"
        ),
    }
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Shutdown triggered by Ctrl+C");
        },
        _ = terminate => {
            tracing::warn!("Shutdown triggered by SIGTERM");
        },
    }

    cancel_token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    check_permissions();

    let topology = resolve_topology(&args)?;

    // Without register access there is nothing to do; the discovery error
    // names every family tried and why it lost.
    let registry = Arc::new(MsrRegistry::open(topology).context("MSR device discovery failed")?);

    let config = SamplerConfig {
        interval: Duration::from_millis(args.interval_ms),
        verbose_dump: args.full,
        rapl: args.rapl,
        samples: args.samples,
    };

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let sampler = Sampler::new(config, registry).context("sensor initialization failed")?;
    sampler
        .start(cancel_token)
        .await
        .context("sampler task panicked")?;

    tracing::info!("Sampling complete, exiting");

    Ok(())
}
