use std::process::ExitCode;
use std::thread;

use clap::{Parser, Subcommand};
use geoprobe::config::{self, DEFAULT_BIND_HOST, DEFAULT_LOG_FILTER};
use geoprobe::geo::{report, GeoResolver};
use geoprobe::health::{self, framework, raw::RawHealthServer};

/// geoprobe: container probes
///
/// Prints the host's public IP geolocation for shell pipelines, or runs a
/// liveness responder.
///
/// Examples:
///   geoprobe ipinfo
///   GEOPROBE_TIMEOUT_SECS=2 geoprobe ipinfo
///   HTTP_PORT=8081 geoprobe serve
///   geoprobe serve-raw --port 10001
#[derive(Parser)]
#[command(name = "geoprobe", version, about, long_about = None)]
struct Cli {
    /// Log filter (e.g. "geoprobe=debug,tower_http=debug"). Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print COUNTRY-REGION-ORG for this host's public IP on stdout.
    Ipinfo {
        /// Per-provider timeout in seconds. Defaults to GEOPROBE_TIMEOUT_SECS or 5.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Health responder on axum: any GET returns {"status":"ok"}.
    Serve {
        /// Port to listen on. Defaults to HTTP_PORT or 8080.
        #[arg(long, short = 'p')]
        port: Option<u16>,

        #[arg(long, default_value = DEFAULT_BIND_HOST)]
        host: String,
    },

    /// Hand-rolled health responder: GET /health returns {"status":"ok"}, anything else 404.
    ServeRaw {
        /// Port to listen on. Defaults to PORT or 10000.
        #[arg(long, short = 'p')]
        port: Option<u16>,

        #[arg(long, default_value = DEFAULT_BIND_HOST)]
        host: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Command::Ipinfo { timeout_secs } => run_ipinfo(timeout_secs),
        Command::Serve { port, host } => {
            let port = port.unwrap_or_else(config::framework_port);
            run_async(framework::start(&host, port))
        }
        Command::ServeRaw { port, host } => {
            let port = port.unwrap_or_else(config::raw_port);
            run_raw(&host, port)
        }
    }
}

/// Priority: --log-level > RUST_LOG > default. Always writes to stderr so
/// stdout carries nothing but command output.
fn init_tracing(cli_filter: Option<&str>) {
    let filter = cli_filter
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

fn run_ipinfo(timeout_secs: Option<u64>) -> ExitCode {
    let timeout = timeout_secs
        .map(|secs| config::timeout_from_secs("--timeout-secs", secs))
        .unwrap_or_else(config::provider_timeout);

    let mut stdout = std::io::stdout().lock();
    report::run(|| GeoResolver::new(timeout).resolve(), &mut stdout).into()
}

fn run_async<F>(fut: F) -> ExitCode
where
    F: std::future::Future<Output = Result<(), health::ServerError>>,
{
    let result = tokio::runtime::Runtime::new()
        .map_err(health::ServerError::from)
        .and_then(|rt| rt.block_on(fut));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "failed to start health server");
            ExitCode::FAILURE
        }
    }
}

fn run_raw(host: &str, port: u16) -> ExitCode {
    let server = match RawHealthServer::bind(host, port) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start health server");
            return ExitCode::FAILURE;
        }
    };

    // Accept loop on its own thread; the main thread waits for a signal and
    // exits, taking the detached workers with it.
    thread::spawn(move || server.serve());

    run_async(async {
        health::shutdown_signal().await;
        Ok(())
    })
}
