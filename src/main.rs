use std::{env, path::Path, sync::Arc, time::Instant};

use dotenv::dotenv;
use eyre::bail;
use ngrokscan::{
    config::Config,
    processing::Reporter,
    resolve::{self, ResolvedAddressSet},
    scanner::{Scanner, targets},
    terminal_colors::*,
    tracing::init_tracing,
};
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    // first command line argument is the location of the config file
    let args = env::args().collect::<Box<[String]>>();
    let config = match args.get(1) {
        Some(config_file) => Config::load(config_file)?,
        None if Path::new("config.toml").exists() => Config::load("config.toml")?,
        None => Config::default(),
    };

    init_tracing(&config);
    info!("Logging initialized");

    print_settings(&config);

    let hostnames = resolve::ngrok_hostnames(config.region);
    let addresses = if config.skip_resolve {
        eprintln!("Skipped resolving IP addresses");
        ResolvedAddressSet::unresolved(&hostnames)
    } else {
        eprintln!("Resolving IP addresses...");
        let resolution = resolve::resolve_all(&hostnames).await;
        for (hostname, address) in resolution.addresses.iter() {
            eprintln!("Address resolved for {hostname}: [{address}]");
        }
        for hostname in &resolution.failed {
            eprintln!("{RED}Couldn't resolve address for {hostname}{RESET}");
        }
        resolution.addresses
    };

    if addresses.is_empty() {
        bail!("couldn't resolve any of ngrok's addresses");
    }

    let endpoints = targets::generate(addresses.addresses());
    let total = endpoints.len();
    let chunks = targets::partition(endpoints, config.threads);
    eprintln!(
        "We have {BOLD}{total}{RESET} addresses to scan (~{} per worker).",
        chunks.first().map(Vec::len).unwrap_or_default()
    );

    let reporter = Arc::new(Reporter::new(&config.output, total)?);
    let scanner = Scanner::minecraft(config.scan_policy());

    let start_time = Instant::now();
    let handle = scanner.scan(chunks, reporter.clone());
    eprintln!("Scan started with {} workers!", handle.worker_count());
    info!("Scanning {total} endpoints");

    handle.join().await;

    let elapsed_secs = start_time.elapsed().as_secs();
    eprintln!(
        "{GREEN}Scan finished after {BOLD}{elapsed_secs}{RESET}{GREEN} seconds, discovered {BOLD}{}{RESET}{GREEN} servers{RESET}",
        reporter.discovered_count()
    );
    info!(
        "Finished scanning {} endpoints after {elapsed_secs} seconds, discovered {} servers",
        reporter.scanned_count(),
        reporter.discovered_count()
    );

    Ok(())
}

fn print_settings(config: &Config) {
    eprintln!();
    eprintln!(" ngrok region: {}", config.region);
    eprintln!(" No. of workers: {}", config.threads);
    eprintln!(" Ping mode: {:?}", config.ping_mode);
    eprintln!(" Protocol version number: {}", config.protocol_version);
    eprintln!(" JSON output: {}", config.output.json);
    eprintln!(" Ignore empty servers: {}", config.output.skip_empty);
    eprintln!(" Timeout (ms): {}ms", config.timeout_ms);
    eprintln!(" Discover unlisted: {}", config.force_join);
    eprintln!(" Skip ngrok IP resolve: {}", config.skip_resolve);
    if let Some(file) = &config.output.file {
        eprintln!(" Output file: {file}");
    }
    eprintln!();
}
