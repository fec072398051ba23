use clap::Parser;
use log::info;
use server::directory::DirectoryClient;
use server::profile::ProfileResolver;
use server::state::{AppState, Settings};
use server::{http, refresh, resolver};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind the HTTP listener to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,
    /// Port to serve the enriched listing on
    #[clap(short, long, default_value = "3000")]
    port: u16,
    /// Upstream directory API base URL
    #[clap(long, default_value = "https://api.minefort.com/v1")]
    directory_url: String,
    /// Domain suffix appended to server names for status probes
    #[clap(long, default_value = ".minefort.com")]
    server_domain: String,
    /// Port game servers answer status queries on
    #[clap(long, default_value = "25565")]
    probe_port: u16,
    /// Per-probe deadline in milliseconds
    #[clap(long, default_value = "5000")]
    probe_timeout_ms: u64,
    /// Seconds between directory refresh cycles
    #[clap(long, default_value = "30")]
    refresh_interval_secs: u64,
    /// Directory page size fetched per refresh cycle
    #[clap(long, default_value = "64")]
    page_limit: u32,
    /// Seconds between fallback resolution attempts
    #[clap(long, default_value = "5")]
    resolve_interval_secs: u64,
    /// Seconds to pause the fallback queue after a rate-limit rejection
    #[clap(long, default_value = "60")]
    cooldown_secs: u64,
    /// Java-namespace profile lookup base URL
    #[clap(long, default_value = "https://api.ashcon.app/mojang/v2/user")]
    java_profile_url: String,
    /// Bedrock-namespace profile lookup base URL
    #[clap(long, default_value = "https://api.geysermc.org/v2/xbox/gamertag")]
    bedrock_profile_url: String,
    /// Outbound HTTP timeout in milliseconds
    #[clap(long, default_value = "10000")]
    http_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let http_timeout = Duration::from_millis(args.http_timeout_ms);
    let settings = Settings {
        server_domain: args.server_domain,
        probe_port: args.probe_port,
        probe_timeout: Duration::from_millis(args.probe_timeout_ms),
        refresh_interval: Duration::from_secs(args.refresh_interval_secs),
        page_limit: args.page_limit,
        resolve_interval: Duration::from_secs(args.resolve_interval_secs),
        rate_limit_cooldown: Duration::from_secs(args.cooldown_secs),
    };

    let state = Arc::new(AppState::new(
        settings,
        DirectoryClient::new(&args.directory_url, http_timeout),
        ProfileResolver::new(
            &args.java_profile_url,
            &args.bedrock_profile_url,
            http_timeout,
        ),
    ));

    // Background loops run independently of inbound request traffic.
    let refresh_handle = tokio::spawn(refresh::run(Arc::clone(&state)));
    let resolver_handle = tokio::spawn(resolver::run(Arc::clone(&state)));

    let address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Serving enriched listing on {}", address);

    let server = axum::serve(listener, http::router(state));

    // Handle shutdown gracefully
    tokio::select! {
        result = server.into_future() => {
            result?;
        }
        result = refresh_handle => {
            if let Err(e) = result {
                eprintln!("Refresh task panicked: {}", e);
            }
        }
        result = resolver_handle => {
            if let Err(e) = result {
                eprintln!("Resolver task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
