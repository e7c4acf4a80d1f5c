//! LAN file transfer server entry point.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use lanshare::net::advertise::ServiceAdvertiser;
use lanshare::net::{http, local_ip};
use lanshare::TransferService;

#[derive(Parser, Debug)]
#[command(name = "lanshare-server", about = "LAN file transfer service", version)]
struct Args {
    /// Port to run the server on
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Path to the configuration file (json)
    #[arg(long, default_value = "./config.json")]
    config: PathBuf,

    /// Host to run the server on
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.debug { "debug" } else { "info" }),
    )
    .init();

    log::info!("Starting LAN file transfer server");
    let service = Arc::new(TransferService::new(args.config.clone()));
    let document = service.initialize().await?;

    for diagnostic in service.diagnostics().await {
        log::warn!(
            "Store {} at {} excluded: {}",
            diagnostic.name,
            diagnostic.path.display(),
            diagnostic.error
        );
    }

    let routes = http::routes(Arc::clone(&service), document.max_file_size_bytes());

    let advertiser = match ServiceAdvertiser::register(&document.service_name, args.port) {
        Ok(advertiser) => Some(advertiser),
        Err(e) => {
            log::warn!("Service advertisement failed: {}", e);
            None
        }
    };

    let ip = local_ip();
    log::info!("==================================================");
    log::info!("{} running at:", document.service_name);
    log::info!("http://{}:{}/", ip, args.port);
    log::info!("Using configuration file: {}", args.config.display());
    log::info!("==================================================");

    let (addr, server) =
        warp::serve(routes).bind_with_graceful_shutdown((args.host, args.port), async {
            tokio::signal::ctrl_c().await.ok();
        });
    log::info!("Listening on {}", addr);
    server.await;

    if let Some(advertiser) = advertiser {
        log::info!("Unregistering service...");
        advertiser.shutdown();
    }

    Ok(())
}
