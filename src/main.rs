mod cache;
mod config;
mod error;
mod hosts;
mod name;
mod pipeline;
mod store;

use std::fs;
use std::sync::Arc;

use clap::Parser;
use dnsrelay_resolver::ForwardResolver;
use dnsrelay_transport::UdpServer;

use cache::AnswerCache;
use config::{Args, Settings};
use hosts::HostsMap;
use pipeline::DnsHandler;

fn init_logs(debug: bool, verbose: bool) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, registry, EnvFilter};

    let default_directive = if verbose {
        format!("{}=trace", env!("CARGO_PKG_NAME"))
    } else if debug {
        format!("{}=debug", env!("CARGO_PKG_NAME"))
    } else {
        format!("{}=info", env!("CARGO_PKG_NAME"))
    };

    let _ = registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into()))
        .with(fmt::layer().with_ansi(cfg!(debug_assertions)))
        .try_init();
}

fn load_hosts(settings: &Settings) -> HostsMap {
    let Some(path) = &settings.hosts else {
        return HostsMap::default();
    };
    match fs::read_to_string(path) {
        Ok(content) => HostsMap::parse(&content),
        Err(error) => {
            tracing::warn!(path = %path.display(), "couldn't read hosts file: {error}");
            HostsMap::default()
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    init_logs(args.debug, args.verbose);

    let settings = match Settings::load(&args) {
        Ok(settings) => settings,
        Err(error) => {
            tracing::error!("couldn't load configuration: {error}");
            std::process::exit(1);
        }
    };

    if let Some(pidfile) = &settings.pidfile {
        if let Err(error) = fs::write(pidfile, std::process::id().to_string()) {
            tracing::warn!(path = %pidfile.display(), "couldn't write pidfile: {error}");
        }
    }

    let store_config = store::Config {
        url: settings.database_url.clone(),
    };
    let pool = match store_config.build().await {
        Ok(pool) => pool,
        Err(error) => {
            tracing::error!("couldn't reach the record store: {error}");
            std::process::exit(1);
        }
    };

    let hosts = Arc::new(load_hosts(&settings));
    let cache = Arc::new(AnswerCache::new(settings.cachesize));

    let listen = UdpServer::<DnsHandler>::bind(settings.bind).await?;

    let resolver = match ForwardResolver::bind(settings.forward).await {
        Ok(resolver) => Arc::new(resolver),
        Err(error) => {
            tracing::error!("couldn't open an upstream socket: {error}");
            std::process::exit(1);
        }
    };

    tokio::spawn({
        let cache = cache.clone();
        async move { cache.run_ticker().await }
    });

    tokio::spawn({
        let resolver = resolver.clone();
        let listen = listen.clone();
        async move { resolver.run_response_loop(listen).await }
    });

    let handler = DnsHandler::new(cache, hosts, pool, resolver);
    let server = UdpServer::new(listen, handler);

    tracing::info!(bind = %settings.bind, forward = %settings.forward, "listening");
    server.run().await?;

    Ok(())
}
