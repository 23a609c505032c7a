use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

/// Authoritative-and-forwarding DNS server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML configuration file, layered beneath these flags and
    /// `DNSRELAY_*` environment variables
    #[arg(short = 'c', long, env = "CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    /// Address to bind the listening socket to
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// DNS server to forward unresolved queries to
    #[arg(long)]
    pub forward: Option<SocketAddr>,

    /// Maximum number of answer sets kept in the LRU cache
    #[arg(long)]
    pub cachesize: Option<usize>,

    /// Path to a hosts(5)-formatted file consulted before the record store
    #[arg(long)]
    pub hosts: Option<PathBuf>,

    /// Connection string for the authoritative record store
    #[arg(long)]
    pub database_url: Option<String>,

    /// Write logs to FILE instead of stdout
    #[arg(long)]
    pub logfile: Option<PathBuf>,

    /// Write the process id to FILE
    #[arg(long)]
    pub pidfile: Option<PathBuf>,

    /// Run as a background process
    #[arg(short, long)]
    pub daemon: bool,

    /// Enable debug-level logging
    #[arg(long)]
    pub debug: bool,

    /// Enable verbose (trace-level) logging
    #[arg(long)]
    pub verbose: bool,
}

/// The server's resolved settings: a TOML file (if `--config-path` names
/// one) and `DNSRELAY_*`/`DATABASE_URL` environment variables supply the
/// defaults, and any flag actually passed on the command line overrides
/// both.
#[derive(Debug, serde::Deserialize)]
pub struct Settings {
    #[serde(default = "Settings::default_bind")]
    pub bind: SocketAddr,
    #[serde(default = "Settings::default_forward")]
    pub forward: SocketAddr,
    #[serde(default = "Settings::default_cachesize")]
    pub cachesize: usize,
    #[serde(default)]
    pub hosts: Option<PathBuf>,
    #[serde(default = "Settings::default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub logfile: Option<PathBuf>,
    #[serde(default)]
    pub pidfile: Option<PathBuf>,
}

impl Settings {
    fn default_bind() -> SocketAddr {
        SocketAddr::from((IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 53))
    }

    fn default_forward() -> SocketAddr {
        SocketAddr::from((IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53))
    }

    fn default_cachesize() -> usize {
        100
    }

    fn default_database_url() -> String {
        String::from("sqlite::memory:")
    }

    /// Builds the final settings by layering, from lowest to highest
    /// precedence: the TOML file at `args.config_path` (if any), the
    /// `DNSRELAY_*`/`DATABASE_URL` environment variables, then whichever
    /// fields `args` actually carries.
    pub fn load(args: &Args) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = &args.config_path {
            builder = builder.add_source(config::File::from(path.as_path()).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("DNSRELAY")
                .separator("_")
                .try_parsing(true),
        );
        // `DATABASE_URL` doesn't carry the `DNSRELAY_` prefix the other
        // variables do, so it's layered in as an explicit override.
        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database_url", database_url)?;
        }

        if let Some(bind) = args.bind {
            builder = builder.set_override("bind", bind.to_string())?;
        }
        if let Some(forward) = args.forward {
            builder = builder.set_override("forward", forward.to_string())?;
        }
        if let Some(cachesize) = args.cachesize {
            builder = builder.set_override("cachesize", cachesize as i64)?;
        }
        if let Some(hosts) = &args.hosts {
            builder = builder.set_override("hosts", hosts.display().to_string())?;
        }
        if let Some(database_url) = &args.database_url {
            builder = builder.set_override("database_url", database_url.clone())?;
        }
        if let Some(logfile) = &args.logfile {
            builder = builder.set_override("logfile", logfile.display().to_string())?;
        }
        if let Some(pidfile) = &args.pidfile {
            builder = builder.set_override("pidfile", pidfile.display().to_string())?;
        }

        builder.build()?.try_deserialize()
    }
}
