//! this binary starts the kvcache server
//! to see the list of options, type: `kvcache-server --help`
//!
//! Settings are read from the `--config` JSON file (if given) and then overridden by any
//! command line flag.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::thread;
use std::time::Duration;

use clap::{crate_version, value_t, App, Arg, ArgMatches};
use kvcache::{
    KvServer, KvsError, PoolKind, RayonThreadPool, Result, ServerConfig, SharedQueueThreadPool,
    SocketServer, ThreadPool,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    // set up a tracing subscriber to log to STDERR
    subscriber_config();

    // parse command line args
    let matches = App::new("kvcache-server")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("a multi-threaded key-value server with a set-associative cache")
        .arg(Arg::with_name("config")
            .long("config")
            .value_name("FILE")
            .help("reads settings from a JSON file; other flags override it"))
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("IP_ADDR:PORT")
            .help("sets the IP_ADDR:PORT that the server listens on [default: 127.0.0.1:4000]"))
        .arg(Arg::with_name("sets")
            .long("sets")
            .value_name("N")
            .help("number of cache sets [default: 100]"))
        .arg(Arg::with_name("set-capacity")
            .long("set-capacity")
            .value_name("N")
            .help("number of entries in each cache set [default: 10]"))
        .arg(Arg::with_name("threads")
            .long("threads")
            .value_name("N")
            .help("number of worker threads [default: 4]"))
        .arg(Arg::with_name("pool")
            .long("pool")
            .value_name("POOL")
            .possible_values(&["shared", "rayon"])
            .help("the thread pool implementation [default: shared]"))
        .arg(Arg::with_name("snapshot")
            .long("snapshot")
            .value_name("FILE")
            .help("restores the store from FILE at startup and writes it back periodically"))
        .get_matches();

    // validate command line options
    let (config, addr) = match build_config(&matches) {
        Ok(opt) => opt,
        Err(err) => {
            eprintln!("{}", err);
            exit(1);
        }
    };

    // start the server
    if let Err(e) = run(config, addr) {
        eprintln!("{}", e);
        exit(1);
    }
}

/// merges the config file (if any) with the command line flags and validates the result
fn build_config(matches: &ArgMatches) -> Result<(ServerConfig, SocketAddr)> {
    let mut config = match matches.value_of("config") {
        Some(path) => ServerConfig::from_file(Path::new(path))?,
        None => ServerConfig::default(),
    };

    if let Some(addr) = matches.value_of("addr") {
        config.addr = addr.to_string();
    }
    if matches.is_present("sets") {
        config.num_sets = value_t!(matches, "sets", usize).map_err(parse_err)?;
    }
    if matches.is_present("set-capacity") {
        config.set_capacity = value_t!(matches, "set-capacity", usize).map_err(parse_err)?;
    }
    if matches.is_present("threads") {
        config.threads = value_t!(matches, "threads", u32).map_err(parse_err)?;
    }
    if let Some(pool) = matches.value_of("pool") {
        config.pool = pool.parse()?;
    }
    if let Some(snapshot) = matches.value_of("snapshot") {
        config.snapshot = Some(PathBuf::from(snapshot));
    }

    let addr = config.validate()?;
    Ok((config, addr))
}

fn parse_err(e: clap::Error) -> KvsError {
    KvsError::Parsing(e.message)
}

fn run(config: ServerConfig, addr: SocketAddr) -> Result<()> {
    info!("kvcache-server {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Cache: {} sets x {} entries, {} pool with {} threads",
        config.num_sets, config.set_capacity, config.pool, config.threads
    );
    info!("Listening on {}", addr);

    let engine = KvServer::new(config.num_sets, config.set_capacity);

    if let Some(path) = &config.snapshot {
        if path.exists() {
            if let Err(e) = engine.store().restore_from_file(path) {
                warn!("could not restore store from {:?}, starting empty: {}", path, e);
            }
        }
        spawn_snapshots(
            engine.clone(),
            path.clone(),
            Duration::from_secs(config.snapshot_interval_secs),
        )?;
    }

    match config.pool {
        PoolKind::Shared => serve(engine, SharedQueueThreadPool::new(config.threads)?, addr),
        PoolKind::Rayon => serve(engine, RayonThreadPool::new(config.threads)?, addr),
    }
}

fn serve<P: ThreadPool>(engine: KvServer, pool: P, addr: SocketAddr) -> Result<()> {
    SocketServer::bind(addr, engine, pool)?.run()
}

/// writes the store to `path` every `interval`. Failures are logged and retried next time
fn spawn_snapshots(engine: KvServer, path: PathBuf, interval: Duration) -> Result<()> {
    thread::Builder::new()
        .name("kvs-snapshot".to_string())
        .spawn(move || loop {
            thread::sleep(interval);
            match engine.store().dump_to_file(&path) {
                Ok(()) => debug!("store written to {:?}", path),
                Err(e) => warn!("could not write store snapshot to {:?}: {}", path, e),
            }
            if let Some(json) = engine.cache_snapshot().to_json() {
                debug!(cache = %json, "cache contents");
            }
        })?;
    Ok(())
}

/// configures a tracing subscriber that will log to STDERR.
/// The level is taken from `RUST_LOG` and defaults to `info`
fn subscriber_config() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        // log to stderr instead of stdout
        .with_writer(std::io::stderr)
        // completes the builder.
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
