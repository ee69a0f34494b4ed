//! The kvcache-client executable supports the following command line arguments:
//!
//! `kvcache-client put <KEY> <VALUE> [--addr IP-PORT] [--timeout-ms MS]`
//!
//!     Set the value of a string key to a string.
//!
//! `kvcache-client get <KEY> [--addr IP-PORT] [--timeout-ms MS]`
//!
//!     Print the string value of a given string key.
//!
//! `kvcache-client del <KEY> [--addr IP-PORT] [--timeout-ms MS]`
//!
//!     Remove a given string key.
//!
//! `--addr` accepts a host name or IP address and a port, with the format HOST:PORT. If
//! --addr is not specified then connect on 127.0.0.1:4000.
//! On failure the error text sent by the server (e.g. "Data Error: Key does not exist") is
//! printed on stderr and the exit code is non-zero.
//!
//! `kvcache-client -V`
//!
//!     Print the version.

use std::process::exit;
use std::time::Duration;

use clap::{crate_version, value_t, App, Arg, ArgMatches, SubCommand};
use kvcache::{KvsClient, KvsError, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_ADDRESS: &str = "127.0.0.1:4000";

/// the request to send, parsed from the command line
#[derive(Debug)]
enum Command {
    Put { key: String, value: String },
    Get { key: String },
    Del { key: String },
}

fn main() {
    // configure a subscriber that will log messages to STDERR
    subscriber_config();

    let key_arg = || Arg::with_name("KEY").required(true).index(1);
    let matches = App::new("kvcache-client")
        .version(crate_version!())
        .author("strohs <strohs1@gmail.com>")
        .about("a client for the kvcache key-value server")
        .subcommands(vec![
            SubCommand::with_name("put")
                .about("Set the value of a string key to a string")
                .arg(key_arg())
                .arg(Arg::with_name("VALUE").required(true).index(2)),
            SubCommand::with_name("get")
                .about("Get the string value of a given string key")
                .arg(key_arg()),
            SubCommand::with_name("del")
                .about("Removes a given key")
                .arg(key_arg()),
        ])
        .arg(Arg::with_name("addr")
            .long("addr")
            .value_name("HOST:PORT")
            .help("sets the HOST:PORT of the server to connect to")
            .default_value(DEFAULT_ADDRESS)
            .global(true))
        .arg(Arg::with_name("timeout-ms")
            .long("timeout-ms")
            .value_name("MS")
            .help("gives up on the server after MS milliseconds")
            .global(true))
        .get_matches();

    if let Err(e) = parse_options(&matches).and_then(|(client, cmd)| run(client, cmd)) {
        eprintln!("{}", e);
        exit(1);
    }
}

/// builds the client and the command to run from the parsed command line
fn parse_options(matches: &ArgMatches) -> Result<(KvsClient, Command)> {
    let (name, args) = match matches.subcommand() {
        (name, Some(args)) => (name, args),
        _ => return Err(KvsError::Parsing("a command is required: put, get or del".to_string())),
    };

    let addr = args
        .value_of("addr")
        .or_else(|| matches.value_of("addr"))
        .unwrap_or(DEFAULT_ADDRESS);
    let mut client = KvsClient::new(addr);
    if args.is_present("timeout-ms") {
        let ms = value_t!(args, "timeout-ms", u64).map_err(|e| KvsError::Parsing(e.message))?;
        client = client.with_timeout(Duration::from_millis(ms));
    }

    let key = args.value_of("KEY").unwrap_or_default().to_string();
    let cmd = match name {
        "put" => Command::Put {
            key,
            value: args.value_of("VALUE").unwrap_or_default().to_string(),
        },
        "get" => Command::Get { key },
        "del" => Command::Del { key },
        other => return Err(KvsError::Parsing(format!("unknown command {}", other))),
    };
    Ok((client, cmd))
}

/// runs the specified command on the [`KvsClient`]
fn run(client: KvsClient, cmd: Command) -> Result<()> {
    match cmd {
        Command::Put { key, value } => client.put(&key, &value),
        Command::Get { key } => {
            println!("{}", client.get(&key)?);
            Ok(())
        }
        Command::Del { key } => client.del(&key),
    }
}

/// configures a tracing subscriber that will log to STDERR.
/// Only warnings are shown unless `RUST_LOG` says otherwise
fn subscriber_config() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting tracing default subscriber failed");
}
