use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand};
use sockrelay_frame::ClientProfile;
use sockrelay_peer::{ShutdownFlag, DEFAULT_SOCKET_PATH};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod connect;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay server on all configured endpoints.
    Serve(ServeArgs),
    /// Connect to a server and send commands.
    Connect(ConnectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Connect(args) => connect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Unix domain socket path.
    #[arg(long, env = "SOCKRELAY_SOCKET_PATH", default_value = DEFAULT_SOCKET_PATH)]
    pub socket_path: PathBuf,
    /// IPv4 port (0 picks a free one).
    #[arg(long, env = "SOCKRELAY_IPV4_PORT", default_value_t = sockrelay_peer::DEFAULT_IPV4_PORT)]
    pub ipv4_port: u16,
    /// IPv6 port (0 picks a free one).
    #[arg(long, env = "SOCKRELAY_IPV6_PORT", default_value_t = sockrelay_peer::DEFAULT_IPV6_PORT)]
    pub ipv6_port: u16,
    /// IPv4 address to bind.
    #[arg(long, default_value_t = Ipv4Addr::UNSPECIFIED)]
    pub bind_ipv4: Ipv4Addr,
    /// IPv6 address to bind.
    #[arg(long, default_value_t = Ipv6Addr::UNSPECIFIED)]
    pub bind_ipv6: Ipv6Addr,
    /// Do not listen on IPv6.
    #[arg(long)]
    pub no_ipv6: bool,
    /// Readiness poll interval in milliseconds.
    #[arg(
        long,
        env = "SOCKRELAY_POLL_MS",
        default_value_t = 50,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_ms: u64,
    /// Failed attempts allowed per frame before giving up (0 = unbounded).
    #[arg(long, default_value_t = sockrelay_frame::DEFAULT_MAX_RETRANSMITS)]
    pub max_retransmits: u32,
    /// How long a new connection may take to send its profile (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub handshake_timeout: String,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("endpoint")
        .required(true)
        .args(["unix", "ipv4", "ipv6"])
))]
pub struct ConnectArgs {
    /// Client profile: a (log query), b (log query, compressed replies), c (system info).
    #[arg(long, short = 'p')]
    pub profile: ClientProfile,
    /// Connect over a Unix domain socket.
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = DEFAULT_SOCKET_PATH
    )]
    pub unix: Option<PathBuf>,
    /// Connect over IPv4 to this address.
    #[arg(long, value_name = "ADDR")]
    pub ipv4: Option<Ipv4Addr>,
    /// Connect over IPv6 to this address.
    #[arg(long, value_name = "ADDR")]
    pub ipv6: Option<Ipv6Addr>,
    /// TCP port. Defaults to the server's port for the chosen family.
    #[arg(long)]
    pub port: Option<u16>,
    /// Send one command, print the reply and exit.
    #[arg(long, short = 'c')]
    pub command: Option<String>,
    /// Give up waiting for a reply after this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub reply_timeout: Option<String>,
    /// Readiness poll interval in milliseconds.
    #[arg(
        long,
        env = "SOCKRELAY_POLL_MS",
        default_value_t = 50,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_ms: u64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Bring `flag` DOWN on SIGINT or SIGTERM.
pub(crate) fn install_ctrlc_handler(flag: ShutdownFlag) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if flag.trigger() {
            tracing::info!("termination requested");
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
