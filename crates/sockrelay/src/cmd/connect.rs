use std::net::{SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;

use sockrelay::input::InputLines;
use sockrelay_peer::{
    Client, ClientConfig, ClientSession, SessionEnd, DEFAULT_IPV4_PORT, DEFAULT_IPV6_PORT,
};
use sockrelay_transport::Endpoint;

use crate::cmd::{install_ctrlc_handler, parse_duration, ConnectArgs};
use crate::exit::{peer_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = resolve_endpoint(&args)?;
    let config = ClientConfig {
        poll_interval: Duration::from_millis(args.poll_ms),
        reply_timeout: args.reply_timeout.as_deref().map(parse_duration).transpose()?,
        ..ClientConfig::default()
    };

    let client = Client::connect_with_config(&endpoint, args.profile, config)
        .map_err(|err| peer_error("connect failed", err))?;
    install_ctrlc_handler(client.shutdown_handle())?;

    match args.command {
        Some(command) => one_shot(client, &command, format),
        None => interactive(client, format),
    }
}

fn one_shot(mut client: Client, command: &str, format: OutputFormat) -> CliResult<i32> {
    let profile = client.profile();
    let reply = client
        .request(command)
        .map_err(|err| peer_error("request failed", err))?
        .ok_or_else(|| CliError::new(FAILURE, "server closed the connection"))?;

    print_reply(profile, Some(command), &reply, format);
    client
        .close()
        .map_err(|err| peer_error("close failed", err))?;
    Ok(SUCCESS)
}

fn interactive(client: Client, format: OutputFormat) -> CliResult<i32> {
    let profile = client.profile();
    let session = ClientSession::new(client);
    let end = session
        .run(InputLines::stdin(), |reply| {
            print_reply(profile, None, reply, format)
        })
        .map_err(|err| peer_error("session failed", err))?;

    match end {
        SessionEnd::InputClosed | SessionEnd::Interrupted => Ok(SUCCESS),
        SessionEnd::ServerDown => Err(CliError::new(FAILURE, "server closed the connection")),
    }
}

fn resolve_endpoint(args: &ConnectArgs) -> CliResult<Endpoint> {
    if let Some(path) = &args.unix {
        if args.port.is_some() {
            return Err(CliError::new(USAGE, "--port does not apply to --unix"));
        }
        return Ok(Endpoint::Unix(path.clone()));
    }
    if let Some(addr) = args.ipv4 {
        let port = args.port.unwrap_or(DEFAULT_IPV4_PORT);
        return Ok(Endpoint::Tcp(SocketAddr::V4(SocketAddrV4::new(addr, port))));
    }
    if let Some(addr) = args.ipv6 {
        let port = args.port.unwrap_or(DEFAULT_IPV6_PORT);
        return Ok(Endpoint::Tcp(SocketAddr::V6(SocketAddrV6::new(
            addr, port, 0, 0,
        ))));
    }
    Err(CliError::new(USAGE, "one of --unix, --ipv4 or --ipv6 is required"))
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::path::PathBuf;

    use sockrelay_frame::ClientProfile;

    use super::*;

    fn args() -> ConnectArgs {
        ConnectArgs {
            profile: ClientProfile::A,
            unix: None,
            ipv4: None,
            ipv6: None,
            port: None,
            command: None,
            reply_timeout: None,
            poll_ms: 50,
        }
    }

    #[test]
    fn tcp_ports_default_per_family() {
        let v4 = ConnectArgs {
            ipv4: Some(Ipv4Addr::LOCALHOST),
            ..args()
        };
        assert_eq!(
            resolve_endpoint(&v4).unwrap(),
            Endpoint::Tcp(SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_IPV4_PORT)))
        );

        let v6 = ConnectArgs {
            ipv6: Some(Ipv6Addr::LOCALHOST),
            port: Some(9000),
            ..args()
        };
        assert_eq!(
            resolve_endpoint(&v6).unwrap(),
            Endpoint::Tcp(SocketAddr::from((Ipv6Addr::LOCALHOST, 9000)))
        );
    }

    #[test]
    fn port_with_unix_is_usage_error() {
        let unix = ConnectArgs {
            unix: Some(PathBuf::from("/tmp/x.sock")),
            port: Some(1),
            ..args()
        };
        assert_eq!(resolve_endpoint(&unix).unwrap_err().code, USAGE);
    }
}
