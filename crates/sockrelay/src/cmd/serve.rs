use std::net::{SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;

use sockrelay::backend::default_dispatcher;
use sockrelay_frame::LinkConfig;
use sockrelay_peer::{HandshakeConfig, ListenerConfig, Server, ServerConfig};
use sockrelay_transport::Family;
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, ServeArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_summary, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = server_config(&args)?;
    let server = Server::bind(config, default_dispatcher())
        .map_err(|err| peer_error("bind failed", err))?;

    install_ctrlc_handler(server.shutdown_handle())?;

    if let Some(path) = server.unix_path() {
        info!(path = %path.display(), "listening on unix socket");
    }
    for family in [Family::Ipv4, Family::Ipv6] {
        if let Some(addr) = server.tcp_addr(family) {
            info!(%family, %addr, "listening on tcp");
        }
    }

    let summary = server.run().map_err(|err| peer_error("server failed", err))?;
    print_summary(&summary, format);
    Ok(SUCCESS)
}

fn server_config(args: &ServeArgs) -> CliResult<ServerConfig> {
    let ipv6 = (!args.no_ipv6)
        .then(|| SocketAddr::V6(SocketAddrV6::new(args.bind_ipv6, args.ipv6_port, 0, 0)));

    Ok(ServerConfig {
        listener: ListenerConfig {
            unix_path: Some(args.socket_path.clone()),
            ipv4: Some(SocketAddr::V4(SocketAddrV4::new(args.bind_ipv4, args.ipv4_port))),
            ipv6,
        },
        poll_interval: Duration::from_millis(args.poll_ms),
        link: LinkConfig {
            max_retransmits: (args.max_retransmits > 0).then_some(args.max_retransmits),
            ..LinkConfig::default()
        },
        handshake: HandshakeConfig {
            timeout: parse_duration(&args.handshake_timeout)?,
            ..HandshakeConfig::default()
        },
    })
}
