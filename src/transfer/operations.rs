//! Transfer operations
//!
//! PORT argument parsing, PASV reply formatting and passive listener
//! binding over the configured port range.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

use log::{debug, info};
use tokio::net::TcpListener;

use crate::config::PassivePorts;
use crate::error::TransferError;

/// Parse `h1,h2,h3,h4,p1,p2` into the client's data address.
pub fn parse_port_argument(arg: &str) -> Result<SocketAddrV4, TransferError> {
    let invalid = || TransferError::InvalidPortArgument(arg.to_string());

    let fields: Vec<u8> = arg
        .split(',')
        .map(|field| field.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;

    if fields.len() != 6 {
        return Err(invalid());
    }

    let ip = Ipv4Addr::new(fields[0], fields[1], fields[2], fields[3]);
    let port = u16::from(fields[4]) * 256 + u16::from(fields[5]);
    Ok(SocketAddrV4::new(ip, port))
}

/// The parenthesized address of a `227` reply: `(a,b,c,d,p1,p2)`.
pub fn format_pasv_address(ip: Ipv4Addr, port: u16) -> String {
    let [a, b, c, d] = ip.octets();
    format!("({},{},{},{},{},{})", a, b, c, d, port >> 8, port & 0xff)
}

/// Bind a passive listener: an OS-assigned port, or the first free port of
/// the range scanning upwards.
pub async fn bind_passive_listener(
    bind_ip: IpAddr,
    ports: PassivePorts,
) -> Result<(TcpListener, u16), TransferError> {
    match ports {
        PassivePorts::Ephemeral => {
            let addr = SocketAddr::new(bind_ip, 0);
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| TransferError::PortBindingFailed { addr, source })?;
            let port = listener.local_addr()?.port();
            info!("Passive listener bound on {} (ephemeral)", SocketAddr::new(bind_ip, port));
            Ok((listener, port))
        }
        PassivePorts::Range { min, max } => {
            for port in min..=max {
                match TcpListener::bind(SocketAddr::new(bind_ip, port)).await {
                    Ok(listener) => {
                        info!("Passive listener bound on {}", SocketAddr::new(bind_ip, port));
                        return Ok((listener, port));
                    }
                    Err(e) => debug!("Passive port {port} unavailable: {e}"),
                }
            }
            Err(TransferError::NoAvailablePort { min, max })
        }
    }
}
