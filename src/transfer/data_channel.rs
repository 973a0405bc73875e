//! Module `data_channel`
//!
//! Tracks how the next data connection is established and opens it when a
//! transfer command runs. An arming is one-shot: it is taken out of the
//! session before the attempt, so the session is unarmed afterwards
//! whatever the outcome.

use std::net::{IpAddr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use log::{info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::error::TransferError;

/// How the next data connection will be made.
#[derive(Debug, Default)]
pub enum DataChannelConfig {
    #[default]
    Unarmed,
    /// PORT: the server dials the client.
    Active(SocketAddrV4),
    /// PASV: the client dials the server's listener.
    Passive { listener: TcpListener, port: u16 },
}

impl DataChannelConfig {
    pub fn is_unarmed(&self) -> bool {
        matches!(self, DataChannelConfig::Unarmed)
    }

    pub fn passive_port(&self) -> Option<u16> {
        match self {
            DataChannelConfig::Passive { port, .. } => Some(*port),
            _ => None,
        }
    }
}

/// Open the data connection described by `config`.
///
/// Active connections dial the recorded address within `wait`. Passive
/// connections accept exactly one client within `wait`; unless
/// `promiscuous` is set the client must connect from the control peer's
/// address. The passive listener is dropped when this returns.
pub async fn open_data_channel(
    config: DataChannelConfig,
    control_peer: IpAddr,
    promiscuous: bool,
    wait: Duration,
) -> Result<TcpStream, TransferError> {
    match config {
        DataChannelConfig::Unarmed => Err(TransferError::NotArmed),
        DataChannelConfig::Active(target) => {
            let addr = SocketAddr::V4(target);
            info!("Connecting data channel to {addr}");
            match timeout(wait, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(source)) => Err(TransferError::ConnectFailed { addr, source }),
                Err(_) => Err(TransferError::ConnectTimeout { addr, wait }),
            }
        }
        DataChannelConfig::Passive { listener, port } => {
            info!("Waiting for data connection on port {port}");
            let (stream, peer) = timeout(wait, listener.accept())
                .await
                .map_err(|_| TransferError::AcceptTimeout(wait))??;

            let actual = peer.ip().to_canonical();
            let expected = control_peer.to_canonical();
            if !promiscuous && actual != expected {
                warn!("Rejected data connection from {actual}, control peer is {expected}");
                return Err(TransferError::PeerMismatch { expected, actual });
            }

            info!("Data connection accepted from {peer}");
            Ok(stream)
        }
    }
}
