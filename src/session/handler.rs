use log::{debug, error};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::VERSION;
use crate::protocol::responses::{READY, SERVICE_CLOSING, SYNTAX_ERROR};
use crate::protocol::{
    CommandStatus, ControlLine, Reply, handle_command, loggable_line, parse_command,
    read_control_line,
};
use crate::server::ServerContext;
use crate::session::Session;
use crate::utils::SessionLog;

/// Runs one control connection from greeting to close.
///
/// - Registers the session in the shared registry for its whole lifetime.
/// - Reads control lines under the idle timeout and dispatches them.
/// - Ends on QUIT, end of stream, timeout or any control I/O failure.
pub async fn handle_session(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<ServerContext>) {
    let local_addr = match stream.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Cannot read local address for {}: {}", peer_addr, e);
            return;
        }
    };

    let registration = ctx.registry.register(peer_addr, local_addr);
    let log_dir = ctx.config.log_dir();
    let log = SessionLog::new(&peer_addr.ip().to_string(), log_dir.as_deref());
    let mut session = Session::new(peer_addr, local_addr, log);
    session.log().info(&format!(
        "Session {} from {} on {}",
        registration.id(),
        peer_addr,
        local_addr
    ));

    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let greeting = Reply::new(READY, format!("Welcome to sandbox-ftpd v{VERSION}"));
    if let Err(e) = session.reply(&mut write_half, greeting).await {
        session.log().error(&format!("Failed to send greeting: {e}"));
        return;
    }

    loop {
        let read = timeout(
            ctx.config.session_timeout(),
            read_control_line(&mut reader, session.encoding(), ctx.config.max_command_length),
        )
        .await;

        let line = match read {
            Err(_) => {
                let _ = session
                    .reply(&mut write_half, Reply::new(SERVICE_CLOSING, "Timeout."))
                    .await;
                session.log().warn("Control connection timed out");
                break;
            }
            Ok(Err(e)) => {
                session.log().error(&format!("Failed to read command: {e}"));
                break;
            }
            Ok(Ok(None)) => {
                session.log().info("Connection closed by client");
                break;
            }
            Ok(Ok(Some(ControlLine::Overflow))) => {
                session.log().warn("Discarded overlong command line");
                let reply = Reply::new(SYNTAX_ERROR, "Command line too long");
                if let Err(e) = session.reply(&mut write_half, reply).await {
                    session.log().error(&format!("Failed to send reply: {e}"));
                    break;
                }
                continue;
            }
            Ok(Ok(Some(ControlLine::Command(line)))) => line,
        };

        if line.is_empty() {
            continue;
        }

        session.log().received(&loggable_line(&line));
        let command = parse_command(&line);

        match handle_command(&mut session, &ctx, command, &mut write_half).await {
            Ok(CommandStatus::CloseConnection) => break,
            Ok(CommandStatus::Failure(reason)) => {
                debug!("Command failed for {}: {}", peer_addr, reason)
            }
            Ok(CommandStatus::Success) => {}
            Err(e) => {
                session.log().error(&format!("Control connection failed: {e}"));
                break;
            }
        }

        registration.update(|info| {
            info.passive_port = session.data_channel().passive_port();
            info.login = session.account().map(|account| account.login.clone());
            info.root = session.vfs().map(|vfs| vfs.root().to_path_buf());
        });
    }

    session.log().info("Session closed");
}
