//! Command handlers module for sandbox-ftpd.
//!
//! This module defines handler functions for FTP commands: authentication,
//! navigation, file operations, data channel arming and transfers. Every
//! handler writes its own replies, since transfers answer twice (150 then
//! 226/4xx).

use std::fs;
use std::io;

use chrono::Local;
use log::error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::VERSION;
use crate::error::{StorageError, TransferError};
use crate::protocol::encoding::TextEncoding;
use crate::protocol::responses::*;
use crate::protocol::{Command, CommandStatus};
use crate::server::ServerContext;
use crate::session::{RenameSource, Session};
use crate::storage::{VirtualFs, list_current, operations};
use crate::transfer::file_ops::{
    open_for_retrieve, open_for_store, receive_file, send_file, send_listing, store_write_mode,
};
use crate::transfer::{
    DataChannelConfig, TransferMode, bind_passive_listener, format_pasv_address, open_data_channel,
    parse_port_argument,
};
use crate::utils::advertised_address;

/// Dispatches a parsed command to its handler.
///
/// Commands other than USER, PASS, QUIT, FEAT, SYST, OPTS and NOOP are
/// refused with 530 until the session has logged in. An `Err` means the
/// control connection itself failed.
pub async fn handle_command<W>(
    session: &mut Session,
    ctx: &ServerContext,
    command: Command,
    out: &mut W,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    if command.requires_login() && !session.is_logged_in() {
        return respond(session, out, NOT_LOGGED_IN, "Not logged in").await;
    }

    match command {
        Command::QUIT => handle_cmd_quit(session, out).await,
        Command::FEAT => handle_cmd_feat(session, out).await,
        Command::SYST => respond(session, out, SYSTEM_TYPE, "UNIX Type: L8").await,
        Command::OPTS(option) => handle_cmd_opts(session, out, &option).await,
        Command::NOOP => respond(session, out, OK, "NOOP command successful").await,
        Command::USER(user) => handle_cmd_user(session, out, &user).await,
        Command::PASS(password) => handle_cmd_pass(session, ctx, out, &password).await,
        Command::PORT(arg) => handle_cmd_port(session, out, &arg).await,
        Command::PASV => handle_cmd_pasv(session, ctx, out).await,
        Command::TYPE(arg) => handle_cmd_type(session, out, &arg).await,
        Command::PWD => handle_cmd_pwd(session, out).await,
        Command::CWD(path) => handle_cmd_cwd(session, out, &path).await,
        Command::CDUP => handle_cmd_cwd(session, out, "..").await,
        Command::MKD(path) => handle_cmd_mkd(session, out, &path).await,
        Command::DELE(path) => handle_cmd_dele(session, out, &path).await,
        Command::RMD(path) => handle_cmd_rmd(session, out, &path).await,
        Command::RNFR(path) => handle_cmd_rnfr(session, out, &path).await,
        Command::RNTO(path) => handle_cmd_rnto(session, out, &path).await,
        Command::REST(arg) => handle_cmd_rest(session, out, &arg).await,
        Command::SIZE(path) => handle_cmd_size(session, out, &path).await,
        Command::MDTM(path) => handle_cmd_mdtm(session, out, &path).await,
        Command::LIST => handle_cmd_list(session, ctx, out).await,
        Command::RETR(path) => handle_cmd_retr(session, ctx, out, &path).await,
        Command::STOR(path) => handle_cmd_store(session, ctx, out, &path, false).await,
        Command::APPE(path) => handle_cmd_store(session, ctx, out, &path, true).await,
        Command::XINFO => handle_cmd_xinfo(session, ctx, out).await,
        Command::INVALID(verb) => {
            let text = format!("{verb}: command requires a parameter");
            respond(session, out, ARGUMENT_ERROR, &text).await
        }
        Command::UNKNOWN(verb) => {
            let text = format!("{verb} not understood");
            respond(session, out, SYNTAX_ERROR, &text).await
        }
    }
}

/// Send a single-line reply and derive the command status from its code.
async fn respond<W>(
    session: &mut Session,
    out: &mut W,
    code: u16,
    text: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    session.reply(out, Reply::new(code, text)).await?;
    if code < 400 {
        Ok(CommandStatus::Success)
    } else {
        Ok(CommandStatus::Failure(format!("{code} {text}")))
    }
}

/// Sandbox of a logged-in session. Handlers only run after the login gate,
/// so a missing sandbox is reported as not logged in.
fn sandbox(session: &Session) -> Result<&VirtualFs, (u16, String)> {
    session
        .vfs()
        .ok_or_else(|| (NOT_LOGGED_IN, "Not logged in".to_string()))
}

async fn respond_result<W>(
    session: &mut Session,
    out: &mut W,
    result: Result<(u16, String), (u16, String)>,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let (code, text) = match result {
        Ok(reply) | Err(reply) => reply,
    };
    respond(session, out, code, &text).await
}

// --------------------
// Session commands
// --------------------

async fn handle_cmd_quit<W>(session: &mut Session, out: &mut W) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    session.reply(out, Reply::new(GOODBYE, "Goodbye.")).await?;
    Ok(CommandStatus::CloseConnection)
}

async fn handle_cmd_feat<W>(session: &mut Session, out: &mut W) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let lines = ["Features:", " SIZE", " MDTM", " PASV", " REST STREAM", " UTF8", "End"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    session.reply(out, Reply::multiline(SYSTEM_STATUS, lines)).await?;
    Ok(CommandStatus::Success)
}

async fn handle_cmd_opts<W>(
    session: &mut Session,
    out: &mut W,
    option: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let normalized = option
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();

    match normalized.as_str() {
        "UTF8 ON" => {
            session.set_encoding(TextEncoding::Utf8);
            respond(session, out, OK, "UTF8 mode enabled").await
        }
        "UTF8 OFF" => {
            session.set_encoding(TextEncoding::Latin1);
            respond(session, out, OK, "UTF8 mode disabled").await
        }
        _ => respond(session, out, ARGUMENT_ERROR, "Option not understood").await,
    }
}

async fn handle_cmd_xinfo<W>(
    session: &mut Session,
    ctx: &ServerContext,
    out: &mut W,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let census = ctx.registry.census(VERSION);
    session.reply(out, Reply::multiline(SYSTEM_STATUS, census)).await?;
    Ok(CommandStatus::Success)
}

// --------------------
// Authentication
// --------------------

async fn handle_cmd_user<W>(
    session: &mut Session,
    out: &mut W,
    user: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    session.begin_login(user);
    let text = format!("Password required for {user}");
    respond(session, out, PASSWORD_REQUIRED, &text).await
}

async fn handle_cmd_pass<W>(
    session: &mut Session,
    ctx: &ServerContext,
    out: &mut W,
    password: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let Some(user) = session.pending_user().map(str::to_string) else {
        return respond(session, out, NOT_LOGGED_IN, "Login with USER first.").await;
    };

    let account = match ctx.credentials.lookup(&user, password) {
        Ok(Some(account)) => account,
        Ok(None) => {
            session.fail_login();
            session.log().warn(&format!("Failed login for {user}"));
            return respond(session, out, NOT_LOGGED_IN, "Login incorrect.").await;
        }
        Err(e) => {
            session.fail_login();
            session.log().error(&format!("Credential lookup for {user} failed: {e}"));
            return respond(session, out, e.reply_code(), "Login incorrect.").await;
        }
    };

    match VirtualFs::new(&account.home) {
        Ok(vfs) => {
            let text = format!("User {} logged in", account.login);
            session.complete_login(account, vfs);
            session.log().info(&text);
            respond(session, out, LOGIN_SUCCESS, &text).await
        }
        Err(e) => {
            session.fail_login();
            session.log().error(&format!("Cannot open home of {user}: {e}"));
            respond(session, out, NOT_LOGGED_IN, "Login incorrect.").await
        }
    }
}

// --------------------
// Data channel arming
// --------------------

async fn handle_cmd_port<W>(
    session: &mut Session,
    out: &mut W,
    arg: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    match parse_port_argument(arg) {
        Ok(addr) => {
            session.arm(DataChannelConfig::Active(addr));
            let text = format!("PORT command successful ({addr})");
            respond(session, out, OK, &text).await
        }
        Err(e) => {
            session.log().warn(&e.to_string());
            respond(session, out, e.reply_code(), "Illegal PORT command").await
        }
    }
}

async fn handle_cmd_pasv<W>(
    session: &mut Session,
    ctx: &ServerContext,
    out: &mut W,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let ip = match session.advertised_ip() {
        Some(ip) => ip,
        None => {
            let resolved = advertised_address(
                ctx.config.pasv_address.as_deref(),
                session.peer_addr().ip(),
                session.local_addr().ip(),
                &ctx.public_address,
            )
            .await;
            match resolved {
                Ok(ip) => {
                    session.set_advertised_ip(ip);
                    ip
                }
                Err(e) => {
                    session.log().error(&e.to_string());
                    let text = "Could not determine passive address";
                    return respond(session, out, e.reply_code(), text).await;
                }
            }
        }
    };

    if let Some(port) = session.data_channel().passive_port() {
        let text = format!("Entering Passive Mode {}.", format_pasv_address(ip, port));
        return respond(session, out, ENTERING_PASSIVE, &text).await;
    }

    let bind_ip = match ctx.config.data_bind_ip() {
        Ok(ip) => ip,
        Err(_) => {
            session
                .log()
                .error(&format!("Invalid bind address {}", ctx.config.bind_address));
            return respond(session, out, FILE_UNAVAILABLE, "Could not open serversocket").await;
        }
    };

    match bind_passive_listener(bind_ip, ctx.config.passive_ports()).await {
        Ok((listener, port)) => {
            session.arm(DataChannelConfig::Passive { listener, port });
            let text = format!("Entering Passive Mode {}.", format_pasv_address(ip, port));
            respond(session, out, ENTERING_PASSIVE, &text).await
        }
        Err(e) => {
            if let TransferError::NoAvailablePort { .. } = e {
                error!(
                    "Unable to open serversocket for {} ({}); census: {}",
                    session.peer_addr(),
                    e,
                    ctx.registry.census(VERSION).join(" | ")
                );
            }
            session.log().error(&e.to_string());
            respond(session, out, e.reply_code(), "Could not open serversocket").await
        }
    }
}

async fn handle_cmd_type<W>(
    session: &mut Session,
    out: &mut W,
    arg: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    match TransferMode::from_type_argument(arg) {
        Some(mode) => {
            session.set_transfer_mode(mode);
            let text = format!("Type set to {}", mode.type_code());
            respond(session, out, OK, &text).await
        }
        None => {
            let text = format!("Type {arg} not implemented");
            respond(session, out, PARAMETER_NOT_IMPLEMENTED, &text).await
        }
    }
}

async fn handle_cmd_rest<W>(
    session: &mut Session,
    out: &mut W,
    arg: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    match arg.parse::<u64>() {
        Ok(offset) => {
            session.set_restart_offset(offset);
            let text = format!("Restarting at position {offset}, now issue STOR or RETR!");
            respond(session, out, PENDING_FURTHER_INFO, &text).await
        }
        Err(_) => respond(session, out, INVALID_RESTART, "Invalid REST parameter").await,
    }
}

// --------------------
// Navigation and metadata
// --------------------

async fn handle_cmd_pwd<W>(session: &mut Session, out: &mut W) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let result = sandbox(session)
        .map(|vfs| (PATH_CREATED, format!("\"{}\" is current directory.", vfs.current_dir())));
    respond_result(session, out, result).await
}

async fn handle_cmd_cwd<W>(
    session: &mut Session,
    out: &mut W,
    path: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let result = match session.vfs_mut() {
        Some(vfs) => vfs
            .change_dir(path)
            .map(|()| (FILE_ACTION_OK, "CWD command successful.".to_string()))
            .map_err(|e| (e.reply_code(), e.to_string())),
        None => Err((NOT_LOGGED_IN, "Not logged in".to_string())),
    };
    respond_result(session, out, result).await
}

async fn handle_cmd_size<W>(
    session: &mut Session,
    out: &mut W,
    path: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let result = sandbox(session).and_then(|vfs| {
        operations::file_size(vfs, path)
            .map(|size| (FILE_STATUS, size.to_string()))
            .map_err(|e| (e.reply_code(), e.to_string()))
    });
    respond_result(session, out, result).await
}

async fn handle_cmd_mdtm<W>(
    session: &mut Session,
    out: &mut W,
    path: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let result = sandbox(session).and_then(|vfs| {
        operations::modification_time(vfs, path)
            .map(|stamp| (FILE_STATUS, stamp))
            .map_err(|e| (e.reply_code(), e.to_string()))
    });
    respond_result(session, out, result).await
}

// --------------------
// Mutations
// --------------------

async fn handle_cmd_mkd<W>(
    session: &mut Session,
    out: &mut W,
    path: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let result = sandbox(session).and_then(|vfs| match operations::make_directory(vfs, path) {
        Ok(_) => Ok((
            PATH_CREATED,
            format!("\"{path}\" - Directory created successfully"),
        )),
        Err(StorageError::Io(_)) => Err((
            FILE_UNAVAILABLE,
            format!("{path}: Unable to create directory"),
        )),
        Err(e) => Err((e.reply_code(), e.to_string())),
    });
    respond_result(session, out, result).await
}

async fn handle_cmd_dele<W>(
    session: &mut Session,
    out: &mut W,
    path: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let result = sandbox(session).and_then(|vfs| {
        operations::delete_file(vfs, path)
            .map(|()| (FILE_ACTION_OK, "File deleted".to_string()))
            .map_err(|e| (e.reply_code(), e.to_string()))
    });
    respond_result(session, out, result).await
}

async fn handle_cmd_rmd<W>(
    session: &mut Session,
    out: &mut W,
    path: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let result = sandbox(session).and_then(|vfs| match operations::remove_directory(vfs, path) {
        Ok(()) => Ok((FILE_ACTION_OK, "Directory removed".to_string())),
        Err(StorageError::DirectoryNotEmpty { entries, .. }) => Err((
            FILE_UNAVAILABLE,
            format!("Directory remove failed. There are {entries} files/dirs in there"),
        )),
        Err(e) => Err((e.reply_code(), e.to_string())),
    });
    respond_result(session, out, result).await
}

async fn handle_cmd_rnfr<W>(
    session: &mut Session,
    out: &mut W,
    path: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let source = match sandbox(session) {
        Ok(vfs) => match vfs.resolve(path) {
            Ok(real) => RenameSource::Resolved(real),
            Err(_) => RenameSource::Unresolved(path.to_string()),
        },
        Err(reply) => return respond_result(session, out, Err(reply)).await,
    };
    session.set_rename_from(source);
    respond(session, out, PENDING_FURTHER_INFO, "OK, now issue a RNTO").await
}

async fn handle_cmd_rnto<W>(
    session: &mut Session,
    out: &mut W,
    path: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let wrong_names = (
        NAME_NOT_ALLOWED,
        "Could not rename file. Probably wrong name(s)".to_string(),
    );

    let result = match session.take_rename_from() {
        None => Err((BAD_SEQUENCE, "RNFR required first".to_string())),
        Some(RenameSource::Unresolved(_)) => Err(wrong_names),
        Some(RenameSource::Resolved(from)) => sandbox(session).and_then(|vfs| {
            match operations::rename_path(vfs, &from, path) {
                Ok(_) => Ok((FILE_ACTION_OK, "File renamed successfully".to_string())),
                Err(StorageError::Io(_)) => {
                    Err((NAME_NOT_ALLOWED, "Unable to rename file".to_string()))
                }
                Err(_) => Err(wrong_names),
            }
        }),
    };
    respond_result(session, out, result).await
}

// --------------------
// Transfers
// --------------------

/// Take the one-shot arming. Replies 425 and returns `None` when unarmed.
async fn take_arming<W>(session: &mut Session, out: &mut W) -> io::Result<Option<DataChannelConfig>>
where
    W: AsyncWrite + Unpin,
{
    let arming = session.take_data_channel();
    if arming.is_unarmed() {
        session.reply(
            out,
            Reply::new(
                CANT_OPEN_DATA,
                "Unable to build data connection! Neither active nor passive chosen",
            ),
        )
        .await?;
        return Ok(None);
    }
    Ok(Some(arming))
}

/// Open the data connection, replying 425 on failure.
async fn connect_data<W>(
    session: &mut Session,
    ctx: &ServerContext,
    out: &mut W,
    arming: DataChannelConfig,
) -> io::Result<Option<TcpStream>>
where
    W: AsyncWrite + Unpin,
{
    let result = open_data_channel(
        arming,
        session.peer_addr().ip(),
        ctx.config.pasv_promiscuous,
        ctx.config.pasv_timeout(),
    )
    .await;

    match result {
        Ok(stream) => Ok(Some(stream)),
        Err(e) => {
            session.log().warn(&e.to_string());
            let text = format!("Unable to build data connection! {e}");
            session.reply(out, Reply::new(e.reply_code(), text)).await?;
            Ok(None)
        }
    }
}

fn data_failure(code: u16, text: String) -> CommandStatus {
    CommandStatus::Failure(format!("{code} {text}"))
}

async fn handle_cmd_list<W>(
    session: &mut Session,
    ctx: &ServerContext,
    out: &mut W,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let Some(arming) = take_arming(session, out).await? else {
        return Ok(data_failure(CANT_OPEN_DATA, "not armed".into()));
    };

    let listing = match sandbox(session) {
        Ok(vfs) => list_current(vfs, Local::now()).map_err(|e| (e.reply_code(), e.to_string())),
        Err(reply) => Err(reply),
    };
    let lines = match listing {
        Ok(lines) => lines,
        Err(reply) => return respond_result(session, out, Err(reply)).await,
    };

    let Some(mut stream) = connect_data(session, ctx, out, arming).await? else {
        return Ok(data_failure(CANT_OPEN_DATA, "no data connection".into()));
    };

    session
        .reply(out, Reply::new(OPENING_DATA, "Here comes the directory listing"))
        .await?;

    let sent = send_listing(&lines, &mut stream, session.encoding()).await;
    let _ = stream.shutdown().await;
    drop(stream);

    match sent {
        Ok(_) => respond(session, out, TRANSFER_COMPLETE, "Transfer complete.").await,
        Err(e) => {
            session.log().error(&format!("LIST aborted: {e}"));
            let text = format!("Transfer aborted {e}");
            respond(session, out, TRANSFER_ABORTED, &text).await
        }
    }
}

async fn handle_cmd_retr<W>(
    session: &mut Session,
    ctx: &ServerContext,
    out: &mut W,
    path: &str,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let Some(arming) = take_arming(session, out).await? else {
        return Ok(data_failure(CANT_OPEN_DATA, "not armed".into()));
    };
    let offset = session.take_restart_offset();

    let resolved = sandbox(session).and_then(|vfs| {
        let real = vfs.resolve(path).map_err(|e| (e.reply_code(), e.to_string()))?;
        match fs::metadata(&real) {
            Ok(meta) if meta.is_file() => Ok((real, meta.len())),
            _ => Err((FILE_UNAVAILABLE, StorageError::NotAFile(path.to_string()).to_string())),
        }
    });
    let (real, length) = match resolved {
        Ok(found) => found,
        Err(reply) => return respond_result(session, out, Err(reply)).await,
    };

    let Some(mut stream) = connect_data(session, ctx, out, arming).await? else {
        return Ok(data_failure(CANT_OPEN_DATA, "no data connection".into()));
    };

    let mut file = match open_for_retrieve(&real, offset).await {
        Ok(file) => file,
        Err(e) => {
            session.log().error(&format!("Cannot open {}: {e}", real.display()));
            let text = format!("{path}: Permission denied");
            return respond(session, out, FILE_UNAVAILABLE, &text).await;
        }
    };

    let text = format!("Opening data connection for file {path} ({length} bytes)");
    session.reply(out, Reply::new(OPENING_DATA, text)).await?;

    let sent = send_file(&mut file, &mut stream, ctx.config.buffer_size).await;
    let _ = stream.shutdown().await;
    drop(stream);

    match sent {
        Ok(stats) => {
            session.log().info(&format!(
                "Sent {} ({} bytes from offset {offset})",
                real.display(),
                stats.bytes
            ));
            respond(session, out, TRANSFER_COMPLETE, &stats.completion_message()).await
        }
        Err(e) => {
            session.log().error(&format!("RETR {path} aborted: {e}"));
            let text = format!("Transfer aborted {e}");
            respond(session, out, TRANSFER_ABORTED, &text).await
        }
    }
}

async fn handle_cmd_store<W>(
    session: &mut Session,
    ctx: &ServerContext,
    out: &mut W,
    path: &str,
    append: bool,
) -> io::Result<CommandStatus>
where
    W: AsyncWrite + Unpin,
{
    let Some(arming) = take_arming(session, out).await? else {
        return Ok(data_failure(CANT_OPEN_DATA, "not armed".into()));
    };
    let offset = session.take_restart_offset();

    let resolved = sandbox(session).and_then(|vfs| {
        let real = vfs
            .resolve_target(path)
            .map_err(|e| (e.reply_code(), e.to_string()))?;
        if real.is_dir() {
            return Err((FILE_UNAVAILABLE, StorageError::NotAFile(path.to_string()).to_string()));
        }
        Ok(real)
    });
    let real = match resolved {
        Ok(real) => real,
        Err(reply) => return respond_result(session, out, Err(reply)).await,
    };

    let current_len = fs::metadata(&real).ok().filter(|m| m.is_file()).map(|m| m.len());
    let write_mode = match store_write_mode(append, offset, current_len) {
        Ok(mode) => mode,
        Err(e) => {
            session.log().warn(&format!("STOR {path} refused: {e}"));
            let text = format!("Invalid REST parameter: {e}");
            return respond(session, out, e.reply_code(), &text).await;
        }
    };

    let Some(mut stream) = connect_data(session, ctx, out, arming).await? else {
        return Ok(data_failure(CANT_OPEN_DATA, "no data connection".into()));
    };

    let mut file = match open_for_store(&real, write_mode).await {
        Ok(file) => file,
        Err(e) => {
            session.log().error(&format!("Cannot write {}: {e}", real.display()));
            let text = format!("{path}: Permission denied");
            return respond(session, out, FILE_UNAVAILABLE, &text).await;
        }
    };

    let mode = session.transfer_mode();
    let label = match mode {
        TransferMode::Binary => "BINARY",
        TransferMode::Text => "ASCII",
    };
    let text = format!("Opening {label} mode data connection for file {path}");
    session.reply(out, Reply::new(OPENING_DATA, text)).await?;

    let received = receive_file(&mut stream, &mut file, mode, ctx.config.buffer_size).await;
    drop(stream);
    drop(file);

    match received {
        Ok(stats) => {
            session.log().info(&format!(
                "Stored {} ({} bytes, {:?})",
                real.display(),
                stats.bytes,
                write_mode
            ));
            respond(session, out, TRANSFER_COMPLETE, &stats.completion_message()).await
        }
        Err(e) => {
            session.log().error(&format!("STOR {path} aborted: {e}"));
            let text = format!("Transfer aborted {e}");
            respond(session, out, TRANSFER_ABORTED, &text).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FileCredentialStore;
    use crate::config::ServerConfig;
    use crate::protocol::parse_command;
    use crate::utils::SessionLog;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        ctx: ServerContext,
        session: Session,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("accounts.txt"), "alice secret\n").unwrap();
            let config = ServerConfig {
                bind_address: "127.0.0.1".into(),
                ftp_home: dir.path().to_path_buf(),
                pasv_port_min: 0,
                pasv_port_max: 0,
                disable_logging: true,
                ..ServerConfig::default()
            };
            let credentials = Arc::new(FileCredentialStore::new(dir.path()));
            let ctx = ServerContext::new(config, credentials);
            let session = Session::new(
                "127.0.0.1:50000".parse().unwrap(),
                "127.0.0.1:21".parse().unwrap(),
                SessionLog::disabled("test"),
            );
            Self {
                _dir: dir,
                ctx,
                session,
            }
        }

        async fn send(&mut self, line: &str) -> (CommandStatus, String) {
            let mut out = Vec::new();
            let status = handle_command(&mut self.session, &self.ctx, parse_command(line), &mut out)
                .await
                .unwrap();
            (status, String::from_utf8(out).unwrap())
        }

        async fn logged_in() -> Self {
            let mut fixture = Self::new();
            fixture.send("USER alice").await;
            let (_, reply) = fixture.send("PASS secret").await;
            assert_eq!(reply, "230 User alice logged in\r\n");
            fixture
        }

        fn home(&self) -> std::path::PathBuf {
            self.session.vfs().unwrap().root().to_path_buf()
        }
    }

    #[tokio::test]
    async fn commands_are_refused_before_login() {
        let mut f = Fixture::new();
        for line in ["PWD", "PASV", "LIST", "XINFO", "BOGUS"] {
            let (status, reply) = f.send(line).await;
            assert_eq!(reply, "530 Not logged in\r\n", "{line}");
            assert!(matches!(status, CommandStatus::Failure(_)));
        }
        assert_eq!(f.send("SYST").await.1, "215 UNIX Type: L8\r\n");
        assert!(f.send("NOOP").await.1.starts_with("200 "));
    }

    #[tokio::test]
    async fn pass_without_user_and_wrong_password() {
        let mut f = Fixture::new();
        assert!(f.send("PASS secret").await.1.starts_with("530 "));

        assert!(f.send("USER alice").await.1.starts_with("331 "));
        assert_eq!(f.send("PASS wrong").await.1, "530 Login incorrect.\r\n");
        assert!(!f.session.is_logged_in());

        f.send("USER alice").await;
        assert!(f.send("PASS secret").await.1.starts_with("230 "));
    }

    #[tokio::test]
    async fn quit_closes_the_connection() {
        let mut f = Fixture::new();
        let (status, reply) = f.send("QUIT").await;
        assert_eq!(status, CommandStatus::CloseConnection);
        assert_eq!(reply, "221 Goodbye.\r\n");
    }

    #[tokio::test]
    async fn feat_lists_extensions() {
        let mut f = Fixture::new();
        let reply = f.send("FEAT").await.1;
        assert_eq!(
            reply,
            "211-Features:\r\n SIZE\r\n MDTM\r\n PASV\r\n REST STREAM\r\n UTF8\r\n211 End\r\n"
        );
    }

    #[tokio::test]
    async fn opts_switches_encoding() {
        let mut f = Fixture::new();
        assert!(f.send("OPTS utf8 off").await.1.starts_with("200 "));
        assert_eq!(f.session.encoding(), TextEncoding::Latin1);
        assert!(f.send("OPTS UTF8 ON").await.1.starts_with("200 "));
        assert_eq!(f.session.encoding(), TextEncoding::Utf8);
        assert!(f.send("OPTS MLST type").await.1.starts_with("501 "));
    }

    #[tokio::test]
    async fn unknown_and_incomplete_commands() {
        let mut f = Fixture::logged_in().await;
        assert_eq!(f.send("SITE CHMOD").await.1, "500 SITE not understood\r\n");
        assert!(f.send("RETR").await.1.starts_with("501 "));
    }

    #[tokio::test]
    async fn type_and_rest_replies() {
        let mut f = Fixture::logged_in().await;
        assert_eq!(f.send("TYPE I").await.1, "200 Type set to I\r\n");
        assert_eq!(f.session.transfer_mode(), TransferMode::Binary);
        assert!(f.send("TYPE E").await.1.starts_with("504 "));

        assert_eq!(
            f.send("REST 50").await.1,
            "350 Restarting at position 50, now issue STOR or RETR!\r\n"
        );
        assert_eq!(f.send("REST -1").await.1, "554 Invalid REST parameter\r\n");
        assert_eq!(f.session.take_restart_offset(), 50);
    }

    #[tokio::test]
    async fn navigation_round_trip() {
        let mut f = Fixture::logged_in().await;
        assert_eq!(f.send("PWD").await.1, "257 \"/\" is current directory.\r\n");
        assert!(f.send("MKD docs").await.1.starts_with("257 \"docs\""));
        assert_eq!(f.send("CWD docs").await.1, "250 CWD command successful.\r\n");
        assert_eq!(f.send("XPWD").await.1, "257 \"/docs\" is current directory.\r\n");
        assert!(f.send("CDUP").await.1.starts_with("250 "));
        assert!(f.send("CDUP").await.1.starts_with("550 "));
        assert_eq!(f.send("PWD").await.1, "257 \"/\" is current directory.\r\n");
        assert!(f.send("CWD ../../etc").await.1.starts_with("550 "));
    }

    #[tokio::test]
    async fn file_metadata_and_removal() {
        let mut f = Fixture::logged_in().await;
        let home = f.home();
        fs::write(home.join("data.bin"), vec![7u8; 200]).unwrap();
        fs::create_dir_all(home.join("full/inner")).unwrap();

        assert_eq!(f.send("SIZE data.bin").await.1, "213 200\r\n");
        assert!(f.send("MDTM data.bin").await.1.starts_with("213 "));
        assert!(f.send("SIZE full").await.1.starts_with("550 "));
        assert_eq!(
            f.send("RMD full").await.1,
            "550 Directory remove failed. There are 1 files/dirs in there\r\n"
        );
        assert!(f.send("RM full/inner").await.1.starts_with("250 "));
        assert!(f.send("DELE full").await.1.starts_with("550 "));
        assert!(f.send("DELE data.bin").await.1.starts_with("250 "));
        assert!(!home.join("data.bin").exists());
    }

    #[tokio::test]
    async fn rename_sequence() {
        let mut f = Fixture::logged_in().await;
        let home = f.home();
        fs::write(home.join("a.txt"), b"x").unwrap();

        assert_eq!(f.send("RNTO b.txt").await.1, "503 RNFR required first\r\n");

        assert!(f.send("RNFR missing").await.1.starts_with("350 "));
        assert_eq!(
            f.send("RNTO b.txt").await.1,
            "553 Could not rename file. Probably wrong name(s)\r\n"
        );

        assert!(f.send("RNFR a.txt").await.1.starts_with("350 "));
        assert_eq!(f.send("RNTO b.txt").await.1, "250 File renamed successfully\r\n");
        assert!(home.join("b.txt").exists());
        assert!(!home.join("a.txt").exists());

        assert_eq!(f.send("RNTO c.txt").await.1, "503 RNFR required first\r\n");

        fs::write(home.join("d.txt"), b"d").unwrap();
        assert!(f.send("RNFR b.txt").await.1.starts_with("350 "));
        assert!(f.send("RNFR d.txt").await.1.starts_with("350 "));
        assert_eq!(f.send("RNTO e.txt").await.1, "250 File renamed successfully\r\n");
        assert_eq!(fs::read(home.join("e.txt")).unwrap(), b"d");
        assert!(!home.join("d.txt").exists());
        assert_eq!(fs::read(home.join("b.txt")).unwrap(), b"x");
    }

    #[tokio::test]
    async fn malformed_port_keeps_prior_arming() {
        let mut f = Fixture::logged_in().await;
        assert!(f.send("PORT 127,0,0,1,39,16").await.1.starts_with("200 "));
        assert_eq!(f.send("PORT 1,2,3").await.1, "501 Illegal PORT command\r\n");
        assert!(matches!(
            f.session.data_channel(),
            DataChannelConfig::Active(addr) if addr.port() == 10000
        ));
    }

    #[tokio::test]
    async fn pasv_reuses_its_listener() {
        let mut f = Fixture::logged_in().await;
        let first = f.send("PASV").await.1;
        let second = f.send("PASV").await.1;
        assert!(first.starts_with("227 Entering Passive Mode (127,0,0,1,"));
        assert!(first.ends_with(").\r\n"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn transfers_without_arming_reply_425() {
        let mut f = Fixture::logged_in().await;
        for line in ["LIST", "RETR x", "STOR x", "APPE x"] {
            assert!(f.send(line).await.1.starts_with("425 "), "{line}");
        }
    }

    #[tokio::test]
    async fn xinfo_reports_the_census() {
        let mut f = Fixture::logged_in().await;
        let reply = f.send("XINFO").await.1;
        assert!(reply.starts_with("211-SysInfo:\r\n"));
        assert!(reply.contains("  Total connections: 0\r\n"));
        assert!(reply.ends_with("211 End\r\n"));
    }

    #[tokio::test]
    async fn infosys_is_an_alias_for_the_census() {
        let mut f = Fixture::logged_in().await;
        let xinfo = f.send("XINFO").await.1;
        let infosys = f.send("infosys").await.1;
        assert!(infosys.starts_with("211-SysInfo:\r\n"));
        assert_eq!(infosys, xinfo);
    }
}
