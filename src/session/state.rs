//! Module `session`
//!
//! Defines the `Session` struct: everything one control connection knows
//! about its client. A session is owned by its connection task and never
//! shared.

use std::io;
use std::mem;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::auth::Account;
use crate::protocol::encoding::TextEncoding;
use crate::protocol::responses::Reply;
use crate::storage::VirtualFs;
use crate::transfer::{DataChannelConfig, TransferMode};
use crate::utils::SessionLog;

/// Login progress of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AwaitingPassword(String),
    Authenticated(Account),
}

/// Pending RNFR source. An argument that did not resolve is remembered so
/// the following RNTO fails with the rename error rather than a sequence
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameSource {
    Resolved(PathBuf),
    Unresolved(String),
}

#[derive(Debug)]
pub struct Session {
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    auth: AuthState,
    fs: Option<VirtualFs>,
    transfer_mode: TransferMode,
    data_channel: DataChannelConfig,
    rename_from: Option<RenameSource>,
    restart_offset: u64,
    encoding: TextEncoding,
    advertised_ip: Option<Ipv4Addr>,
    log: SessionLog,
}

impl Session {
    pub fn new(peer_addr: SocketAddr, local_addr: SocketAddr, log: SessionLog) -> Self {
        Self {
            peer_addr,
            local_addr,
            auth: AuthState::Unauthenticated,
            fs: None,
            transfer_mode: TransferMode::default(),
            data_channel: DataChannelConfig::Unarmed,
            rename_from: None,
            restart_offset: 0,
            encoding: TextEncoding::default(),
            advertised_ip: None,
            log,
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    // --------------------
    // Authentication
    // --------------------

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self.auth, AuthState::Authenticated(_))
    }

    pub fn account(&self) -> Option<&Account> {
        match &self.auth {
            AuthState::Authenticated(account) => Some(account),
            _ => None,
        }
    }

    /// USER: always moves to `AwaitingPassword`, logging out first.
    pub fn begin_login(&mut self, user: &str) {
        if self.is_logged_in() {
            self.logout();
        }
        self.auth = AuthState::AwaitingPassword(user.to_string());
    }

    pub fn pending_user(&self) -> Option<&str> {
        match &self.auth {
            AuthState::AwaitingPassword(user) => Some(user),
            _ => None,
        }
    }

    /// PASS succeeded: bind the account and its sandbox.
    pub fn complete_login(&mut self, account: Account, fs: VirtualFs) {
        self.log.set_user(&account.login);
        self.fs = Some(fs);
        self.auth = AuthState::Authenticated(account);
    }

    pub fn fail_login(&mut self) {
        self.auth = AuthState::Unauthenticated;
    }

    /// Drop the account, sandbox and every pending per-command state.
    pub fn logout(&mut self) {
        self.auth = AuthState::Unauthenticated;
        self.fs = None;
        self.data_channel = DataChannelConfig::Unarmed;
        self.rename_from = None;
        self.restart_offset = 0;
    }

    // --------------------
    // Filesystem
    // --------------------

    pub fn vfs(&self) -> Option<&VirtualFs> {
        self.fs.as_ref()
    }

    pub fn vfs_mut(&mut self) -> Option<&mut VirtualFs> {
        self.fs.as_mut()
    }

    // --------------------
    // Per-command state
    // --------------------

    pub fn transfer_mode(&self) -> TransferMode {
        self.transfer_mode
    }

    pub fn set_transfer_mode(&mut self, mode: TransferMode) {
        self.transfer_mode = mode;
    }

    pub fn data_channel(&self) -> &DataChannelConfig {
        &self.data_channel
    }

    /// Replace the current arming. A previous passive listener is dropped.
    pub fn arm(&mut self, config: DataChannelConfig) {
        self.data_channel = config;
    }

    /// Take the arming for a transfer, leaving the session unarmed.
    pub fn take_data_channel(&mut self) -> DataChannelConfig {
        mem::take(&mut self.data_channel)
    }

    pub fn set_restart_offset(&mut self, offset: u64) {
        self.restart_offset = offset;
    }

    /// Read and clear the restart offset.
    pub fn take_restart_offset(&mut self) -> u64 {
        mem::take(&mut self.restart_offset)
    }

    pub fn set_rename_from(&mut self, source: RenameSource) {
        self.rename_from = Some(source);
    }

    pub fn take_rename_from(&mut self) -> Option<RenameSource> {
        self.rename_from.take()
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    pub fn advertised_ip(&self) -> Option<Ipv4Addr> {
        self.advertised_ip
    }

    pub fn set_advertised_ip(&mut self, ip: Ipv4Addr) {
        self.advertised_ip = Some(ip);
    }

    // --------------------
    // Output
    // --------------------

    pub fn log(&mut self) -> &mut SessionLog {
        &mut self.log
    }

    /// Send a reply on the control connection and record it.
    pub async fn reply<W>(&mut self, out: &mut W, reply: Reply) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        self.log.sent(&reply.to_string());
        out.write_all(&self.encoding.encode(&reply.to_wire())).await?;
        out.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::responses::OK;

    fn session() -> Session {
        Session::new(
            "127.0.0.1:50000".parse().unwrap(),
            "127.0.0.1:21".parse().unwrap(),
            SessionLog::disabled("test"),
        )
    }

    fn login(session: &mut Session) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let account = Account {
            login: "alice".into(),
            home: dir.path().to_path_buf(),
        };
        session.begin_login("alice");
        session.complete_login(account, VirtualFs::new(dir.path()).unwrap());
        dir
    }

    #[test]
    fn user_then_pass_authenticates() {
        let mut session = session();
        session.begin_login("alice");
        assert_eq!(session.pending_user(), Some("alice"));
        let _dir = login(&mut session);
        assert!(session.is_logged_in());
        assert_eq!(session.account().unwrap().login, "alice");
        assert_eq!(session.vfs().unwrap().current_dir(), "/");
    }

    #[test]
    fn user_while_authenticated_logs_out() {
        let mut session = session();
        let _dir = login(&mut session);
        session.set_restart_offset(10);

        session.begin_login("bob");
        assert!(!session.is_logged_in());
        assert!(session.vfs().is_none());
        assert_eq!(session.auth(), &AuthState::AwaitingPassword("bob".into()));
        assert_eq!(session.take_restart_offset(), 0);
    }

    #[test]
    fn restart_offset_is_read_then_cleared() {
        let mut session = session();
        session.set_restart_offset(42);
        assert_eq!(session.take_restart_offset(), 42);
        assert_eq!(session.take_restart_offset(), 0);
    }

    #[test]
    fn taking_the_arming_leaves_the_session_unarmed() {
        let mut session = session();
        session.arm(DataChannelConfig::Active("127.0.0.1:2000".parse().unwrap()));
        assert!(!session.data_channel().is_unarmed());
        assert!(matches!(session.take_data_channel(), DataChannelConfig::Active(_)));
        assert!(session.data_channel().is_unarmed());
    }

    #[tokio::test]
    async fn replies_use_the_session_encoding() {
        let mut session = session();
        session.set_encoding(TextEncoding::Latin1);
        let mut out = Vec::new();
        session.reply(&mut out, Reply::new(OK, "räk")).await.unwrap();
        assert_eq!(out, b"200 r\xe4k\r\n");
    }
}
