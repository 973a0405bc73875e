//! sandbox-ftpd - Entry Point
//!
//! Parses the command line, layers it over the file/environment
//! configuration and serves forever.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use sandbox_ftpd::auth::FileCredentialStore;
use sandbox_ftpd::utils::init_logging;
use sandbox_ftpd::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "sandbox-ftpd", version, about = "A sandboxed FTP server.")]
struct Cli {
    /// Server home: holds accounts.txt, home/ and logs/
    ftp_home: PathBuf,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control port
    #[arg(short, long)]
    port: Option<u16>,

    /// Passive port range, e.g. 8123-8129
    #[arg(long, value_parser = parse_port_range)]
    pasv_range: Option<(u16, u16)>,

    /// Address advertised in PASV replies
    #[arg(long)]
    pasv_address: Option<String>,

    /// Do not write session transcripts
    #[arg(long)]
    disable_logging: bool,
}

fn parse_port_range(value: &str) -> Result<(u16, u16), String> {
    let (min, max) = value
        .split_once('-')
        .ok_or_else(|| format!("expected MIN-MAX, got {value:?}"))?;
    let min = min.trim().parse::<u16>().map_err(|e| e.to_string())?;
    let max = max.trim().parse::<u16>().map_err(|e| e.to_string())?;
    if min > max {
        return Err(format!("{min} is greater than {max}"));
    }
    Ok((min, max))
}

impl Cli {
    /// Command-line flags win over every other configuration source.
    fn apply(self, config: &mut ServerConfig) {
        config.ftp_home = self.ftp_home;
        if let Some(port) = self.port {
            config.control_port = port;
        }
        if let Some((min, max)) = self.pasv_range {
            config.pasv_port_min = min;
            config.pasv_port_max = max;
        }
        if let Some(address) = self.pasv_address {
            config.pasv_address = Some(address);
        }
        if self.disable_logging {
            config.disable_logging = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut config =
        ServerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let accounts = config.accounts_file();
    if !accounts.is_file() {
        warn!(
            "{} not found; every login will fail until it exists",
            accounts.display()
        );
    }

    info!("Launching sandbox-ftpd v{}...", sandbox_ftpd::VERSION);

    let credentials = Arc::new(FileCredentialStore::new(config.ftp_home.clone()));
    let server = Server::bind(config, credentials)
        .await
        .context("Server startup failed")?;
    server.run().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_range_parsing() {
        assert_eq!(parse_port_range("8123-8129"), Ok((8123, 8129)));
        assert!(parse_port_range("9000-8000").is_err());
        assert!(parse_port_range("8123").is_err());
        assert!(parse_port_range("a-b").is_err());
    }

    #[test]
    fn flags_override_configuration() {
        let cli = Cli::parse_from([
            "sandbox-ftpd",
            "/srv/ftp",
            "--port",
            "2121",
            "--pasv-range",
            "40000-40010",
            "--pasv-address",
            "203.0.113.5",
            "--disable-logging",
        ]);
        let mut config = ServerConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.ftp_home, PathBuf::from("/srv/ftp"));
        assert_eq!(config.control_port, 2121);
        assert_eq!((config.pasv_port_min, config.pasv_port_max), (40000, 40010));
        assert_eq!(config.pasv_address.as_deref(), Some("203.0.113.5"));
        assert!(config.disable_logging);
    }
}
