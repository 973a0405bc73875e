use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::auth::CredentialStore;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::server::spawner::{SessionSpawner, TokioSpawner};
use crate::session::{SessionRegistry, handle_session};
use crate::utils::PublicAddressResolver;

/// Shared state every session task can see.
pub struct ServerContext {
    pub config: ServerConfig,
    pub credentials: Arc<dyn CredentialStore>,
    pub registry: Arc<SessionRegistry>,
    pub public_address: PublicAddressResolver,
}

impl ServerContext {
    pub fn new(config: ServerConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let public_address = PublicAddressResolver::new(config.public_ip_url.clone());
        Self {
            config,
            credentials,
            registry: Arc::new(SessionRegistry::new()),
            public_address,
        }
    }
}

pub struct Server {
    listener: TcpListener,
    context: Arc<ServerContext>,
    spawner: Box<dyn SessionSpawner>,
}

impl Server {
    /// Bind the control socket. Failure here is fatal to the process.
    pub async fn bind(
        config: ServerConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ServerError> {
        let addr = config.control_socket();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            context: Arc::new(ServerContext::new(config, credentials)),
            spawner: Box::new(TokioSpawner),
        })
    }

    /// Replace the default unbounded tokio spawner.
    pub fn with_spawner(mut self, spawner: impl SessionSpawner + 'static) -> Self {
        self.spawner = Box::new(spawner);
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever. Accept errors are logged and skipped.
    pub async fn run(self) {
        let config = &self.context.config;
        info!(
            "Serving {} on {} (passive ports {}-{})",
            config.ftp_home.display(),
            config.control_socket(),
            config.pasv_port_min,
            config.pasv_port_max
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let context = Arc::clone(&self.context);
                    self.spawner
                        .spawn(Box::pin(handle_session(stream, addr, context)));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}
