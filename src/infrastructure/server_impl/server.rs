use std::fmt;
use std::future::{self, Future};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::application::dispatcher::{DefaultFallbacks, Fallbacks};
use crate::application::handler::{Handler, Mapping, RouteHandler};
use crate::application::observer::{Observer, TracingObserver};
use crate::application::routes::RouteTable;
use crate::domain::errors::{RouteError, ServerError};
use crate::domain::headers::HeaderTable;
use crate::domain::route::Route;
use crate::infrastructure::server_impl::config::ServerConfig;
use crate::infrastructure::server_impl::connection::{Connection, Shared};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Owns the listener and everything connections will share.
///
/// Routes and default headers are configured through `&mut self`; serving
/// consumes the server, so nothing can change them once connections exist.
pub struct Server {
    routes: RouteTable,
    default_headers: HeaderTable,
    config: ServerConfig,
    fallbacks: Arc<dyn Fallbacks>,
    observer: Arc<dyn Observer>,
    listener: Option<TcpListener>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("routes", &self.routes)
            .field("default_headers", &self.default_headers)
            .field("config", &self.config)
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            routes: RouteTable::new(),
            default_headers: HeaderTable::new(),
            config: ServerConfig::default(),
            fallbacks: Arc::new(DefaultFallbacks),
            observer: Arc::new(TracingObserver),
            listener: None,
        }
    }
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config_mut(&mut self) -> &mut ServerConfig {
        &mut self.config
    }

    /// Replaces the builders for the 404, 500 and 400 responses.
    pub fn with_fallbacks(mut self, fallbacks: impl Fallbacks) -> Self {
        self.fallbacks = Arc::new(fallbacks);
        self
    }

    pub fn with_observer(mut self, observer: impl Observer) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Registers every route the handler exposes. Nothing is registered if
    /// any of its routes fails to compile.
    pub fn add_handler<H: RouteHandler>(
        &mut self,
        handler: Arc<H>,
    ) -> Result<&mut Self, RouteError> {
        for mapping in handler.mappings()? {
            self.routes.insert(mapping);
        }
        Ok(self)
    }

    pub fn route(&mut self, route: Route, handler: impl Handler) -> &mut Self {
        self.routes.insert(Mapping::new(route, handler));
        self
    }

    /// Appended to every response unless the response sets the same name.
    pub fn add_default_response_headers(&mut self, headers: impl Into<HeaderTable>) -> &mut Self {
        self.default_headers.merge(&headers.into());
        self
    }

    pub async fn start(&mut self, host: &str, port: u16) -> Result<(), ServerError> {
        if self.listener.is_some() {
            return Err(ServerError::AlreadyStarted);
        }
        let listener = TcpListener::bind((host, port)).await?;
        self.listener = Some(listener);
        Ok(())
    }

    /// Adopts an already bound socket, e.g. one handed over by a supervisor.
    /// Must be called from within the runtime.
    pub fn start_with_listener(
        &mut self,
        listener: std::net::TcpListener,
    ) -> Result<(), ServerError> {
        if self.listener.is_some() {
            return Err(ServerError::AlreadyStarted);
        }
        listener.set_nonblocking(true)?;
        self.listener = Some(TcpListener::from_std(listener)?);
        Ok(())
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        let listener = self.listener.as_ref().ok_or(ServerError::NotStarted)?;
        Ok(listener.local_addr()?)
    }

    pub fn bind_address_description(&self) -> String {
        match self.local_addr() {
            Ok(addr) => addr.to_string(),
            Err(e) => format!("<{e}>"),
        }
    }

    pub async fn serve_forever(self) -> Result<(), ServerError> {
        self.serve_until(future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves. Connections already
    /// being served keep running on their own tasks.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let Server {
            routes,
            default_headers,
            config,
            fallbacks,
            observer,
            listener,
        } = self;
        let listener = listener.ok_or(ServerError::NotStarted)?;

        let shared = Arc::new(Shared {
            routes,
            default_headers,
            config,
            fallbacks,
            observer,
        });
        info!(
            "Serving {} routes on {}",
            shared.routes.len(),
            listener.local_addr()?
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("accepted connection from {peer}");
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("unable to set TCP_NODELAY for {peer}: {e}");
                        }
                        let (read, write) = stream.into_split();
                        let connection =
                            Connection::new(read, write, peer.to_string(), Arc::clone(&shared));
                        tokio::spawn(connection.run());
                    }
                    Err(e) => {
                        warn!("failed to accept a connection: {e}");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }

        Ok(())
    }
}
