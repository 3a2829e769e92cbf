use super::config::HttpConfig;
use super::protocol::{HttpConnection, HttpProtocolError};
use super::response::HttpResponse;
use crate::common::{EchoServerTrait, RequestHandler};
use crate::cors::Cors;
use crate::echo::EchoHandler;
use crate::security::ConnectionTracker;
use crate::{ReflectError, Result};
use async_trait::async_trait;
use http::Method;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{Instrument, debug, error, info, warn};

/// HTTP/1.1 server that routes every request to a [`RequestHandler`]
///
/// # Examples
///
/// ```no_run
/// use reflectsrv::common::EchoServerTrait;
/// use reflectsrv::http::{HttpConfig, ReflectServer};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = ReflectServer::reflector(HttpConfig::from_env()?);
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct HttpEchoServer<H> {
    config: HttpConfig,
    handler: Arc<H>,
    shutdown_signal: Arc<broadcast::Sender<()>>,
}

/// The reflector: permissive CORS in front of the echo handler
pub type ReflectServer = HttpEchoServer<Cors<EchoHandler>>;

impl ReflectServer {
    pub fn reflector(config: HttpConfig) -> Self {
        Self::new(config, Cors::permissive(EchoHandler::new()))
    }
}

impl<H> HttpEchoServer<H>
where
    H: RequestHandler + 'static,
{
    pub fn new(config: HttpConfig, handler: H) -> Self {
        let (shutdown_signal, _) = broadcast::channel(1);
        Self {
            config,
            handler: Arc::new(handler),
            shutdown_signal: Arc::new(shutdown_signal),
        }
    }

    /// Binds the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr;
        TcpListener::bind(addr)
            .await
            .map_err(|source| ReflectError::Bind { addr, source })
    }

    /// Accepts connections on `listener` until a shutdown signal arrives,
    /// then gives in-flight connections the configured grace period.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown_signal.subscribe();
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, max_connections = self.config.max_connections, "HTTP reflector listening");

        let tracker = ConnectionTracker::new(self.config.max_connections);
        let mut connections = JoinSet::new();
        let termination = termination_signal();
        tokio::pin!(termination);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let guard = match tracker.try_acquire() {
                                Ok(guard) => guard,
                                Err(e) => {
                                    warn!(%addr, error = %e, "Connection rejected");
                                    continue;
                                }
                            };

                            let handler = Arc::clone(&self.handler);
                            let config = self.config.clone();
                            let conn_shutdown = self.shutdown_signal.subscribe();
                            let span = tracing::info_span!("connection", %addr);

                            connections.spawn(
                                async move {
                                    let _guard = guard;
                                    match Self::handle_connection(stream, addr, handler, config, conn_shutdown).await {
                                        Ok(()) => debug!(%addr, "Connection closed"),
                                        Err(HttpProtocolError::Io(e)) => {
                                            error!(%addr, error = %e, "Error handling connection");
                                        }
                                        Err(e) => warn!(%addr, error = %e, "Rejected malformed request"),
                                    }
                                }
                                .instrument(span),
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = &mut termination => {
                    info!("Received shutdown signal, stopping server");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Received internal shutdown signal, stopping server");
                    break;
                }
            }
        }

        drop(listener);
        // idle connections close at once, busy ones after their current response
        let _ = self.shutdown_signal.send(());

        let in_flight = connections.len();
        let drained = timeout(self.config.shutdown_grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        match drained {
            Ok(()) => info!(connections = in_flight, "In-flight connections drained"),
            Err(_) => {
                warn!(
                    remaining = connections.len(),
                    grace_ms = self.config.shutdown_grace.as_millis(),
                    "Shutdown grace period elapsed, aborting connections"
                );
                connections.shutdown().await;
            }
        }

        info!("HTTP reflector stopped");
        Ok(())
    }

    /// Serves requests on one connection until it closes or shutdown starts
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        handler: Arc<H>,
        config: HttpConfig,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> std::result::Result<(), HttpProtocolError> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%addr, error = %e, "Failed to set TCP_NODELAY");
        }
        let mut connection = HttpConnection::new(stream, &config);

        loop {
            if !connection.has_buffered_data() {
                let filled = tokio::select! {
                    result = timeout(config.read_timeout, connection.fill()) => result,
                    _ = shutdown_rx.recv() => {
                        debug!(%addr, "Closing idle connection for shutdown");
                        break;
                    }
                };
                match filled {
                    Ok(Ok(true)) => {}
                    Ok(Ok(false)) => {
                        debug!(%addr, "Client closed connection");
                        break;
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        debug!(%addr, "Idle connection timed out");
                        break;
                    }
                }
            }

            let parsed = match timeout(config.read_timeout, connection.read_request()).await {
                Ok(Ok(Some(parsed))) => parsed,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    Self::reject(&mut connection, &e, &config).await;
                    return Err(e);
                }
                Err(_) => {
                    warn!(%addr, "Read timeout");
                    let e = HttpProtocolError::Timeout;
                    Self::reject(&mut connection, &e, &config).await;
                    return Err(e);
                }
            };

            let request = parsed.request;
            let response = handler.handle(&request);
            let head_only = request.is_method(&Method::HEAD);
            let keep_alive = parsed.keep_alive && !shutdown_started(&mut shutdown_rx);

            debug!(
                %addr,
                method = %request.method,
                path = %request.path,
                status = response.status.as_u16(),
                size = response.body.len(),
                "Handled request"
            );

            match timeout(
                config.write_timeout,
                connection.write_response(&response, head_only, keep_alive),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!(%addr, "Write timeout");
                    break;
                }
            }

            if !keep_alive {
                break;
            }
        }

        Ok(())
    }

    /// Best-effort error response before the connection is dropped
    async fn reject(
        connection: &mut HttpConnection<TcpStream>,
        error: &HttpProtocolError,
        config: &HttpConfig,
    ) {
        if let Some(status) = error.status() {
            let response = HttpResponse::error(status);
            let _ = timeout(
                config.write_timeout,
                connection.write_response(&response, false, false),
            )
            .await;
        }
    }
}

#[async_trait]
impl<H> EchoServerTrait for HttpEchoServer<H>
where
    H: RequestHandler + 'static,
{
    /// Binds the configured address and serves until shutdown
    async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }
}

fn shutdown_started(shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
    !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty))
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
