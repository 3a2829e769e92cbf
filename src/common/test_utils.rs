use crate::common::EchoServerTrait;
use crate::http::{HttpConfig, ReflectServer};
use crate::{ReflectError, Result};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Starts a reflector on an ephemeral loopback port for integration tests
///
/// The listener is bound before this returns, so clients may connect right
/// away. `bind_addr` in `config` is ignored. Send on the returned channel to
/// stop the server.
pub async fn spawn_test_server(
    config: HttpConfig,
) -> Result<(JoinHandle<Result<()>>, SocketAddr, broadcast::Sender<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|source| ReflectError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            source,
        })?;
    let addr = listener.local_addr()?;

    let server = ReflectServer::reflector(HttpConfig {
        bind_addr: addr,
        ..config
    });
    let shutdown = server.shutdown_signal();

    let server_handle = tokio::spawn(async move { server.serve(listener).await });

    Ok((server_handle, addr, shutdown))
}
