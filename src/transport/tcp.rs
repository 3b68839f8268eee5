//! # TCP Server and Client
//!
//! Messages are written back to back on a plain TCP stream without any
//! length prefix; the framer finds message boundaries.
//!
//! The accept loop runs on tokio. Each accepted connection gets its own OS
//! thread that runs the processor over a buffered socket transport until the
//! peer disconnects or the stream fails. Workers stay off the runtime's
//! blocking pool.

use std::collections::HashMap;
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{NetworkConfig, ServerConfig, TransportConfig};
use crate::core::schema::ServiceSpec;
use crate::error::{ProtocolError, Result};
use crate::protocol::client::Client;
use crate::protocol::processor::Processor;
use crate::transport::{BufferedTransport, SocketTransport, Transport};
use crate::utils::metrics::Metrics;

/// How often shutdown re-checks the active connection count.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Clones of live connection sockets, used to force them closed on shutdown.
type ConnectionTable = Arc<Mutex<HashMap<u64, std::net::TcpStream>>>;

/// Client over a buffered TCP connection.
pub type TcpClient = Client<BufferedTransport<SocketTransport>>;

#[derive(Debug)]
pub struct TcpServer {
    listener: TcpListener,
    processor: Arc<Processor>,
    server: ServerConfig,
    transport: TransportConfig,
    metrics: Arc<Metrics>,
    connections: ConnectionTable,
    next_id: AtomicU64,
}

impl TcpServer {
    /// Bind to `config.server.address`.
    pub async fn bind(processor: Processor, config: &NetworkConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.server.address).await?;
        Ok(Self {
            listener,
            processor: Arc::new(processor),
            server: config.server.clone(),
            transport: config.transport.clone(),
            metrics: Arc::new(Metrics::new()),
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });
        self.serve_with_shutdown(shutdown_rx).await
    }

    /// Serve until a message arrives on `shutdown_rx` or its sender is dropped.
    #[instrument(skip(self, shutdown_rx), fields(address = ?self.listener.local_addr().ok()))]
    pub async fn serve_with_shutdown(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        info!(service = %self.processor.service().name(), "Listening for TCP connections");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    self.drain().await;
                    return Ok(());
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => self.spawn_worker(stream, peer),
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }
    }

    fn spawn_worker(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        let active = self.metrics.active_connections();
        if active >= self.server.max_connections as u64 {
            self.metrics.connection_rejected();
            warn!(peer = %peer, active, "Connection limit reached, closing connection");
            return;
        }

        let stream = match into_blocking(stream) {
            Ok(stream) => stream,
            Err(e) => {
                error!(peer = %peer, error = %e, "Failed to prepare connection");
                return;
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match stream.try_clone() {
            Ok(handle) => {
                if let Ok(mut table) = self.connections.lock() {
                    table.insert(id, handle);
                }
            }
            Err(e) => warn!(peer = %peer, error = %e, "Connection cannot be force-closed"),
        }

        self.metrics.connection_established();

        let processor = Arc::clone(&self.processor);
        let metrics = Arc::clone(&self.metrics);
        let connections = Arc::clone(&self.connections);
        let transport = self.transport.clone();
        let spawned = thread::Builder::new()
            .name(format!("thrift-conn-{id}"))
            .spawn(move || {
                serve_connection(stream, &processor, &transport, &metrics);
                if let Ok(mut table) = connections.lock() {
                    table.remove(&id);
                }
                metrics.connection_closed();
                info!(peer = %peer, "Connection closed");
            });

        match spawned {
            Ok(_) => info!(peer = %peer, "New connection established"),
            Err(e) => {
                // Dropping the closure and the table clone closes the socket.
                if let Ok(mut table) = self.connections.lock() {
                    table.remove(&id);
                }
                self.metrics.connection_closed();
                error!(peer = %peer, error = %e, "Failed to start connection worker");
            }
        }
    }

    /// Wait for active connections, then close whatever is left.
    async fn drain(&self) {
        info!("Shutting down server. Waiting for connections to close...");

        let timeout = tokio::time::sleep(self.server.shutdown_timeout);
        tokio::pin!(timeout);

        loop {
            let connections = self.metrics.active_connections();
            if connections == 0 {
                info!("All connections closed, shutting down");
                break;
            }
            tokio::select! {
                _ = &mut timeout => {
                    warn!(connections, "Shutdown timeout reached, closing remaining connections");
                    self.force_close();
                    break;
                }
                _ = tokio::time::sleep(SHUTDOWN_POLL_INTERVAL) => {
                    debug!(connections, "Waiting for connections to close");
                }
            }
        }
        self.metrics.log_metrics();
    }

    fn force_close(&self) {
        if let Ok(mut table) = self.connections.lock() {
            for (_, stream) in table.drain() {
                let _ = stream.shutdown(Shutdown::Both);
            }
        }
    }
}

fn into_blocking(stream: tokio::net::TcpStream) -> Result<std::net::TcpStream> {
    let stream = stream.into_std()?;
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Process messages until the peer goes away.
fn serve_connection(
    stream: std::net::TcpStream,
    processor: &Processor,
    config: &TransportConfig,
    metrics: &Metrics,
) {
    let mut io = BufferedTransport::with_capacity(
        SocketTransport::new(stream),
        config.read_buffer_size,
        config.write_buffer_size,
    );

    loop {
        match processor.process_duplex(&mut io) {
            Ok(exchange) => metrics.record_exchange(&exchange),
            Err(ProtocolError::ConnectionClosed) => {
                debug!("Peer closed the connection");
                break;
            }
            Err(e) => {
                metrics.protocol_error();
                warn!(error = %e, "Dropping connection after transport failure");
                break;
            }
        }
    }

    let _ = io.close();
}

/// Start a server on `config.server.address` and serve until Ctrl-C.
pub async fn start_server(processor: Processor, config: &NetworkConfig) -> Result<()> {
    TcpServer::bind(processor, config).await?.serve().await
}

/// Connect a blocking client to `config.client.address`.
pub fn connect(service: Arc<ServiceSpec>, config: &NetworkConfig) -> Result<TcpClient> {
    connect_to(&config.client.address, service, config)
}

/// Connect a blocking client to `address`, taking timeouts and buffer sizes from `config`.
pub fn connect_to(
    address: &str,
    service: Arc<ServiceSpec>,
    config: &NetworkConfig,
) -> Result<TcpClient> {
    let socket = SocketTransport::connect(address, &config.client)?;
    let transport = BufferedTransport::with_capacity(
        socket,
        config.transport.read_buffer_size,
        config.transport.write_buffer_size,
    );
    Ok(Client::new(service, transport).with_max_message_size(config.transport.max_message_size))
}
