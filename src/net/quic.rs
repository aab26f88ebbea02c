//! QUIC transport for pose synchronization, backed by the certificates
//! the `certgen` tool produces: the server presents `server.crt`, clients
//! trust exactly `ca.crt`.

use crate::certs;
use crate::net::protocol::Packet;
use quinn::{ClientConfig, Connection, Endpoint, RecvStream, SendStream, ServerConfig};
use std::collections::HashMap;
use std::io::{Error, ErrorKind, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

const MAX_PACKET_SIZE: usize = 64 * 1024;
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

fn transport_config() -> quinn::TransportConfig {
    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(IDLE_TIMEOUT.try_into().ok());
    transport.keep_alive_interval(Some(KEEP_ALIVE_INTERVAL));
    transport
}

/// One QUIC connection carrying framed protocol packets over a single
/// bidirectional stream.
pub struct QuicConnection {
    connection: Connection,
    send_stream: Arc<RwLock<SendStream>>,
    recv_stream: Arc<RwLock<RecvStream>>,
    connected: AtomicBool,
}

impl QuicConnection {
    pub async fn new(connection: Connection) -> Result<Self> {
        let (send, recv) = connection.open_bi().await.map_err(|e| {
            Error::new(
                ErrorKind::ConnectionRefused,
                format!("Failed to open stream: {}", e),
            )
        })?;

        Ok(Self {
            connection,
            send_stream: Arc::new(RwLock::new(send)),
            recv_stream: Arc::new(RwLock::new(recv)),
            connected: AtomicBool::new(true),
        })
    }

    pub async fn from_incoming(connection: Connection) -> Result<Self> {
        let (send, recv) = connection.accept_bi().await.map_err(|e| {
            Error::new(
                ErrorKind::ConnectionRefused,
                format!("Failed to accept stream: {}", e),
            )
        })?;

        Ok(Self {
            connection,
            send_stream: Arc::new(RwLock::new(send)),
            recv_stream: Arc::new(RwLock::new(recv)),
            connected: AtomicBool::new(true),
        })
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.connection.remote_address()
    }

    pub async fn send(&self, packet: &Packet) -> Result<()> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(Error::new(ErrorKind::NotConnected, "Connection closed"));
        }

        let bytes = packet.to_bytes();
        let mut stream = self.send_stream.write().await;
        stream
            .write_all(&bytes)
            .await
            .map_err(|e| Error::new(ErrorKind::BrokenPipe, format!("Write error: {}", e)))
    }

    pub async fn recv(&self) -> Result<Packet> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(Error::new(ErrorKind::NotConnected, "Connection closed"));
        }

        let mut stream = self.recv_stream.write().await;

        let mut len_bytes = [0u8; 2];
        stream
            .read_exact(&mut len_bytes)
            .await
            .map_err(|e| Error::new(ErrorKind::UnexpectedEof, format!("Read error: {}", e)))?;
        let len = u16::from_le_bytes(len_bytes) as usize;
        if len == 0 || len > MAX_PACKET_SIZE {
            return Err(Error::new(ErrorKind::InvalidData, "Bad packet length"));
        }

        let mut body = vec![0u8; len];
        stream
            .read_exact(&mut body)
            .await
            .map_err(|e| Error::new(ErrorKind::UnexpectedEof, format!("Read error: {}", e)))?;

        let mut framed = Vec::with_capacity(2 + len);
        framed.extend_from_slice(&len_bytes);
        framed.extend(body);
        Packet::from_bytes(&framed)
    }

    pub async fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);
        self.connection.close(0u32.into(), b"connection closed");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Accepting side of the transport.
pub struct QuicServer {
    endpoint: Endpoint,
    connections: Arc<RwLock<HashMap<u32, Arc<QuicConnection>>>>,
    next_id: AtomicU32,
    running: AtomicBool,
}

impl QuicServer {
    /// Bind on `addr`, presenting the server certificate found in
    /// `certs_dir` (as written by [`crate::certs::generate`]).
    pub fn bind<P: AsRef<Path>>(addr: SocketAddr, certs_dir: P) -> Result<Self> {
        let (cert_chain, key) = certs::load_server_credentials(certs_dir)?;

        let mut server_config = ServerConfig::with_single_cert(cert_chain, key)
            .map_err(|e| Error::new(ErrorKind::Other, format!("TLS config error: {}", e)))?;
        server_config.transport_config(Arc::new(transport_config()));

        let endpoint = Endpoint::server(server_config, addr)?;
        tracing::info!(%addr, "QUIC server listening");

        Ok(Self {
            endpoint,
            connections: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU32::new(1),
            running: AtomicBool::new(true),
        })
    }

    /// Accept the next connection and register it under a fresh id.
    pub async fn accept(&self) -> Result<(u32, Arc<QuicConnection>)> {
        let incoming = self
            .endpoint
            .accept()
            .await
            .ok_or_else(|| Error::new(ErrorKind::NotConnected, "Server endpoint closed"))?;

        let connection = incoming.await.map_err(|e| {
            Error::new(
                ErrorKind::ConnectionRefused,
                format!("Connection failed: {}", e),
            )
        })?;

        let addr = connection.remote_address();
        let quic_conn = Arc::new(QuicConnection::from_incoming(connection).await?);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut conns = self.connections.write().await;
            conns.insert(id, quic_conn.clone());
        }

        tracing::info!(client = id, %addr, "client connected");
        Ok((id, quic_conn))
    }

    /// Send a packet to every client except one.
    pub async fn broadcast_except(&self, packet: &Packet, except_id: u32) {
        let conns = self.connections.read().await;
        for (id, conn) in conns.iter() {
            if *id != except_id {
                if let Err(e) = conn.send(packet).await {
                    tracing::warn!(client = id, "failed to send: {}", e);
                }
            }
        }
    }

    pub async fn remove_client(&self, id: u32) {
        let mut conns = self.connections.write().await;
        if conns.remove(&id).is_some() {
            tracing::info!(client = id, "client disconnected");
        }
    }

    pub async fn client_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.endpoint.close(0u32.into(), b"server shutdown");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

/// Connecting side of the transport. The rustls config trusts exactly the
/// generated CA, so a server presenting anything else is rejected.
pub struct QuicClient {
    endpoint: Option<Endpoint>,
    connection: Option<Arc<QuicConnection>>,
}

impl QuicClient {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            connection: None,
        }
    }

    pub async fn connect<P: AsRef<Path>>(
        &mut self,
        addr: &str,
        server_name: &str,
        certs_dir: P,
    ) -> Result<()> {
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::new(ErrorKind::InvalidInput, format!("Invalid address: {}", e)))?;

        let roots = certs::load_root_store(certs_dir)?;
        let crypto = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        let mut client_config = ClientConfig::new(Arc::new(
            quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
                .map_err(|e| Error::new(ErrorKind::Other, format!("QUIC config error: {}", e)))?,
        ));
        client_config.transport_config(Arc::new(transport_config()));

        let bind_addr: SocketAddr = if socket_addr.is_ipv6() {
            "[::]:0".parse().map_err(|e| {
                Error::new(ErrorKind::InvalidInput, format!("Bind address: {}", e))
            })?
        } else {
            "0.0.0.0:0".parse().map_err(|e| {
                Error::new(ErrorKind::InvalidInput, format!("Bind address: {}", e))
            })?
        };
        let mut endpoint = Endpoint::client(bind_addr)?;
        endpoint.set_default_client_config(client_config);

        let connection = endpoint
            .connect(socket_addr, server_name)
            .map_err(|e| {
                Error::new(ErrorKind::ConnectionRefused, format!("Connect error: {}", e))
            })?
            .await
            .map_err(|e| {
                Error::new(
                    ErrorKind::ConnectionRefused,
                    format!("Connection failed: {}", e),
                )
            })?;

        let quic_conn = Arc::new(QuicConnection::new(connection).await?);

        self.endpoint = Some(endpoint);
        self.connection = Some(quic_conn);

        tracing::info!(%addr, server_name, "connected");
        Ok(())
    }

    pub fn connection(&self) -> Option<&Arc<QuicConnection>> {
        self.connection.as_ref()
    }

    pub async fn send(&self, packet: &Packet) -> Result<()> {
        match &self.connection {
            Some(conn) => conn.send(packet).await,
            None => Err(Error::new(ErrorKind::NotConnected, "Not connected")),
        }
    }

    pub async fn recv(&self) -> Result<Packet> {
        match &self.connection {
            Some(conn) => conn.recv().await,
            None => Err(Error::new(ErrorKind::NotConnected, "Not connected")),
        }
    }

    pub async fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close().await;
        }
        if let Some(endpoint) = self.endpoint.take() {
            endpoint.close(0u32.into(), b"client disconnect");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.is_connected())
            .unwrap_or(false)
    }
}

impl Default for QuicClient {
    fn default() -> Self {
        Self::new()
    }
}
