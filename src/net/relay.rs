//! Headless pose relay: accepts clients and rebroadcasts their pose
//! updates to everyone else.

use crate::net::protocol::Packet;
use crate::net::quic::{QuicConnection, QuicServer};
use std::io::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

/// Run the relay until the endpoint is closed. Each accepted client gets
/// a connection handler task; the accept loop itself never blocks on
/// client traffic.
pub async fn run<P: AsRef<Path>>(addr: SocketAddr, certs_dir: P) -> Result<()> {
    let server = Arc::new(QuicServer::bind(addr, certs_dir)?);

    while server.is_running() {
        let (id, connection) = match server.accept().await {
            Ok(accepted) => accepted,
            // The endpoint itself went away; handshake failures from
            // individual peers only skip that peer.
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => {
                tracing::info!("endpoint closed: {}", e);
                break;
            }
            Err(e) => {
                tracing::warn!("failed to accept connection: {}", e);
                continue;
            }
        };

        let server = server.clone();
        tokio::spawn(async move {
            handle_client(server, id, connection).await;
        });
    }

    Ok(())
}

async fn handle_client(server: Arc<QuicServer>, id: u32, connection: Arc<QuicConnection>) {
    loop {
        let packet = match connection.recv().await {
            Ok(packet) => packet,
            Err(e) => {
                tracing::info!(client = id, "connection ended: {}", e);
                break;
            }
        };

        match packet {
            Packet::Hello { username } => {
                tracing::info!(client = id, username, "hello");
                if let Err(e) = connection.send(&Packet::HelloAck { entity_id: id }).await {
                    tracing::warn!(client = id, "failed to ack: {}", e);
                    break;
                }
            }
            Packet::Pose {
                x,
                y,
                z,
                yaw,
                frame,
                next_frame,
                factor,
                ..
            } => {
                // Stamp the sender's id; clients cannot speak for others.
                let forwarded = Packet::Pose {
                    entity_id: id,
                    x,
                    y,
                    z,
                    yaw,
                    frame,
                    next_frame,
                    factor,
                };
                server.broadcast_except(&forwarded, id).await;
            }
            Packet::Ping { timestamp } => {
                if let Err(e) = connection.send(&Packet::Pong { timestamp }).await {
                    tracing::warn!(client = id, "failed to pong: {}", e);
                    break;
                }
            }
            Packet::Disconnect { .. } => break,
            Packet::HelloAck { .. } | Packet::Pong { .. } => {
                // Server-to-client packets; ignore from clients.
            }
        }
    }

    server.remove_client(id).await;
    server
        .broadcast_except(&Packet::Disconnect { entity_id: id }, id)
        .await;
}
