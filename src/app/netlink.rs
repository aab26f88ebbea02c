use std::io::Result;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::net::protocol::Packet;
use crate::net::quic::QuicClient;

/// Bridge between the render loop and the QUIC client: packets cross on
/// unbounded channels, the connection itself lives on a dedicated tokio
/// runtime.
pub struct NetLink {
    incoming: mpsc::UnboundedReceiver<Packet>,
    outgoing: mpsc::UnboundedSender<Packet>,
    _runtime: tokio::runtime::Runtime,
}

impl NetLink {
    pub fn connect(
        addr: &str,
        server_name: &str,
        certs_dir: &Path,
        username: &str,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let mut client = QuicClient::new();
        runtime.block_on(client.connect(addr, server_name, certs_dir))?;
        let client = Arc::new(client);

        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();

        let recv_client = client.clone();
        runtime.spawn(async move {
            loop {
                match recv_client.recv().await {
                    Ok(packet) => {
                        if in_tx.send(packet).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::info!("receive loop ended: {}", e);
                        break;
                    }
                }
            }
        });

        let send_client = client.clone();
        runtime.spawn(async move {
            while let Some(packet) = out_rx.recv().await {
                if let Err(e) = send_client.send(&packet).await {
                    tracing::info!("send loop ended: {}", e);
                    break;
                }
            }
        });

        let link = Self {
            incoming: in_rx,
            outgoing: out_tx,
            _runtime: runtime,
        };
        link.send(Packet::Hello {
            username: username.to_string(),
        });
        Ok(link)
    }

    pub fn try_recv(&mut self) -> Option<Packet> {
        self.incoming.try_recv().ok()
    }

    pub fn send(&self, packet: Packet) {
        // A dropped peer surfaces on the receive side; sends are fire-and-forget.
        let _ = self.outgoing.send(packet);
    }
}
