pub mod protocol;
pub mod quic;
pub mod relay;

// Re-exports for convenience
pub use protocol::{EntityId, Packet};
pub use quic::{QuicClient, QuicConnection, QuicServer};
