// Render module with the skinned-mesh pipeline
pub mod render;

// Network module with the QUIC pose-sync transport
pub mod net;

// Certificate generation and loading for the transport
pub mod certs;

// Viewer application
pub mod app;

// Re-exports
pub use net::{EntityId, Packet, QuicClient, QuicConnection, QuicServer};
pub use render::{
    AnimationBinding, AnimationUniform, CameraBinding, CameraUniform, DrawCall, KeyframedMesh,
    Material, ModelBinding, ModelUniform, OrbitCamera, Pose, PoseCursor, Renderer, SkinnedMesh,
    SkinnedPipeline, Timeline, build_demo_cylinder, seam_corrected_u,
};
