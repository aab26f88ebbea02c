//! Viewer application: winit event loop plus the network bridge feeding
//! remote poses into the frame loop.

mod netlink;
mod settings;
mod viewer;

pub use netlink::NetLink;
pub use settings::ViewerSettings;
pub use viewer::{ViewerOptions, run_viewer};
