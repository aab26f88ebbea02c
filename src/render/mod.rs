pub mod animation;
pub mod camera;
pub mod material;
pub mod mesh;
pub mod model;
pub mod pipeline;
pub mod renderer;

pub use animation::{AnimationBinding, AnimationUniform, PoseCursor, Timeline};
pub use camera::{CameraBinding, CameraUniform, OrbitCamera};
pub use material::{Material, generate_checker_albedo, load_albedo_from_file};
pub use mesh::{KeyframedMesh, Pose, SkinnedMesh, build_demo_cylinder, seam_corrected_u};
pub use model::{ModelBinding, ModelUniform};
pub use pipeline::{DEPTH_FORMAT, SkinnedPipeline};
pub use renderer::{DrawCall, Renderer};
