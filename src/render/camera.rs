use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Orbit camera circling the model at a fixed distance.
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
}

impl OrbitCamera {
    pub fn new(target: Vec3, distance: f32) -> Self {
        Self {
            target,
            distance,
            yaw: 0.0,
            pitch: 0.35,
        }
    }

    pub fn eye_position(&self) -> Vec3 {
        let offset = Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        ) * self.distance;
        self.target + offset
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(60f32.to_radians(), aspect.max(0.01), 0.1, 500.0)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_projection: (projection * view).to_cols_array_2d(),
        }
    }
}

/// Bind group 0: per-frame camera matrices.
pub struct CameraBinding {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl CameraBinding {
    pub const BIND_GROUP_LAYOUT_DESCRIPTOR: wgpu::BindGroupLayoutDescriptor<'static> =
        wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(
                        std::num::NonZeroU64::new(
                            size_of::<CameraUniform>() as wgpu::BufferAddress
                        )
                        .unwrap(),
                    ),
                },
                count: None,
            }],
        };

    pub fn new(device: &wgpu::Device, view: Mat4, projection: Mat4) -> Self {
        let uniform = CameraUniform::new(view, projection);

        use wgpu::util::DeviceExt;
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera uniform buffer"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let layout = device.create_bind_group_layout(&Self::BIND_GROUP_LAYOUT_DESCRIPTOR);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera bind group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            uniform_buffer,
            bind_group,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, view: Mat4, projection: Mat4) {
        let uniform = CameraUniform::new(view, projection);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_projection_is_product() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);

        let uniform = CameraUniform::new(view, projection);
        let expected = (projection * view).to_cols_array_2d();
        assert_eq!(uniform.view_projection, expected);
    }

    #[test]
    fn test_uniform_layout_size() {
        // Three 4x4 column-major matrices, tightly packed.
        assert_eq!(size_of::<CameraUniform>(), 192);
    }

    #[test]
    fn test_orbit_camera_keeps_distance() {
        let mut camera = OrbitCamera::new(Vec3::ZERO, 7.0);
        for i in 0..16 {
            camera.yaw = i as f32 * 0.4;
            let eye = camera.eye_position();
            assert!((eye.length() - 7.0).abs() < 1e-4);
        }
    }
}
