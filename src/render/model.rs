use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ModelUniform {
    pub transform: [[f32; 4]; 4],
    // mat3x3<f32> in a WGSL uniform is three vec4-aligned columns.
    pub inv_transpose: [[f32; 4]; 3],
}

impl ModelUniform {
    pub fn new(transform: Mat4) -> Result<Self, String> {
        let upper3x3 = Mat3::from_mat4(transform);
        let inverse = upper3x3.inverse();
        if !inverse.is_finite() {
            return Err("Transform matrix is not invertible".to_string());
        }
        let inv_transpose = inverse.transpose();

        Ok(Self {
            transform: transform.to_cols_array_2d(),
            inv_transpose: pad_mat3(inv_transpose),
        })
    }
}

fn pad_mat3(m: Mat3) -> [[f32; 4]; 3] {
    [
        [m.x_axis.x, m.x_axis.y, m.x_axis.z, 0.0],
        [m.y_axis.x, m.y_axis.y, m.y_axis.z, 0.0],
        [m.z_axis.x, m.z_axis.y, m.z_axis.z, 0.0],
    ]
}

/// Bind group 1: per-object transform plus the inverse-transpose used to
/// keep normals correct under non-uniform scale.
pub struct ModelBinding {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl ModelBinding {
    pub const BIND_GROUP_LAYOUT_DESCRIPTOR: wgpu::BindGroupLayoutDescriptor<'static> =
        wgpu::BindGroupLayoutDescriptor {
            label: Some("Model bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(
                        std::num::NonZeroU64::new(size_of::<ModelUniform>() as wgpu::BufferAddress)
                            .unwrap(),
                    ),
                },
                count: None,
            }],
        };

    pub fn new(device: &wgpu::Device, transform: Mat4) -> Result<Self, String> {
        let uniform = ModelUniform::new(transform)?;

        use wgpu::util::DeviceExt;
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Model uniform buffer"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let layout = device.create_bind_group_layout(&Self::BIND_GROUP_LAYOUT_DESCRIPTOR);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Model bind group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Ok(Self {
            uniform_buffer,
            bind_group,
        })
    }

    pub fn write(&self, queue: &wgpu::Queue, transform: Mat4) -> Result<(), String> {
        let uniform = ModelUniform::new(transform)?;
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
        Ok(())
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_uniform_layout_size() {
        // mat4x4 (64 bytes) + padded mat3x3 (48 bytes).
        assert_eq!(size_of::<ModelUniform>(), 112);
    }

    #[test]
    fn test_identity_inv_transpose() {
        let uniform = ModelUniform::new(Mat4::IDENTITY).unwrap();
        assert_eq!(
            uniform.inv_transpose,
            [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ]
        );
    }

    #[test]
    fn test_non_uniform_scale_normals() {
        // Under scale (2, 1, 1) a normal along X must shrink by the
        // inverse scale, which is exactly what the inverse-transpose does.
        let transform = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let uniform = ModelUniform::new(transform).unwrap();
        assert!((uniform.inv_transpose[0][0] - 0.5).abs() < 1e-6);
        assert!((uniform.inv_transpose[1][1] - 1.0).abs() < 1e-6);
        assert!((uniform.inv_transpose[2][2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_singular_transform_is_error() {
        let transform = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(ModelUniform::new(transform).is_err());
    }
}
