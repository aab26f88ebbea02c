use glam::Vec3;

/// One vertex pose: positions and normals for every vertex of the mesh.
#[derive(Clone, Debug)]
pub struct Pose {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

impl Pose {
    /// Linear blend towards `next`. The GPU does the same thing in the
    /// vertex stage; this mirror exists for CPU-side checks.
    pub fn blend(&self, next: &Pose, factor: f32) -> Pose {
        let positions = self
            .positions
            .iter()
            .zip(&next.positions)
            .map(|(a, b)| a.lerp(*b, factor))
            .collect();
        let normals = self
            .normals
            .iter()
            .zip(&next.normals)
            .map(|(a, b)| a.lerp(*b, factor))
            .collect();
        Pose { positions, normals }
    }
}

/// Seam rule applied by the fragment stage: a seam vertex whose U landed
/// past 0.5 samples one wrap to the left.
pub fn seam_corrected_u(u: f32, on_seam: bool) -> f32 {
    if on_seam && u > 0.5 { u - 1.0 } else { u }
}

/// CPU-side keyframed mesh: every frame shares the vertex count, UVs,
/// seam flags and topology.
#[derive(Clone, Debug)]
pub struct KeyframedMesh {
    pub frames: Vec<Pose>,
    pub uvs: Vec<[f32; 2]>,
    pub seam_flags: Vec<u32>,
    pub indices: Vec<u32>,
}

impl KeyframedMesh {
    pub fn vertex_count(&self) -> usize {
        self.uvs.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Procedural two-pose demo model: a tube with a cylindrical UV unwrap,
/// so the wrap column genuinely exercises the seam flag. Frames bend the
/// tube sideways and back over one cycle.
pub fn build_demo_cylinder(segments: usize, rings: usize, frame_count: usize) -> KeyframedMesh {
    assert!(segments >= 3 && rings >= 2 && frame_count >= 2);

    let radius = 1.0;
    let height = 4.0;

    let mut uvs = Vec::new();
    let mut seam_flags = Vec::new();
    for ring in 0..rings {
        let v = ring as f32 / (rings - 1) as f32;
        for segment in 0..=segments {
            // The closing column repeats the first one with u = 1.0; it is
            // the seam the fragment stage re-wraps.
            let u = segment as f32 / segments as f32;
            uvs.push([u, v]);
            seam_flags.push(if segment == segments { 1 } else { 0 });
        }
    }

    let columns = segments + 1;
    let mut indices = Vec::new();
    for ring in 0..rings - 1 {
        for segment in 0..segments {
            let a = (ring * columns + segment) as u32;
            let b = a + 1;
            let c = a + columns as u32;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }

    let mut frames = Vec::with_capacity(frame_count);
    for frame in 0..frame_count {
        let phase = frame as f32 / frame_count as f32 * std::f32::consts::TAU;
        let bend = phase.sin() * 0.8;

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        for ring in 0..rings {
            let v = ring as f32 / (rings - 1) as f32;
            let y = (v - 0.5) * height;
            let sway = bend * v * v * height * 0.25;
            for segment in 0..=segments {
                let angle = segment as f32 / segments as f32 * std::f32::consts::TAU;
                let (sin, cos) = angle.sin_cos();
                positions.push(Vec3::new(cos * radius + sway, y, sin * radius));
                normals.push(Vec3::new(cos, 0.0, sin));
            }
        }
        frames.push(Pose { positions, normals });
    }

    KeyframedMesh {
        frames,
        uvs,
        seam_flags,
        indices,
    }
}

/// GPU-side mesh: six single-attribute vertex buffers plus indices. UVs,
/// seam flags and topology are uploaded once; the two pose buffers are
/// rewritten whenever the keyframe pair changes.
pub struct SkinnedMesh {
    positions_buffer: wgpu::Buffer,
    next_positions_buffer: wgpu::Buffer,
    normals_buffer: wgpu::Buffer,
    next_normals_buffer: wgpu::Buffer,
    uv_buffer: wgpu::Buffer,
    seam_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl SkinnedMesh {
    pub fn new(device: &wgpu::Device, mesh: &KeyframedMesh) -> Self {
        let vertex_buffer_size = (mesh.vertex_count() * size_of::<Vec3>()) as u64;

        let pose_buffer = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: vertex_buffer_size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let positions_buffer = pose_buffer("Skinned mesh positions buffer");
        let next_positions_buffer = pose_buffer("Skinned mesh next positions buffer");
        let normals_buffer = pose_buffer("Skinned mesh normals buffer");
        let next_normals_buffer = pose_buffer("Skinned mesh next normals buffer");

        use wgpu::util::DeviceExt;
        let uv_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skinned mesh uv buffer"),
            contents: bytemuck::cast_slice(&mesh.uvs),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let seam_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skinned mesh seam buffer"),
            contents: bytemuck::cast_slice(&mesh.seam_flags),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skinned mesh index buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            positions_buffer,
            next_positions_buffer,
            normals_buffer,
            next_normals_buffer,
            uv_buffer,
            seam_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        }
    }

    /// Upload the keyframe pair the shader blends between.
    pub fn write_pose_pair(
        &self,
        queue: &wgpu::Queue,
        mesh: &KeyframedMesh,
        current: usize,
        next: usize,
    ) {
        let current = &mesh.frames[current];
        let next = &mesh.frames[next];
        queue.write_buffer(
            &self.positions_buffer,
            0,
            bytemuck::cast_slice(&current.positions),
        );
        queue.write_buffer(
            &self.next_positions_buffer,
            0,
            bytemuck::cast_slice(&next.positions),
        );
        queue.write_buffer(
            &self.normals_buffer,
            0,
            bytemuck::cast_slice(&current.normals),
        );
        queue.write_buffer(
            &self.next_normals_buffer,
            0,
            bytemuck::cast_slice(&next.normals),
        );
    }

    pub fn bind(&self, render_pass: &mut wgpu::RenderPass<'_>) {
        render_pass.set_vertex_buffer(0, self.positions_buffer.slice(..));
        render_pass.set_vertex_buffer(1, self.next_positions_buffer.slice(..));
        render_pass.set_vertex_buffer(2, self.normals_buffer.slice(..));
        render_pass.set_vertex_buffer(3, self.next_normals_buffer.slice(..));
        render_pass.set_vertex_buffer(4, self.uv_buffer.slice(..));
        render_pass.set_vertex_buffer(5, self.seam_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_poses() -> (Pose, Pose) {
        let a = Pose {
            positions: vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 2.0, 3.0)],
            normals: vec![Vec3::X, Vec3::Y],
        };
        let b = Pose {
            positions: vec![Vec3::new(4.0, 0.0, -2.0), Vec3::new(1.0, 0.0, 3.0)],
            normals: vec![Vec3::Y, Vec3::Z],
        };
        (a, b)
    }

    #[test]
    fn test_blend_endpoints_match_poses() {
        let (a, b) = two_poses();
        let at_zero = a.blend(&b, 0.0);
        let at_one = a.blend(&b, 1.0);
        assert_eq!(at_zero.positions, a.positions);
        assert_eq!(at_zero.normals, a.normals);
        assert_eq!(at_one.positions, b.positions);
        assert_eq!(at_one.normals, b.normals);
    }

    #[test]
    fn test_blend_is_convex_combination() {
        let (a, b) = two_poses();
        for step in 0..=10 {
            let t = step as f32 / 10.0;
            let blended = a.blend(&b, t);
            for ((p, pa), pb) in blended.positions.iter().zip(&a.positions).zip(&b.positions) {
                for axis in 0..3 {
                    let lo = pa[axis].min(pb[axis]);
                    let hi = pa[axis].max(pb[axis]);
                    assert!(p[axis] >= lo - 1e-6 && p[axis] <= hi + 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_seam_rule() {
        assert_eq!(seam_corrected_u(0.97, true), 0.97 - 1.0);
        assert_eq!(seam_corrected_u(1.0, true), 0.0);
        assert_eq!(seam_corrected_u(0.4, true), 0.4);
        assert_eq!(seam_corrected_u(0.97, false), 0.97);
        assert_eq!(seam_corrected_u(0.1, false), 0.1);
    }

    #[test]
    fn test_demo_cylinder_shape() {
        let mesh = build_demo_cylinder(12, 6, 8);
        let vertex_count = mesh.vertex_count();

        assert_eq!(mesh.frame_count(), 8);
        assert_eq!(vertex_count, 13 * 6);
        assert_eq!(mesh.seam_flags.len(), vertex_count);
        for frame in &mesh.frames {
            assert_eq!(frame.positions.len(), vertex_count);
            assert_eq!(frame.normals.len(), vertex_count);
        }
        for index in &mesh.indices {
            assert!((*index as usize) < vertex_count);
        }
    }

    #[test]
    fn test_demo_cylinder_seam_column() {
        let mesh = build_demo_cylinder(12, 6, 8);
        for (uv, flag) in mesh.uvs.iter().zip(&mesh.seam_flags) {
            if *flag == 1 {
                // Seam vertices sit on the wrap column; the corrected U
                // lands back at the left edge of the skin.
                assert_eq!(uv[0], 1.0);
                assert_eq!(seam_corrected_u(uv[0], true), 0.0);
            } else {
                assert!(uv[0] < 1.0);
            }
        }
        assert!(mesh.seam_flags.iter().any(|f| *f == 1));
    }
}
