use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct AnimationUniform {
    pub interpolation_factor: f32,
    pub _padding: [f32; 3],
}

impl AnimationUniform {
    pub fn new(interpolation_factor: f32) -> Self {
        Self {
            interpolation_factor,
            _padding: [0.0; 3],
        }
    }
}

/// Bind group 2: the blend weight between the current and next vertex pose.
pub struct AnimationBinding {
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl AnimationBinding {
    pub const BIND_GROUP_LAYOUT_DESCRIPTOR: wgpu::BindGroupLayoutDescriptor<'static> =
        wgpu::BindGroupLayoutDescriptor {
            label: Some("Animation bind group layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(
                        std::num::NonZeroU64::new(
                            size_of::<AnimationUniform>() as wgpu::BufferAddress
                        )
                        .unwrap(),
                    ),
                },
                count: None,
            }],
        };

    pub fn new(device: &wgpu::Device, interpolation_factor: f32) -> Self {
        let uniform = AnimationUniform::new(interpolation_factor);

        use wgpu::util::DeviceExt;
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Animation uniform buffer"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let layout = device.create_bind_group_layout(&Self::BIND_GROUP_LAYOUT_DESCRIPTOR);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Animation bind group"),
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

    pub fn write(&self, queue: &wgpu::Queue, interpolation_factor: f32) {
        let uniform = AnimationUniform::new(interpolation_factor);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

/// The keyframe pair playback currently sits on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PoseCursor {
    pub current: usize,
    pub next: usize,
}

/// Playback clock mapping elapsed time to a keyframe pair and an
/// interpolation factor. The sequence wraps: the frame after the last one
/// is the first.
#[derive(Clone, Debug)]
pub struct Timeline {
    frame_count: usize,
    frame_rate: f32,
    clock: f32,
}

impl Timeline {
    pub fn new(frame_count: usize, frame_rate: f32) -> Self {
        assert!(frame_count > 0, "animation needs at least one frame");
        Self {
            frame_count,
            frame_rate,
            clock: 0.0,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.clock += dt;
        let cycle = self.frame_count as f32 / self.frame_rate;
        if self.clock >= cycle {
            self.clock %= cycle;
        }
    }

    pub fn cursor(&self) -> PoseCursor {
        let position = self.clock * self.frame_rate;
        let current = (position as usize) % self.frame_count;
        PoseCursor {
            current,
            next: (current + 1) % self.frame_count,
        }
    }

    /// Blend weight within the current keyframe pair, always in [0, 1).
    pub fn interpolation_factor(&self) -> f32 {
        let position = self.clock * self.frame_rate;
        position.fract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_starts_at_first_pair() {
        let timeline = Timeline::new(4, 10.0);
        assert_eq!(timeline.cursor(), PoseCursor { current: 0, next: 1 });
        assert_eq!(timeline.interpolation_factor(), 0.0);
    }

    #[test]
    fn test_advance_moves_within_pair() {
        let mut timeline = Timeline::new(4, 10.0);
        timeline.advance(0.05); // half a frame at 10 fps
        assert_eq!(timeline.cursor(), PoseCursor { current: 0, next: 1 });
        assert!((timeline.interpolation_factor() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_last_frame_wraps_to_first() {
        let mut timeline = Timeline::new(3, 10.0);
        timeline.advance(0.25); // frame 2.5
        assert_eq!(timeline.cursor(), PoseCursor { current: 2, next: 0 });
    }

    #[test]
    fn test_factor_stays_in_unit_range() {
        let mut timeline = Timeline::new(5, 24.0);
        for _ in 0..1000 {
            timeline.advance(0.013);
            let factor = timeline.interpolation_factor();
            assert!((0.0..1.0).contains(&factor), "factor {factor} out of range");
        }
    }

    #[test]
    fn test_full_cycle_returns_to_start() {
        let mut timeline = Timeline::new(4, 10.0);
        timeline.advance(0.4); // exactly one cycle
        assert_eq!(timeline.cursor(), PoseCursor { current: 0, next: 1 });
        assert!(timeline.interpolation_factor() < 1e-5);
    }
}
