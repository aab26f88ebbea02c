use crate::render::animation::AnimationBinding;
use crate::render::camera::CameraBinding;
use crate::render::material::Material;
use crate::render::model::ModelBinding;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The skinned-mesh render pipeline. Bind groups 0-3 are camera, model,
/// animation and material; the six vertex buffers carry one attribute
/// each so pose buffers can be swapped without re-interleaving.
pub struct SkinnedPipeline {
    render_pipeline: wgpu::RenderPipeline,
}

impl SkinnedPipeline {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        let shader_module =
            device.create_shader_module(wgpu::include_wgsl!("../shaders/skinned.wgsl"));

        let bind_group_layouts = [
            CameraBinding::BIND_GROUP_LAYOUT_DESCRIPTOR,
            ModelBinding::BIND_GROUP_LAYOUT_DESCRIPTOR,
            AnimationBinding::BIND_GROUP_LAYOUT_DESCRIPTOR,
            Material::BIND_GROUP_LAYOUT_DESCRIPTOR,
        ]
        .map(|descriptor| device.create_bind_group_layout(&descriptor));

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skinned pipeline layout"),
            bind_group_layouts: &bind_group_layouts
                .iter()
                .collect::<Vec<&wgpu::BindGroupLayout>>(),
            immediate_size: 0,
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skinned render pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader_module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[
                    // Current pose positions
                    wgpu::VertexBufferLayout {
                        array_stride: size_of::<[f32; 3]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                    },
                    // Next pose positions
                    wgpu::VertexBufferLayout {
                        array_stride: size_of::<[f32; 3]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![1 => Float32x3],
                    },
                    // Current pose normals
                    wgpu::VertexBufferLayout {
                        array_stride: size_of::<[f32; 3]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![2 => Float32x3],
                    },
                    // Next pose normals
                    wgpu::VertexBufferLayout {
                        array_stride: size_of::<[f32; 3]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![3 => Float32x3],
                    },
                    // Texture coordinates
                    wgpu::VertexBufferLayout {
                        array_stride: size_of::<[f32; 2]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![4 => Float32x2],
                    },
                    // Seam flags
                    wgpu::VertexBufferLayout {
                        array_stride: size_of::<u32>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![5 => Uint32],
                    },
                ],
            },
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: Default::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview_mask: None,
            cache: None,
        });

        Self { render_pipeline }
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.render_pipeline
    }
}
