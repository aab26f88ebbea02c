use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use winit::{
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use crate::app::netlink::NetLink;
use crate::app::settings::ViewerSettings;
use crate::net::protocol::Packet;
use crate::render::{
    AnimationBinding, CameraBinding, DrawCall, KeyframedMesh, Material, ModelBinding, OrbitCamera,
    Renderer, SkinnedMesh, SkinnedPipeline, Timeline, build_demo_cylinder, generate_checker_albedo,
    load_albedo_from_file,
};

pub struct ViewerOptions {
    pub connect: Option<String>,
    pub certs_dir: PathBuf,
    pub domain: String,
    pub username: String,
    pub albedo_path: Option<PathBuf>,
    pub settings: ViewerSettings,
}

/// An entity driven by remote pose packets. It owns its pose buffers so
/// it can sit on a different keyframe pair than the local entity.
struct RemoteEntity {
    mesh: SkinnedMesh,
    model: ModelBinding,
    animation: AnimationBinding,
    position: Vec3,
    yaw: f32,
    frame: usize,
    next_frame: usize,
    factor: f32,
    uploaded_pair: Option<(usize, usize)>,
}

struct Viewer {
    renderer: Renderer,
    pipeline: SkinnedPipeline,
    camera: OrbitCamera,
    camera_binding: CameraBinding,
    material: Material,

    keyframes: KeyframedMesh,
    timeline: Timeline,
    local_mesh: SkinnedMesh,
    local_model: ModelBinding,
    local_animation: AnimationBinding,
    local_uploaded_pair: Option<(usize, usize)>,

    link: Option<NetLink>,
    entity_id: Option<u32>,
    remotes: HashMap<u32, RemoteEntity>,
    last_pose_send: Instant,
    pose_send_interval: Duration,
}

impl Viewer {
    async fn new(
        window: Arc<winit::window::Window>,
        options: &ViewerOptions,
    ) -> Result<Self, String> {
        let renderer = Renderer::new(window).await?;
        let pipeline = SkinnedPipeline::new(&renderer.device, renderer.surface_format());

        let camera = OrbitCamera::new(Vec3::ZERO, 8.0);
        let camera_binding = CameraBinding::new(
            &renderer.device,
            camera.view_matrix(),
            camera.projection_matrix(renderer.aspect_ratio()),
        );

        let (pixels, width, height) = match &options.albedo_path {
            Some(path) => load_albedo_from_file(path)?,
            None => (generate_checker_albedo(256), 256, 256),
        };
        let material = Material::from_rgba(&renderer.device, &renderer.queue, &pixels, width, height);

        let demo = &options.settings.demo;
        let keyframes = build_demo_cylinder(demo.segments, demo.rings, demo.frames);
        let timeline = Timeline::new(keyframes.frame_count(), demo.frame_rate);
        let local_mesh = SkinnedMesh::new(&renderer.device, &keyframes);
        let local_model = ModelBinding::new(&renderer.device, Mat4::IDENTITY)?;
        let local_animation = AnimationBinding::new(&renderer.device, 0.0);

        let link = match &options.connect {
            Some(addr) => {
                let link = NetLink::connect(
                    addr,
                    &options.domain,
                    &options.certs_dir,
                    &options.username,
                )
                .map_err(|e| format!("Failed to connect to {}: {}", addr, e))?;
                Some(link)
            }
            None => None,
        };

        Ok(Self {
            renderer,
            pipeline,
            camera,
            camera_binding,
            material,
            keyframes,
            timeline,
            local_mesh,
            local_model,
            local_animation,
            local_uploaded_pair: None,
            link,
            entity_id: None,
            remotes: HashMap::new(),
            last_pose_send: Instant::now(),
            pose_send_interval: Duration::from_millis(
                options.settings.network.pose_send_interval_ms,
            ),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.renderer.resize(width, height);
    }

    fn update(&mut self, dt: f32) {
        self.timeline.advance(dt);
        let cursor = self.timeline.cursor();
        let factor = self.timeline.interpolation_factor();

        if self.local_uploaded_pair != Some((cursor.current, cursor.next)) {
            self.local_mesh.write_pose_pair(
                &self.renderer.queue,
                &self.keyframes,
                cursor.current,
                cursor.next,
            );
            self.local_uploaded_pair = Some((cursor.current, cursor.next));
        }
        self.local_animation.write(&self.renderer.queue, factor);

        self.camera.yaw += dt * 0.25;
        self.camera_binding.write(
            &self.renderer.queue,
            self.camera.view_matrix(),
            self.camera.projection_matrix(self.renderer.aspect_ratio()),
        );

        self.pump_network(cursor.current as u16, cursor.next as u16, factor);
        self.update_remotes();
    }

    fn pump_network(&mut self, frame: u16, next_frame: u16, factor: f32) {
        let Some(link) = &mut self.link else {
            return;
        };

        while let Some(packet) = link.try_recv() {
            match packet {
                Packet::HelloAck { entity_id } => {
                    tracing::info!(entity_id, "joined relay");
                    self.entity_id = Some(entity_id);
                }
                Packet::Pose {
                    entity_id,
                    x,
                    y,
                    z,
                    yaw,
                    frame,
                    next_frame,
                    factor,
                } => {
                    let frame_count = self.keyframes.frame_count();
                    match self.remotes.entry(entity_id) {
                        std::collections::hash_map::Entry::Occupied(mut entry) => {
                            let remote = entry.get_mut();
                            remote.position = Vec3::new(x, y, z);
                            remote.yaw = yaw;
                            remote.frame = frame as usize % frame_count;
                            remote.next_frame = next_frame as usize % frame_count;
                            remote.factor = factor.clamp(0.0, 1.0);
                        }
                        std::collections::hash_map::Entry::Vacant(entry) => {
                            tracing::info!(entity_id, "remote entity appeared");
                            match ModelBinding::new(&self.renderer.device, Mat4::IDENTITY) {
                                Ok(model) => {
                                    entry.insert(RemoteEntity {
                                        mesh: SkinnedMesh::new(
                                            &self.renderer.device,
                                            &self.keyframes,
                                        ),
                                        model,
                                        animation: AnimationBinding::new(&self.renderer.device, 0.0),
                                        position: Vec3::new(x, y, z),
                                        yaw,
                                        frame: frame as usize % frame_count,
                                        next_frame: next_frame as usize % frame_count,
                                        factor: factor.clamp(0.0, 1.0),
                                        uploaded_pair: None,
                                    });
                                }
                                Err(e) => {
                                    tracing::warn!(entity_id, "failed to create entity: {}", e)
                                }
                            }
                        }
                    }
                }
                Packet::Disconnect { entity_id } => {
                    tracing::info!(entity_id, "remote entity left");
                    self.remotes.remove(&entity_id);
                }
                Packet::Hello { .. } | Packet::Ping { .. } | Packet::Pong { .. } => {}
            }
        }

        if self.last_pose_send.elapsed() >= self.pose_send_interval {
            self.last_pose_send = Instant::now();
            link.send(Packet::Pose {
                entity_id: self.entity_id.unwrap_or(0),
                x: 0.0,
                y: 0.0,
                z: 0.0,
                yaw: 0.0,
                frame,
                next_frame,
                factor,
            });
        }
    }

    fn update_remotes(&mut self) {
        for remote in self.remotes.values_mut() {
            if remote.uploaded_pair != Some((remote.frame, remote.next_frame)) {
                remote.mesh.write_pose_pair(
                    &self.renderer.queue,
                    &self.keyframes,
                    remote.frame,
                    remote.next_frame,
                );
                remote.uploaded_pair = Some((remote.frame, remote.next_frame));
            }
            remote.animation.write(&self.renderer.queue, remote.factor);

            let transform =
                Mat4::from_translation(remote.position) * Mat4::from_rotation_y(remote.yaw);
            if let Err(e) = remote.model.write(&self.renderer.queue, transform) {
                tracing::warn!("remote transform rejected: {}", e);
            }
        }
    }

    fn render(&mut self) {
        let mut draws = vec![DrawCall {
            mesh: &self.local_mesh,
            material: &self.material,
            model: &self.local_model,
            animation: &self.local_animation,
        }];
        for remote in self.remotes.values() {
            draws.push(DrawCall {
                mesh: &remote.mesh,
                material: &self.material,
                model: &remote.model,
                animation: &remote.animation,
            });
        }

        match self.renderer.render(&self.pipeline, &self.camera_binding, &draws) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (width, height) = (self.renderer.config.width, self.renderer.config.height);
                self.renderer.resize(width, height);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                tracing::error!("surface out of memory");
            }
            Err(e) => tracing::warn!("frame dropped: {:?}", e),
        }
    }
}

pub fn run_viewer(options: ViewerOptions) -> Result<(), String> {
    let event_loop = EventLoop::new().map_err(|e| format!("Failed to create event loop: {}", e))?;
    let window_settings = &options.settings.window;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&window_settings.title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                window_settings.width,
                window_settings.height,
            ))
            .build(&event_loop)
            .map_err(|e| format!("Failed to create window: {}", e))?,
    );

    let mut viewer = pollster::block_on(Viewer::new(window.clone(), &options))?;
    let mut last_frame = Instant::now();

    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(KeyCode::Escape),
                            state: ElementState::Pressed,
                            ..
                        },
                    ..
                } => elwt.exit(),
                WindowEvent::Resized(size) => viewer.resize(size.width, size.height),
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let dt = (now - last_frame).as_secs_f32().min(0.1);
                    last_frame = now;

                    viewer.update(dt);
                    viewer.render();
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            _ => {}
        })
        .map_err(|e| format!("Event loop error: {}", e))
}
