//! A room with a TV that shows a live world; after a few seconds (or on
//! Space) the camera dives into the TV and the view continues inside it.

use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use telescreen::{
    ActiveCamera, Avatar, Camera, CinematicTransitionController, Color, CompositorConfig,
    FollowCamera, GpuContext, GpuRenderer, GrainPass, GrainSettings, MapSlot, Material,
    Mesh, OverlayPass, OverlayState, RenderError, RenderMesh, RenderSurfaceCompositor, SceneGraph,
    SceneRenderer, SceneRole, Texture, Transform, TransitionConfig, TransitionRig, Vec2, Vec3,
};

/// Seconds of watching the TV before the transition starts on its own.
const AUTO_START: f32 = 3.0;
/// Texture units the offscreen pass may use per draw.
const SCREEN_TEXTURE_UNITS: u32 = 2;

struct Demo {
    window: Arc<Window>,
    renderer: GpuRenderer,
    grain_pass: GrainPass,
    overlay_pass: OverlayPass,
    room: SceneGraph,
    room_camera: Camera,
    compositor: RenderSurfaceCompositor,
    avatar: Avatar,
    follow: FollowCamera,
    grain: GrainSettings,
    overlay: OverlayState,
    transition: CinematicTransitionController,
    active: ActiveCamera,
    started: bool,
    start_time: Instant,
    last_frame: Instant,
}

impl Demo {
    fn new(window: Arc<Window>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut renderer = GpuRenderer::new(GpuContext::new(window.clone())?);

        let cube = Mesh::cube(renderer.gpu());
        let cube = renderer.add_mesh(cube);
        let noise = |renderer: &mut GpuRenderer, seed: u32, base: Color, label: &str| {
            let texture = Texture::noise(renderer.gpu(), 64, seed, base, label);
            renderer.add_texture(texture)
        };
        let floor_map = noise(&mut renderer, 1, Color::rgb(0.35, 0.3, 0.25), "Floor");
        let grass_map = noise(&mut renderer, 2, Color::rgb(0.2, 0.45, 0.2), "Grass");
        let skin_map = noise(&mut renderer, 3, Color::rgb(0.8, 0.5, 0.3), "Skin");
        let detail_map = noise(&mut renderer, 4, Color::rgb(0.5, 0.5, 1.0), "Detail");

        // The room with the TV.
        let mut room = SceneGraph::new("Room");
        room.spawn_mesh(
            Transform::from_position(Vec3::new(0.0, -0.05, 0.0)).scale(Vec3::new(10.0, 0.1, 10.0)),
            RenderMesh::new(cube, Material::standard(Color::WHITE).with_map(floor_map)),
        );
        room.spawn_mesh(
            Transform::from_position(Vec3::new(0.0, 0.5, -2.3)).scale(Vec3::new(2.2, 1.0, 0.6)),
            RenderMesh::new(cube, Material::standard(Color::rgb(0.25, 0.15, 0.1))),
        );
        room.spawn_mesh(
            Transform::from_position(Vec3::new(0.0, 1.5, -2.1)).scale(Vec3::new(1.8, 1.35, 0.1)),
            RenderMesh::new(cube, Material::standard(Color::rgb(0.05, 0.05, 0.05))),
        );
        let mut room_camera = Camera::new()
            .at(Vec3::new(0.0, 1.6, 2.5))
            .looking_at(Vec3::new(0.0, 1.4, -2.0))
            .with_fov(60.0);
        room_camera.set_aspect_from_size(renderer.gpu().width(), renderer.gpu().height());

        // The world inside the TV. The avatar waits in the room until the hand-off.
        let mut world = SceneGraph::new("Inside");
        world.spawn_mesh(
            Transform::from_position(Vec3::new(0.0, -0.05, 0.0)).scale(Vec3::new(30.0, 0.1, 30.0)),
            RenderMesh::new(
                cube,
                Material::standard(Color::WHITE)
                    .with_map(grass_map)
                    .with_slot(MapSlot::Normal, detail_map)
                    .with_slot(MapSlot::Roughness, detail_map),
            ),
        );
        for i in 0..6 {
            let angle = i as f32 * std::f32::consts::TAU / 6.0;
            world.spawn_mesh(
                Transform::from_position(Vec3::new(angle.cos() * 6.0, 1.0, angle.sin() * 6.0))
                    .uniform_scale(2.0),
                RenderMesh::new(
                    cube,
                    Material::standard(Color::rgb(0.6, 0.6, 0.7))
                        .with_map(floor_map)
                        .with_slot(MapSlot::AmbientOcclusion, detail_map),
                ),
            );
        }
        let avatar_entity = room.spawn_mesh(
            Transform::from_position(Vec3::new(0.0, -5.0, 0.0)).uniform_scale(0.8),
            RenderMesh::new(
                cube,
                Material::standard(Color::WHITE)
                    .with_map(skin_map)
                    .with_slot(MapSlot::Normal, detail_map)
                    .with_slot(MapSlot::Emissive, detail_map),
            ),
        );
        let avatar = Avatar::new(avatar_entity, SceneRole::Primary);

        let world_camera = Camera::new()
            .at(Vec3::new(9.0, 5.0, 9.0))
            .looking_at(Vec3::ZERO);
        let mut compositor = RenderSurfaceCompositor::new(
            &mut renderer,
            CompositorConfig::default()
                .resolution(640, 480)
                .clear_color(Color::rgb(0.45, 0.6, 0.85))
                .label("TV"),
            world,
            world_camera,
        );
        compositor.create_display_surface(
            &mut renderer,
            &mut room,
            Vec3::new(0.0, 1.5, -2.04),
            Vec2::new(1.6, 1.2),
            Vec3::Z,
        )?;

        let grain_pass = GrainPass::new(renderer.gpu());
        let overlay_pass = OverlayPass::new(renderer.gpu());
        let now = Instant::now();

        Ok(Self {
            window,
            renderer,
            grain_pass,
            overlay_pass,
            room,
            room_camera,
            compositor,
            avatar,
            follow: FollowCamera::new().distance(6.0).distance_limits(2.0, 12.0),
            grain: GrainSettings::default(),
            overlay: OverlayState::new(),
            transition: CinematicTransitionController::new(TransitionConfig::default()),
            active: ActiveCamera::Primary,
            started: false,
            start_time: now,
            last_frame: now,
        })
    }

    fn start_transition(&mut self) {
        if self.started {
            return;
        }
        let (width, height) = (self.renderer.gpu().width(), self.renderer.gpu().height());
        let display = self.compositor.display_surface().copied();
        let (world, world_camera) = self.compositor.secondary_parts_mut();
        let mut rig = TransitionRig::new(
            &mut self.room_camera,
            &mut self.room,
            world,
            world_camera,
            &mut self.avatar,
        )
        .display(display)
        .follow_camera(&mut self.follow)
        .grain(&mut self.grain)
        .overlay(&mut self.overlay)
        .viewport(width, height);

        match self
            .transition
            .start(&mut rig, || log::info!("welcome inside"))
        {
            Ok(_) => self.started = true,
            Err(err) => log::warn!("{err}"),
        }
    }

    fn update(&mut self, dt: f32, elapsed: f32) {
        if !self.started && elapsed >= AUTO_START {
            self.start_transition();
        }

        if self.transition.is_in_progress() {
            let (width, height) = (self.renderer.gpu().width(), self.renderer.gpu().height());
            let display = self.compositor.display_surface().copied();
            let (world, world_camera) = self.compositor.secondary_parts_mut();
            let mut rig = TransitionRig::new(
                &mut self.room_camera,
                &mut self.room,
                world,
                world_camera,
                &mut self.avatar,
            )
            .display(display)
            .follow_camera(&mut self.follow)
            .grain(&mut self.grain)
            .overlay(&mut self.overlay)
            .viewport(width, height);
            self.active = self.transition.update(dt, &mut rig);
        } else if self.avatar.scene == SceneRole::Secondary {
            // Walk the avatar in a slow circle and let the follow camera trail it.
            let world = self.compositor.secondary_scene_mut();
            let position = Vec3::new(
                (elapsed * 0.4).sin() * 3.0,
                0.4,
                (elapsed * 0.4).cos() * 3.0,
            );
            if let Some(transform) = world.transform(self.avatar.entity) {
                world.set_transform(self.avatar.entity, transform.position(position));
            }
            self.follow.follow(position + Vec3::Y);
            self.follow.orbit(dt * 0.1, 0.0);
            self.follow.update(dt);
            self.follow.apply(self.compositor.secondary_camera_mut());
        }

        self.overlay.tick(dt);
        self.grain.time = elapsed;
        self.renderer.set_time(elapsed);
    }

    fn render(&mut self, dt: f32, elapsed: f32) -> Result<(), RenderError> {
        if self.active == ActiveCamera::Primary {
            let limit = self.renderer.gpu().texture_unit_limit();
            self.renderer
                .set_reserved_texture_units(limit.saturating_sub(SCREEN_TEXTURE_UNITS));
            let outcome = self.compositor.render_frame(&mut self.renderer, dt, elapsed);
            self.renderer.set_reserved_texture_units(0);
            outcome?;
        }

        self.renderer.set_render_target(None);
        self.renderer.set_clear_color(Color::rgb(0.02, 0.02, 0.03));
        self.renderer.clear();
        let drawn = match self.active {
            ActiveCamera::Primary => self.renderer.render(&self.room, &self.room_camera),
            ActiveCamera::Secondary => self.renderer.render(
                self.compositor.secondary_scene(),
                self.compositor.secondary_camera(),
            ),
        };
        match drawn {
            Err(err) if err.is_budget_overflow() => log::warn!("{err}"),
            other => other?,
        }

        let output = match self.renderer.gpu().surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.window.inner_size();
                self.renderer.resize(size.width, size.height);
                return Ok(());
            }
            Err(err) => return Err(RenderError::Surface(err.to_string())),
        };
        let gpu = self.renderer.gpu();
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(frame) = self.renderer.frame_texture() {
                self.grain_pass
                    .render(gpu, &mut render_pass, frame, &self.grain);
            }
            self.overlay_pass
                .render(gpu, &mut render_pass, &self.overlay);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        let elapsed = (now - self.start_time).as_secs_f32();
        self.last_frame = now;

        self.update(dt, elapsed);
        if let Err(err) = self.render(dt, elapsed) {
            log::error!("frame failed: {err}");
        }
    }
}

#[derive(Default)]
struct App {
    demo: Option<Demo>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.demo.is_some() {
            return;
        }

        let attributes = Window::default_attributes().with_title("Telescreen");
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        match Demo::new(window) {
            Ok(demo) => self.demo = Some(demo),
            Err(err) => {
                log::error!("failed to set up the demo: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(demo) = self.demo.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                demo.renderer.resize(size.width, size.height);
                demo.room_camera.set_aspect_from_size(size.width, size.height);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Space)
                {
                    demo.start_transition();
                }
            }
            WindowEvent::RedrawRequested => {
                demo.tick();
                demo.window.request_redraw();
            }
            _ => (),
        }
    }
}

fn main() -> Result<(), winit::error::EventLoopError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::default();
    event_loop.run_app(&mut app)
}
