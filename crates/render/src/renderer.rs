use lumen_common::{Extent, Viewport};

use crate::camera::Camera;
use crate::device::{GraphicsDevice, SamplerFilter, SubmissionContext, WindowSurface};
use crate::error::{InitError, InitStep};
use crate::material::FrameTransforms;
use crate::mesh::Mesh;
use crate::scene::{Animator, Scene, Static};

/// Renderer settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererConfig {
    /// Colour the render target is cleared to each frame.
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.3, 1.0],
        }
    }
}

/// Output-stage resources. Fields drop top to bottom, the reverse of
/// creation order.
struct GpuState<D: GraphicsDevice> {
    render_target_view: D::RenderTargetView,
    _render_target_buffer: D::RenderTargetBuffer,
    depth_stencil_view: D::DepthStencilView,
    _depth_stencil_buffer: D::DepthStencilBuffer,
    swap_chain: D::SwapChain,
    context: D::Context,
    device: D,
}

impl<D: GraphicsDevice> GpuState<D> {
    fn create(window: &D::Window, size: Extent) -> Result<Self, InitError> {
        let (device, context) = D::create_device(window).map_err(InitError::at(InitStep::Device))?;
        // Rebind so the context drops before the device on early return.
        let mut device = device;
        let mut context = context;
        tracing::debug!(backend = device.backend_name(), "device created");

        let swap_chain = device
            .create_swap_chain(window, size)
            .map_err(InitError::at(InitStep::SwapChain))?;
        let depth_stencil_buffer = device
            .create_depth_stencil_buffer(size)
            .map_err(InitError::at(InitStep::DepthStencilBuffer))?;
        let depth_stencil_view = device
            .create_depth_stencil_view(&depth_stencil_buffer)
            .map_err(InitError::at(InitStep::DepthStencilView))?;
        let render_target_buffer = device
            .back_buffer(&swap_chain)
            .map_err(InitError::at(InitStep::BackBuffer))?;
        let render_target_view = device
            .create_render_target_view(&render_target_buffer)
            .map_err(InitError::at(InitStep::RenderTargetView))?;

        context.set_render_targets(&render_target_view, &depth_stencil_view);
        context.set_viewport(Viewport::full(size));

        Ok(Self {
            render_target_view,
            _render_target_buffer: render_target_buffer,
            depth_stencil_view,
            _depth_stencil_buffer: depth_stencil_buffer,
            swap_chain,
            context,
            device,
        })
    }
}

/// Owns the device, the output stage, the scene and the camera.
///
/// Construction through [`Renderer::new`] never fails: if any initialization
/// step fails the error is logged and kept, and the renderer stays safe to
/// update, render and drop without drawing anything. Teardown order is fixed
/// by field order: scene (meshes and their materials), then the output stage
/// and device, then the camera.
pub struct Renderer<D: GraphicsDevice, C: Camera> {
    scene: Scene<D>,
    gpu: Option<GpuState<D>>,
    init_error: Option<InitError>,
    size: Extent,
    config: RendererConfig,
    camera: C,
}

impl<D: GraphicsDevice, C: Camera> Renderer<D, C> {
    pub fn new(window: &D::Window, camera: C, config: RendererConfig) -> Self {
        let size = window.size();
        match GpuState::<D>::create(window, size) {
            Ok(gpu) => {
                tracing::info!(
                    backend = gpu.device.backend_name(),
                    width = size.width,
                    height = size.height,
                    "renderer initialized"
                );
                Self::assemble(Some(gpu), None, size, camera, config)
            }
            Err(err) => {
                tracing::error!(
                    step = %err.step,
                    error = %err.source,
                    "renderer initialization failed"
                );
                Self::assemble(None, Some(err), size, camera, config)
            }
        }
    }

    /// Like [`Renderer::new`] but returns the initialization error.
    pub fn initialize(
        window: &D::Window,
        camera: C,
        config: RendererConfig,
    ) -> Result<Self, InitError> {
        let size = window.size();
        let gpu = GpuState::<D>::create(window, size)?;
        tracing::info!(
            backend = gpu.device.backend_name(),
            width = size.width,
            height = size.height,
            "renderer initialized"
        );
        Ok(Self::assemble(Some(gpu), None, size, camera, config))
    }

    fn assemble(
        gpu: Option<GpuState<D>>,
        init_error: Option<InitError>,
        size: Extent,
        camera: C,
        config: RendererConfig,
    ) -> Self {
        Self {
            scene: Scene::new(),
            gpu,
            init_error,
            size,
            config,
            camera,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn init_error(&self) -> Option<&InitError> {
        self.init_error.as_ref()
    }

    /// The device, for creating textures, materials and meshes.
    pub fn device_mut(&mut self) -> Option<&mut D> {
        self.gpu.as_mut().map(|gpu| &mut gpu.device)
    }

    pub fn size(&self) -> Extent {
        self.size
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn add_mesh(&mut self, mesh: Mesh<D>) -> usize {
        self.scene.add(mesh, Box::new(Static))
    }

    pub fn add_animated_mesh(&mut self, mesh: Mesh<D>, animator: impl Animator + 'static) -> usize {
        self.scene.add(mesh, Box::new(animator))
    }

    pub fn scene(&self) -> &Scene<D> {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene<D> {
        &mut self.scene
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }

    pub fn filter_mode(&self) -> SamplerFilter {
        self.scene.filter_mode()
    }

    /// Advance to the next filter mode and push it into every material.
    pub fn cycle_filter_mode(&mut self) -> SamplerFilter {
        let next = self.scene.filter_mode().next();
        self.scene.set_filter_mode(next);
        tracing::info!(filter = %next, "filter mode");
        next
    }

    pub fn is_animating(&self) -> bool {
        self.scene.is_animating()
    }

    pub fn set_animating(&mut self, animating: bool) {
        self.scene.set_animating(animating);
    }

    pub fn toggle_animation(&mut self) -> bool {
        let animating = !self.scene.is_animating();
        self.scene.set_animating(animating);
        tracing::info!(animating, "mesh animation");
        animating
    }

    /// Advance the camera, then every mesh animator in insertion order.
    pub fn update(&mut self, elapsed_seconds: f32) {
        self.camera.update(elapsed_seconds);
        self.scene.update(elapsed_seconds);
    }

    /// Clear, draw every mesh in insertion order and present. Does nothing if
    /// initialization failed.
    pub fn render(&mut self) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        gpu.context
            .clear_render_target(&gpu.render_target_view, self.config.clear_color);
        gpu.context
            .clear_depth_stencil(&gpu.depth_stencil_view, 1.0, 0);

        let view_proj = self.camera.projection_matrix() * self.camera.view_matrix();
        let view_inverse = self.camera.inverse_view_matrix();
        for mesh in self.scene.meshes() {
            let world = mesh.world_matrix();
            let transforms = FrameTransforms {
                world_view_proj: view_proj * world,
                world,
                view_inverse,
            };
            mesh.render(&mut gpu.context, &transforms);
        }

        gpu.context.present(&gpu.swap_chain);
    }
}

impl<D: GraphicsDevice, C: Camera> Drop for Renderer<D, C> {
    fn drop(&mut self) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.context.flush();
            tracing::debug!(meshes = self.scene.len(), "renderer shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use glam::{Mat4, Vec3};
    use lumen_common::{VertexPosCol, VertexPosTex};

    use super::*;
    use crate::camera::FlyCamera;
    use crate::headless::{Command, HeadlessDevice, HeadlessWindow, ResourceKind};
    use crate::material::Material;
    use crate::scene::Spin;
    use crate::shader::BlendMode;
    use crate::shaders::BuiltinEffect;

    type TestRenderer = Renderer<HeadlessDevice, FlyCamera>;

    fn renderer(window: &HeadlessWindow) -> TestRenderer {
        let camera = FlyCamera::new(Vec3::new(0.0, 0.0, 10.0), 45.0, window.size().aspect_ratio());
        Renderer::new(window, camera, RendererConfig::default())
    }

    fn material(renderer: &mut TestRenderer, effect: BuiltinEffect) -> Rc<Material<HeadlessDevice>> {
        let device = renderer.device_mut().unwrap();
        match Material::from_asset(device, &effect.asset().unwrap()) {
            Ok(material) => Rc::new(material),
            Err(err) => panic!("{effect}: {err}"),
        }
    }

    fn triangle(renderer: &mut TestRenderer, material: Rc<Material<HeadlessDevice>>) -> Mesh<HeadlessDevice> {
        let vertices = [
            VertexPosCol { position: [0.0, 3.0, 2.0], color: [1.0, 0.0, 0.0] },
            VertexPosCol { position: [3.0, -3.0, 2.0], color: [0.0, 0.0, 1.0] },
            VertexPosCol { position: [-3.0, -3.0, 2.0], color: [0.0, 1.0, 0.0] },
        ];
        Mesh::create(renderer.device_mut().unwrap(), material, &vertices, &[0, 1, 2])
            .map_err(|e| e.to_string())
            .unwrap()
    }

    fn quad(renderer: &mut TestRenderer, material: Rc<Material<HeadlessDevice>>) -> Mesh<HeadlessDevice> {
        let v = |x: f32, y: f32| VertexPosTex { position: [x, y, 0.0], uv: [x, y] };
        let vertices = [v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0)];
        Mesh::create(renderer.device_mut().unwrap(), material, &vertices, &[0, 1, 2, 2, 3, 0])
            .map_err(|e| e.to_string())
            .unwrap()
    }

    #[test]
    fn animated_frames_leave_mesh_buffers_untouched() {
        let window = HeadlessWindow::new(320, 240);
        let mut renderer = renderer(&window);
        let material = material(&mut renderer, BuiltinEffect::PosTex);
        let mesh = quad(&mut renderer, material);
        let vertices = mesh.vertex_buffer().contents().to_vec();
        let indices = mesh.index_buffer().contents().to_vec();
        renderer.add_animated_mesh(mesh, Spin::y_axis());

        for _ in 0..5 {
            renderer.update(0.25);
            renderer.render();
        }
        let mesh = renderer.scene().mesh(0).unwrap();
        assert_ne!(mesh.world_matrix(), Mat4::IDENTITY);
        assert_eq!(mesh.vertex_buffer().contents(), vertices.as_slice());
        assert_eq!(mesh.index_buffer().contents(), indices.as_slice());
    }

    #[test]
    fn initialization_binds_targets_and_full_viewport() {
        let window = HeadlessWindow::new(800, 600);
        let renderer = renderer(&window);
        assert!(renderer.is_initialized());
        assert!(renderer.init_error().is_none());

        let commands = window.trace().commands();
        assert!(matches!(commands[0], Command::SetRenderTargets { .. }));
        assert_eq!(
            commands[1],
            Command::SetViewport(Viewport {
                x: 0.0,
                y: 0.0,
                width: 800.0,
                height: 600.0,
                min_depth: 0.0,
                max_depth: 1.0,
            })
        );

        let kinds: Vec<_> = window.trace().created().into_iter().map(|(_, k)| k).collect();
        assert_eq!(
            kinds,
            [
                ResourceKind::Device,
                ResourceKind::Context,
                ResourceKind::SwapChain,
                ResourceKind::DepthStencilBuffer,
                ResourceKind::DepthStencilView,
                ResourceKind::RenderTargetBuffer,
                ResourceKind::RenderTargetView,
            ]
        );
    }

    #[test]
    fn failed_initialization_is_survivable() {
        let window = HeadlessWindow::new(800, 600).failing_on(ResourceKind::DepthStencilView);
        let mut renderer = renderer(&window);
        assert!(!renderer.is_initialized());
        assert_eq!(renderer.init_error().unwrap().step, InitStep::DepthStencilView);
        assert!(renderer.device_mut().is_none());

        // partial resources released in reverse creation order
        let released: Vec<_> = window.trace().released().into_iter().map(|(_, k)| k).collect();
        assert_eq!(
            released,
            [
                ResourceKind::DepthStencilBuffer,
                ResourceKind::SwapChain,
                ResourceKind::Context,
                ResourceKind::Device,
            ]
        );

        renderer.update(0.016);
        renderer.render();
        renderer.cycle_filter_mode();
        drop(renderer);

        let trace = window.trace();
        assert!(trace.commands().is_empty());
        assert_eq!(trace.live_total(), 0);
        assert_eq!(trace.released().len(), trace.created().len());
    }

    #[test]
    fn initialize_reports_the_failing_step() {
        let window = HeadlessWindow::new(800, 600).failing_on(ResourceKind::SwapChain);
        let camera = FlyCamera::default();
        let err = TestRenderer::initialize(&window, camera, RendererConfig::default())
            .err()
            .unwrap();
        assert_eq!(err.step, InitStep::SwapChain);
        assert!(err.to_string().contains("swap chain"));
        assert_eq!(window.trace().live_total(), 0);
    }

    #[test]
    fn every_step_failure_releases_what_was_created() {
        for kind in [
            ResourceKind::Device,
            ResourceKind::Context,
            ResourceKind::SwapChain,
            ResourceKind::DepthStencilBuffer,
            ResourceKind::DepthStencilView,
            ResourceKind::RenderTargetBuffer,
            ResourceKind::RenderTargetView,
        ] {
            let window = HeadlessWindow::new(64, 64).failing_on(kind);
            let mut renderer = renderer(&window);
            assert!(renderer.init_error().is_some(), "{kind}");
            renderer.render();
            drop(renderer);
            assert_eq!(window.trace().live_total(), 0, "{kind}");
        }
    }

    #[test]
    fn drop_releases_everything_once_in_order() {
        let window = HeadlessWindow::new(800, 600);
        let mut renderer = renderer(&window);
        let shared = material(&mut renderer, BuiltinEffect::PosCol);
        let a = triangle(&mut renderer, shared.clone());
        let b = triangle(&mut renderer, shared);
        renderer.add_mesh(a);
        renderer.add_mesh(b);
        let textured = material(&mut renderer, BuiltinEffect::PosTex);
        let c = quad(&mut renderer, textured);
        renderer.add_animated_mesh(c, Spin::y_axis());
        renderer.render();
        drop(renderer);

        let trace = window.trace();
        assert_eq!(trace.live_total(), 0);
        let released = trace.released();
        assert_eq!(released.len(), trace.created().len());
        let mut ids: Vec<_> = released.iter().map(|(id, _)| *id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), released.len());

        let kinds: Vec<_> = released.iter().map(|(_, k)| *k).collect();
        let tail = &kinds[kinds.len() - 7..];
        assert_eq!(
            tail,
            [
                ResourceKind::RenderTargetView,
                ResourceKind::RenderTargetBuffer,
                ResourceKind::DepthStencilView,
                ResourceKind::DepthStencilBuffer,
                ResourceKind::SwapChain,
                ResourceKind::Context,
                ResourceKind::Device,
            ]
        );

        // context flushed before anything is released
        let events = trace.events();
        let flush = events
            .iter()
            .position(|e| matches!(e, crate::headless::TraceEvent::Command(Command::Flush)))
            .unwrap();
        let first_release = events
            .iter()
            .position(|e| matches!(e, crate::headless::TraceEvent::Released { .. }))
            .unwrap();
        assert!(flush < first_release);
    }

    #[test]
    fn cycle_filter_mode_has_period_three_and_reaches_materials() {
        let window = HeadlessWindow::new(800, 600);
        let mut renderer = renderer(&window);
        let shared = material(&mut renderer, BuiltinEffect::PosTex);
        let other = material(&mut renderer, BuiltinEffect::Transparent);
        let a = quad(&mut renderer, shared.clone());
        let b = quad(&mut renderer, shared.clone());
        let c = quad(&mut renderer, other.clone());
        renderer.add_mesh(a);
        renderer.add_mesh(b);
        renderer.add_mesh(c);

        assert_eq!(renderer.filter_mode(), SamplerFilter::Point);
        assert_eq!(renderer.cycle_filter_mode(), SamplerFilter::Linear);
        assert_eq!(shared.sampler_filter(), SamplerFilter::Linear);
        assert_eq!(other.sampler_filter(), SamplerFilter::Linear);

        for k in 0..10 {
            let window = HeadlessWindow::new(8, 8);
            let mut r = renderer_with_quad(&window);
            for _ in 0..k {
                r.cycle_filter_mode();
            }
            let expected = SamplerFilter::ALL[k % 3];
            assert_eq!(r.filter_mode(), expected);
            for mesh in r.scene().meshes() {
                assert_eq!(mesh.material().sampler_filter(), expected);
            }
        }
    }

    fn renderer_with_quad(window: &HeadlessWindow) -> TestRenderer {
        let mut r = renderer(window);
        let m = material(&mut r, BuiltinEffect::PosTex);
        let mesh = quad(&mut r, m);
        r.add_mesh(mesh);
        r
    }

    #[test]
    fn render_clears_draws_in_order_and_presents() {
        let window = HeadlessWindow::new(800, 600);
        let mut renderer = renderer(&window);
        let opaque = material(&mut renderer, BuiltinEffect::PosTex);
        let translucent = material(&mut renderer, BuiltinEffect::Transparent);
        let a = quad(&mut renderer, opaque);
        let b = quad(&mut renderer, translucent);
        renderer.add_mesh(a);
        renderer.add_mesh(b);

        window.trace().clear_commands();
        renderer.render();
        let commands = window.trace().commands();

        assert!(matches!(
            commands[0],
            Command::ClearRenderTarget { color: [0.0, 0.0, 0.3, 1.0], .. }
        ));
        assert!(matches!(
            commands[1],
            Command::ClearDepthStencil { depth: 1.0, stencil: 0, .. }
        ));
        assert!(matches!(commands.last(), Some(Command::Present { .. })));

        let blends: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::ApplyPass { blend, .. } => Some(*blend),
                _ => None,
            })
            .collect();
        assert_eq!(blends, [BlendMode::Opaque, BlendMode::Alpha]);
        let draws = commands
            .iter()
            .filter(|c| matches!(c, Command::DrawIndexed { index_count: 6 }))
            .count();
        assert_eq!(draws, 2);
    }

    #[test]
    fn render_composes_projection_view_world() {
        let window = HeadlessWindow::new(800, 600);
        let mut renderer = renderer(&window);
        let m = material(&mut renderer, BuiltinEffect::PosCol);
        let mut mesh = triangle(&mut renderer, m);
        let world = Mat4::from_translation(Vec3::new(1.0, -2.0, 0.5));
        mesh.set_world_matrix(world);
        renderer.add_mesh(mesh);

        window.trace().clear_commands();
        renderer.render();
        let camera = renderer.camera();
        let expected = camera.projection_matrix() * camera.view_matrix() * world;
        let bound = window
            .trace()
            .commands()
            .into_iter()
            .find_map(|c| match c {
                Command::ApplyPass { bindings, .. } => Some(bindings),
                _ => None,
            })
            .unwrap();
        let crate::headless::BoundValue::Matrix(wvp) = bound[0].1 else {
            panic!("expected a matrix at binding 0");
        };
        assert!(wvp.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn update_advances_camera_then_meshes() {
        let window = HeadlessWindow::new(800, 600);
        let mut renderer = renderer(&window);
        let m = material(&mut renderer, BuiltinEffect::PosCol);
        let mesh = triangle(&mut renderer, m);
        renderer.add_animated_mesh(mesh, Spin::new(Vec3::Y, 1.0));

        renderer.camera_mut().set_motion(crate::camera::CameraMotion {
            right: 1.0,
            ..Default::default()
        });
        let start = renderer.camera().position;
        renderer.update(0.5);
        assert!(renderer.camera().position.x > start.x);
        let world = renderer.scene().mesh(0).unwrap().world_matrix();
        assert!(world.abs_diff_eq(Mat4::from_rotation_y(0.5), 1e-5));

        assert!(!renderer.toggle_animation());
        renderer.update(0.5);
        let paused = renderer.scene().mesh(0).unwrap().world_matrix();
        assert_eq!(paused, world);
    }
}
