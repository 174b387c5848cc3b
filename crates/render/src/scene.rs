//! Ordered scene of meshes with per-mesh animation.

use glam::{Mat4, Vec3};

use crate::device::{GraphicsDevice, SamplerFilter};
use crate::mesh::Mesh;

/// Advances one mesh's world matrix each update.
pub trait Animator {
    fn advance(&mut self, world: Mat4, elapsed_seconds: f32) -> Mat4;
}

impl<F: FnMut(Mat4, f32) -> Mat4> Animator for F {
    fn advance(&mut self, world: Mat4, elapsed_seconds: f32) -> Mat4 {
        self(world, elapsed_seconds)
    }
}

/// Leaves the world matrix untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Static;

impl Animator for Static {
    fn advance(&mut self, world: Mat4, _elapsed_seconds: f32) -> Mat4 {
        world
    }
}

/// Rotates about a local axis at a fixed angular speed. The first world
/// matrix seen becomes the base the rotation is applied to.
#[derive(Debug, Clone)]
pub struct Spin {
    axis: Vec3,
    radians_per_second: f32,
    angle: f32,
    base: Option<Mat4>,
}

impl Spin {
    pub fn new(axis: Vec3, radians_per_second: f32) -> Self {
        Self {
            axis: axis.try_normalize().unwrap_or(Vec3::Y),
            radians_per_second,
            angle: 0.0,
            base: None,
        }
    }

    /// Quarter turn per second about +Y.
    pub fn y_axis() -> Self {
        Self::new(Vec3::Y, std::f32::consts::FRAC_PI_2)
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }
}

impl Animator for Spin {
    fn advance(&mut self, world: Mat4, elapsed_seconds: f32) -> Mat4 {
        let base = *self.base.get_or_insert(world);
        self.angle = (self.angle + self.radians_per_second * elapsed_seconds)
            % std::f32::consts::TAU;
        base * Mat4::from_axis_angle(self.axis, self.angle)
    }
}

pub struct SceneEntry<D: GraphicsDevice> {
    mesh: Mesh<D>,
    animator: Box<dyn Animator>,
}

impl<D: GraphicsDevice> SceneEntry<D> {
    pub fn mesh(&self) -> &Mesh<D> {
        &self.mesh
    }
}

/// Meshes in insertion order plus the global sampler filter mirrored into
/// their materials.
pub struct Scene<D: GraphicsDevice> {
    entries: Vec<SceneEntry<D>>,
    filter: SamplerFilter,
    animating: bool,
}

impl<D: GraphicsDevice> Default for Scene<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: GraphicsDevice> Scene<D> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            filter: SamplerFilter::default(),
            animating: true,
        }
    }

    /// Append a mesh. Its material picks up the current filter mode.
    pub fn add(&mut self, mesh: Mesh<D>, animator: Box<dyn Animator>) -> usize {
        mesh.material().set_sampler_filter(self.filter);
        self.entries.push(SceneEntry { mesh, animator });
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SceneEntry<D>] {
        &self.entries
    }

    pub fn meshes(&self) -> impl Iterator<Item = &Mesh<D>> {
        self.entries.iter().map(|e| &e.mesh)
    }

    pub fn mesh(&self, index: usize) -> Option<&Mesh<D>> {
        self.entries.get(index).map(|e| &e.mesh)
    }

    pub fn mesh_mut(&mut self, index: usize) -> Option<&mut Mesh<D>> {
        self.entries.get_mut(index).map(|e| &mut e.mesh)
    }

    pub fn filter_mode(&self) -> SamplerFilter {
        self.filter
    }

    /// Set the filter mode and push it into every material in the scene.
    pub fn set_filter_mode(&mut self, filter: SamplerFilter) {
        self.filter = filter;
        for entry in &self.entries {
            entry.mesh.material().set_sampler_filter(filter);
        }
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn set_animating(&mut self, animating: bool) {
        self.animating = animating;
    }

    /// Run every animator in insertion order.
    pub fn update(&mut self, elapsed_seconds: f32) {
        if !self.animating {
            return;
        }
        for entry in &mut self.entries {
            let world = entry
                .animator
                .advance(entry.mesh.world_matrix(), elapsed_seconds);
            entry.mesh.set_world_matrix(world);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::headless::{HeadlessDevice, HeadlessWindow};
    use crate::material::Material;
    use crate::shaders::BuiltinEffect;
    use lumen_common::VertexPosCol;

    fn mesh(device: &mut HeadlessDevice, material: Rc<Material<HeadlessDevice>>) -> Mesh<HeadlessDevice> {
        let vertices = [VertexPosCol { position: [0.0; 3], color: [1.0; 3] }; 3];
        Mesh::create(device, material, &vertices, &[0, 1, 2])
            .map_err(|e| e.to_string())
            .unwrap()
    }

    fn material(device: &mut HeadlessDevice, effect: BuiltinEffect) -> Rc<Material<HeadlessDevice>> {
        Rc::new(
            Material::from_asset(device, &effect.asset().unwrap())
                .map_err(|e| e.to_string())
                .unwrap(),
        )
    }

    #[test]
    fn spin_accumulates_from_base() {
        let base = Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0));
        let mut spin = Spin::new(Vec3::Y, 1.0);
        let w1 = spin.advance(base, 0.25);
        let w2 = spin.advance(w1, 0.25);
        assert!((spin.angle() - 0.5).abs() < 1e-6);
        let expected = base * Mat4::from_rotation_y(0.5);
        assert!(w2.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn closures_are_animators() {
        let mut lift = |world: Mat4, dt: f32| world * Mat4::from_translation(Vec3::Y * dt);
        let w = lift.advance(Mat4::IDENTITY, 2.0);
        assert_eq!(w.w_axis.y, 2.0);
        assert_eq!(Static.advance(w, 1.0), w);
    }

    #[test]
    fn update_runs_in_insertion_order_and_respects_pause() {
        let window = HeadlessWindow::new(32, 32);
        let (mut device, _context) = HeadlessDevice::create_device(&window).unwrap();
        let shared = material(&mut device, BuiltinEffect::PosCol);

        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut scene = Scene::new();
        for id in 0..3 {
            let order = order.clone();
            scene.add(
                mesh(&mut device, shared.clone()),
                Box::new(move |world: Mat4, _dt: f32| {
                    order.borrow_mut().push(id);
                    world
                }),
            );
        }
        scene.update(0.016);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);

        scene.set_animating(false);
        scene.update(0.016);
        assert_eq!(order.borrow().len(), 3);
    }

    #[test]
    fn filter_mode_reaches_every_material() {
        let window = HeadlessWindow::new(32, 32);
        let (mut device, _context) = HeadlessDevice::create_device(&window).unwrap();
        let shared = material(&mut device, BuiltinEffect::PosTex);
        let other = material(&mut device, BuiltinEffect::Transparent);

        let mut scene = Scene::new();
        scene.set_filter_mode(SamplerFilter::Linear);
        scene.add(mesh_tex(&mut device, shared.clone()), Box::new(Static));
        scene.add(mesh_tex(&mut device, shared.clone()), Box::new(Static));
        // picked up on add
        assert_eq!(shared.sampler_filter(), SamplerFilter::Linear);

        scene.add(mesh_tex(&mut device, other.clone()), Box::new(Static));
        scene.set_filter_mode(SamplerFilter::Anisotropic);
        for m in scene.meshes() {
            assert_eq!(m.material().sampler_filter(), SamplerFilter::Anisotropic);
        }
        assert_eq!(other.sampler_filter(), SamplerFilter::Anisotropic);
    }

    fn mesh_tex(device: &mut HeadlessDevice, material: Rc<Material<HeadlessDevice>>) -> Mesh<HeadlessDevice> {
        let (vertices, indices) = quad();
        Mesh::create(device, material, &vertices, &indices)
            .map_err(|e| e.to_string())
            .unwrap()
    }

    fn quad() -> (Vec<lumen_common::VertexPosTex>, Vec<u32>) {
        let v = |x: f32, y: f32| lumen_common::VertexPosTex { position: [x, y, 0.0], uv: [x, y] };
        (vec![v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0)], vec![0, 1, 2, 2, 3, 0])
    }
}
