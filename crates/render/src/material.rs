//! Materials: a loaded effect plus the state a draw needs from it.
//!
//! A material owns the effect program, the active technique, one texture per
//! declared slot, and three samplers (point, linear, anisotropic) created up
//! front. Switching the filter only changes which sampler is bound, so it
//! takes `&self` and can be shared through `Rc` by every mesh using it.

use std::cell::Cell;
use std::path::Path;

use glam::Mat4;
use lumen_common::Image;

use crate::device::{GraphicsDevice, SamplerFilter, SubmissionContext, VariableBinding};
use crate::error::{DeviceError, ShaderError};
use crate::shader::{CompiledShader, ResolvedVariables, ShaderAsset, Technique, TextureSlot};
use crate::texture::Texture;

/// Matrices a material may upload for one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransforms {
    pub world_view_proj: Mat4,
    pub world: Mat4,
    pub view_inverse: Mat4,
}

impl Default for FrameTransforms {
    fn default() -> Self {
        Self {
            world_view_proj: Mat4::IDENTITY,
            world: Mat4::IDENTITY,
            view_inverse: Mat4::IDENTITY,
        }
    }
}

struct SamplerSet<D: GraphicsDevice> {
    point: D::Sampler,
    linear: D::Sampler,
    anisotropic: D::Sampler,
}

impl<D: GraphicsDevice> SamplerSet<D> {
    fn create(device: &mut D) -> Result<Self, DeviceError> {
        Ok(Self {
            point: device.create_sampler(SamplerFilter::Point)?,
            linear: device.create_sampler(SamplerFilter::Linear)?,
            anisotropic: device.create_sampler(SamplerFilter::Anisotropic)?,
        })
    }

    fn get(&self, filter: SamplerFilter) -> &D::Sampler {
        match filter {
            SamplerFilter::Point => &self.point,
            SamplerFilter::Linear => &self.linear,
            SamplerFilter::Anisotropic => &self.anisotropic,
        }
    }
}

struct SlotBinding<D: GraphicsDevice> {
    slot: TextureSlot,
    binding: u32,
    texture: Texture<D>,
    assigned: bool,
}

pub struct Material<D: GraphicsDevice> {
    name: String,
    technique: Technique,
    variables: ResolvedVariables,
    slots: Vec<SlotBinding<D>>,
    samplers: SamplerSet<D>,
    filter: Cell<SamplerFilter>,
    program: D::Program,
}

impl<D: GraphicsDevice> Material<D> {
    /// Load an effect manifest from disk and use its first technique.
    pub fn load(device: &mut D, path: impl AsRef<Path>) -> Result<Self, ShaderError> {
        Self::build(device, &ShaderAsset::from_file(path)?, None)
    }

    /// Load an effect manifest from disk and use the named technique.
    pub fn load_technique(
        device: &mut D,
        path: impl AsRef<Path>,
        technique: &str,
    ) -> Result<Self, ShaderError> {
        Self::build(device, &ShaderAsset::from_file(path)?, Some(technique))
    }

    pub fn from_asset(device: &mut D, asset: &ShaderAsset) -> Result<Self, ShaderError> {
        Self::build(device, asset, None)
    }

    pub fn from_asset_technique(
        device: &mut D,
        asset: &ShaderAsset,
        technique: &str,
    ) -> Result<Self, ShaderError> {
        Self::build(device, asset, Some(technique))
    }

    fn build(
        device: &mut D,
        asset: &ShaderAsset,
        technique: Option<&str>,
    ) -> Result<Self, ShaderError> {
        let compiled = CompiledShader::compile(asset)?;
        let technique = compiled.technique(technique)?.clone();
        let program = device.create_program(&compiled)?;
        let samplers = SamplerSet::create(device)?;

        let mut slots = Vec::with_capacity(compiled.resolved().slots.len());
        for &(slot, binding) in &compiled.resolved().slots {
            let label = format!("{} {slot} fallback", compiled.name());
            let texture = Texture::create(device, &Image::solid(slot.fallback_color()), &label)?;
            slots.push(SlotBinding {
                slot,
                binding,
                texture,
                assigned: false,
            });
        }

        tracing::info!(
            effect = compiled.name(),
            technique = %technique.name,
            passes = technique.passes.len(),
            slots = slots.len(),
            "loaded material"
        );

        Ok(Self {
            name: compiled.name().to_owned(),
            technique,
            variables: compiled.resolved().clone(),
            slots,
            samplers,
            filter: Cell::new(SamplerFilter::default()),
            program,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The technique every draw applies.
    pub fn technique(&self) -> &Technique {
        &self.technique
    }

    pub fn program(&self) -> &D::Program {
        &self.program
    }

    pub fn supports_slot(&self, slot: TextureSlot) -> bool {
        self.slots.iter().any(|s| s.slot == slot)
    }

    /// Whether a texture was assigned to `slot` (as opposed to the fallback).
    pub fn has_texture(&self, slot: TextureSlot) -> bool {
        self.slots.iter().any(|s| s.slot == slot && s.assigned)
    }

    pub fn uses_view_inverse(&self) -> bool {
        self.variables.view_inverse.is_some()
    }

    pub fn uses_world_matrix(&self) -> bool {
        self.variables.world.is_some()
    }

    pub fn is_translucent(&self) -> bool {
        self.technique.is_translucent()
    }

    /// Bind `texture` to `slot`, replacing the previous one. Ignored if the
    /// effect does not expose the slot.
    pub fn set_texture_slot(&mut self, slot: TextureSlot, texture: Texture<D>) {
        match self.slots.iter_mut().find(|s| s.slot == slot) {
            Some(binding) => {
                binding.texture = texture;
                binding.assigned = true;
            }
            None => {
                tracing::debug!(material = %self.name, %slot, "slot not exposed, texture ignored");
            }
        }
    }

    pub fn sampler_filter(&self) -> SamplerFilter {
        self.filter.get()
    }

    pub fn set_sampler_filter(&self, filter: SamplerFilter) {
        if self.filter.replace(filter) != filter {
            tracing::debug!(material = %self.name, %filter, "sampler filter changed");
        }
    }

    /// Upload the matrices this material uses and apply every pass of the
    /// active technique in order, calling `draw` after each.
    pub fn bind(
        &self,
        context: &mut D::Context,
        transforms: &FrameTransforms,
        mut draw: impl FnMut(&mut D::Context),
    ) {
        let vars = &self.variables;
        let mut values: Vec<VariableBinding<'_, D>> = Vec::with_capacity(4 + self.slots.len());
        values.push(VariableBinding::matrix(
            vars.world_view_proj,
            transforms.world_view_proj,
        ));
        if let Some(binding) = vars.world {
            values.push(VariableBinding::matrix(binding, transforms.world));
        }
        if let Some(binding) = vars.view_inverse {
            values.push(VariableBinding::matrix(binding, transforms.view_inverse));
        }
        if let Some(binding) = vars.sampler {
            values.push(VariableBinding::sampler(
                binding,
                self.samplers.get(self.filter.get()),
            ));
        }
        for slot in &self.slots {
            values.push(VariableBinding::texture(slot.binding, slot.texture.resource()));
        }

        for pass in 0..self.technique.passes.len() {
            context.apply_pass(&self.program, pass, &values);
            draw(context);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{
        BoundValue, Command, HeadlessContext, HeadlessDevice, HeadlessWindow, ResourceKind,
    };
    use crate::shaders::BuiltinEffect;

    fn device(window: &HeadlessWindow) -> (HeadlessDevice, HeadlessContext) {
        HeadlessDevice::create_device(window).unwrap()
    }

    fn load(device: &mut HeadlessDevice, effect: BuiltinEffect) -> Material<HeadlessDevice> {
        match Material::from_asset(device, &effect.asset().unwrap()) {
            Ok(material) => material,
            Err(err) => panic!("{effect}: {err}"),
        }
    }

    #[test]
    fn capability_queries() {
        let window = HeadlessWindow::new(64, 64);
        let (mut device, _context) = device(&window);

        let plain = load(&mut device, BuiltinEffect::PosCol);
        assert!(!plain.supports_slot(TextureSlot::Diffuse));
        assert!(!plain.uses_view_inverse());
        assert!(!plain.is_translucent());

        let shaded = load(&mut device, BuiltinEffect::Shaded);
        for slot in TextureSlot::ALL {
            assert!(shaded.supports_slot(slot));
            assert!(!shaded.has_texture(slot));
        }
        assert!(shaded.uses_view_inverse());
        assert!(shaded.uses_world_matrix());

        let fire = load(&mut device, BuiltinEffect::Transparent);
        assert!(fire.is_translucent());
    }

    #[test]
    fn load_creates_samplers_and_fallbacks_up_front() {
        let window = HeadlessWindow::new(64, 64);
        let (mut device, _context) = device(&window);
        let material = load(&mut device, BuiltinEffect::Shaded);
        let trace = window.trace();
        assert_eq!(trace.live(ResourceKind::Program), 1);
        assert_eq!(trace.live(ResourceKind::Sampler), 3);
        assert_eq!(trace.live(ResourceKind::Texture), 4);

        let before = trace.created().len();
        for filter in SamplerFilter::ALL {
            material.set_sampler_filter(filter);
            material.set_sampler_filter(filter);
            assert_eq!(material.sampler_filter(), filter);
        }
        assert_eq!(trace.created().len(), before);
    }

    #[test]
    fn set_texture_slot_replaces_fallback() {
        let window = HeadlessWindow::new(64, 64);
        let (mut device, _context) = device(&window);
        let mut material = load(&mut device, BuiltinEffect::PosTex);
        let texture = Texture::create(&mut device, &Image::white(), "albedo").unwrap();
        material.set_texture_slot(TextureSlot::Diffuse, texture);
        assert!(material.has_texture(TextureSlot::Diffuse));
        // fallback released, new texture live
        assert_eq!(window.trace().live(ResourceKind::Texture), 1);
    }

    #[test]
    fn unsupported_slot_is_ignored() {
        let window = HeadlessWindow::new(64, 64);
        let (mut device, _context) = device(&window);
        let mut material = load(&mut device, BuiltinEffect::PosTex);
        let texture = Texture::create(&mut device, &Image::white(), "normal").unwrap();
        material.set_texture_slot(TextureSlot::Normal, texture);
        assert!(!material.supports_slot(TextureSlot::Normal));
        assert!(!material.has_texture(TextureSlot::Diffuse));
        assert_eq!(window.trace().live(ResourceKind::Texture), 1);
    }

    #[test]
    fn bind_applies_each_pass_with_variables() {
        let window = HeadlessWindow::new(64, 64);
        let (mut device, mut context) = device(&window);
        let material = load(&mut device, BuiltinEffect::Shaded);
        material.set_sampler_filter(SamplerFilter::Anisotropic);

        let transforms = FrameTransforms {
            world_view_proj: Mat4::from_scale(glam::Vec3::splat(2.0)),
            ..FrameTransforms::default()
        };
        let mut draws = 0;
        material.bind(&mut context, &transforms, |_| draws += 1);
        assert_eq!(draws, material.technique().passes.len());

        let commands = window.trace().commands();
        let Some(Command::ApplyPass { bindings, pass, .. }) = commands.first() else {
            panic!("expected ApplyPass, got {commands:?}");
        };
        assert_eq!(*pass, 0);
        assert_eq!(bindings[0], (0, BoundValue::Matrix(transforms.world_view_proj)));
        assert!(bindings.iter().any(|(binding, value)| *binding == 3
            && matches!(value, BoundValue::Sampler { filter: SamplerFilter::Anisotropic, .. })));
        // wvp, world, view inverse, sampler, four maps
        assert_eq!(bindings.len(), 8);
    }

    #[test]
    fn technique_by_name() {
        let window = HeadlessWindow::new(64, 64);
        let (mut device, _context) = device(&window);
        let asset = BuiltinEffect::Shaded.asset().unwrap();
        let material = Material::from_asset_technique(&mut device, &asset, "diffuse").unwrap();
        assert_eq!(material.technique().name, "diffuse");
        assert!(matches!(
            Material::from_asset_technique(&mut device, &asset, "toon"),
            Err(ShaderError::MissingTechnique { .. })
        ));
    }

    #[test]
    fn failed_load_releases_partial_resources() {
        let window = HeadlessWindow::new(64, 64).failing_on(ResourceKind::Texture);
        let (mut device, _context) = device(&window);
        let result = Material::from_asset(&mut device, &BuiltinEffect::PosTex.asset().unwrap());
        assert!(matches!(result, Err(ShaderError::Texture(_))));
        assert_eq!(window.trace().live(ResourceKind::Program), 0);
        assert_eq!(window.trace().live(ResourceKind::Sampler), 0);
    }

    #[test]
    fn load_from_disk_requires_world_view_proj() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("broken.json"),
            r#"{ "name": "broken", "source": "broken.wgsl",
                 "techniques": [{ "name": "t", "passes": [{ "vertex": "vs", "fragment": "fs" }] }] }"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("broken.wgsl"),
            r#"
@group(0) @binding(0) var<uniform> transform: mat4x4<f32>;
@vertex
fn vs(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return transform * vec4<f32>(position, 1.0);
}
@fragment
fn fs() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#,
        )
        .unwrap();

        let window = HeadlessWindow::new(64, 64);
        let (mut device, _context) = device(&window);
        let result = Material::load(&mut device, dir.path().join("broken.json"));
        assert!(matches!(
            result,
            Err(ShaderError::MissingVariable { ref variable, .. }) if variable == "world_view_proj"
        ));
        assert_eq!(window.trace().live(ResourceKind::Program), 0);
    }
}
