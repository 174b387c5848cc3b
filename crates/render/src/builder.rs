//! Scene population for the viewer and the CLI.
//!
//! Builds the default scene: a vertex-coloured triangle, a spinning model
//! (an OBJ file or a procedural cube) drawn with the shaded effect or a
//! custom one, and an alpha-blended quad inserted last so it composites over
//! the opaque meshes.

use std::path::PathBuf;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use lumen_assets::AssetError;
use lumen_common::{Image, VertexPosCol};

use crate::camera::Camera;
use crate::device::GraphicsDevice;
use crate::error::{MeshError, ShaderError, TextureError};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::renderer::Renderer;
use crate::scene::Spin;
use crate::shader::{ShaderAsset, TextureSlot};
use crate::shaders::BuiltinEffect;
use crate::texture::Texture;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("renderer is not initialized")]
    NotInitialized,
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error(transparent)]
    Texture(#[from] TextureError),
}

/// What goes into the default scene. Paths override the procedural defaults.
#[derive(Debug, Clone)]
pub struct SceneOptions {
    pub triangle: bool,
    pub overlay: bool,
    /// Wavefront OBJ model; a unit cube when unset.
    pub mesh: Option<PathBuf>,
    /// Effect manifest for the model; the built-in shaded effect when unset.
    pub effect: Option<PathBuf>,
    pub technique: Option<String>,
    pub textures: Vec<(TextureSlot, PathBuf)>,
    pub model_scale: f32,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            triangle: true,
            overlay: true,
            mesh: None,
            effect: None,
            technique: None,
            textures: Vec::new(),
            model_scale: 3.0,
        }
    }
}

const TRIANGLE: [VertexPosCol; 3] = [
    VertexPosCol { position: [0.0, 3.0, 2.0], color: [1.0, 0.0, 0.0] },
    VertexPosCol { position: [3.0, -3.0, 2.0], color: [0.0, 0.0, 1.0] },
    VertexPosCol { position: [-3.0, -3.0, 2.0], color: [0.0, 1.0, 0.0] },
];

/// Populate `renderer` and return the number of meshes added.
pub fn build_scene<D: GraphicsDevice, C: Camera>(
    renderer: &mut Renderer<D, C>,
    options: &SceneOptions,
) -> Result<usize, SceneError> {
    let device = renderer.device_mut().ok_or(SceneError::NotInitialized)?;
    let mut meshes = Vec::new();

    if options.triangle {
        let material = material(device, &BuiltinEffect::PosCol.asset()?, None)?;
        let mut mesh = Mesh::create(device, Rc::new(material), &TRIANGLE, &[0, 1, 2])?;
        mesh.set_world_matrix(Mat4::from_translation(Vec3::new(-5.0, 0.0, -2.0)));
        meshes.push((mesh, false));
    }

    let (vertices, indices) = match &options.mesh {
        Some(path) => lumen_assets::load_obj(path)?,
        None => lumen_assets::cube(),
    };
    let effect = match &options.effect {
        Some(path) => ShaderAsset::from_file(path)?,
        None => BuiltinEffect::Shaded.asset()?,
    };
    let mut model_material = material(device, &effect, options.technique.as_deref())?;
    if !options
        .textures
        .iter()
        .any(|(slot, _)| *slot == TextureSlot::Diffuse)
    {
        let checker = Image::checkerboard(64, [230, 230, 230, 255], [40, 90, 200, 255]);
        assign(device, &mut model_material, TextureSlot::Diffuse, &checker, "checkerboard")?;
    }
    for (slot, path) in &options.textures {
        let image = lumen_assets::load_image(path)?;
        assign(device, &mut model_material, *slot, &image, &path.display().to_string())?;
    }
    let mut model = Mesh::create(device, Rc::new(model_material), &vertices, &indices)?;
    model.set_world_matrix(Mat4::from_scale(Vec3::splat(options.model_scale)));
    meshes.push((model, true));

    if options.overlay {
        let mut glass = material(device, &BuiltinEffect::Transparent.asset()?, None)?;
        let tint = Image::checkerboard(32, [255, 140, 20, 160], [255, 220, 60, 60]);
        assign(device, &mut glass, TextureSlot::Diffuse, &tint, "overlay tint")?;
        let (vertices, indices) = lumen_assets::quad();
        let mut quad = Mesh::create(device, Rc::new(glass), &vertices, &indices)?;
        quad.set_world_matrix(
            Mat4::from_translation(Vec3::new(4.0, 0.0, 2.5)) * Mat4::from_scale(Vec3::splat(3.0)),
        );
        meshes.push((quad, false));
    }

    let count = meshes.len();
    for (mesh, spin) in meshes {
        if spin {
            renderer.add_animated_mesh(mesh, Spin::y_axis());
        } else {
            renderer.add_mesh(mesh);
        }
    }
    tracing::info!(meshes = count, "scene built");
    Ok(count)
}

fn material<D: GraphicsDevice>(
    device: &mut D,
    asset: &ShaderAsset,
    technique: Option<&str>,
) -> Result<Material<D>, ShaderError> {
    match technique {
        Some(name) => Material::from_asset_technique(device, asset, name),
        None => Material::from_asset(device, asset),
    }
}

fn assign<D: GraphicsDevice>(
    device: &mut D,
    material: &mut Material<D>,
    slot: TextureSlot,
    image: &Image,
    label: &str,
) -> Result<(), TextureError> {
    if !material.supports_slot(slot) {
        tracing::warn!(material = material.name(), %slot, "effect has no such slot, texture skipped");
        return Ok(());
    }
    let texture = Texture::create(device, image, label)?;
    material.set_texture_slot(slot, texture);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::camera::FlyCamera;
    use crate::headless::{Command, HeadlessDevice, HeadlessWindow, ResourceKind};
    use crate::renderer::RendererConfig;
    use crate::shader::BlendMode;

    fn renderer(window: &HeadlessWindow) -> Renderer<HeadlessDevice, FlyCamera> {
        Renderer::new(window, FlyCamera::default(), RendererConfig::default())
    }

    #[test]
    fn default_scene_puts_translucent_last() {
        let window = HeadlessWindow::new(800, 600);
        let mut renderer = renderer(&window);
        let count = build_scene(&mut renderer, &SceneOptions::default()).unwrap();
        assert_eq!(count, 3);
        assert!(!renderer.scene().mesh(0).unwrap().material().is_translucent());
        assert!(renderer.scene().mesh(2).unwrap().material().is_translucent());
        let model = renderer.scene().mesh(1).unwrap().material();
        assert!(model.has_texture(TextureSlot::Diffuse));
        assert!(!model.has_texture(TextureSlot::Normal));

        window.trace().clear_commands();
        renderer.render();
        let blends: Vec<_> = window
            .trace()
            .commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::ApplyPass { blend, .. } => Some(blend),
                _ => None,
            })
            .collect();
        assert_eq!(blends, [BlendMode::Opaque, BlendMode::Opaque, BlendMode::Alpha]);
    }

    #[test]
    fn uninitialized_renderer_is_reported() {
        let window = HeadlessWindow::new(800, 600).failing_on(ResourceKind::SwapChain);
        let mut renderer = renderer(&window);
        assert!(matches!(
            build_scene(&mut renderer, &SceneOptions::default()),
            Err(SceneError::NotInitialized)
        ));
    }

    #[test]
    fn files_override_the_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path().join("tri.obj");
        std::fs::write(
            &obj,
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1\n",
        )
        .unwrap();
        let png = dir.path().join("normal.png");
        let mut bytes = Vec::new();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([128, 128, 255, 255]))
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(&png, bytes).unwrap();

        let window = HeadlessWindow::new(320, 240);
        let mut renderer = renderer(&window);
        let options = SceneOptions {
            triangle: false,
            overlay: false,
            mesh: Some(obj),
            technique: Some("diffuse".into()),
            textures: vec![(TextureSlot::Normal, png)],
            ..SceneOptions::default()
        };
        assert_eq!(build_scene(&mut renderer, &options).unwrap(), 1);
        let mesh = renderer.scene().mesh(0).unwrap();
        assert_eq!(mesh.index_count(), 3);
        assert_eq!(mesh.material().technique().name, "diffuse");
        assert!(mesh.material().has_texture(TextureSlot::Normal));
        assert!(mesh.material().has_texture(TextureSlot::Diffuse));
    }

    #[test]
    fn missing_model_file_is_an_asset_error() {
        let window = HeadlessWindow::new(320, 240);
        let mut renderer = renderer(&window);
        let options = SceneOptions {
            mesh: Some(PathBuf::from("/nonexistent/model.obj")),
            ..SceneOptions::default()
        };
        assert!(matches!(
            build_scene(&mut renderer, &options),
            Err(SceneError::Asset(_))
        ));
    }
}
