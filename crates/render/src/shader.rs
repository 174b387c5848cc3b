//! Effect manifests and WGSL reflection.
//!
//! An effect is a JSON manifest plus a WGSL module. The manifest names the
//! techniques and their passes (entry points and fixed-function state) and
//! declares which optional inputs the material drives: texture slots, the
//! world matrix and the inverse view matrix. The WGSL module is parsed and
//! validated with naga, then every bound global is matched by name against
//! what the manifest declares.
//!
//! Variables live in bind group 0:
//!
//! | name              | type                 | present when           |
//! |-------------------|----------------------|------------------------|
//! | `world_view_proj` | `mat4x4<f32>` uniform| always                 |
//! | `world_matrix`    | `mat4x4<f32>` uniform| `world: true`          |
//! | `view_inverse`    | `mat4x4<f32>` uniform| `view_inverse: true`   |
//! | `sampler_state`   | `sampler`            | any slot declared      |
//! | `<slot>_map`      | `texture_2d<f32>`    | slot listed in `slots` |

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use lumen_common::VertexFormat;
use naga::{
    AddressSpace, Binding, ImageDimension, Module, ScalarKind, ShaderStage, TypeInner, VectorSize,
};
use serde::{Deserialize, Serialize};

use crate::error::ShaderError;

pub const WORLD_VIEW_PROJ: &str = "world_view_proj";
pub const WORLD_MATRIX: &str = "world_matrix";
pub const VIEW_INVERSE: &str = "view_inverse";
pub const SAMPLER_STATE: &str = "sampler_state";

/// Named texture inputs a material may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureSlot {
    Diffuse,
    Normal,
    Specular,
    Gloss,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 4] = [
        TextureSlot::Diffuse,
        TextureSlot::Normal,
        TextureSlot::Specular,
        TextureSlot::Gloss,
    ];

    /// Name of the WGSL texture variable backing this slot.
    pub fn variable_name(self) -> &'static str {
        match self {
            TextureSlot::Diffuse => "diffuse_map",
            TextureSlot::Normal => "normal_map",
            TextureSlot::Specular => "specular_map",
            TextureSlot::Gloss => "gloss_map",
        }
    }

    /// Colour of the 1x1 texture sampled while the slot is unset. White
    /// everywhere except the normal slot, which gets a flat tangent-space normal.
    pub fn fallback_color(self) -> [u8; 4] {
        match self {
            TextureSlot::Normal => [128, 128, 255, 255],
            _ => [255, 255, 255, 255],
        }
    }
}

impl fmt::Display for TextureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TextureSlot::Diffuse => "diffuse",
            TextureSlot::Normal => "normal",
            TextureSlot::Specular => "specular",
            TextureSlot::Gloss => "gloss",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Opaque,
    Alpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

/// Fixed-function state applied with a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassState {
    pub blend: BlendMode,
    pub depth_write: bool,
    pub cull: CullMode,
}

impl Default for PassState {
    fn default() -> Self {
        Self {
            blend: BlendMode::Opaque,
            depth_write: true,
            cull: CullMode::Back,
        }
    }
}

/// The JSON half of an effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectManifest {
    pub name: String,
    /// WGSL file, relative to the manifest.
    pub source: String,
    #[serde(default)]
    pub slots: Vec<TextureSlot>,
    #[serde(default)]
    pub world: bool,
    #[serde(default)]
    pub view_inverse: bool,
    pub techniques: Vec<TechniqueDesc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueDesc {
    pub name: String,
    pub passes: Vec<PassDesc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassDesc {
    #[serde(default = "default_pass_name")]
    pub name: String,
    pub vertex: String,
    pub fragment: String,
    #[serde(default)]
    pub blend: BlendMode,
    #[serde(default = "default_depth_write")]
    pub depth_write: bool,
    #[serde(default)]
    pub cull: CullMode,
}

fn default_pass_name() -> String {
    "main".into()
}

fn default_depth_write() -> bool {
    true
}

/// Manifest plus WGSL source, ready to compile.
#[derive(Debug, Clone)]
pub struct ShaderAsset {
    pub manifest: EffectManifest,
    pub source: String,
}

impl ShaderAsset {
    /// Read a manifest and the WGSL file it points at.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let path = path.as_ref();
        let text = read(path)?;
        let manifest: EffectManifest = serde_json::from_str(&text)?;
        let source_path = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&manifest.source);
        let source = read(&source_path)?;
        Ok(Self { manifest, source })
    }

    /// Build an asset from a manifest document and WGSL text held in memory.
    pub fn from_json(manifest: &str, source: &str) -> Result<Self, ShaderError> {
        Ok(Self {
            manifest: serde_json::from_str(manifest)?,
            source: source.to_owned(),
        })
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }
}

fn read(path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Type of a bound shader variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Matrix,
    Texture,
    Sampler,
}

impl VariableKind {
    fn describe(self) -> &'static str {
        match self {
            VariableKind::Matrix => "uniform mat4x4<f32>",
            VariableKind::Texture => "texture_2d<f32>",
            VariableKind::Sampler => "non-comparison sampler",
        }
    }
}

/// A bound global found in the WGSL module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderVariable {
    pub name: String,
    pub binding: u32,
    pub kind: VariableKind,
}

/// One vertex-stage input of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderInput {
    pub location: u32,
    pub format: VertexFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    pub name: String,
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub state: PassState,
    /// Input signature of the vertex entry point, sorted by location.
    pub inputs: Vec<ShaderInput>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Technique {
    pub name: String,
    pub passes: Vec<Pass>,
}

impl Technique {
    pub fn is_translucent(&self) -> bool {
        self.passes.iter().any(|p| p.state.blend == BlendMode::Alpha)
    }
}

/// Binding numbers of every variable a material drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVariables {
    pub world_view_proj: u32,
    pub world: Option<u32>,
    pub view_inverse: Option<u32>,
    pub sampler: Option<u32>,
    pub slots: Vec<(TextureSlot, u32)>,
}

/// A parsed, validated and reflected effect.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    name: String,
    source: String,
    variables: Vec<ShaderVariable>,
    techniques: Vec<Technique>,
    resolved: ResolvedVariables,
    slots: Vec<TextureSlot>,
}

impl CompiledShader {
    pub fn compile(asset: &ShaderAsset) -> Result<Self, ShaderError> {
        let manifest = &asset.manifest;
        let effect = manifest.name.clone();

        let module = naga::front::wgsl::parse_str(&asset.source).map_err(|e| {
            ShaderError::Parse {
                effect: effect.clone(),
                message: e.emit_to_string(&asset.source),
            }
        })?;
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            effect: effect.clone(),
            message: e.into_inner().to_string(),
        })?;

        let variables = reflect_variables(&module, &effect)?;
        let slots = dedup_slots(&manifest.slots);
        let resolved = resolve_variables(manifest, &slots, &variables)?;

        let techniques = manifest
            .techniques
            .iter()
            .map(|desc| build_technique(&module, &effect, desc))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            effect = %effect,
            techniques = techniques.len(),
            variables = variables.len(),
            "compiled effect"
        );

        Ok(Self {
            name: effect,
            source: asset.source.clone(),
            variables,
            techniques,
            resolved,
            slots,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// WGSL source the module was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every bound variable, sorted by binding number.
    pub fn variables(&self) -> &[ShaderVariable] {
        &self.variables
    }

    pub fn techniques(&self) -> &[Technique] {
        &self.techniques
    }

    /// The named technique, or the first declared one.
    pub fn technique(&self, name: Option<&str>) -> Result<&Technique, ShaderError> {
        let found = match name {
            Some(name) => self.techniques.iter().find(|t| t.name == name),
            None => self.techniques.first(),
        };
        found.ok_or_else(|| ShaderError::MissingTechnique {
            effect: self.name.clone(),
            technique: name.unwrap_or("<first>").to_owned(),
        })
    }

    pub fn resolved(&self) -> &ResolvedVariables {
        &self.resolved
    }

    pub fn slots(&self) -> &[TextureSlot] {
        &self.slots
    }
}

fn dedup_slots(slots: &[TextureSlot]) -> Vec<TextureSlot> {
    let mut out: Vec<TextureSlot> = Vec::with_capacity(slots.len());
    for &slot in slots {
        if !out.contains(&slot) {
            out.push(slot);
        }
    }
    out
}

fn classify(module: &Module, var: &naga::GlobalVariable) -> Option<VariableKind> {
    match &module.types[var.ty].inner {
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float
            && scalar.width == 4
            && var.space == AddressSpace::Uniform =>
        {
            Some(VariableKind::Matrix)
        }
        TypeInner::Image {
            dim: ImageDimension::D2,
            arrayed: false,
            class: naga::ImageClass::Sampled {
                kind: ScalarKind::Float,
                multi: false,
            },
        } => Some(VariableKind::Texture),
        TypeInner::Sampler { comparison: false } => Some(VariableKind::Sampler),
        _ => None,
    }
}

fn reflect_variables(module: &Module, effect: &str) -> Result<Vec<ShaderVariable>, ShaderError> {
    let mut variables = Vec::new();
    let mut used = BTreeSet::new();

    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();
        if binding.group != 0 {
            return Err(ShaderError::InvalidBinding {
                effect: effect.to_owned(),
                variable: name,
                reason: format!("group {} used, only group 0 is supported", binding.group),
            });
        }
        if !used.insert(binding.binding) {
            return Err(ShaderError::InvalidBinding {
                effect: effect.to_owned(),
                variable: name,
                reason: format!("binding {} is used twice", binding.binding),
            });
        }
        let Some(kind) = classify(module, var) else {
            let expected = expected_kind(&name);
            return Err(match expected {
                Some(kind) => ShaderError::VariableType {
                    effect: effect.to_owned(),
                    variable: name,
                    expected: kind.describe(),
                },
                None => ShaderError::UnexpectedVariable {
                    effect: effect.to_owned(),
                    variable: name,
                },
            });
        };
        variables.push(ShaderVariable {
            name,
            binding: binding.binding,
            kind,
        });
    }

    variables.sort_by_key(|v| v.binding);
    Ok(variables)
}

/// Kind a well-known variable name must have.
fn expected_kind(name: &str) -> Option<VariableKind> {
    match name {
        WORLD_VIEW_PROJ | WORLD_MATRIX | VIEW_INVERSE => Some(VariableKind::Matrix),
        SAMPLER_STATE => Some(VariableKind::Sampler),
        _ if TextureSlot::ALL.iter().any(|s| s.variable_name() == name) => {
            Some(VariableKind::Texture)
        }
        _ => None,
    }
}

fn resolve_variables(
    manifest: &EffectManifest,
    slots: &[TextureSlot],
    variables: &[ShaderVariable],
) -> Result<ResolvedVariables, ShaderError> {
    let effect = manifest.name.as_str();
    let mut driven: Vec<&str> = vec![WORLD_VIEW_PROJ];

    let find = |name: &str| -> Result<u32, ShaderError> {
        let var = variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| ShaderError::MissingVariable {
                effect: effect.to_owned(),
                variable: name.to_owned(),
            })?;
        match expected_kind(name) {
            Some(kind) if kind != var.kind => Err(ShaderError::VariableType {
                effect: effect.to_owned(),
                variable: name.to_owned(),
                expected: kind.describe(),
            }),
            _ => Ok(var.binding),
        }
    };

    let world_view_proj = find(WORLD_VIEW_PROJ)?;
    let world = if manifest.world {
        driven.push(WORLD_MATRIX);
        Some(find(WORLD_MATRIX)?)
    } else {
        None
    };
    let view_inverse = if manifest.view_inverse {
        driven.push(VIEW_INVERSE);
        Some(find(VIEW_INVERSE)?)
    } else {
        None
    };
    let sampler = if slots.is_empty() {
        None
    } else {
        driven.push(SAMPLER_STATE);
        Some(find(SAMPLER_STATE)?)
    };
    let mut resolved_slots = Vec::with_capacity(slots.len());
    for &slot in slots {
        driven.push(slot.variable_name());
        resolved_slots.push((slot, find(slot.variable_name())?));
    }

    if let Some(extra) = variables.iter().find(|v| !driven.contains(&v.name.as_str())) {
        return Err(ShaderError::UnexpectedVariable {
            effect: effect.to_owned(),
            variable: extra.name.clone(),
        });
    }

    Ok(ResolvedVariables {
        world_view_proj,
        world,
        view_inverse,
        sampler,
        slots: resolved_slots,
    })
}

fn build_technique(
    module: &Module,
    effect: &str,
    desc: &TechniqueDesc,
) -> Result<Technique, ShaderError> {
    if desc.passes.is_empty() {
        return Err(ShaderError::EmptyTechnique {
            effect: effect.to_owned(),
            technique: desc.name.clone(),
        });
    }
    let mut passes = Vec::with_capacity(desc.passes.len());
    for pass in &desc.passes {
        let vertex = find_entry(module, effect, ShaderStage::Vertex, &pass.vertex)?;
        find_entry(module, effect, ShaderStage::Fragment, &pass.fragment)?;
        passes.push(Pass {
            name: pass.name.clone(),
            vertex_entry: pass.vertex.clone(),
            fragment_entry: pass.fragment.clone(),
            state: PassState {
                blend: pass.blend,
                depth_write: pass.depth_write,
                cull: pass.cull,
            },
            inputs: reflect_inputs(module, effect, vertex)?,
        });
    }
    Ok(Technique {
        name: desc.name.clone(),
        passes,
    })
}

fn find_entry<'m>(
    module: &'m Module,
    effect: &str,
    stage: ShaderStage,
    name: &str,
) -> Result<&'m naga::EntryPoint, ShaderError> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.stage == stage && ep.name == name)
        .ok_or_else(|| ShaderError::MissingEntryPoint {
            effect: effect.to_owned(),
            stage: if stage == ShaderStage::Vertex {
                "vertex"
            } else {
                "fragment"
            },
            entry: name.to_owned(),
        })
}

/// Location inputs of a vertex entry point, whether passed as plain
/// arguments or as members of an input struct.
fn reflect_inputs(
    module: &Module,
    effect: &str,
    entry: &naga::EntryPoint,
) -> Result<Vec<ShaderInput>, ShaderError> {
    let mut located = Vec::new();
    for arg in &entry.function.arguments {
        match (&arg.binding, &module.types[arg.ty].inner) {
            (Some(Binding::Location { location, .. }), _) => located.push((*location, arg.ty)),
            (None, TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let Some(Binding::Location { location, .. }) = &member.binding {
                        located.push((*location, member.ty));
                    }
                }
            }
            _ => {}
        }
    }

    let mut inputs = Vec::with_capacity(located.len());
    for (location, ty) in located {
        let format = vertex_format(&module.types[ty].inner).ok_or_else(|| {
            ShaderError::UnsupportedInput {
                effect: effect.to_owned(),
                entry: entry.name.clone(),
                location,
            }
        })?;
        inputs.push(ShaderInput { location, format });
    }
    inputs.sort_by_key(|i| i.location);
    Ok(inputs)
}

fn vertex_format(inner: &TypeInner) -> Option<VertexFormat> {
    let (size, scalar) = match *inner {
        TypeInner::Scalar(scalar) => (None, scalar),
        TypeInner::Vector { size, scalar } => (Some(size), scalar),
        _ => return None,
    };
    if scalar.kind != ScalarKind::Float || scalar.width != 4 {
        return None;
    }
    Some(match size {
        None => VertexFormat::Float32,
        Some(VectorSize::Bi) => VertexFormat::Float32x2,
        Some(VectorSize::Tri) => VertexFormat::Float32x3,
        Some(VectorSize::Quad) => VertexFormat::Float32x4,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "name": "test",
        "source": "test.wgsl",
        "slots": ["diffuse"],
        "techniques": [
            { "name": "default", "passes": [{ "vertex": "vs_main", "fragment": "fs_main" }] },
            { "name": "blended", "passes": [
                { "name": "p0", "vertex": "vs_main", "fragment": "fs_main", "blend": "alpha", "depth_write": false, "cull": "none" }
            ] }
        ]
    }"#;

    const SOURCE: &str = r#"
@group(0) @binding(0) var<uniform> world_view_proj: mat4x4<f32>;
@group(0) @binding(1) var sampler_state: sampler;
@group(0) @binding(2) var diffuse_map: texture_2d<f32>;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = world_view_proj * vec4<f32>(in.position, 1.0);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(diffuse_map, sampler_state, in.uv);
}
"#;

    fn compile(manifest: &str, source: &str) -> Result<CompiledShader, ShaderError> {
        CompiledShader::compile(&ShaderAsset::from_json(manifest, source).unwrap())
    }

    #[test]
    fn manifest_defaults() {
        let asset = ShaderAsset::from_json(MANIFEST, SOURCE).unwrap();
        let pass = &asset.manifest.techniques[0].passes[0];
        assert_eq!(pass.name, "main");
        assert_eq!(pass.blend, BlendMode::Opaque);
        assert!(pass.depth_write);
        assert_eq!(pass.cull, CullMode::Back);
        assert!(!asset.manifest.world);
    }

    #[test]
    fn reflects_variables_and_inputs() {
        let shader = compile(MANIFEST, SOURCE).unwrap();
        let names: Vec<_> = shader.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["world_view_proj", "sampler_state", "diffuse_map"]);

        let resolved = shader.resolved();
        assert_eq!(resolved.world_view_proj, 0);
        assert_eq!(resolved.sampler, Some(1));
        assert_eq!(resolved.slots, vec![(TextureSlot::Diffuse, 2)]);

        let technique = shader.technique(None).unwrap();
        assert_eq!(technique.name, "default");
        assert_eq!(
            technique.passes[0].inputs,
            vec![
                ShaderInput { location: 0, format: VertexFormat::Float32x3 },
                ShaderInput { location: 1, format: VertexFormat::Float32x2 },
            ]
        );
    }

    #[test]
    fn technique_lookup_by_name() {
        let shader = compile(MANIFEST, SOURCE).unwrap();
        let blended = shader.technique(Some("blended")).unwrap();
        assert!(blended.is_translucent());
        assert_eq!(blended.passes[0].state.cull, CullMode::None);
        assert!(!blended.passes[0].state.depth_write);
        assert!(matches!(
            shader.technique(Some("nope")),
            Err(ShaderError::MissingTechnique { .. })
        ));
    }

    #[test]
    fn missing_world_view_proj_is_rejected() {
        let source = SOURCE
            .replace("var<uniform> world_view_proj", "var<uniform> mvp")
            .replace("world_view_proj *", "mvp *");
        let err = compile(MANIFEST, &source).unwrap_err();
        assert!(
            matches!(&err, ShaderError::MissingVariable { variable, .. } if variable == WORLD_VIEW_PROJ),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn missing_world_view_proj_without_other_globals() {
        let manifest = r#"{ "name": "bare", "source": "x.wgsl",
            "techniques": [{ "name": "t", "passes": [{ "vertex": "vs", "fragment": "fs" }] }] }"#;
        let source = r#"
@vertex
fn vs(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 1.0);
}
@fragment
fn fs() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;
        let err = compile(manifest, source).unwrap_err();
        assert!(
            matches!(&err, ShaderError::MissingVariable { variable, .. } if variable == WORLD_VIEW_PROJ),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn undriven_variable_is_rejected() {
        let manifest = MANIFEST.replace(r#""slots": ["diffuse"],"#, r#""slots": [],"#);
        let err = compile(&manifest, SOURCE).unwrap_err();
        assert!(matches!(err, ShaderError::UnexpectedVariable { .. }), "{err}");
    }

    #[test]
    fn declared_world_matrix_must_exist() {
        let manifest = MANIFEST.replace(r#""slots""#, r#""world": true, "slots""#);
        let err = compile(&manifest, SOURCE).unwrap_err();
        assert!(
            matches!(&err, ShaderError::MissingVariable { variable, .. } if variable == WORLD_MATRIX),
            "{err}"
        );
    }

    #[test]
    fn wrong_variable_type_is_rejected() {
        let source = SOURCE.replace(
            "var<uniform> world_view_proj: mat4x4<f32>",
            "var<uniform> world_view_proj: vec4<f32>",
        )
        .replace(
            "world_view_proj * vec4<f32>(in.position, 1.0)",
            "world_view_proj * in.position.x",
        );
        let err = compile(MANIFEST, &source).unwrap_err();
        assert!(matches!(err, ShaderError::VariableType { .. }), "{err}");
    }

    #[test]
    fn missing_entry_point_is_rejected() {
        let manifest = MANIFEST.replacen(r#""fragment": "fs_main""#, r#""fragment": "fs_other""#, 1);
        let err = compile(&manifest, SOURCE).unwrap_err();
        assert!(matches!(err, ShaderError::MissingEntryPoint { stage: "fragment", .. }), "{err}");
    }

    #[test]
    fn parse_errors_are_reported() {
        let err = compile(MANIFEST, "fn broken( {").unwrap_err();
        assert!(matches!(err, ShaderError::Parse { .. }));
    }

    #[test]
    fn from_file_resolves_source_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.json"), MANIFEST).unwrap();
        std::fs::write(dir.path().join("test.wgsl"), SOURCE).unwrap();
        let asset = ShaderAsset::from_file(dir.path().join("test.json")).unwrap();
        assert_eq!(asset.name(), "test");
        assert!(CompiledShader::compile(&asset).is_ok());

        std::fs::remove_file(dir.path().join("test.wgsl")).unwrap();
        assert!(matches!(
            ShaderAsset::from_file(dir.path().join("test.json")),
            Err(ShaderError::Io { .. })
        ));
    }
}
