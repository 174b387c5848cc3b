//! Built-in effects. Each is a WGSL module plus its manifest, compiled the
//! same way as effects loaded from disk.

use std::fmt;
use std::str::FromStr;

use crate::error::ShaderError;
use crate::shader::ShaderAsset;

/// Vertex colour, no textures.
pub const POS_COL_SHADER: &str = r#"
@group(0) @binding(0) var<uniform> world_view_proj: mat4x4<f32>;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = world_view_proj * vec4<f32>(in.position, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
"#;

pub const POS_COL_MANIFEST: &str = r#"{
    "name": "pos_col",
    "source": "pos_col.wgsl",
    "techniques": [
        { "name": "default", "passes": [{ "vertex": "vs_main", "fragment": "fs_main" }] }
    ]
}"#;

/// Single diffuse map.
pub const POS_TEX_SHADER: &str = r#"
@group(0) @binding(0) var<uniform> world_view_proj: mat4x4<f32>;
@group(0) @binding(3) var sampler_state: sampler;
@group(0) @binding(4) var diffuse_map: texture_2d<f32>;

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
    return vec4<f32>(textureSample(diffuse_map, sampler_state, in.uv).rgb, 1.0);
}
"#;

pub const POS_TEX_MANIFEST: &str = r#"{
    "name": "pos_tex",
    "source": "pos_tex.wgsl",
    "slots": ["diffuse"],
    "techniques": [
        { "name": "default", "passes": [{ "vertex": "vs_main", "fragment": "fs_main" }] }
    ]
}"#;

/// Normal-mapped Phong: diffuse, normal, specular and gloss maps, lit by one
/// directional light. The camera position comes from the inverse view matrix.
pub const SHADED_SHADER: &str = r#"
@group(0) @binding(0) var<uniform> world_view_proj: mat4x4<f32>;
@group(0) @binding(1) var<uniform> world_matrix: mat4x4<f32>;
@group(0) @binding(2) var<uniform> view_inverse: mat4x4<f32>;
@group(0) @binding(3) var sampler_state: sampler;
@group(0) @binding(4) var diffuse_map: texture_2d<f32>;
@group(0) @binding(5) var normal_map: texture_2d<f32>;
@group(0) @binding(6) var specular_map: texture_2d<f32>;
@group(0) @binding(7) var gloss_map: texture_2d<f32>;

const PI: f32 = 3.14159265;
const LIGHT_DIRECTION: vec3<f32> = vec3<f32>(0.577, -0.577, 0.577);
const LIGHT_INTENSITY: f32 = 7.0;
const SHININESS: f32 = 25.0;
const AMBIENT: vec3<f32> = vec3<f32>(0.025, 0.025, 0.025);

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tangent: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) normal: vec3<f32>,
    @location(3) tangent: vec3<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = world_view_proj * vec4<f32>(in.position, 1.0);
    out.world_position = (world_matrix * vec4<f32>(in.position, 1.0)).xyz;
    out.uv = in.uv;
    out.normal = normalize((world_matrix * vec4<f32>(in.normal, 0.0)).xyz);
    out.tangent = normalize((world_matrix * vec4<f32>(in.tangent, 0.0)).xyz);
    return out;
}

fn sample_normal(in: VertexOutput) -> vec3<f32> {
    let binormal = cross(in.normal, in.tangent);
    let tangent_space = mat3x3<f32>(in.tangent, binormal, in.normal);
    let sampled = textureSample(normal_map, sampler_state, in.uv).xyz * 2.0 - 1.0;
    return normalize(tangent_space * sampled);
}

@fragment
fn fs_phong(in: VertexOutput) -> @location(0) vec4<f32> {
    let normal = sample_normal(in);
    let albedo = textureSample(diffuse_map, sampler_state, in.uv).rgb;
    let specular_strength = textureSample(specular_map, sampler_state, in.uv).r;
    let gloss = textureSample(gloss_map, sampler_state, in.uv).r;

    let camera_position = view_inverse[3].xyz;
    let to_camera = normalize(camera_position - in.world_position);
    let lambert = max(dot(normal, -LIGHT_DIRECTION), 0.0);
    let reflected = reflect(LIGHT_DIRECTION, normal);
    let exponent = max(gloss * SHININESS, 1.0);
    let specular = specular_strength * pow(max(dot(reflected, to_camera), 0.0), exponent);

    let diffuse = albedo * LIGHT_INTENSITY / PI;
    return vec4<f32>((diffuse + vec3<f32>(specular)) * lambert + AMBIENT, 1.0);
}

@fragment
fn fs_diffuse(in: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = textureSample(diffuse_map, sampler_state, in.uv).rgb;
    let lambert = max(dot(normalize(in.normal), -LIGHT_DIRECTION), 0.0);
    return vec4<f32>(albedo * lambert + AMBIENT, 1.0);
}
"#;

pub const SHADED_MANIFEST: &str = r#"{
    "name": "shaded",
    "source": "shaded.wgsl",
    "slots": ["diffuse", "normal", "specular", "gloss"],
    "world": true,
    "view_inverse": true,
    "techniques": [
        { "name": "phong", "passes": [{ "vertex": "vs_main", "fragment": "fs_phong" }] },
        { "name": "diffuse", "passes": [{ "vertex": "vs_main", "fragment": "fs_diffuse" }] }
    ]
}"#;

/// Alpha-blended diffuse map, drawn double sided without depth writes.
pub const TRANSPARENT_SHADER: &str = r#"
@group(0) @binding(0) var<uniform> world_view_proj: mat4x4<f32>;
@group(0) @binding(3) var sampler_state: sampler;
@group(0) @binding(4) var diffuse_map: texture_2d<f32>;

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

pub const TRANSPARENT_MANIFEST: &str = r#"{
    "name": "transparent",
    "source": "transparent.wgsl",
    "slots": ["diffuse"],
    "techniques": [
        { "name": "blended", "passes": [{
            "name": "blend",
            "vertex": "vs_main",
            "fragment": "fs_main",
            "blend": "alpha",
            "depth_write": false,
            "cull": "none"
        }] }
    ]
}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinEffect {
    PosCol,
    PosTex,
    Shaded,
    Transparent,
}

impl BuiltinEffect {
    pub const ALL: [BuiltinEffect; 4] = [
        BuiltinEffect::PosCol,
        BuiltinEffect::PosTex,
        BuiltinEffect::Shaded,
        BuiltinEffect::Transparent,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinEffect::PosCol => "pos_col",
            BuiltinEffect::PosTex => "pos_tex",
            BuiltinEffect::Shaded => "shaded",
            BuiltinEffect::Transparent => "transparent",
        }
    }

    pub fn asset(self) -> Result<ShaderAsset, ShaderError> {
        let (manifest, source) = match self {
            BuiltinEffect::PosCol => (POS_COL_MANIFEST, POS_COL_SHADER),
            BuiltinEffect::PosTex => (POS_TEX_MANIFEST, POS_TEX_SHADER),
            BuiltinEffect::Shaded => (SHADED_MANIFEST, SHADED_SHADER),
            BuiltinEffect::Transparent => (TRANSPARENT_MANIFEST, TRANSPARENT_SHADER),
        };
        ShaderAsset::from_json(manifest, source)
    }
}

impl fmt::Display for BuiltinEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltinEffect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| format!("unknown built-in effect `{s}`"))
    }
}
