//! WGSL sources for every pass.
//!
//! The point programs are the GPU side of [`crate::morph`]; keep the two in
//! step. Each pass is assembled from [`COMMON`] plus its own body.

/// Bind group 0 (camera) and the per-draw batch uniform in group 1.
pub const COMMON: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    eye: vec4<f32>,
    // width, height, point scale, unused
    viewport: vec4<f32>,
    // elapsed, delta, unused, unused
    time: vec4<f32>,
};

struct Batch {
    model: mat4x4<f32>,
    // x: morph progress, y: snow field height
    params: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> camera: Camera;
@group(1) @binding(0)
var<uniform> batch: Batch;
"#;

const POINTS: &str = r#"
const FOLIAGE_DEEP: vec3<f32> = vec3<f32>(0.0, 0.26, 0.15);
const FOLIAGE_LEAF: vec3<f32> = vec3<f32>(0.1, 0.4, 0.1);
const SPARKLE_GOLD: vec3<f32> = vec3<f32>(1.0, 0.84, 0.0);
const LIGHT_COLOR: vec3<f32> = vec3<f32>(1.0, 0.97, 0.9);

// Every point instance is two vec4s; the meaning depends on the pass.
struct PointInstance {
    @location(0) a: vec4<f32>,
    @location(1) b: vec4<f32>,
};

struct PointOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec3<f32>,
    @location(2) alpha: f32,
};

fn sprite_corner(index: u32) -> vec2<f32> {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-0.5, -0.5),
        vec2<f32>(0.5, -0.5),
        vec2<f32>(0.5, 0.5),
        vec2<f32>(-0.5, -0.5),
        vec2<f32>(0.5, 0.5),
        vec2<f32>(-0.5, 0.5),
    );
    return corners[index % 6u];
}

fn ease_out_cubic(x: f32) -> f32 {
    let inv = 1.0 - clamp(x, 0.0, 1.0);
    return 1.0 - inv * inv * inv;
}

fn view_depth(world: vec4<f32>) -> f32 {
    return max(-(camera.view * world).z, 0.001);
}

// Grow a screen-aligned quad of `pixels` around the projected point.
fn expand_sprite(world: vec4<f32>, pixels: f32, index: u32) -> PointOut {
    let corner = sprite_corner(index);
    var clip = camera.view_proj * world;
    clip.x += corner.x * pixels * 2.0 / camera.viewport.x * clip.w;
    clip.y += corner.y * pixels * 2.0 / camera.viewport.y * clip.w;

    var out: PointOut;
    out.clip = clip;
    out.uv = corner + vec2<f32>(0.5);
    out.color = vec3<f32>(1.0);
    out.alpha = 1.0;
    return out;
}

fn sprite_distance(uv: vec2<f32>) -> f32 {
    return distance(uv, vec2<f32>(0.5));
}

// a: chaos.xyz, random    b: formed.xyz, unused
@vertex
fn vs_foliage(@builtin(vertex_index) index: u32, inst: PointInstance) -> PointOut {
    let chaos = inst.a.xyz;
    let random = inst.a.w;
    let formed = inst.b.xyz;
    let progress = batch.params.x;
    let time = camera.time.x;

    let delay = random * 0.5;
    let activation = smoothstep(delay, 1.0, progress * (1.0 + delay));
    var pos = mix(chaos, formed, ease_out_cubic(activation));

    let wind = sin(time * 2.0 + pos.y * 0.5 + random * 10.0) * 0.05 * activation;
    pos.x += wind;
    pos.z += wind;

    var color = mix(FOLIAGE_DEEP, FOLIAGE_LEAF, random);
    if (sin(time * 5.0 + random * 100.0) > 0.98) {
        color = mix(color, SPARKLE_GOLD, 0.8);
    }

    let world = batch.model * vec4<f32>(pos, 1.0);
    let pixels = (15.0 * random + 5.0) * camera.viewport.z / view_depth(world);
    var out = expand_sprite(world, pixels, index);
    out.color = color;
    return out;
}

@fragment
fn fs_foliage(in: PointOut) -> @location(0) vec4<f32> {
    let d = sprite_distance(in.uv);
    if (d > 0.5) {
        discard;
    }
    return vec4<f32>(in.color, 1.0 - smoothstep(0.3, 0.5, d));
}

// a: chaos.xyz, blink offset    b: formed.xyz, blink speed
@vertex
fn vs_lights(@builtin(vertex_index) index: u32, inst: PointInstance) -> PointOut {
    let chaos = inst.a.xyz;
    let blink_offset = inst.a.w;
    let formed = inst.b.xyz;
    let blink_speed = inst.b.w;
    let progress = batch.params.x;
    let time = camera.time.x;

    // Bottom of the strand lands first.
    let delay = formed.y * 0.05;
    let activation = smoothstep(0.0, 1.0, progress * 1.5 - delay);
    var pos = mix(chaos, formed, ease_out_cubic(activation));
    if (progress > 0.8) {
        pos.x += sin(time + pos.y) * 0.02;
        pos.z += cos(time + pos.y) * 0.02;
    }

    let world = batch.model * vec4<f32>(pos, 1.0);
    let pixels = 25.0 * camera.viewport.z / view_depth(world);
    var out = expand_sprite(world, pixels, index);
    out.color = LIGHT_COLOR;
    out.alpha = 0.6 + 0.4 * sin(time * blink_speed + blink_offset);
    return out;
}

@fragment
fn fs_lights(in: PointOut) -> @location(0) vec4<f32> {
    let d = sprite_distance(in.uv);
    if (d > 0.5) {
        discard;
    }
    let core = 1.0 - smoothstep(0.0, 0.1, d);
    let glow = 1.0 - smoothstep(0.0, 0.5, d);
    return vec4<f32>(in.color, (core * 0.8 + glow * 0.4) * in.alpha);
}

fn wrap_height(y: f32, height: f32) -> f32 {
    let h = max(height, 0.001);
    let shifted = y + 1000.0 * h;
    return clamp(shifted - h * floor(shifted / h), 0.0, h) - h * 0.5;
}

// a: base.xyz, fall speed    b: random, unused
@vertex
fn vs_snow(@builtin(vertex_index) index: u32, inst: PointInstance) -> PointOut {
    let base = inst.a.xyz;
    let speed = inst.a.w;
    let random = inst.b.x;
    let time = camera.time.x;

    let pos = vec3<f32>(
        base.x + sin(time * 0.5 + random * 10.0) * 0.5,
        wrap_height(base.y - time * speed, batch.params.y),
        base.z + cos(time * 0.3 + random * 20.0) * 0.3,
    );

    let world = batch.model * vec4<f32>(pos, 1.0);
    let pixels = (12.0 * random + 4.0) * camera.viewport.z / view_depth(world);
    var out = expand_sprite(world, pixels, index);
    out.alpha = 0.7;
    return out;
}

@fragment
fn fs_snow(in: PointOut) -> @location(0) vec4<f32> {
    let d = sprite_distance(in.uv);
    if (d > 0.5) {
        discard;
    }
    return vec4<f32>(in.color, (1.0 - smoothstep(0.0, 0.5, d)) * in.alpha);
}

// a: position.xyz, size    b: color.rgb, random
@vertex
fn vs_sky(@builtin(vertex_index) index: u32, inst: PointInstance) -> PointOut {
    let time = camera.time.x;
    let world = batch.model * vec4<f32>(inst.a.xyz, 1.0);
    let twinkle = 3.0 + sin(time + 100.0 * inst.b.w);
    let pixels = inst.a.w * (30.0 / view_depth(world)) * twinkle;
    var out = expand_sprite(world, pixels, index);
    out.color = inst.b.xyz;
    return out;
}

@fragment
fn fs_sky(in: PointOut) -> @location(0) vec4<f32> {
    let d = sprite_distance(in.uv);
    return vec4<f32>(in.color, 1.0 / (1.0 + exp(16.0 * (d - 0.25))));
}
"#;

const MESH_VERTEX: &str = r#"
struct MeshVertex {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};
"#;

const MESHES: &str = r#"
const PI: f32 = 3.141592653589793;

struct Lighting {
    ambient: vec4<f32>,
    // xyz position, w intensity
    spot_position: vec4<f32>,
    // xyz unit vector from the target to the light, w cos(cone angle)
    spot_direction: vec4<f32>,
    // rgb, w cos(inner angle)
    spot_color: vec4<f32>,
    fill_position: vec4<f32>,
    // rgb, w cutoff distance
    fill_color: vec4<f32>,
    star_position: vec4<f32>,
    star_color: vec4<f32>,
    env_sky: vec4<f32>,
    env_ground: vec4<f32>,
};

@group(1) @binding(1)
var<uniform> lighting: Lighting;

struct MeshInstance {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
    @location(7) normal_0: vec4<f32>,
    @location(8) normal_1: vec4<f32>,
    @location(9) normal_2: vec4<f32>,
    @location(10) color: vec4<f32>,
    @location(11) emissive: vec4<f32>,
    // roughness, metalness, env intensity, double sided
    @location(12) material: vec4<f32>,
};

struct MeshOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) world: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
    @location(3) emissive: vec3<f32>,
    @location(4) material: vec4<f32>,
};

@vertex
fn vs_mesh(v: MeshVertex, inst: MeshInstance) -> MeshOut {
    let model = batch.model * mat4x4<f32>(inst.model_0, inst.model_1, inst.model_2, inst.model_3);
    // The batch transform is rigid, so its upper 3x3 carries normals as is.
    let group_normal = mat3x3<f32>(batch.model[0].xyz, batch.model[1].xyz, batch.model[2].xyz);
    let instance_normal = mat3x3<f32>(inst.normal_0.xyz, inst.normal_1.xyz, inst.normal_2.xyz);
    let world = model * vec4<f32>(v.position, 1.0);

    var out: MeshOut;
    out.clip = camera.view_proj * world;
    out.world = world.xyz;
    out.normal = group_normal * instance_normal * v.normal;
    out.color = inst.color.rgb;
    out.emissive = inst.emissive.rgb;
    out.material = inst.material;
    return out;
}

fn distance_attenuation(d: f32, cutoff: f32) -> f32 {
    var falloff = 1.0 / max(d * d, 0.01);
    if (cutoff > 0.0) {
        let ratio = d / cutoff;
        let fade = clamp(1.0 - ratio * ratio * ratio * ratio, 0.0, 1.0);
        falloff *= fade * fade;
    }
    return falloff;
}

fn f_schlick(f0: vec3<f32>, vh: f32) -> vec3<f32> {
    let fresnel = exp2((-5.55473 * vh - 6.98316) * vh);
    return f0 * (1.0 - fresnel) + vec3<f32>(fresnel);
}

fn v_smith(alpha: f32, nl: f32, nv: f32) -> f32 {
    let a2 = alpha * alpha;
    let gv = nl * sqrt(a2 + (1.0 - a2) * nv * nv);
    let gl = nv * sqrt(a2 + (1.0 - a2) * nl * nl);
    return 0.5 / max(gv + gl, 1e-6);
}

fn d_ggx(alpha: f32, nh: f32) -> f32 {
    let a2 = alpha * alpha;
    let denom = nh * nh * (a2 - 1.0) + 1.0;
    return a2 / (PI * denom * denom);
}

// Lambert diffuse plus GGX specular for one light of `radiance`.
fn direct(l: vec3<f32>, radiance: vec3<f32>, n: vec3<f32>, v: vec3<f32>,
          diffuse: vec3<f32>, f0: vec3<f32>, roughness: f32) -> vec3<f32> {
    let nl = clamp(dot(n, l), 0.0, 1.0);
    if (nl <= 0.0) {
        return vec3<f32>(0.0);
    }
    let h = normalize(l + v);
    let nv = clamp(dot(n, v), 0.0, 1.0);
    let alpha = roughness * roughness;
    let specular = f_schlick(f0, clamp(dot(v, h), 0.0, 1.0))
        * v_smith(alpha, nl, nv)
        * d_ggx(alpha, clamp(dot(n, h), 0.0, 1.0));
    return radiance * nl * (diffuse / PI + specular);
}

// Analytic approximation of the split-sum environment BRDF.
fn env_brdf(f0: vec3<f32>, roughness: f32, nv: f32) -> vec3<f32> {
    let c0 = vec4<f32>(-1.0, -0.0275, -0.572, 0.022);
    let c1 = vec4<f32>(1.0, 0.0425, 1.04, -0.04);
    let r = roughness * c0 + c1;
    let a004 = min(r.x * r.x, exp2(-9.28 * nv)) * r.x + r.y;
    let ab = vec2<f32>(-1.04, 1.04) * a004 + r.zw;
    return f0 * ab.x + vec3<f32>(ab.y);
}

fn hemisphere(dir: vec3<f32>) -> vec3<f32> {
    return mix(lighting.env_ground.rgb, lighting.env_sky.rgb, dir.y * 0.5 + 0.5);
}

@fragment
fn fs_mesh(in: MeshOut, @builtin(front_facing) front: bool) -> @location(0) vec4<f32> {
    var n = normalize(in.normal);
    if (!front) {
        if (in.material.w < 0.5) {
            discard;
        }
        n = -n;
    }

    let v = normalize(camera.eye.xyz - in.world);
    let roughness = clamp(in.material.x, 0.04, 1.0);
    let metalness = clamp(in.material.y, 0.0, 1.0);
    let env_intensity = in.material.z;
    let diffuse = in.color * (1.0 - metalness);
    let f0 = mix(vec3<f32>(0.04), in.color, metalness);

    var color = lighting.ambient.rgb * diffuse;

    // Spot light with a smooth penumbra.
    let to_spot = lighting.spot_position.xyz - in.world;
    let spot_dist = length(to_spot);
    let spot_l = to_spot / max(spot_dist, 1e-4);
    let cone = smoothstep(lighting.spot_direction.w, lighting.spot_color.w, dot(spot_l, lighting.spot_direction.xyz));
    let spot_radiance = lighting.spot_color.rgb * lighting.spot_position.w
        * distance_attenuation(spot_dist, 0.0) * cone;
    color += direct(spot_l, spot_radiance, n, v, diffuse, f0, roughness);

    let to_fill = lighting.fill_position.xyz - in.world;
    let fill_dist = length(to_fill);
    let fill_radiance = lighting.fill_color.rgb * lighting.fill_position.w
        * distance_attenuation(fill_dist, lighting.fill_color.w);
    color += direct(to_fill / max(fill_dist, 1e-4), fill_radiance, n, v, diffuse, f0, roughness);

    let to_star = lighting.star_position.xyz - in.world;
    let star_dist = length(to_star);
    let star_radiance = lighting.star_color.rgb * lighting.star_position.w
        * distance_attenuation(star_dist, lighting.star_color.w);
    color += direct(to_star / max(star_dist, 1e-4), star_radiance, n, v, diffuse, f0, roughness);

    // Environment stand-in: sky above, ground below.
    let nv = clamp(dot(n, v), 0.0, 1.0);
    color += hemisphere(n) * diffuse * env_intensity;
    color += hemisphere(reflect(-v, n)) * env_brdf(f0, roughness, nv) * env_intensity;

    color += in.emissive;
    return vec4<f32>(color, 1.0);
}
"#;

const PHOTOS: &str = r#"
struct PhotoInstance {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
};

struct PhotoOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(2) @binding(0)
var photo_texture: texture_2d<f32>;
@group(2) @binding(1)
var photo_sampler: sampler;

@vertex
fn vs_photo(v: MeshVertex, inst: PhotoInstance) -> PhotoOut {
    let model = batch.model * mat4x4<f32>(inst.model_0, inst.model_1, inst.model_2, inst.model_3);
    var out: PhotoOut;
    out.clip = camera.view_proj * model * vec4<f32>(v.position, 1.0);
    out.uv = v.uv;
    return out;
}

// Unlit: the photo shows its own colors regardless of the lights.
@fragment
fn fs_photo(in: PhotoOut) -> @location(0) vec4<f32> {
    return vec4<f32>(textureSample(photo_texture, photo_sampler, in.uv).rgb, 1.0);
}
"#;

/// Bright pass, separable blur and the final composite.
pub const POST: &str = r#"
struct PostParams {
    // threshold, smoothing, intensity, unused
    bloom: vec4<f32>,
    // vignette offset, vignette darkness, exposure, 1 when output needs sRGB encoding
    grade: vec4<f32>,
    // blur step in uv units
    direction: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@group(0) @binding(0)
var src_texture: texture_2d<f32>;
@group(0) @binding(1)
var src_sampler: sampler;
@group(0) @binding(2)
var<uniform> params: PostParams;
@group(0) @binding(3)
var aux_texture: texture_2d<f32>;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0),
    );
    var uvs = array<vec2<f32>, 3>(
        vec2<f32>(0.0, 1.0),
        vec2<f32>(2.0, 1.0),
        vec2<f32>(0.0, -1.0),
    );

    var out: VertexOutput;
    out.clip_position = vec4<f32>(positions[vertex_index], 0.0, 1.0);
    out.uv = uvs[vertex_index];
    return out;
}

// smoothstep that also accepts edge0 > edge1.
fn ramp(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = clamp((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

@fragment
fn fs_bright(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = textureSample(src_texture, src_sampler, in.uv).rgb;
    let luma = dot(c, vec3<f32>(0.2126, 0.7152, 0.0722));
    let keep = smoothstep(params.bloom.x, params.bloom.x + params.bloom.y, luma);
    return vec4<f32>(c * keep, 1.0);
}

@fragment
fn fs_blur(in: VertexOutput) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let stride = params.direction.xy;
    var sum = textureSample(src_texture, src_sampler, in.uv).rgb * weights[0];
    for (var i = 1; i < 5; i++) {
        let offset = stride * f32(i);
        sum += textureSample(src_texture, src_sampler, in.uv + offset).rgb * weights[i];
        sum += textureSample(src_texture, src_sampler, in.uv - offset).rgb * weights[i];
    }
    return vec4<f32>(sum, 1.0);
}

fn cineon(color: vec3<f32>, exposure: f32) -> vec3<f32> {
    let c = max(vec3<f32>(0.0), color * exposure - vec3<f32>(0.004));
    return pow((c * (6.2 * c + 0.5)) / (c * (6.2 * c + 1.7) + 0.06), vec3<f32>(2.2));
}

fn linear_to_srgb(c: vec3<f32>) -> vec3<f32> {
    let lo = c * 12.92;
    let hi = 1.055 * pow(c, vec3<f32>(1.0 / 2.4)) - 0.055;
    return select(hi, lo, c <= vec3<f32>(0.0031308));
}

@fragment
fn fs_composite(in: VertexOutput) -> @location(0) vec4<f32> {
    let scene = textureSample(src_texture, src_sampler, in.uv).rgb;
    let bloom = textureSample(aux_texture, src_sampler, in.uv).rgb;
    var c = cineon(scene + bloom * params.bloom.z, params.grade.z);

    let offset = params.grade.x;
    let darkness = params.grade.y;
    let d = distance(in.uv, vec2<f32>(0.5));
    c *= ramp(0.8, offset * 0.799, d * (darkness + offset));

    if (params.grade.w > 0.5) {
        c = linear_to_srgb(clamp(c, vec3<f32>(0.0), vec3<f32>(1.0)));
    }
    return vec4<f32>(c, 1.0);
}
"#;

/// Foliage, lights, snow and sky sprites.
pub fn points() -> String {
    [COMMON, POINTS].concat()
}

/// Lit instanced meshes.
pub fn meshes() -> String {
    [COMMON, MESH_VERTEX, MESHES].concat()
}

/// Unlit textured photo planes.
pub fn photos() -> String {
    [COMMON, MESH_VERTEX, PHOTOS].concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates WGSL code using naga.
    fn validate_wgsl(code: &str) -> Result<naga::Module, String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {}", e.emit_to_string(code)))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(module)
    }

    fn entry_points(module: &naga::Module) -> Vec<&str> {
        module.entry_points.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_points_shader_validates() {
        let module = validate_wgsl(&points()).unwrap();
        let names = entry_points(&module);
        for stage in ["foliage", "lights", "snow", "sky"] {
            assert!(names.contains(&format!("vs_{}", stage).as_str()), "missing vs_{}", stage);
            assert!(names.contains(&format!("fs_{}", stage).as_str()), "missing fs_{}", stage);
        }
    }

    #[test]
    fn test_mesh_shader_validates() {
        let module = validate_wgsl(&meshes()).unwrap();
        assert_eq!(entry_points(&module), vec!["vs_mesh", "fs_mesh"]);
    }

    #[test]
    fn test_photo_shader_validates() {
        let module = validate_wgsl(&photos()).unwrap();
        assert_eq!(entry_points(&module), vec!["vs_photo", "fs_photo"]);
    }

    #[test]
    fn test_post_shader_validates() {
        let module = validate_wgsl(POST).unwrap();
        let names = entry_points(&module);
        for name in ["vs_main", "fs_bright", "fs_blur", "fs_composite"] {
            assert!(names.contains(&name), "missing {}", name);
        }
    }

    #[test]
    fn test_point_constants_match_cpu() {
        // The palette literals above must agree with the CPU mirror.
        let src = points();
        let deep = crate::morph::FOLIAGE_DEEP;
        assert!(src.contains(&format!("vec3<f32>({:.1}, {}, {})", deep.x, deep.y, deep.z)));
        let light = crate::morph::LIGHT_COLOR;
        assert!(src.contains(&format!("vec3<f32>({:.1}, {}, {})", light.x, light.y, light.z)));
    }
}
