// ============================================================================
// PRESETS: built-in effect / mask-heuristic programs and the record format
// ============================================================================

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a preset's output means.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresetKind {
    /// Drives the visible canvas; blends through `apply_mask`.
    Effect,
    /// Rendered offscreen; the red channel becomes the mask.
    MaskHeuristic,
}

#[derive(Clone, Copy, Debug)]
pub struct Preset {
    pub name: &'static str,
    pub kind: PresetKind,
    pub description: &'static str,
    /// Reads `u.time`, so only looks right while animating.
    pub animated: bool,
    pub source: &'static str,
}

// ----------------------------------------------------------------------------
// Effects
// ----------------------------------------------------------------------------

const GRAYSCALE: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = sample_image(in.uv);
    let l = dot(c.rgb, vec3<f32>(0.299, 0.587, 0.114));
    return apply_mask(c, vec4<f32>(vec3<f32>(l), c.a), in.uv);
}
"#;

const INVERT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = sample_image(in.uv);
    return apply_mask(c, vec4<f32>(vec3<f32>(1.0) - c.rgb, c.a), in.uv);
}
"#;

const SEPIA: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = sample_image(in.uv);
    let s = vec3<f32>(
        dot(c.rgb, vec3<f32>(0.393, 0.769, 0.189)),
        dot(c.rgb, vec3<f32>(0.349, 0.686, 0.168)),
        dot(c.rgb, vec3<f32>(0.272, 0.534, 0.131)),
    );
    return apply_mask(c, vec4<f32>(min(s, vec3<f32>(1.0)), c.a), in.uv);
}
"#;

const PIXELATE: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let cell = vec2<f32>(8.0) / u.resolution;
    let centre = (floor(in.uv / cell) + vec2<f32>(0.5)) * cell;
    return apply_mask(sample_image(in.uv), sample_image(centre), in.uv);
}
"#;

const WAVE: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let shift = sin(in.uv.y * 30.0 + u.time * 3.0) * 0.01;
    let warped = sample_image(in.uv + vec2<f32>(shift, 0.0));
    return apply_mask(sample_image(in.uv), warped, in.uv);
}
"#;

const HUE_CYCLE: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = sample_image(in.uv);
    let angle = u.time * 1.5;
    let k = vec3<f32>(0.57735);
    let cs = cos(angle);
    let sn = sin(angle);
    let rgb = c.rgb * cs + cross(k, c.rgb) * sn + k * dot(k, c.rgb) * (1.0 - cs);
    let e = vec4<f32>(clamp(rgb, vec3<f32>(0.0), vec3<f32>(1.0)), c.a);
    return apply_mask(c, e, in.uv);
}
"#;

// ----------------------------------------------------------------------------
// Mask heuristics (white = select)
// ----------------------------------------------------------------------------

const BRIGHT_REGIONS: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = sample_image(in.uv);
    let l = dot(c.rgb, vec3<f32>(0.299, 0.587, 0.114));
    let m = smoothstep(0.6, 0.8, l);
    return vec4<f32>(m, m, m, 1.0);
}
"#;

const DARK_REGIONS: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = sample_image(in.uv);
    let l = dot(c.rgb, vec3<f32>(0.299, 0.587, 0.114));
    let m = 1.0 - smoothstep(0.2, 0.4, l);
    return vec4<f32>(m, m, m, 1.0);
}
"#;

const SKY_REGIONS: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = sample_image(in.uv);
    let blueness = smoothstep(0.02, 0.15, c.b - max(c.r, c.g));
    let upper = 1.0 - smoothstep(0.5, 0.9, in.uv.y);
    let m = blueness * upper;
    return vec4<f32>(m, m, m, 1.0);
}
"#;

const SATURATED_REGIONS: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let c = sample_image(in.uv);
    let hi = max(max(c.r, c.g), c.b);
    let lo = min(min(c.r, c.g), c.b);
    let sat = (hi - lo) / max(hi, 0.00001);
    let m = smoothstep(0.35, 0.6, sat);
    return vec4<f32>(m, m, m, 1.0);
}
"#;

pub const BUILTIN: &[Preset] = &[
    Preset { name: "grayscale", kind: PresetKind::Effect, description: "Luminance-only greyscale", animated: false, source: GRAYSCALE },
    Preset { name: "invert", kind: PresetKind::Effect, description: "Negative colours", animated: false, source: INVERT },
    Preset { name: "sepia", kind: PresetKind::Effect, description: "Warm sepia tone", animated: false, source: SEPIA },
    Preset { name: "pixelate", kind: PresetKind::Effect, description: "8px mosaic", animated: false, source: PIXELATE },
    Preset { name: "wave", kind: PresetKind::Effect, description: "Horizontal ripple that drifts over time", animated: true, source: WAVE },
    Preset { name: "hue-cycle", kind: PresetKind::Effect, description: "Hue rotation over time", animated: true, source: HUE_CYCLE },
    Preset { name: "bright", kind: PresetKind::MaskHeuristic, description: "Select bright regions", animated: false, source: BRIGHT_REGIONS },
    Preset { name: "dark", kind: PresetKind::MaskHeuristic, description: "Select dark regions", animated: false, source: DARK_REGIONS },
    Preset { name: "sky", kind: PresetKind::MaskHeuristic, description: "Select blue regions in the upper image", animated: false, source: SKY_REGIONS },
    Preset { name: "saturated", kind: PresetKind::MaskHeuristic, description: "Select strongly coloured regions", animated: false, source: SATURATED_REGIONS },
];

/// Case-insensitive lookup by name.
pub fn find_builtin(name: &str) -> Option<&'static Preset> {
    BUILTIN.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

pub fn builtin_of_kind(kind: PresetKind) -> impl Iterator<Item = &'static Preset> {
    BUILTIN.iter().filter(move |p| p.kind == kind)
}

// ============================================================================
// SHADER RECORD: what a preset store persists
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShaderRecord {
    pub id: Uuid,
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub description: String,
    /// Base64 PNG preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl ShaderRecord {
    pub fn new(name: impl Into<String>, source: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source: source.into(),
            description: description.into(),
            thumbnail: None,
        }
    }

    pub fn from_preset(preset: &Preset) -> Self {
        Self::new(preset.name, preset.source, preset.description)
    }

    pub fn with_thumbnail_png(mut self, png: &[u8]) -> Self {
        self.thumbnail = Some(crate::io::to_base64(png));
        self
    }

    /// Decoded thumbnail bytes, `None` if absent or not valid base64.
    pub fn thumbnail_png(&self) -> Option<Vec<u8>> {
        let encoded = self.thumbnail.as_deref()?;
        base64::engine::general_purpose::STANDARD.decode(encoded).ok()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::program::check_source;

    #[test]
    fn every_builtin_passes_the_front_end() {
        for preset in BUILTIN {
            let checked = check_source(preset.source)
                .unwrap_or_else(|e| panic!("preset {} rejected: {e}", preset.name));
            assert!(checked.rewrites.is_empty(), "preset {} needed rewrites", preset.name);
        }
    }

    #[test]
    fn names_are_unique() {
        for (i, a) in BUILTIN.iter().enumerate() {
            for b in &BUILTIN[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(find_builtin("Sepia").map(|p| p.name), Some("sepia"));
        assert!(find_builtin("nope").is_none());
        assert_eq!(builtin_of_kind(PresetKind::MaskHeuristic).count(), 4);
    }

    #[test]
    fn effects_blend_through_mask_and_heuristics_do_not() {
        for preset in BUILTIN {
            let blends = preset.source.contains("apply_mask");
            assert_eq!(blends, preset.kind == PresetKind::Effect, "{}", preset.name);
        }
    }

    #[test]
    fn record_json_keeps_thumbnail() {
        let record = ShaderRecord::from_preset(&BUILTIN[0]).with_thumbnail_png(&[1, 2, 3]);
        let back = ShaderRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.thumbnail_png(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn record_without_optional_fields_parses() {
        let json = r#"{"id":"67e55044-10b1-426f-9247-bb680e5fe0c8","name":"x","source":"y"}"#;
        let record = ShaderRecord::from_json(json).unwrap();
        assert!(record.description.is_empty());
        assert!(record.thumbnail_png().is_none());
    }
}
