// ============================================================================
// ShaderMask CLI: headless masked-effect rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   shadermask --input photo.png --preset sepia --output out.png
//   shadermask -i photo.jpg --mask-preset sky --preset hue-cycle -o out.png
//   shadermask -i photo.jpg --quick-select 120,40 300,60 --tolerance 20 --grow 3 \
//              --shader effect.wgsl --intensity 0.7 -o out.png --mask-output mask.png
//   shadermask -i photo.jpg --polygons people.json --invert-mask --preset grayscale -o out.png
//
// Everything runs synchronously on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;

use crate::config::Settings;
use crate::error::RenderError;
use crate::io;
use crate::ops::ingest::IngestMode;
use crate::ops::polygon::{self, PolygonMode};
use crate::ops::quick_select::SelectMode;
use crate::presets::{self, PresetKind};
use crate::session::Session;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// ShaderMask headless renderer.
///
/// Apply a WGSL fragment effect to the selected region of an image.
#[derive(Parser, Debug)]
#[command(
    name = "shadermask",
    version,
    about = "Apply a GPU shader effect to a masked region of an image",
    long_about = "Builds a selection mask from heuristics, polygons, rasters or colour\n\
                  flood fills, then renders a WGSL fragment effect blended through it.\n\n\
                  Example:\n  \
                  shadermask --input photo.png --mask-preset sky --preset hue-cycle --output out.png"
)]
pub struct CliArgs {
    /// Input image (PNG, JPEG, WEBP, BMP, TGA, TIFF).
    #[arg(short, long, required_unless_present = "list_presets", value_name = "IMAGE")]
    pub input: Option<PathBuf>,

    /// WGSL fragment file defining `fs_main`.
    #[arg(short, long, value_name = "FILE.wgsl", conflicts_with = "preset")]
    pub shader: Option<PathBuf>,

    /// Built-in effect preset (see --list-presets).
    #[arg(short, long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Effect intensity, 0..1.  Defaults to the saved setting.
    #[arg(long, value_name = "0-1")]
    pub intensity: Option<f32>,

    /// Built-in mask heuristic rendered offscreen into the mask.
    #[arg(long, value_name = "NAME", conflicts_with = "mask_shader")]
    pub mask_preset: Option<String>,

    /// WGSL heuristic whose red output becomes the mask.
    #[arg(long, value_name = "FILE.wgsl")]
    pub mask_shader: Option<PathBuf>,

    /// External mask raster (red channel, any size).
    #[arg(long, value_name = "IMAGE")]
    pub mask_image: Option<PathBuf>,

    /// JSON polygon loops `[[[x,y],...],...]` in normalised coordinates.
    #[arg(long, value_name = "FILE.json")]
    pub polygons: Option<PathBuf>,

    /// Quick-select seed points in image pixels.
    #[arg(long, value_name = "X,Y", num_args = 1.., value_parser = parse_point)]
    pub quick_select: Vec<(u32, u32)>,

    /// Quick-select colour tolerance.
    #[arg(long, value_name = "T")]
    pub tolerance: Option<f32>,

    /// Quick-select growth radius in pixels.
    #[arg(long, value_name = "N")]
    pub grow: Option<u32>,

    /// Quick-select removes from the mask instead of adding.
    #[arg(long)]
    pub subtract: bool,

    /// Mask sources add to the current mask instead of replacing it.
    #[arg(long)]
    pub additive: bool,

    /// Invert the mask after all sources are applied.
    #[arg(long)]
    pub invert_mask: bool,

    /// Composite PNG output path.
    #[arg(short, long, value_name = "FILE.png")]
    pub output: Option<PathBuf>,

    /// Write the final mask as a greyscale PNG.
    #[arg(long, value_name = "FILE.png")]
    pub mask_output: Option<PathBuf>,

    /// Write a thumbnail PNG of the composite.
    #[arg(long, value_name = "FILE.png")]
    pub thumbnail: Option<PathBuf>,

    /// Thumbnail bounding box in pixels.  Defaults to the saved setting.
    #[arg(long, value_name = "N")]
    pub thumbnail_size: Option<u32>,

    /// Write a JSON shader record (source + thumbnail) for the applied effect.
    #[arg(long, value_name = "FILE.json")]
    pub record: Option<PathBuf>,

    /// Print the built-in presets and exit.
    #[arg(long)]
    pub list_presets: bool,

    /// Debug-level logging and per-step timing.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_point(s: &str) -> Result<(u32, u32), String> {
    let (x, y) = s.split_once(',').ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x = x.trim().parse().map_err(|_| format!("bad x in '{s}'"))?;
    let y = y.trim().parse().map_err(|_| format!("bad y in '{s}'"))?;
    Ok((x, y))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    if args.list_presets {
        print_presets();
        return ExitCode::SUCCESS;
    }

    let start = Instant::now();
    match run_inner(&args) {
        Ok(()) => {
            if args.verbose {
                println!("done in {:.0}ms", start.elapsed().as_secs_f64() * 1000.0);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            // Compiler diagnostics go out untouched.
            if let Some(diag) = e.downcast_ref::<RenderError>().and_then(RenderError::diagnostic) {
                eprintln!("error: {e:#}");
                eprintln!("{diag}");
            } else {
                eprintln!("error: {e:#}");
            }
            tracing::error!(error = %format!("{e:#}"), "CLI run failed");
            ExitCode::FAILURE
        }
    }
}

fn print_presets() {
    for (title, kind) in [("Effects", PresetKind::Effect), ("Mask heuristics", PresetKind::MaskHeuristic)] {
        println!("{title}:");
        for p in presets::builtin_of_kind(kind) {
            let anim = if p.animated { " (animated)" } else { "" };
            println!("  {:<12} {}{}", p.name, p.description, anim);
        }
    }
}

fn read_text(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("could not read {what} '{}'", path.display()))
}

fn preset_source(name: &str, kind: PresetKind) -> Result<&'static str> {
    match presets::find_builtin(name) {
        Some(p) if p.kind == kind => Ok(p.source),
        Some(_) => bail!("preset '{name}' is not a {kind:?} preset"),
        None => bail!("unknown preset '{name}' (try --list-presets)"),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("could not write '{}'", path.display()))
}

fn run_inner(args: &CliArgs) -> Result<()> {
    let Some(input) = &args.input else {
        bail!("--input is required");
    };

    // -- Settings ------------------------------------------------------------
    let mut settings = Settings::load();
    if let Some(t) = args.tolerance {
        settings.tolerance = t;
    }
    if let Some(g) = args.grow {
        settings.grow_radius = g;
    }
    if let Some(i) = args.intensity {
        settings.intensity = i;
    }
    if let Some(n) = args.thumbnail_size {
        settings.thumbnail_dim = n.max(1);
    }

    // -- Load ----------------------------------------------------------------
    let image = io::load_image(input).with_context(|| format!("load failed: '{}'", input.display()))?;
    let mut session = Session::new(settings.clone()).context("GPU initialisation failed")?;
    session.load_image(image).context("could not bind image")?;

    // -- Mask ----------------------------------------------------------------
    let ingest_mode = if args.additive { IngestMode::Merge } else { IngestMode::Replace };

    let heuristic = match (&args.mask_preset, &args.mask_shader) {
        (Some(name), _) => Some(preset_source(name, PresetKind::MaskHeuristic)?.to_string()),
        (None, Some(path)) => Some(read_text(path, "mask shader")?),
        (None, None) => None,
    };
    if let Some(source) = heuristic {
        session
            .synthesize_mask(&source, ingest_mode)
            .context("mask heuristic failed")?;
    }

    if let Some(path) = &args.mask_image {
        let raster = io::load_mask_raster(path).with_context(|| format!("could not load mask '{}'", path.display()))?;
        session.ingest_mask(&raster, ingest_mode);
    }

    if let Some(path) = &args.polygons {
        let loops = polygon::load_polygons(path).with_context(|| format!("could not read polygons '{}'", path.display()))?;
        let mode = if args.additive { PolygonMode::Additive } else { PolygonMode::Replace };
        let drawn = session.apply_polygons(&loops, mode);
        tracing::info!(drawn, total = loops.len(), "polygons applied");
    }

    if !args.quick_select.is_empty() {
        let mode = if args.subtract { SelectMode::Subtract } else { SelectMode::Add };
        let opts = settings.quick_select();
        // A fresh quick-select mask starts empty unless adding to what is there.
        if mode == SelectMode::Add && !args.additive && !has_other_mask_source(args) {
            session.clear_mask();
        }
        for &seed in &args.quick_select {
            let written = session.quick_select(seed, &opts, mode);
            if args.verbose {
                println!("quick select at {seed:?}: {written} px");
            }
        }
    }

    if args.invert_mask {
        session.invert_mask();
    }

    // -- Effect --------------------------------------------------------------
    let effect = match (&args.preset, &args.shader) {
        (Some(name), _) => Some(preset_source(name, PresetKind::Effect)?.to_string()),
        (None, Some(path)) => Some(read_text(path, "shader")?),
        (None, None) => None,
    };
    match &effect {
        Some(source) => {
            session.set_shader(source).context("shader rejected")?;
            session.render();
        }
        None => {
            session.render_passthrough();
        }
    }

    // -- Outputs -------------------------------------------------------------
    if let Some(path) = &args.output {
        write_file(path, &session.export_png().context("export failed")?)?;
        println!("wrote {}", path.display());
    }
    if let Some(path) = &args.mask_output {
        write_file(path, &session.mask_png().context("mask export failed")?)?;
        println!("wrote {}", path.display());
    }
    if let Some(path) = &args.thumbnail {
        write_file(path, &session.thumbnail_png().context("thumbnail failed")?)?;
        println!("wrote {}", path.display());
    }
    if let Some(path) = &args.record {
        let source = effect.as_deref().unwrap_or(crate::gpu::shaders::PASSTHROUGH_FRAGMENT);
        let name = args
            .preset
            .clone()
            .or_else(|| args.shader.as_ref().and_then(|p| p.file_stem()).map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "passthrough".to_string());
        let record = session.shader_record(&name, source, "");
        write_file(path, record.to_json()?.as_bytes())?;
        println!("wrote {}", path.display());
    }

    if args.output.is_none() && args.mask_output.is_none() && args.thumbnail.is_none() && args.record.is_none() {
        println!("nothing to write (use --output, --mask-output, --thumbnail or --record)");
    }
    Ok(())
}

fn has_other_mask_source(args: &CliArgs) -> bool {
    args.mask_preset.is_some() || args.mask_shader.is_some() || args.mask_image.is_some() || args.polygons.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn clap_definition_is_valid() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn parses_points_and_flags() {
        let args = CliArgs::try_parse_from([
            "shadermask", "-i", "a.png", "--preset", "sepia", "--quick-select", "1,2", "30,40", "--subtract",
        ])
        .unwrap();
        assert_eq!(args.quick_select, vec![(1, 2), (30, 40)]);
        assert!(args.subtract);
        assert_eq!(args.preset.as_deref(), Some("sepia"));
    }

    #[test]
    fn rejects_bad_point() {
        assert!(CliArgs::try_parse_from(["shadermask", "-i", "a.png", "--quick-select", "12"]).is_err());
    }

    #[test]
    fn list_presets_needs_no_input() {
        let args = CliArgs::try_parse_from(["shadermask", "--list-presets"]).unwrap();
        assert!(args.list_presets && args.input.is_none());
    }

    #[test]
    fn preset_kind_is_checked() {
        assert!(preset_source("sepia", PresetKind::Effect).is_ok());
        assert!(preset_source("sepia", PresetKind::MaskHeuristic).is_err());
        assert!(preset_source("sky", PresetKind::MaskHeuristic).is_ok());
    }
}
