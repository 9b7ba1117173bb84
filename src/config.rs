// ============================================================================
// SETTINGS: persisted `key=value` file in the OS config directory
// ============================================================================

use std::path::{Path, PathBuf};

use crate::ops::brush::BrushSettings;
use crate::ops::quick_select::QuickSelectOptions;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// "high performance" / "low power"; anything else means high performance.
    pub preferred_gpu: String,
    /// Longer-side cap applied to every loaded image.
    pub max_image_dim: u32,
    pub thumbnail_dim: u32,
    pub brush_radius: f32,
    pub brush_softness: f32,
    pub tolerance: f32,
    pub grow_radius: u32,
    pub intensity: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preferred_gpu: "high performance".to_string(),
            max_image_dim: 2048,
            thumbnail_dim: 256,
            brush_radius: 24.0,
            brush_softness: 0.5,
            tolerance: 32.0,
            grow_radius: 0,
            intensity: 1.0,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/shadermask/shadermask_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\ShaderMask\shadermask_settings.cfg
    /// On macOS:   ~/Library/Application Support/ShaderMask/shadermask_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("shadermask");
            Some(config_dir.join("shadermask_settings.cfg"))
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            Some(PathBuf::from(appdata).join("ShaderMask").join("shadermask_settings.cfg"))
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("ShaderMask")
                    .join("shadermask_settings.cfg"),
            )
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join("shadermask_settings.cfg")))
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "preferred_gpu={}\n\
             max_image_dim={}\n\
             thumbnail_dim={}\n\
             brush_radius={}\n\
             brush_softness={}\n\
             tolerance={}\n\
             grow_radius={}\n\
             intensity={}\n",
            self.preferred_gpu,
            self.max_image_dim,
            self.thumbnail_dim,
            self.brush_radius,
            self.brush_softness,
            self.tolerance,
            self.grow_radius,
            self.intensity,
        )
    }

    /// Parse `key=value` lines.  Unknown keys and unparsable values keep
    /// their defaults.
    pub fn from_config_str(content: &str) -> Self {
        let defaults = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "preferred_gpu" => s.preferred_gpu = val.to_string(),
                "max_image_dim" => {
                    s.max_image_dim = val.parse().ok().filter(|&v| v > 0).unwrap_or(defaults.max_image_dim);
                }
                "thumbnail_dim" => {
                    s.thumbnail_dim = val.parse().ok().filter(|&v| v > 0).unwrap_or(defaults.thumbnail_dim);
                }
                "brush_radius" => {
                    s.brush_radius = val
                        .parse()
                        .ok()
                        .filter(|v: &f32| v.is_finite() && *v > 0.0)
                        .unwrap_or(defaults.brush_radius);
                }
                "brush_softness" => s.brush_softness = val.parse().unwrap_or(defaults.brush_softness),
                "tolerance" => s.tolerance = val.parse().unwrap_or(defaults.tolerance),
                "grow_radius" => s.grow_radius = val.parse().unwrap_or(defaults.grow_radius),
                "intensity" => s.intensity = val.parse().unwrap_or(defaults.intensity),
                _ => tracing::debug!(key, "ignoring unknown settings key"),
            }
        }
        s
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::settings_path() else { return Ok(()) };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    pub fn brush(&self) -> BrushSettings {
        BrushSettings {
            radius: self.brush_radius,
            softness: self.brush_softness,
            ..BrushSettings::default()
        }
    }

    pub fn quick_select(&self) -> QuickSelectOptions {
        QuickSelectOptions {
            tolerance: self.tolerance,
            grow_radius: self.grow_radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_string_round_trips() {
        let s = Settings {
            preferred_gpu: "low power".into(),
            max_image_dim: 1024,
            tolerance: 12.5,
            grow_radius: 3,
            ..Settings::default()
        };
        assert_eq!(Settings::from_config_str(&s.to_config_string()), s);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let s = Settings::from_config_str("max_image_dim=0\ntolerance=lots\nnot a line\nmystery=1\nintensity=0.25");
        assert_eq!(s.max_image_dim, 2048);
        assert_eq!(s.tolerance, 32.0);
        assert_eq!(s.intensity, 0.25);
    }

    #[test]
    fn non_positive_brush_radius_is_rejected() {
        for bad in ["brush_radius=0", "brush_radius=-4", "brush_radius=NaN", "brush_radius=inf"] {
            assert_eq!(Settings::from_config_str(bad).brush_radius, 24.0, "{bad}");
        }
        assert_eq!(Settings::from_config_str("brush_radius=0.5").brush_radius, 0.5);
    }

    #[test]
    fn save_then_load_from_file() {
        let dir = std::env::temp_dir().join(format!("shadermask-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("settings.cfg");
        let s = Settings { brush_radius: 8.0, ..Settings::default() };
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), s);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("shadermask-definitely-missing.cfg");
        assert_eq!(Settings::load_from(&path), Settings::default());
    }
}
