use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use deepbrot_core::viewport::{clamp_iterations, DEFAULT_ITERATIONS};
use deepbrot_core::{Backend, IterationParams, Viewport};
use deepbrot_render::PipelineConfig;

/// Everything needed to render one image, as stored in a settings file.
///
/// Coordinates are decimal strings so that deep locations survive the
/// round trip through JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "default_center_re")]
    pub center_re: String,
    #[serde(default = "default_center_im")]
    pub center_im: String,
    #[serde(default = "default_zoom")]
    pub zoom: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_true")]
    pub smooth: bool,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_center_re() -> String {
    "-0.5".into()
}
fn default_center_im() -> String {
    "0".into()
}
fn default_zoom() -> String {
    "1".into()
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}
fn default_max_iterations() -> u32 {
    DEFAULT_ITERATIONS
}
fn default_true() -> bool {
    true
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            center_re: default_center_re(),
            center_im: default_center_im(),
            zoom: default_zoom(),
            width: default_width(),
            height: default_height(),
            max_iterations: default_max_iterations(),
            smooth: true,
            backend: Backend::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl RenderSettings {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!("No settings file at {}", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<RenderSettings>(&json) {
                Ok(settings) => {
                    info!("Loaded settings from {}", path.display());
                    return settings;
                }
                Err(e) => error!("Failed to parse settings: {e}"),
            },
            Err(e) => error!("Failed to read settings file: {e}"),
        }
        Self::default()
    }

    pub fn viewport(&self) -> deepbrot_core::Result<Viewport> {
        Viewport::from_decimal(
            &self.center_re,
            &self.center_im,
            &self.zoom,
            self.width,
            self.height,
            self.backend,
        )
    }

    /// Iteration parameters with the count clamped to the supported range.
    pub fn iteration_params(&self) -> deepbrot_core::Result<IterationParams> {
        IterationParams::new(clamp_iterations(self.max_iterations), self.smooth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("deepbrot_cli_settings");
        let _ = fs::create_dir_all(&dir);
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = RenderSettings::load(Path::new("/definitely/not/here.json"));
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = write_temp(
            "partial.json",
            r#"{"zoom": "1e40", "backend": "gpu", "pipeline": {"workers": 2}}"#,
        );
        let settings = RenderSettings::load(&path);
        assert_eq!(settings.zoom, "1e40");
        assert_eq!(settings.backend, Backend::Gpu);
        assert_eq!(settings.pipeline.workers, 2);
        assert_eq!(settings.pipeline.tile_size, 32);
        assert_eq!(settings.center_re, "-0.5");
        assert_eq!(settings.width, 800);
        assert!(settings.smooth);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let path = write_temp("broken.json", "{ not json");
        assert_eq!(RenderSettings::load(&path), RenderSettings::default());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn iterations_are_clamped() {
        let settings = RenderSettings {
            max_iterations: 5,
            ..Default::default()
        };
        assert_eq!(settings.iteration_params().unwrap().max_iterations, 100);
        let settings = RenderSettings {
            max_iterations: 10_000_000,
            ..Default::default()
        };
        assert_eq!(settings.iteration_params().unwrap().max_iterations, 100_000);
    }

    #[test]
    fn viewport_follows_settings() {
        let settings = RenderSettings {
            zoom: "1e30".into(),
            width: 100,
            height: 50,
            ..Default::default()
        };
        let viewport = settings.viewport().unwrap();
        assert_eq!((viewport.width(), viewport.height()), (100, 50));
        assert!(viewport.precision() > 58);

        let bad = RenderSettings {
            center_re: "abc".into(),
            ..Default::default()
        };
        assert!(bad.viewport().is_err());
    }
}
