use crate::annotate::surface::SurfaceOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_api_base_url() -> String {
    "http://127.0.0.1:8090/api/edit".into()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    3
}

fn default_history_limit() -> usize {
    50
}

fn default_brush_width() -> f32 {
    24.0
}

fn default_eraser_width() -> f32 {
    24.0
}

fn default_min_rect_size() -> f32 {
    5.0
}

fn default_markup_color() -> [u8; 4] {
    // Semi-transparent red; a UI affordance only, never mask semantics.
    [255, 0, 0, 90]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetouchSettings {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_brush_width")]
    pub brush_width: f32,
    #[serde(default = "default_eraser_width")]
    pub eraser_width: f32,
    #[serde(default = "default_min_rect_size")]
    pub min_rect_size: f32,
    #[serde(default = "default_markup_color")]
    pub markup_color: [u8; 4],
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for RetouchSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            history_limit: default_history_limit(),
            brush_width: default_brush_width(),
            eraser_width: default_eraser_width(),
            min_rect_size: default_min_rect_size(),
            markup_color: default_markup_color(),
            debug_logging: false,
        }
    }
}

impl RetouchSettings {
    /// Missing or empty settings files yield the defaults; only malformed
    /// JSON is an error.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn surface_options(&self) -> SurfaceOptions {
        SurfaceOptions {
            brush_width: self.brush_width,
            eraser_width: self.eraser_width,
            min_rect_size: self.min_rect_size,
            history_limit: self.history_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = RetouchSettings::default();
        assert_eq!(settings.request_timeout_secs, 60);
        assert_eq!(settings.max_concurrent, 3);
        assert_eq!(settings.history_limit, 50);
        assert_eq!(settings.min_rect_size, 5.0);
        assert_eq!(settings.markup_color, [255, 0, 0, 90]);
        assert!(!settings.debug_logging);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = RetouchSettings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, RetouchSettings::default());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = RetouchSettings::default();
        settings.max_concurrent = 5;
        settings.brush_width = 12.0;
        settings.save(&path).unwrap();

        let loaded = RetouchSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_json_fills_missing_fields_with_defaults() {
        let settings: RetouchSettings = serde_json::from_str("{\"max_concurrent\": 7}").unwrap();
        assert_eq!(settings.max_concurrent, 7);
        assert_eq!(settings.history_limit, 50);
        assert_eq!(settings.api_base_url, default_api_base_url());
    }

    #[test]
    fn surface_options_mirror_settings() {
        let mut settings = RetouchSettings::default();
        settings.brush_width = 10.0;
        settings.history_limit = 8;

        let options = settings.surface_options();
        assert_eq!(options.brush_width, 10.0);
        assert_eq!(options.history_limit, 8);
        assert_eq!(options.min_rect_size, 5.0);
    }
}
