use serde::{Deserialize, Serialize};
use std::path::Path;

/// Viewer configuration loaded from a JSON file. Missing or malformed
/// files fall back to defaults so the viewer always starts.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ViewerSettings {
    #[serde(default)]
    pub window: WindowSettings,
    #[serde(default)]
    pub demo: DemoSettings,
    #[serde(default)]
    pub network: NetworkSettings,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            window: WindowSettings::default(),
            demo: DemoSettings::default(),
            network: NetworkSettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "emberview".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Shape and playback of the procedural demo model.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DemoSettings {
    pub segments: usize,
    pub rings: usize,
    pub frames: usize,
    pub frame_rate: f32,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            segments: 24,
            rings: 12,
            frames: 12,
            frame_rate: 10.0,
        }
    }
}

impl DemoSettings {
    /// The cylinder builder needs at least 3 segments, 2 rings and 2
    /// frames, and the playback clock needs a positive frame rate.
    fn is_valid(&self) -> bool {
        self.segments >= 3
            && self.rings >= 2
            && self.frames >= 2
            && self.frame_rate.is_finite()
            && self.frame_rate > 0.0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkSettings {
    pub pose_send_interval_ms: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            pose_send_interval_ms: 50,
        }
    }
}

impl ViewerSettings {
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };

        let settings: Self = serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "Failed to parse settings: {}", e);
            Self::default()
        });
        settings.sanitized(path)
    }

    fn sanitized(mut self, path: &Path) -> Self {
        if !self.demo.is_valid() {
            tracing::warn!(
                path = %path.display(),
                "Demo settings out of range, using defaults: {:?}",
                self.demo
            );
            self.demo = DemoSettings::default();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let settings = ViewerSettings::load("/nonexistent/emberview.json");
        assert_eq!(settings.window.width, 1280);
        assert_eq!(settings.demo.frames, 12);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let json = r#"{ "demo": { "segments": 8, "rings": 4, "frames": 6, "frame_rate": 5.0 } }"#;
        let settings: ViewerSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.demo.segments, 8);
        assert_eq!(settings.window.title, "emberview");
        assert_eq!(settings.network.pose_send_interval_ms, 50);
    }

    fn scratch_file(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "emberview-settings-test-{}-{}",
            std::process::id(),
            name
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_degenerate_demo_shape_falls_back() {
        // 2 segments cannot form a tube; such a file must not reach the
        // mesh builder.
        let path = scratch_file(
            "degenerate-shape",
            r#"{ "demo": { "segments": 2, "rings": 1, "frames": 1, "frame_rate": 10.0 } }"#,
        );
        let settings = ViewerSettings::load(&path);
        assert_eq!(settings.demo.segments, 24);
        assert_eq!(settings.demo.rings, 12);
        assert_eq!(settings.demo.frames, 12);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_negative_frame_rate_falls_back() {
        let path = scratch_file(
            "negative-rate",
            r#"{ "demo": { "segments": 8, "rings": 4, "frames": 6, "frame_rate": -5.0 } }"#,
        );
        let settings = ViewerSettings::load(&path);
        assert_eq!(settings.demo.frame_rate, 10.0);

        // Loaded settings always drive the playback clock into [0, 1).
        let mut timeline = crate::render::Timeline::new(
            settings.demo.frames,
            settings.demo.frame_rate,
        );
        for _ in 0..100 {
            timeline.advance(0.017);
            let factor = timeline.interpolation_factor();
            assert!((0.0..1.0).contains(&factor), "factor {factor} out of range");
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_settings_roundtrip() {
        let settings = ViewerSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: ViewerSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.demo.frame_rate, settings.demo.frame_rate);
        assert_eq!(back.window.height, settings.window.height);
    }
}
