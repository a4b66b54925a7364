use crate::scene::registry::{ModelDescriptor, ModelRegistry, RegistryError};
use crate::wireframe::DEFAULT_BASE_THRESHOLD_DEG;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "HANGAR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "hangar.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model list: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "hangar".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fov_deg: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 8.0],
            target: [0.0, 0.0, 0.0],
            fov_deg: 45.0,
            min_distance: 3.0,
            max_distance: 50.0,
        }
    }
}

/// Step sizes and ranges the UI applies before values reach the store.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub position_step: f32,
    pub scale_step: f32,
    pub scale_range: [f32; 2],
    pub rotation_speed_range: [f32; 2],
    pub line_density_range: [f32; 2],
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            position_step: 1.0,
            scale_step: 0.1,
            scale_range: [0.5, 3.0],
            rotation_speed_range: [0.0, 0.1],
            line_density_range: [0.25, 4.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub asset_root: PathBuf,
    pub preferences_path: PathBuf,
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub wireframe_threshold_deg: f32,
    /// Replaces the built-in model list when present.
    pub models: Option<Vec<ModelDescriptor>>,
    pub target_fps: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            preferences_path: PathBuf::from("preferences.json"),
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            wireframe_threshold_deg: DEFAULT_BASE_THRESHOLD_DEG,
            models: None,
            target_fps: 60.0,
        }
    }
}

impl ViewerConfig {
    /// Reads `$HANGAR_CONFIG` or `hangar.json`; a missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn registry(&self) -> Result<ModelRegistry, ConfigError> {
        match &self.models {
            Some(models) => Ok(ModelRegistry::new(models.clone())?),
            None => Ok(ModelRegistry::builtin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("hangar-config-does-not-exist.json");
        let config = ViewerConfig::load_from(&path).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.registry().unwrap().len(), 2);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: ViewerConfig =
            serde_json::from_str(r#"{"camera":{"fov_deg":60.0},"controls":{"scale_step":0.5}}"#)
                .unwrap();
        assert_eq!(config.camera.fov_deg, 60.0);
        assert_eq!(config.camera.position, [0.0, 0.0, 8.0]);
        assert_eq!(config.controls.scale_step, 0.5);
        assert_eq!(config.controls.scale_range, [0.5, 3.0]);
    }

    #[test]
    fn custom_models_are_validated() {
        let config: ViewerConfig = serde_json::from_str(
            r#"{"models":[{"id":"x","name":"X","path":"x.glb"},{"id":"x","name":"Y","path":"y.glb"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            config.registry(),
            Err(ConfigError::Registry(RegistryError::DuplicateId(_)))
        ));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("hangar-config-bad-{}.json", std::process::id()));
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            ViewerConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
        let _ = std::fs::remove_file(&path);
    }
}
