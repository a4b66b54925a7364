use std::path::{Path, PathBuf};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    /// Mesh-mode outline color, linear RGB.
    pub fn outline_color(self) -> [f32; 3] {
        match self {
            Theme::Dark => [0.55, 0.85, 1.0],
            Theme::Light => [0.08, 0.1, 0.2],
        }
    }

    pub fn background(self) -> [u8; 3] {
        match self {
            Theme::Dark => [0x00, 0x00, 0x11],
            Theme::Light => [0xf0, 0xf2, 0xf7],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
}

#[derive(Debug, thiserror::Error)]
pub enum PreferencesError {
    #[error("failed to read preferences at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write preferences at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed preferences at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The single persisted flag, backed by a small JSON file.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn try_load(&self) -> Result<Option<Preferences>, PreferencesError> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PreferencesError::Read {
                    path: self.path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| PreferencesError::Parse {
                path: self.path.display().to_string(),
                source,
            })
    }

    /// Loads preferences, falling back to defaults on any problem.
    pub fn load(&self) -> Preferences {
        match self.try_load() {
            Ok(Some(preferences)) => preferences,
            Ok(None) => Preferences::default(),
            Err(err) => {
                log::warn!("{err}; using default preferences");
                Preferences::default()
            }
        }
    }

    pub fn save(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        let write_err = |source| PreferencesError::Write {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(preferences)
            .map_err(|err| write_err(std::io::Error::other(err)))?;
        std::fs::write(&self.path, json).map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "hangar-prefs-{}-{}.json",
            name,
            std::process::id()
        ))
    }

    #[test]
    fn missing_file_defaults_to_dark() {
        let store = PreferenceStore::new(temp_path("missing"));
        let _ = std::fs::remove_file(store.path());
        assert_eq!(store.load().theme, Theme::Dark);
        assert!(store.try_load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_keeps_theme() {
        let store = PreferenceStore::new(temp_path("roundtrip"));
        store
            .save(&Preferences {
                theme: Theme::Light,
            })
            .unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"light\""));
        assert_eq!(store.load().theme, Theme::Light);
        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let store = PreferenceStore::new(temp_path("corrupt"));
        std::fs::write(store.path(), "{ theme: purple").unwrap();
        assert!(matches!(
            store.try_load(),
            Err(PreferencesError::Parse { .. })
        ));
        assert_eq!(store.load(), Preferences::default());
        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn toggle_flips_between_two_themes() {
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
        assert_eq!(Theme::Light.toggled().toggled(), Theme::Light);
    }
}
