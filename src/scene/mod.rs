pub mod composer;
pub mod manipulation;
pub mod registry;

use crate::scene::registry::ModelRegistry;
use std::collections::HashMap;

pub const DEFAULT_ROTATION_SPEED: f32 = 0.01;
pub const DEFAULT_MESH_OPACITY: f32 = 0.6;
pub const DEFAULT_LINE_DENSITY: f32 = 1.0;

/// Per-model settings edited by the UI. The store does not clamp any value.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub position: [f32; 3],
    pub scale: f32,
    pub auto_rotate: bool,
    /// Radians added to the spin angle per redraw tick.
    pub rotation_speed: f32,
    pub mesh_mode: bool,
    pub mesh_opacity: f32,
    pub mesh_line_density: f32,
    pub is_locked: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            scale: 1.0,
            auto_rotate: false,
            rotation_speed: DEFAULT_ROTATION_SPEED,
            mesh_mode: false,
            mesh_opacity: DEFAULT_MESH_OPACITY,
            mesh_line_density: DEFAULT_LINE_DENSITY,
            is_locked: false,
        }
    }
}

/// A single-field update. Each variant replaces exactly one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingChange {
    Position([f32; 3]),
    Scale(f32),
    AutoRotate(bool),
    RotationSpeed(f32),
    MeshMode(bool),
    MeshOpacity(f32),
    MeshLineDensity(f32),
    Locked(bool),
}

impl SettingChange {
    fn apply(self, settings: &mut ModelSettings) -> Dirty {
        match self {
            SettingChange::Position(position) => {
                settings.position = position;
                Dirty::TRANSFORM
            }
            SettingChange::Scale(scale) => {
                settings.scale = scale;
                Dirty::TRANSFORM
            }
            SettingChange::AutoRotate(auto_rotate) => {
                settings.auto_rotate = auto_rotate;
                Dirty::NONE
            }
            SettingChange::RotationSpeed(speed) => {
                settings.rotation_speed = speed;
                Dirty::NONE
            }
            SettingChange::MeshMode(mesh_mode) => {
                settings.mesh_mode = mesh_mode;
                Dirty::APPEARANCE
            }
            SettingChange::MeshOpacity(opacity) => {
                settings.mesh_opacity = opacity;
                Dirty::APPEARANCE
            }
            SettingChange::MeshLineDensity(density) => {
                settings.mesh_line_density = density;
                Dirty::APPEARANCE
            }
            SettingChange::Locked(locked) => {
                settings.is_locked = locked;
                Dirty::NONE
            }
        }
    }
}

/// Which derived state of a model's group needs recomputing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dirty {
    pub transform: bool,
    pub appearance: bool,
}

impl Dirty {
    pub const NONE: Self = Self {
        transform: false,
        appearance: false,
    };
    pub const TRANSFORM: Self = Self {
        transform: true,
        appearance: false,
    };
    pub const APPEARANCE: Self = Self {
        transform: false,
        appearance: true,
    };

    pub fn any(self) -> bool {
        self.transform || self.appearance
    }

    fn merge(&mut self, other: Dirty) {
        self.transform |= other.transform;
        self.appearance |= other.appearance;
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StoreError {
    #[error("unknown model id `{0}`")]
    UnknownModel(String),
}

#[derive(Debug, Clone)]
struct ModelRecord {
    id: String,
    settings: ModelSettings,
    dirty: Dirty,
    revision: u64,
}

/// Single source of truth for model settings and the selection.
#[derive(Debug, Clone)]
pub struct ModelStore {
    records: Vec<ModelRecord>,
    index: HashMap<String, usize>,
    selected: usize,
}

impl ModelStore {
    pub fn new(registry: &ModelRegistry) -> Self {
        let records: Vec<ModelRecord> = registry
            .descriptors()
            .iter()
            .map(|descriptor| ModelRecord {
                id: descriptor.id.clone(),
                settings: descriptor.defaults.clone(),
                // Fresh records still need their first projection.
                dirty: Dirty {
                    transform: true,
                    appearance: true,
                },
                revision: 0,
            })
            .collect();
        let index = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.id.clone(), i))
            .collect();
        Self {
            records,
            index,
            selected: 0,
        }
    }

    fn position_of(&self, id: &str) -> usize {
        match self.index.get(id) {
            Some(position) => *position,
            None => panic!("unknown model id `{id}`"),
        }
    }

    /// Panics on an id that is not in the registry.
    pub fn get(&self, id: &str) -> &ModelSettings {
        &self.records[self.position_of(id)].settings
    }

    /// Replaces one field of `id`'s record and marks it dirty. Panics on an
    /// id that is not in the registry.
    pub fn update(&mut self, id: &str, change: SettingChange) {
        let position = self.position_of(id);
        let record = &mut self.records[position];
        let dirty = change.apply(&mut record.settings);
        record.dirty.merge(dirty);
        record.revision += 1;
        log::trace!("model `{}` updated: {:?}", id, change);
    }

    /// Number of updates applied to `id` so far.
    #[cfg(test)]
    pub fn revision(&self, id: &str) -> u64 {
        self.records[self.position_of(id)].revision
    }

    pub fn select(&mut self, id: &str) -> Result<(), StoreError> {
        let position = self
            .index
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::UnknownModel(id.to_string()))?;
        if position != self.selected {
            log::debug!("selected model `{}`", id);
        }
        self.selected = position;
        Ok(())
    }

    pub fn selected_id(&self) -> &str {
        &self.records[self.selected].id
    }

    pub fn selected(&self) -> &ModelSettings {
        &self.records[self.selected].settings
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.id.as_str())
    }

    /// Drains dirty flags in registry order.
    pub fn take_dirty(&mut self) -> Vec<(String, Dirty)> {
        self.records
            .iter_mut()
            .filter(|record| record.dirty.any())
            .map(|record| {
                let dirty = std::mem::take(&mut record.dirty);
                (record.id.clone(), dirty)
            })
            .collect()
    }
}
