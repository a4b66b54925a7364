use crate::scene::ModelSettings;
use std::collections::HashSet;

/// Static definition of one viewable model.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    /// Asset path relative to the asset root.
    pub path: String,
    #[serde(default)]
    pub defaults: ModelSettings,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("model registry is empty")]
    Empty,
    #[error("duplicate model id `{0}`")]
    DuplicateId(String),
    #[error("model `{0}` has an empty id or asset path")]
    Incomplete(String),
}

/// Immutable, validated list of descriptors. Order is display order.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    descriptors: Vec<ModelDescriptor>,
}

impl ModelRegistry {
    pub fn new(descriptors: Vec<ModelDescriptor>) -> Result<Self, RegistryError> {
        if descriptors.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if descriptor.id.trim().is_empty() || descriptor.path.trim().is_empty() {
                return Err(RegistryError::Incomplete(descriptor.name.clone()));
            }
            if !seen.insert(descriptor.id.as_str()) {
                return Err(RegistryError::DuplicateId(descriptor.id.clone()));
            }
        }
        Ok(Self { descriptors })
    }

    pub fn builtin() -> Self {
        Self {
            descriptors: builtin_descriptors(),
        }
    }

    pub fn descriptors(&self) -> &[ModelDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.descriptors.iter().find(|descriptor| descriptor.id == id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }
}

pub fn builtin_descriptors() -> Vec<ModelDescriptor> {
    vec![
        ModelDescriptor {
            id: "endurance-lowpoly".to_string(),
            name: "Endurance (Low Poly)".to_string(),
            path: "endurance_from_interstellar_lowpoly.glb".to_string(),
            defaults: ModelSettings::default(),
        },
        ModelDescriptor {
            id: "endurance".to_string(),
            name: "Endurance".to_string(),
            path: "models/interstellar_endurance.glb".to_string(),
            defaults: ModelSettings {
                position: [4.0, 0.0, 0.0],
                scale: 0.8,
                ..ModelSettings::default()
            },
        },
    ]
}
