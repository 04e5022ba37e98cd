use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use ulid::Ulid;

use crate::limits::*;

/// A bookable stylist. `name` is the booking identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    /// `#rrggbb`
    pub color: String,
}

/// Ordered list of resources with unique names.
///
/// Owned by the caller and handed to the scheduler as a slice; the scheduler
/// never reads or writes it on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDirectory {
    resources: Vec<Resource>,
}

impl Default for ResourceDirectory {
    fn default() -> Self {
        Self::default_salon()
    }
}

impl ResourceDirectory {
    /// The three stylists a fresh board starts with.
    pub fn default_salon() -> Self {
        let seed = [
            ("sty_1", "Cristina", "#22c55e"),
            ("sty_2", "Laura", "#3b82f6"),
            ("sty_3", "Marta", "#f59e0b"),
        ];
        Self {
            resources: seed
                .iter()
                .map(|(id, name, color)| Resource {
                    id: (*id).into(),
                    name: (*name).into(),
                    color: (*color).into(),
                })
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self { resources: Vec::new() }
    }

    pub fn from_resources(resources: Vec<Resource>) -> Result<Self, DirectoryError> {
        let mut dir = Self::empty();
        for r in resources {
            dir.push(r)?;
        }
        Ok(dir)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name.trim())
    }

    pub fn add(&mut self, name: &str, color: &str) -> Result<&Resource, DirectoryError> {
        let resource = Resource {
            id: format!("sty_{}", Ulid::new().to_string().to_lowercase()),
            name: name.trim().to_string(),
            color: color.trim().to_lowercase(),
        };
        self.push(resource)?;
        Ok(&self.resources[self.resources.len() - 1])
    }

    pub fn rename(&mut self, name: &str, new_name: &str) -> Result<(), DirectoryError> {
        let new_name = validate_name(new_name)?;
        if new_name != name.trim() && self.get(&new_name).is_some() {
            return Err(DirectoryError::DuplicateName(new_name));
        }
        let r = self.get_mut(name)?;
        r.name = new_name;
        Ok(())
    }

    pub fn recolor(&mut self, name: &str, color: &str) -> Result<(), DirectoryError> {
        let color = validate_color(color)?;
        self.get_mut(name)?.color = color;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Resource, DirectoryError> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.name == name.trim())
            .ok_or_else(|| DirectoryError::NotFound(name.trim().to_string()))?;
        Ok(self.resources.remove(pos))
    }

    /// Load from a JSON file, falling back to [`ResourceDirectory::default_salon`]
    /// when the file is missing, unreadable, invalid or empty.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("cannot read directory {}: {e}; using defaults", path.display());
                }
                return Self::default_salon();
            }
        };
        let parsed = serde_json::from_str::<Vec<Resource>>(&raw)
            .map_err(|e| DirectoryError::Io(e.to_string()))
            .and_then(Self::from_resources);
        match parsed {
            Ok(dir) if !dir.is_empty() => dir,
            Ok(_) => Self::default_salon(),
            Err(e) => {
                warn!("invalid directory {}: {e}; using defaults", path.display());
                Self::default_salon()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), DirectoryError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DirectoryError::Io(e.to_string()))?;
            }
        let json = serde_json::to_string_pretty(&self.resources)
            .map_err(|e| DirectoryError::Io(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| DirectoryError::Io(e.to_string()))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Resource, DirectoryError> {
        self.resources
            .iter_mut()
            .find(|r| r.name == name.trim())
            .ok_or_else(|| DirectoryError::NotFound(name.trim().to_string()))
    }

    fn push(&mut self, mut resource: Resource) -> Result<(), DirectoryError> {
        if self.resources.len() >= MAX_RESOURCES {
            return Err(DirectoryError::LimitExceeded("too many resources"));
        }
        resource.name = validate_name(&resource.name)?;
        resource.color = validate_color(&resource.color)?;
        if self.get(&resource.name).is_some() {
            return Err(DirectoryError::DuplicateName(resource.name));
        }
        self.resources.push(resource);
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<String, DirectoryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DirectoryError::InvalidName("empty name".into()));
    }
    if name.len() > MAX_RESOURCE_NAME_LEN {
        return Err(DirectoryError::LimitExceeded("resource name too long"));
    }
    Ok(name.to_string())
}

fn validate_color(color: &str) -> Result<String, DirectoryError> {
    let color = color.trim().to_lowercase();
    let hex = color.strip_prefix('#').unwrap_or("");
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DirectoryError::InvalidColor(color));
    }
    Ok(color)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    DuplicateName(String),
    NotFound(String),
    InvalidName(String),
    InvalidColor(String),
    LimitExceeded(&'static str),
    Io(String),
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::DuplicateName(n) => write!(f, "resource name already taken: {n}"),
            DirectoryError::NotFound(n) => write!(f, "no such resource: {n}"),
            DirectoryError::InvalidName(msg) => write!(f, "invalid resource name: {msg}"),
            DirectoryError::InvalidColor(c) => write!(f, "invalid color {c:?}, expected #rrggbb"),
            DirectoryError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            DirectoryError::Io(e) => write!(f, "directory I/O error: {e}"),
        }
    }
}

impl std::error::Error for DirectoryError {}
