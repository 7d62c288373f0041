use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lightweight project reference carried in event subjects and digest records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectRef {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl ProjectRef {
    pub fn new(uuid: Uuid, name: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            uuid,
            name: name.into(),
            version: version.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRef {
    pub uuid: Uuid,
    #[serde(default)]
    pub group: Option<String>,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl ComponentRef {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            group: None,
            name: name.into(),
            version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VulnerabilityRef {
    pub id: String,
    pub source: String,
}

impl VulnerabilityRef {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
        }
    }
}

/// A node of the project hierarchy.
///
/// The engine only ever traverses this tree. `parent` is a back-reference by
/// UUID; `children` is populated by whichever store hands the project out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub parent: Option<Uuid>,
    #[serde(default)]
    pub children: Vec<Project>,
}

fn default_active() -> bool {
    true
}

impl Project {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            version: None,
            active: true,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Attach `child`, setting its parent back-reference to this project.
    pub fn with_child(mut self, mut child: Project) -> Self {
        child.parent = Some(self.uuid);
        self.children.push(child);
        self
    }

    pub fn to_ref(&self) -> ProjectRef {
        ProjectRef {
            uuid: self.uuid,
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}
