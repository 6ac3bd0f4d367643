use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The two entity types an organization workbook can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Department,
    Position,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Department => "department",
            Self::Position => "position",
        }
    }

    /// Sheet name shown to users in findings and reports.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            Self::Department => "Departments",
            Self::Position => "Positions",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codes already persisted by the remote service, fetched by the caller
/// before validation and classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExistingKeys {
    #[serde(default)]
    pub departments: HashSet<String>,
    #[serde(default)]
    pub positions: HashSet<String>,
}

impl ExistingKeys {
    pub fn new(departments: HashSet<String>, positions: HashSet<String>) -> Self {
        Self {
            departments,
            positions,
        }
    }

    /// The key set for a single entity type.
    pub fn for_entity(&self, entity: EntityKind) -> &HashSet<String> {
        match entity {
            EntityKind::Department => &self.departments,
            EntityKind::Position => &self.positions,
        }
    }
}
