//! Protocol Registry
//!
//! Maps each approved protocol name to the table it may delete from and the
//! operation it performs. Built once at startup and never mutated afterwards.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_ID_COLUMN: &str = "Connect_ID";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read protocol file {path}: {cause}")]
    Io { path: String, cause: String },

    #[error("Invalid protocol definitions: {0}")]
    Parse(String),

    #[error("Protocol registry is empty")]
    Empty,

    #[error("Protocol '{protocol}' references unknown operation '{operation}'")]
    UnknownOperation { protocol: String, operation: String },

    #[error("Protocol '{protocol}' has invalid {field} name: '{value}'")]
    InvalidIdentifier {
        protocol: String,
        field: &'static str,
        value: String,
    },
}

/// Operation kinds a protocol can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Delete every row whose identifier matches.
    DeleteRow,
    /// Null out selected fields per identifier. Declared only.
    MaskFields,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::DeleteRow => "delete_row",
            Operation::MaskFields => "mask_fields",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delete_row" => Ok(Operation::DeleteRow),
            "mask_fields" => Ok(Operation::MaskFields),
            other => Err(other.to_string()),
        }
    }
}

/// Fully resolved location of the rows a protocol targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub dataset: String,
    pub table: String,
    pub id_column: String,
}

impl TableTarget {
    pub fn new(dataset: &str, table: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            table: table.to_string(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
        }
    }

    /// `<project>.<dataset>.<table>`
    pub fn qualified_name(&self, project: &str) -> String {
        format!("{}.{}.{}", project, self.dataset, self.table)
    }
}

#[derive(Debug, Clone)]
pub struct Protocol {
    pub name: String,
    pub target: TableTarget,
    pub operation: Operation,
}

/// On-disk form of a protocol entry
#[derive(Debug, Deserialize)]
struct ProtocolDefinition {
    dataset: String,
    table: String,
    #[serde(alias = "function")]
    operation: String,
    #[serde(default = "default_id_column")]
    id_column: String,
}

fn default_id_column() -> String {
    DEFAULT_ID_COLUMN.to_string()
}

#[derive(Debug, Clone)]
pub struct ProtocolRegistry {
    protocols: BTreeMap<String, Protocol>,
}

impl ProtocolRegistry {
    /// The protocols this service ships with.
    pub fn builtin() -> Self {
        let mut protocols = BTreeMap::new();
        protocols.insert(
            "roi_physical_activity".to_string(),
            Protocol {
                name: "roi_physical_activity".to_string(),
                target: TableTarget::new("ForTestingOnly", "physical_activity"),
                operation: Operation::DeleteRow,
            },
        );
        Self { protocols }
    }

    pub fn from_protocols(protocols: impl IntoIterator<Item = Protocol>) -> Result<Self, RegistryError> {
        let protocols: BTreeMap<String, Protocol> = protocols
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();

        if protocols.is_empty() {
            return Err(RegistryError::Empty);
        }

        for protocol in protocols.values() {
            validate_target(&protocol.name, &protocol.target)?;
        }

        Ok(Self { protocols })
    }

    /// Parse a JSON object of `name -> {dataset, table, operation, id_column?}`.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let definitions: HashMap<String, ProtocolDefinition> =
            serde_json::from_str(json).map_err(|e| RegistryError::Parse(e.to_string()))?;

        let mut protocols = Vec::with_capacity(definitions.len());
        for (name, def) in definitions {
            let operation = def.operation.parse::<Operation>().map_err(|operation| {
                RegistryError::UnknownOperation {
                    protocol: name.clone(),
                    operation,
                }
            })?;

            protocols.push(Protocol {
                name,
                target: TableTarget {
                    dataset: def.dataset,
                    table: def.table,
                    id_column: def.id_column,
                },
                operation,
            });
        }

        Self::from_protocols(protocols)
    }

    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;

        let registry = Self::from_json_str(&content)?;
        info!(
            "Loaded {} protocols from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Protocol> {
        self.protocols.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.protocols.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// Allowed protocol names rendered as `['a', 'b']` for error messages.
    pub fn allowed_display(&self) -> String {
        let quoted: Vec<String> = self.names().map(|n| format!("'{}'", n)).collect();
        format!("[{}]", quoted.join(", "))
    }
}

fn validate_target(protocol: &str, target: &TableTarget) -> Result<(), RegistryError> {
    for (field, value) in [
        ("dataset", &target.dataset),
        ("table", &target.table),
        ("id_column", &target.id_column),
    ] {
        if !is_valid_identifier(value) {
            return Err(RegistryError::InvalidIdentifier {
                protocol: protocol.to_string(),
                field,
                value: value.clone(),
            });
        }
    }
    Ok(())
}

/// Names end up in SQL text, so only plain identifiers are accepted.
pub fn is_valid_identifier(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    let first_char = match name.chars().next() {
        Some(c) => c,
        None => return false,
    };
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return false;
    }

    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
