use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::hlc::Hlc;
use crate::key::{KeyValue, MappingKey};

pub const MAX_KEY_LENGTH: usize = 64;
pub const MAX_LABEL_LENGTH: usize = 20;
pub const MAX_SYSTEM_LENGTH: usize = 16;

const CREATED_SUFFIX: &str = "_CREATED";
const UPDATED_SUFFIX: &str = "_UPDATED";

/// Provenance of a mapping row: `MIGRATED`, `<SYSTEM>_CREATED` or
/// `<SYSTEM>_UPDATED`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MappingType {
    Migrated,
    Created(String),
    Updated(String),
}

impl MappingType {
    pub fn created(system: &str) -> Self {
        Self::Created(system.to_string())
    }

    pub fn updated(system: &str) -> Self {
        Self::Updated(system.to_string())
    }

    pub fn is_migrated(&self) -> bool {
        matches!(self, Self::Migrated)
    }

    pub fn as_string(&self) -> String {
        match self {
            Self::Migrated => "MIGRATED".to_string(),
            Self::Created(system) => format!("{system}{CREATED_SUFFIX}"),
            Self::Updated(system) => format!("{system}{UPDATED_SUFFIX}"),
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let parsed = if s == "MIGRATED" {
            Self::Migrated
        } else if let Some(system) = s.strip_suffix(CREATED_SUFFIX) {
            Self::Created(system.to_string())
        } else if let Some(system) = s.strip_suffix(UPDATED_SUFFIX) {
            Self::Updated(system.to_string())
        } else {
            return Err(CoreError::validation("mappingType", format!("unknown mapping type {s:?}")));
        };
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let system = match self {
            Self::Migrated => return Ok(()),
            Self::Created(system) | Self::Updated(system) => system,
        };
        let mut chars = system.chars();
        let well_formed = matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
            && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if !well_formed || system.len() > MAX_SYSTEM_LENGTH {
            return Err(CoreError::validation(
                "mappingType",
                format!("invalid system name {system:?}"),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl FromStr for MappingType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A crosswalk row with its identifiers flattened to column values. This is
/// the shape the store reads and writes; [`Mapping`] is the typed view.
#[derive(Debug, Clone)]
pub struct MappingRow {
    pub legacy_id: Vec<KeyValue>,
    pub new_id: Vec<KeyValue>,
    pub parent_id: Option<String>,
    pub owner_id: Option<String>,
    pub label: Option<String>,
    pub mapping_type: MappingType,
    /// Rows still awaiting a confirmed legacy record; excluded from label
    /// counts unless asked for.
    pub provisional: bool,
    pub when_created: Option<Hlc>,
}

impl MappingRow {
    /// True when both keys match `other`, ignoring every other column.
    pub fn same_pair(&self, other: &MappingRow) -> bool {
        self.legacy_id == other.legacy_id && self.new_id == other.new_id
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_key("legacyId", &self.legacy_id)?;
        validate_key("newId", &self.new_id)?;
        if let Some(parent) = &self.parent_id {
            validate_text("parentId", parent, MAX_KEY_LENGTH)?;
        }
        if let Some(owner) = &self.owner_id {
            validate_text("ownerId", owner, MAX_KEY_LENGTH)?;
        }
        if let Some(label) = &self.label {
            validate_label(label)?;
        }
        self.mapping_type.validate()
    }
}

fn validate_key(field: &str, values: &[KeyValue]) -> Result<(), CoreError> {
    if values.is_empty() {
        return Err(CoreError::validation(field, "missing"));
    }
    for value in values {
        if let KeyValue::Text(text) = value {
            validate_text(field, text, MAX_KEY_LENGTH)?;
        }
    }
    Ok(())
}

fn validate_text(field: &str, text: &str, max: usize) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::validation(field, "must not be blank"));
    }
    if text.chars().count() > max {
        return Err(CoreError::validation(field, format!("longer than {max} characters")));
    }
    Ok(())
}

/// Checks a free-standing id such as an owner or aggregate id.
pub fn validate_id(field: &str, text: &str) -> Result<(), CoreError> {
    validate_text(field, text, MAX_KEY_LENGTH)
}

pub fn validate_label(label: &str) -> Result<(), CoreError> {
    validate_text("label", label, MAX_LABEL_LENGTH)
}

/// One crosswalk entry relating a legacy id to a new-system id.
///
/// Equality is identity on the new-system id, the table's primary key.
#[derive(Debug, Clone)]
pub struct Mapping<L, N = String> {
    pub legacy_id: L,
    pub new_id: N,
    pub parent_id: Option<String>,
    pub owner_id: Option<String>,
    pub label: Option<String>,
    pub mapping_type: MappingType,
    pub provisional: bool,
    pub when_created: Option<Hlc>,
}

impl<L: MappingKey, N: MappingKey> Mapping<L, N> {
    pub fn new(legacy_id: L, new_id: N, mapping_type: MappingType) -> Self {
        Self {
            legacy_id,
            new_id,
            parent_id: None,
            owner_id: None,
            label: None,
            mapping_type,
            provisional: false,
            when_created: None,
        }
    }

    pub fn migrated(legacy_id: L, new_id: N, label: impl Into<String>) -> Self {
        Self::new(legacy_id, new_id, MappingType::Migrated).with_label(label)
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn provisional(mut self) -> Self {
        self.provisional = true;
        self
    }

    pub fn same_pair(&self, other: &Self) -> bool {
        self.legacy_id == other.legacy_id && self.new_id == other.new_id
    }

    pub fn to_row(&self) -> MappingRow {
        MappingRow {
            legacy_id: self.legacy_id.key_values(),
            new_id: self.new_id.key_values(),
            parent_id: self.parent_id.clone(),
            owner_id: self.owner_id.clone(),
            label: self.label.clone(),
            mapping_type: self.mapping_type.clone(),
            provisional: self.provisional,
            when_created: self.when_created,
        }
    }

    pub fn from_row(row: MappingRow) -> Result<Self, CoreError> {
        Ok(Self {
            legacy_id: L::from_key_values(&row.legacy_id)?,
            new_id: N::from_key_values(&row.new_id)?,
            parent_id: row.parent_id,
            owner_id: row.owner_id,
            label: row.label,
            mapping_type: row.mapping_type,
            provisional: row.provisional,
            when_created: row.when_created,
        })
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.to_row().validate()
    }
}

impl<L, N: PartialEq> PartialEq for Mapping<L, N> {
    fn eq(&self, other: &Self) -> bool {
        self.new_id == other.new_id
    }
}

impl<L, N: Eq> Eq for Mapping<L, N> {}
