//! Schema data model
//!
//! The structural snapshot types produced by introspection and consumed by
//! the differ, relation mapper, index advisor and model generator. A snapshot
//! is immutable once built; each introspection run produces a fresh one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::EngineResult;

/// Complete schema snapshot at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSnapshot {
    /// Human-readable label, e.g. "PostgreSQL schema (public)"
    pub name: String,
    pub timestamp: DateTime<Utc>,
    /// Tables keyed by table name (keys unique, deterministic order)
    pub tables: BTreeMap<String, TableDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
}

impl SchemaSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: Utc::now(),
            tables: BTreeMap::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Export to the JSON interchange format.
    ///
    /// Field names and nesting are a compatibility contract: top-level
    /// `name`, `timestamp`, `tables` (object keyed by table name) and
    /// `foreignKeys` (array).
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Import a snapshot previously produced by [`SchemaSnapshot::to_json`].
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Table representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub name: String,
    pub schema: String,
    /// Columns keyed by column name
    pub columns: BTreeMap<String, ColumnDescriptor>,
    /// Primary-key column names in key order; every entry exists in `columns`
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    /// Derived relations, attached post-hoc by the relation mapper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<Vec<RelationDescriptor>>,
}

impl TableDescriptor {
    /// Descriptor with no columns. Used when a table errors out mid-scan:
    /// the run continues and callers treat the hole as a data-quality signal.
    pub fn empty(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            columns: BTreeMap::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            relations: None,
        }
    }
}

/// Column representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub name: String,
    /// Raw catalog type name, not normalized (e.g. "character varying")
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub is_primary: bool,
    pub is_unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
    /// Raw default expression as stored by the catalog, e.g. `nextval(...)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// Index representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDescriptor {
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
    /// Access method tag, e.g. "btree", "gin", "gist"
    #[serde(rename = "type")]
    pub index_type: String,
}

impl IndexDescriptor {
    /// Structural equality on the covered column set, regardless of order.
    pub fn covers_same_columns(&self, columns: &[String]) -> bool {
        if self.columns.len() != columns.len() {
            return false;
        }
        let mine: HashSet<&str> = self.columns.iter().map(String::as_str).collect();
        columns.iter().all(|c| mine.contains(c.as_str()))
    }
}

/// Foreign key relationship
///
/// The only directed edge type between tables; all relation inference
/// derives from it. Source and target column lists have the same length and
/// are positionally paired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyDescriptor {
    pub name: String,
    pub source_table: String,
    pub source_columns: Vec<String>,
    pub target_table: String,
    pub target_columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
}

/// Relation cardinality between two tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "1:1")]
    OneToOne,
    #[serde(rename = "1:n")]
    OneToMany,
    #[serde(rename = "n:1")]
    ManyToOne,
    #[serde(rename = "n:m")]
    ManyToMany,
}

impl Cardinality {
    /// Cardinality of the inverse relation: 1:1↔1:1, 1:n↔n:1, n:m↔n:m.
    pub fn inverse(self) -> Self {
        match self {
            Cardinality::OneToOne => Cardinality::OneToOne,
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
            Cardinality::ManyToMany => Cardinality::ManyToMany,
        }
    }
}

/// Derived relation between two tables
///
/// Not authoritative: recomputed on every relation mapper invocation and
/// never persisted independently of the snapshot that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDescriptor {
    pub cardinality: Cardinality,
    pub source_table: String,
    pub source_columns: Vec<String>,
    pub target_table: String,
    pub target_columns: Vec<String>,
    /// Set only for n:m relations realized through a join table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_table: Option<String>,
}

impl RelationDescriptor {
    /// The same relation seen from the target table's side.
    pub fn inverse(&self) -> Self {
        Self {
            cardinality: self.cardinality.inverse(),
            source_table: self.target_table.clone(),
            source_columns: self.target_columns.clone(),
            target_table: self.source_table.clone(),
            target_columns: self.source_columns.clone(),
            join_table: self.join_table.clone(),
        }
    }
}
