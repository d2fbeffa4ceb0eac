//! Schema Diff Engine
//!
//! Compares two independently-built schema snapshots and produces an
//! ordered, classified list of structural changes plus aggregate
//! statistics. The comparison is structural and order-insensitive on key
//! sets, but exact-match on column type strings: no type-compatibility
//! normalization is performed.

use crate::schema::{ColumnDescriptor, SchemaSnapshot, TableDescriptor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// Closed vocabulary of change types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    TableAdded,
    TableRemoved,
    ColumnAdded,
    ColumnRemoved,
    ColumnTypeChanged,
    ColumnConstraintChanged,
    IndexAdded,
    IndexRemoved,
    ForeignKeyAdded,
    ForeignKeyRemoved,
}

/// Three-level impact classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    /// Sort rank: high changes first.
    pub fn rank(self) -> u8 {
        match self {
            Impact::High => 0,
            Impact::Medium => 1,
            Impact::Low => 2,
        }
    }
}

/// A single classified change between two snapshots
///
/// Changes are pure facts derived from the comparison; they carry no
/// mutation capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<serde_json::Value>,
    pub impact: Impact,
    pub description: String,
}

impl DiffChange {
    fn new(kind: ChangeKind, table_name: &str, impact: Impact, description: String) -> Self {
        Self {
            kind,
            table_name: table_name.to_string(),
            column_name: None,
            index_name: None,
            foreign_key_name: None,
            old_value: None,
            new_value: None,
            impact,
            description,
        }
    }
}

/// Per-kind addition/removal counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounters {
    pub added: usize,
    pub removed: usize,
}

/// Table counters, including tables modified in place
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounters {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

/// Column counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnCounters {
    pub added: usize,
    pub removed: usize,
    pub type_changed: usize,
    pub constraint_changed: usize,
}

/// Aggregate statistics over a diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStatistics {
    pub total: usize,
    pub tables: TableCounters,
    pub columns: ColumnCounters,
    pub indexes: EntityCounters,
    pub foreign_keys: EntityCounters,
}

/// Complete diff report between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDiff {
    pub timestamp: DateTime<Utc>,
    pub source_name: String,
    pub target_name: String,
    /// Changes ordered by impact: high, then medium, then low
    pub changes: Vec<DiffChange>,
    pub statistics: DiffStatistics,
}

/// The comparison engine
pub struct SchemaDiffer;

impl SchemaDiffer {
    /// Compare two snapshots (source → target) and return the classified
    /// change report.
    pub fn diff(source: &SchemaSnapshot, target: &SchemaSnapshot) -> SchemaDiff {
        let mut changes = Vec::new();
        let mut statistics = DiffStatistics::default();

        // Tables present only in the source
        for table_name in source.tables.keys() {
            if !target.tables.contains_key(table_name) {
                changes.push(DiffChange::new(
                    ChangeKind::TableRemoved,
                    table_name,
                    Impact::High,
                    format!("Table {} does not exist in the target schema", table_name),
                ));
                statistics.tables.removed += 1;
            }
        }

        // Tables present only in the target
        for table_name in target.tables.keys() {
            if !source.tables.contains_key(table_name) {
                changes.push(DiffChange::new(
                    ChangeKind::TableAdded,
                    table_name,
                    Impact::Medium,
                    format!(
                        "Table {} exists in the target schema but not in the source",
                        table_name
                    ),
                ));
                statistics.tables.added += 1;
            }
        }

        // Tables present in both: descend into columns and indexes
        for (table_name, source_table) in &source.tables {
            let Some(target_table) = target.tables.get(table_name) else {
                continue;
            };

            let before = changes.len();
            Self::diff_columns(source_table, target_table, &mut changes, &mut statistics);
            Self::diff_indexes(source_table, target_table, &mut changes, &mut statistics);
            if changes.len() > before {
                statistics.tables.modified += 1;
            }
        }

        Self::diff_foreign_keys(source, target, &mut changes, &mut statistics);

        // Stable sort preserves relative order within each impact rank
        changes.sort_by_key(|change| change.impact.rank());
        statistics.total = changes.len();

        SchemaDiff {
            timestamp: Utc::now(),
            source_name: source.name.clone(),
            target_name: target.name.clone(),
            changes,
            statistics,
        }
    }

    fn diff_columns(
        source_table: &TableDescriptor,
        target_table: &TableDescriptor,
        changes: &mut Vec<DiffChange>,
        statistics: &mut DiffStatistics,
    ) {
        let table_name = &source_table.name;

        for column_name in source_table.columns.keys() {
            if !target_table.columns.contains_key(column_name) {
                let mut change = DiffChange::new(
                    ChangeKind::ColumnRemoved,
                    table_name,
                    Impact::High,
                    format!(
                        "Column {}.{} does not exist in the target schema",
                        table_name, column_name
                    ),
                );
                change.column_name = Some(column_name.clone());
                changes.push(change);
                statistics.columns.removed += 1;
            }
        }

        for column_name in target_table.columns.keys() {
            if !source_table.columns.contains_key(column_name) {
                let mut change = DiffChange::new(
                    ChangeKind::ColumnAdded,
                    table_name,
                    Impact::Medium,
                    format!(
                        "Column {}.{} exists in the target schema but not in the source",
                        table_name, column_name
                    ),
                );
                change.column_name = Some(column_name.clone());
                changes.push(change);
                statistics.columns.added += 1;
            }
        }

        for (column_name, source_column) in &source_table.columns {
            let Some(target_column) = target_table.columns.get(column_name) else {
                continue;
            };

            if source_column.data_type != target_column.data_type {
                let mut change = DiffChange::new(
                    ChangeKind::ColumnTypeChanged,
                    table_name,
                    Impact::High,
                    format!(
                        "Column {}.{} changed type: {} -> {}",
                        table_name, column_name, source_column.data_type, target_column.data_type
                    ),
                );
                change.column_name = Some(column_name.clone());
                change.old_value = Some(json!(source_column.data_type));
                change.new_value = Some(json!(target_column.data_type));
                changes.push(change);
                statistics.columns.type_changed += 1;
            }

            // (nullable, isPrimary, isUnique) compared as one unit
            if constraint_triple(source_column) != constraint_triple(target_column) {
                let mut change = DiffChange::new(
                    ChangeKind::ColumnConstraintChanged,
                    table_name,
                    Impact::Medium,
                    format!(
                        "Column {}.{} constraints changed: {}",
                        table_name,
                        column_name,
                        describe_constraint_change(source_column, target_column)
                    ),
                );
                change.column_name = Some(column_name.clone());
                change.old_value = Some(constraint_payload(source_column));
                change.new_value = Some(constraint_payload(target_column));
                changes.push(change);
                statistics.columns.constraint_changed += 1;
            }
        }
    }

    fn diff_indexes(
        source_table: &TableDescriptor,
        target_table: &TableDescriptor,
        changes: &mut Vec<DiffChange>,
        statistics: &mut DiffStatistics,
    ) {
        let table_name = &source_table.name;

        let source_indexes: BTreeMap<&str, _> = source_table
            .indexes
            .iter()
            .map(|idx| (idx.name.as_str(), idx))
            .collect();
        let target_indexes: BTreeMap<&str, _> = target_table
            .indexes
            .iter()
            .map(|idx| (idx.name.as_str(), idx))
            .collect();

        for (name, index) in &source_indexes {
            if !target_indexes.contains_key(name) {
                let mut change = DiffChange::new(
                    ChangeKind::IndexRemoved,
                    table_name,
                    Impact::Medium,
                    format!(
                        "Index {} on {} ({}) does not exist in the target schema",
                        name,
                        table_name,
                        index.columns.join(", ")
                    ),
                );
                change.index_name = Some((*name).to_string());
                change.old_value = serde_json::to_value(index).ok();
                changes.push(change);
                statistics.indexes.removed += 1;
            }
        }

        for (name, index) in &target_indexes {
            if !source_indexes.contains_key(name) {
                let mut change = DiffChange::new(
                    ChangeKind::IndexAdded,
                    table_name,
                    Impact::Low,
                    format!(
                        "Index {} on {} ({}) exists in the target schema but not in the source",
                        name,
                        table_name,
                        index.columns.join(", ")
                    ),
                );
                change.index_name = Some((*name).to_string());
                change.new_value = serde_json::to_value(index).ok();
                changes.push(change);
                statistics.indexes.added += 1;
            }
        }
    }

    fn diff_foreign_keys(
        source: &SchemaSnapshot,
        target: &SchemaSnapshot,
        changes: &mut Vec<DiffChange>,
        statistics: &mut DiffStatistics,
    ) {
        let source_fks: BTreeMap<&str, _> = source
            .foreign_keys
            .iter()
            .map(|fk| (fk.name.as_str(), fk))
            .collect();
        let target_fks: BTreeMap<&str, _> = target
            .foreign_keys
            .iter()
            .map(|fk| (fk.name.as_str(), fk))
            .collect();

        for (name, fk) in &source_fks {
            if !target_fks.contains_key(name) {
                let mut change = DiffChange::new(
                    ChangeKind::ForeignKeyRemoved,
                    &fk.source_table,
                    Impact::Medium,
                    format!(
                        "Foreign key {} ({}.{} -> {}.{}) does not exist in the target schema",
                        name,
                        fk.source_table,
                        fk.source_columns.join(","),
                        fk.target_table,
                        fk.target_columns.join(",")
                    ),
                );
                change.foreign_key_name = Some((*name).to_string());
                change.old_value = serde_json::to_value(fk).ok();
                changes.push(change);
                statistics.foreign_keys.removed += 1;
            }
        }

        for (name, fk) in &target_fks {
            if !source_fks.contains_key(name) {
                let mut change = DiffChange::new(
                    ChangeKind::ForeignKeyAdded,
                    &fk.source_table,
                    Impact::Low,
                    format!(
                        "Foreign key {} ({}.{} -> {}.{}) exists in the target schema but not in the source",
                        name,
                        fk.source_table,
                        fk.source_columns.join(","),
                        fk.target_table,
                        fk.target_columns.join(",")
                    ),
                );
                change.foreign_key_name = Some((*name).to_string());
                change.new_value = serde_json::to_value(fk).ok();
                changes.push(change);
                statistics.foreign_keys.added += 1;
            }
        }
    }
}

fn constraint_triple(column: &ColumnDescriptor) -> (bool, bool, bool) {
    (column.nullable, column.is_primary, column.is_unique)
}

fn constraint_payload(column: &ColumnDescriptor) -> serde_json::Value {
    json!({
        "nullable": column.nullable,
        "isPrimary": column.is_primary,
        "isUnique": column.is_unique,
    })
}

fn describe_constraint_change(source: &ColumnDescriptor, target: &ColumnDescriptor) -> String {
    let mut parts = Vec::new();
    if source.nullable != target.nullable {
        parts.push(if target.nullable {
            "now nullable".to_string()
        } else {
            "now NOT NULL".to_string()
        });
    }
    if source.is_primary != target.is_primary {
        parts.push(if target.is_primary {
            "now PRIMARY KEY".to_string()
        } else {
            "no longer PRIMARY KEY".to_string()
        });
    }
    if source.is_unique != target.is_unique {
        parts.push(if target.is_unique {
            "now UNIQUE".to_string()
        } else {
            "no longer UNIQUE".to_string()
        });
    }
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ForeignKeyDescriptor, IndexDescriptor};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn column(name: &str, data_type: &str, nullable: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable,
            is_primary: false,
            is_unique: false,
            max_length: None,
            precision: None,
            scale: None,
            default_value: None,
        }
    }

    fn table_with_columns(name: &str, columns: Vec<ColumnDescriptor>) -> TableDescriptor {
        let mut map = BTreeMap::new();
        for col in columns {
            map.insert(col.name.clone(), col);
        }
        TableDescriptor {
            name: name.to_string(),
            schema: "public".to_string(),
            columns: map,
            primary_key: Vec::new(),
            indexes: Vec::new(),
            relations: None,
        }
    }

    fn snapshot_with(tables: Vec<TableDescriptor>) -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::new("test");
        for table in tables {
            snapshot.tables.insert(table.name.clone(), table);
        }
        snapshot
    }

    fn users_and_orders() -> SchemaSnapshot {
        snapshot_with(vec![
            table_with_columns(
                "users",
                vec![column("id", "integer", false), column("email", "text", true)],
            ),
            table_with_columns("orders", vec![column("id", "integer", false)]),
        ])
    }

    #[test]
    fn test_identical_snapshots_yield_empty_diff() {
        let snapshot = users_and_orders();
        let diff = SchemaDiffer::diff(&snapshot, &snapshot);

        assert!(diff.changes.is_empty());
        assert_eq!(diff.statistics, DiffStatistics::default());
    }

    #[test]
    fn test_added_table_is_reported_once_with_medium_impact() {
        let source = users_and_orders();
        let mut target = users_and_orders();
        target.tables.insert(
            "audit_log".to_string(),
            table_with_columns("audit_log", vec![column("id", "integer", false)]),
        );

        let diff = SchemaDiffer::diff(&source, &target);

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].kind, ChangeKind::TableAdded);
        assert_eq!(diff.changes[0].table_name, "audit_log");
        assert_eq!(diff.changes[0].impact, Impact::Medium);
        assert_eq!(diff.statistics.tables.added, 1);
        assert_eq!(diff.statistics.total, 1);
    }

    #[test]
    fn test_nullability_change_is_one_constraint_event() {
        let source = users_and_orders();
        let mut target = users_and_orders();
        if let Some(table) = target.tables.get_mut("users") {
            if let Some(email) = table.columns.get_mut("email") {
                email.nullable = false;
            }
        }

        let diff = SchemaDiffer::diff(&source, &target);

        assert_eq!(diff.changes.len(), 1);
        let change = &diff.changes[0];
        assert_eq!(change.kind, ChangeKind::ColumnConstraintChanged);
        assert_eq!(change.column_name.as_deref(), Some("email"));
        assert_eq!(change.impact, Impact::Medium);
        assert_eq!(
            change.old_value,
            Some(json!({"nullable": true, "isPrimary": false, "isUnique": false}))
        );
        assert_eq!(
            change.new_value,
            Some(json!({"nullable": false, "isPrimary": false, "isUnique": false}))
        );
        assert_eq!(diff.statistics.columns.constraint_changed, 1);
    }

    #[test]
    fn test_type_change_is_exact_match_and_high_impact() {
        let source = users_and_orders();
        let mut target = users_and_orders();
        if let Some(table) = target.tables.get_mut("users") {
            if let Some(email) = table.columns.get_mut("email") {
                email.data_type = "character varying".to_string();
            }
        }

        let diff = SchemaDiffer::diff(&source, &target);

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].kind, ChangeKind::ColumnTypeChanged);
        assert_eq!(diff.changes[0].impact, Impact::High);
        assert_eq!(diff.statistics.columns.type_changed, 1);
        assert_eq!(diff.statistics.tables.modified, 1);
    }

    #[test]
    fn test_diff_symmetry_between_added_and_removed() {
        let a = users_and_orders();
        let mut b = users_and_orders();
        b.tables.remove("orders");
        b.tables.insert(
            "invoices".to_string(),
            table_with_columns("invoices", vec![column("id", "integer", false)]),
        );

        let forward = SchemaDiffer::diff(&a, &b);
        let backward = SchemaDiffer::diff(&b, &a);

        let added_forward: Vec<_> = forward
            .changes
            .iter()
            .filter(|c| c.kind == ChangeKind::TableAdded)
            .map(|c| c.table_name.clone())
            .collect();
        let removed_backward: Vec<_> = backward
            .changes
            .iter()
            .filter(|c| c.kind == ChangeKind::TableRemoved)
            .map(|c| c.table_name.clone())
            .collect();

        assert_eq!(added_forward, removed_backward);
        assert_eq!(forward.statistics.tables.added, backward.statistics.tables.removed);
        assert_eq!(forward.statistics.tables.removed, backward.statistics.tables.added);
    }

    #[test]
    fn test_index_changes_are_keyed_by_name() {
        let mut source = users_and_orders();
        let mut target = users_and_orders();

        if let Some(table) = source.tables.get_mut("users") {
            table.indexes.push(IndexDescriptor {
                name: "idx_users_email".to_string(),
                columns: vec!["email".to_string()],
                is_unique: false,
                index_type: "btree".to_string(),
            });
        }
        if let Some(table) = target.tables.get_mut("users") {
            table.indexes.push(IndexDescriptor {
                name: "idx_users_email_unique".to_string(),
                columns: vec!["email".to_string()],
                is_unique: true,
                index_type: "btree".to_string(),
            });
        }

        let diff = SchemaDiffer::diff(&source, &target);

        assert_eq!(diff.statistics.indexes.removed, 1);
        assert_eq!(diff.statistics.indexes.added, 1);
        assert_eq!(diff.statistics.total, 2);

        // removed (medium) sorts before added (low)
        assert_eq!(diff.changes[0].kind, ChangeKind::IndexRemoved);
        assert_eq!(diff.changes[1].kind, ChangeKind::IndexAdded);
    }

    #[test]
    fn test_foreign_key_changes() {
        let source = users_and_orders();
        let mut target = users_and_orders();
        target.foreign_keys.push(ForeignKeyDescriptor {
            name: "fk_orders_user_id".to_string(),
            source_table: "orders".to_string(),
            source_columns: vec!["user_id".to_string()],
            target_table: "users".to_string(),
            target_columns: vec!["id".to_string()],
            on_delete: None,
            on_update: None,
        });

        let diff = SchemaDiffer::diff(&source, &target);

        assert_eq!(diff.changes.len(), 1);
        assert_eq!(diff.changes[0].kind, ChangeKind::ForeignKeyAdded);
        assert_eq!(diff.changes[0].table_name, "orders");
        assert_eq!(diff.changes[0].impact, Impact::Low);
        assert_eq!(diff.statistics.foreign_keys.added, 1);

        let reverse = SchemaDiffer::diff(&target, &source);
        assert_eq!(reverse.changes[0].kind, ChangeKind::ForeignKeyRemoved);
        assert_eq!(reverse.changes[0].impact, Impact::Medium);
    }

    #[test]
    fn test_changes_are_ordered_by_impact() {
        let mut source = users_and_orders();
        let mut target = users_and_orders();

        // high: drop a table; medium: add a table; low: add a foreign key
        source.tables.insert(
            "legacy".to_string(),
            table_with_columns("legacy", vec![column("id", "integer", false)]),
        );
        target.tables.insert(
            "audit_log".to_string(),
            table_with_columns("audit_log", vec![column("id", "integer", false)]),
        );
        target.foreign_keys.push(ForeignKeyDescriptor {
            name: "fk_orders_user_id".to_string(),
            source_table: "orders".to_string(),
            source_columns: vec!["user_id".to_string()],
            target_table: "users".to_string(),
            target_columns: vec!["id".to_string()],
            on_delete: None,
            on_update: None,
        });

        let diff = SchemaDiffer::diff(&source, &target);

        let ranks: Vec<u8> = diff.changes.iter().map(|c| c.impact.rank()).collect();
        let mut sorted = ranks.clone();
        sorted.sort_unstable();
        assert_eq!(ranks, sorted);
        assert_eq!(diff.changes[0].impact, Impact::High);
        assert_eq!(diff.statistics.total, 3);
    }

    #[test]
    fn test_diff_report_serializes_with_stable_vocabulary() {
        let source = users_and_orders();
        let mut target = users_and_orders();
        target.tables.remove("orders");

        let diff = SchemaDiffer::diff(&source, &target);
        let value = serde_json::to_value(&diff).unwrap();

        assert_eq!(value["changes"][0]["type"], "table_removed");
        assert_eq!(value["changes"][0]["impact"], "high");
        assert_eq!(value["statistics"]["tables"]["removed"], 1);
        assert_eq!(value["statistics"]["total"], 1);
        assert_eq!(value["sourceName"], "test");
    }
}
