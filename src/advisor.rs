//! Index Advisor
//!
//! Proposes candidate indexes for a single table from a fixed rule list:
//! unindexed foreign-key columns, common filter columns, JSON/geometric/
//! long-text specialized indexes, and two fixed composites. This is not a
//! cost-based optimizer; it has no access to query workload statistics.

use crate::schema::{ColumnDescriptor, ForeignKeyDescriptor, IndexDescriptor, TableDescriptor};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Column-name fragments that commonly appear in WHERE clauses
const FILTER_NAME_FRAGMENTS: &[&str] = &[
    "status",
    "type",
    "category",
    "active",
    "enabled",
    "visible",
    "deleted",
    "created_at",
    "updated_at",
];

/// Fixed composite candidates, suggested when every member column exists
const COMPOSITE_CANDIDATES: &[&[&str]] = &[&["created_at", "type"], &["user_id", "created_at"]];

const JSON_TYPES: &[&str] = &["json", "jsonb"];

const GEOMETRIC_TYPES: &[&str] = &[
    "point",
    "line",
    "lseg",
    "box",
    "path",
    "polygon",
    "circle",
    "geometry",
    "geography",
];

/// Rule-based index advisor
pub struct IndexAdvisor;

impl IndexAdvisor {
    /// Suggest candidate indexes for `table`, given its foreign keys.
    ///
    /// Never mutates the input. A column set already covered by an existing
    /// index (order-insensitive equality) or by an earlier suggestion is
    /// skipped.
    pub fn suggest(
        table: &TableDescriptor,
        foreign_keys: &[ForeignKeyDescriptor],
    ) -> Vec<IndexDescriptor> {
        let mut suggestions = Vec::new();
        let mut suggested: HashSet<BTreeSet<String>> = HashSet::new();

        let mut propose = |suggestions: &mut Vec<IndexDescriptor>,
                           columns: Vec<String>,
                           index_type: &str| {
            if table
                .indexes
                .iter()
                .any(|index| index.covers_same_columns(&columns))
            {
                return;
            }
            let column_set: BTreeSet<String> = columns.iter().cloned().collect();
            if !suggested.insert(column_set) {
                return;
            }
            suggestions.push(IndexDescriptor {
                name: format!("idx_{}_{}", table.name, columns.join("_")),
                columns,
                is_unique: false,
                index_type: index_type.to_string(),
            });
        };

        // 1. Foreign-key source columns without an index
        for fk in foreign_keys
            .iter()
            .filter(|fk| fk.source_table == table.name)
        {
            for column in &fk.source_columns {
                propose(&mut suggestions, vec![column.clone()], "btree");
            }
        }

        // 2. Common filter columns, skipping keys and long text
        for (name, column) in &table.columns {
            let lowered = name.to_lowercase();
            let looks_filterable = FILTER_NAME_FRAGMENTS
                .iter()
                .any(|fragment| lowered.contains(fragment));
            if looks_filterable
                && !column.is_primary
                && !column.is_unique
                && !is_long_text(column)
            {
                propose(&mut suggestions, vec![name.clone()], "btree");
            }
        }

        // 3. Generalized inverted index for JSON columns
        for (name, column) in &table.columns {
            if JSON_TYPES.contains(&column.data_type.to_lowercase().as_str()) {
                propose(&mut suggestions, vec![name.clone()], "gin");
            }
        }

        // 4. Spatial index for geometric columns
        for (name, column) in &table.columns {
            if GEOMETRIC_TYPES.contains(&column.data_type.to_lowercase().as_str()) {
                propose(&mut suggestions, vec![name.clone()], "gist");
            }
        }

        // 5. Full-text search index for long text columns
        for (name, column) in &table.columns {
            if is_long_text(column) {
                propose(&mut suggestions, vec![name.clone()], "gin");
            }
        }

        // 6. Fixed composite candidates
        for candidate in COMPOSITE_CANDIDATES {
            if candidate
                .iter()
                .all(|column| table.columns.contains_key(*column))
            {
                propose(
                    &mut suggestions,
                    candidate.iter().map(|c| c.to_string()).collect(),
                    "btree",
                );
            }
        }

        debug!(
            "Suggested {} indexes for table {}",
            suggestions.len(),
            table.name
        );

        suggestions
    }
}

fn is_long_text(column: &ColumnDescriptor) -> bool {
    column.data_type.to_lowercase() == "text"
}
