//! Schema Introspection Module
//!
//! Walks the database catalog to build one [`TableDescriptor`] per base
//! table and assembles the whole into a [`SchemaSnapshot`]. Table-level
//! fetches run in parallel under a bounded worker limit; the handful of
//! queries for a single table run sequentially on their task. A table that
//! errors mid-scan is recorded with an empty descriptor and the run
//! continues; a missing namespace yields an empty snapshot, not an error.

use crate::error::EngineResult;
use crate::executor::CatalogExecutor;
use crate::queries;
use crate::schema::{
    ColumnDescriptor, ForeignKeyDescriptor, IndexDescriptor, SchemaSnapshot, TableDescriptor,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Default bound on concurrent per-table metadata fetches
pub const DEFAULT_MAX_PARALLEL_TABLES: usize = 8;

/// Schema introspector for PostgreSQL
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Introspect a namespace into a fresh snapshot using the default
    /// concurrency bound.
    pub async fn snapshot(
        executor: &CatalogExecutor,
        namespace: &str,
    ) -> EngineResult<SchemaSnapshot> {
        Self::snapshot_with(executor, namespace, DEFAULT_MAX_PARALLEL_TABLES).await
    }

    /// Introspect a namespace with an explicit bound on parallel table
    /// fetches.
    pub async fn snapshot_with(
        executor: &CatalogExecutor,
        namespace: &str,
        max_parallel_tables: usize,
    ) -> EngineResult<SchemaSnapshot> {
        let table_names = Self::list_tables(executor, namespace).await?;

        let semaphore = Arc::new(Semaphore::new(max_parallel_tables.max(1)));
        let mut join_set = JoinSet::new();

        for table_name in &table_names {
            let executor = executor.clone();
            let namespace = namespace.to_string();
            let table_name = table_name.clone();
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            table_name.clone(),
                            Ok(TableDescriptor::empty(table_name, namespace)),
                        );
                    }
                };
                let result = Self::describe_table(&executor, &namespace, &table_name).await;
                (table_name, result)
            });
        }

        let mut tables = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((table_name, Ok(descriptor))) => {
                    tables.insert(table_name, descriptor);
                }
                Ok((table_name, Err(e))) if e.is_connectivity() => {
                    // Connectivity loss is fatal for the whole run
                    join_set.abort_all();
                    warn!("Introspection aborted at table {}: {}", table_name, e);
                    return Err(e);
                }
                Ok((table_name, Err(e))) => {
                    // Table dropped or unreadable mid-scan: record the hole
                    warn!("Failed to describe table {}: {}", table_name, e);
                    tables.insert(
                        table_name.clone(),
                        TableDescriptor::empty(table_name, namespace),
                    );
                }
                Err(e) => {
                    warn!("Table introspection task failed: {}", e);
                }
            }
        }

        let foreign_keys = Self::foreign_keys(executor, namespace).await?;

        let mut snapshot = SchemaSnapshot::new(format!("PostgreSQL schema ({})", namespace));
        snapshot.tables = tables;
        snapshot.foreign_keys = foreign_keys;

        debug!(
            "Introspected namespace {} with {} tables, {} foreign keys",
            namespace,
            snapshot.tables.len(),
            snapshot.foreign_keys.len()
        );

        Ok(snapshot)
    }

    /// List base tables in a namespace, ordered by name.
    pub async fn list_tables(
        executor: &CatalogExecutor,
        namespace: &str,
    ) -> EngineResult<Vec<String>> {
        let rows = executor.execute(queries::LIST_TABLES, &[&namespace]).await?;
        Ok(rows.iter().map(|row| row.get("table_name")).collect())
    }

    /// Check whether a base table exists in the namespace.
    pub async fn table_exists(
        executor: &CatalogExecutor,
        namespace: &str,
        table: &str,
    ) -> EngineResult<bool> {
        let rows = executor
            .execute(queries::TABLE_EXISTS, &[&namespace, &table])
            .await?;
        Ok(rows.first().map(|row| row.get("present")).unwrap_or(false))
    }

    /// Build the full descriptor for one table: ordered columns, primary
    /// key, indexes, and unique flags derived from unique indexes.
    pub async fn describe_table(
        executor: &CatalogExecutor,
        namespace: &str,
        table: &str,
    ) -> EngineResult<TableDescriptor> {
        let column_rows = executor
            .execute(queries::TABLE_COLUMNS, &[&namespace, &table])
            .await?;

        let mut columns: BTreeMap<String, ColumnDescriptor> = BTreeMap::new();
        for row in &column_rows {
            let name: String = row.get("column_name");
            columns.insert(
                name.clone(),
                ColumnDescriptor {
                    name,
                    data_type: row.get("data_type"),
                    nullable: row.get("nullable"),
                    is_primary: false,
                    is_unique: false,
                    max_length: row.get("character_maximum_length"),
                    precision: row.get("numeric_precision"),
                    scale: row.get("numeric_scale"),
                    default_value: row.get("column_default"),
                },
            );
        }

        let pk_rows = executor
            .execute(queries::TABLE_PRIMARY_KEY, &[&namespace, &table])
            .await?;
        let pk_columns: Vec<String> = pk_rows.iter().map(|row| row.get("column_name")).collect();
        let primary_key = apply_primary_key(&mut columns, pk_columns);

        let index_rows = executor
            .execute(queries::TABLE_INDEXES, &[&table, &namespace])
            .await?;
        let indexes: Vec<IndexDescriptor> = index_rows
            .iter()
            .map(|row| IndexDescriptor {
                name: row.get("index_name"),
                columns: row.try_get("columns").unwrap_or_default(),
                is_unique: row.get("is_unique"),
                index_type: row.get("index_type"),
            })
            .collect();

        mark_unique_columns(&mut columns, &indexes);

        debug!(
            "Described table {}.{}: {} columns, {} indexes",
            namespace,
            table,
            columns.len(),
            indexes.len()
        );

        Ok(TableDescriptor {
            name: table.to_string(),
            schema: namespace.to_string(),
            columns,
            primary_key,
            indexes,
            relations: None,
        })
    }

    /// Fetch all foreign keys for a namespace in one round trip.
    pub async fn foreign_keys(
        executor: &CatalogExecutor,
        namespace: &str,
    ) -> EngineResult<Vec<ForeignKeyDescriptor>> {
        let rows = executor
            .execute(queries::SCHEMA_FOREIGN_KEYS, &[&namespace])
            .await?;

        let foreign_keys = rows
            .iter()
            .map(|row| ForeignKeyDescriptor {
                name: row.get("constraint_name"),
                source_table: row.get("source_table"),
                source_columns: row.try_get("source_columns").unwrap_or_default(),
                target_table: row.get("target_table"),
                target_columns: row.try_get("target_columns").unwrap_or_default(),
                on_delete: row.get("delete_rule"),
                on_update: row.get("update_rule"),
            })
            .collect();

        Ok(foreign_keys)
    }
}

/// Flag primary-key columns and return the key column list in key order.
///
/// Primary-key names that are missing from `columns` (a table altered
/// mid-scan) are dropped so that every returned entry exists in the map.
/// A primary column is never nullable, whatever the column row claimed.
fn apply_primary_key(
    columns: &mut BTreeMap<String, ColumnDescriptor>,
    pk_columns: Vec<String>,
) -> Vec<String> {
    pk_columns
        .into_iter()
        .filter(|name| match columns.get_mut(name) {
            Some(column) => {
                column.is_primary = true;
                column.nullable = false;
                true
            }
            None => false,
        })
        .collect()
}

/// Mark a column unique if it participates in any unique index, independent
/// of the primary key.
fn mark_unique_columns(
    columns: &mut BTreeMap<String, ColumnDescriptor>,
    indexes: &[IndexDescriptor],
) {
    for index in indexes.iter().filter(|idx| idx.is_unique) {
        for column_name in &index.columns {
            if let Some(column) = columns.get_mut(column_name) {
                column.is_unique = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_apply_primary_key_sets_flags() {
        let mut columns = BTreeMap::new();
        columns.insert("id".to_string(), column("id", "integer", true));
        columns.insert("email".to_string(), column("email", "text", true));

        let primary_key = apply_primary_key(&mut columns, vec!["id".to_string()]);

        assert_eq!(primary_key, vec!["id".to_string()]);
        assert!(columns["id"].is_primary);
        // isPrimary implies not nullable
        assert!(!columns["id"].nullable);
        assert!(!columns["email"].is_primary);
    }

    #[test]
    fn test_apply_primary_key_drops_unknown_columns() {
        let mut columns = BTreeMap::new();
        columns.insert("id".to_string(), column("id", "integer", false));

        let primary_key =
            apply_primary_key(&mut columns, vec!["id".to_string(), "ghost".to_string()]);

        // every primary-key entry must exist in the column map
        assert_eq!(primary_key, vec!["id".to_string()]);
    }

    #[test]
    fn test_mark_unique_columns_from_unique_indexes() {
        let mut columns = BTreeMap::new();
        columns.insert("email".to_string(), column("email", "text", false));
        columns.insert("status".to_string(), column("status", "text", true));

        let indexes = vec![
            IndexDescriptor {
                name: "users_email_key".to_string(),
                columns: vec!["email".to_string()],
                is_unique: true,
                index_type: "btree".to_string(),
            },
            IndexDescriptor {
                name: "idx_users_status".to_string(),
                columns: vec!["status".to_string()],
                is_unique: false,
                index_type: "btree".to_string(),
            },
        ];

        mark_unique_columns(&mut columns, &indexes);

        assert!(columns["email"].is_unique);
        assert!(!columns["status"].is_unique);
    }
}
