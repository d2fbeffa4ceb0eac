//! Engine facade
//!
//! Bundles the live-database operations behind a plain request/response
//! interface: list tables, describe a table, capture a snapshot, suggest
//! indexes, generate model blocks, aggregate statistics. The pure
//! components (differ, relation mapper) operate on snapshots directly and
//! need no live connection.

use crate::advisor::IndexAdvisor;
use crate::config::{IntrospectionConfig, Settings};
use crate::error::{EngineError, EngineResult};
use crate::executor::CatalogExecutor;
use crate::generator::{ModelDefinition, ModelGenerator};
use crate::introspect::SchemaIntrospector;
use crate::queries;
use crate::schema::{IndexDescriptor, SchemaSnapshot, TableDescriptor};
use serde::Serialize;
use tracing::info;

/// Aggregate catalog counts for a namespace
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub table_count: i64,
    pub column_count: i64,
    pub index_count: i64,
    pub foreign_key_count: i64,
}

/// Facade over one namespace of one database
pub struct SchemaEngine {
    executor: CatalogExecutor,
    namespace: String,
    introspection: IntrospectionConfig,
}

impl SchemaEngine {
    /// Build an engine from an already-connected executor.
    pub fn new(executor: CatalogExecutor, namespace: impl Into<String>) -> Self {
        Self {
            executor,
            namespace: namespace.into(),
            introspection: IntrospectionConfig::default(),
        }
    }

    /// Connect per `settings` and target its default namespace.
    pub async fn connect(settings: &Settings) -> EngineResult<Self> {
        let executor =
            CatalogExecutor::connect(&settings.database, settings.introspection.query_timeout_secs)
                .await?;
        Ok(Self {
            executor,
            namespace: settings.introspection.default_namespace.clone(),
            introspection: settings.introspection.clone(),
        })
    }

    /// Retarget the engine at a different namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn executor(&self) -> &CatalogExecutor {
        &self.executor
    }

    /// Ordered base-table names in the namespace.
    pub async fn list_tables(&self) -> EngineResult<Vec<String>> {
        SchemaIntrospector::list_tables(&self.executor, &self.namespace).await
    }

    pub async fn table_exists(&self, table: &str) -> EngineResult<bool> {
        SchemaIntrospector::table_exists(&self.executor, &self.namespace, table).await
    }

    /// Full descriptor for one table. An unknown table name is a distinct
    /// not-found condition, never conflated with connectivity failures.
    pub async fn describe_table(&self, table: &str) -> EngineResult<TableDescriptor> {
        if !self.table_exists(table).await? {
            return Err(EngineError::NotFound(format!(
                "Table '{}' does not exist in schema '{}'",
                table, self.namespace
            )));
        }
        SchemaIntrospector::describe_table(&self.executor, &self.namespace, table).await
    }

    /// Capture a fresh snapshot of the namespace.
    pub async fn snapshot(&self) -> EngineResult<SchemaSnapshot> {
        SchemaIntrospector::snapshot_with(
            &self.executor,
            &self.namespace,
            self.introspection.max_parallel_tables,
        )
        .await
    }

    /// Capture a snapshot and attach derived relations to it.
    pub async fn snapshot_with_relations(&self) -> EngineResult<SchemaSnapshot> {
        let mut snapshot = self.snapshot().await?;
        crate::relations::RelationMapper::attach(&mut snapshot);
        Ok(snapshot)
    }

    /// Rule-based index suggestions for one table.
    pub async fn suggest_indexes(&self, table: &str) -> EngineResult<Vec<IndexDescriptor>> {
        let descriptor = self.describe_table(table).await?;
        let foreign_keys: Vec<_> =
            SchemaIntrospector::foreign_keys(&self.executor, &self.namespace)
                .await?
                .into_iter()
                .filter(|fk| fk.source_table == table)
                .collect();

        Ok(IndexAdvisor::suggest(&descriptor, &foreign_keys))
    }

    /// Generate the declarative model block for one table.
    pub async fn generate_model(&self, table: &str) -> EngineResult<ModelDefinition> {
        let descriptor = self.describe_table(table).await?;
        let foreign_keys: Vec<_> =
            SchemaIntrospector::foreign_keys(&self.executor, &self.namespace)
                .await?
                .into_iter()
                .filter(|fk| fk.source_table == table || fk.target_table == table)
                .collect();

        Ok(ModelGenerator::generate(&descriptor, &foreign_keys))
    }

    /// Generate the whole-schema document for the namespace.
    pub async fn generate_document(&self) -> EngineResult<String> {
        let snapshot = self.snapshot().await?;
        info!(
            "Generating schema document for {} tables in {}",
            snapshot.tables.len(),
            self.namespace
        );
        Ok(ModelGenerator::generate_document(&snapshot))
    }

    /// Aggregate catalog counts for the namespace.
    pub async fn database_stats(&self) -> EngineResult<DatabaseStats> {
        let rows = self
            .executor
            .execute(queries::DATABASE_STATS, &[&self.namespace])
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| EngineError::NotFound("No statistics row returned".to_string()))?;

        Ok(DatabaseStats {
            table_count: row.get("table_count"),
            column_count: row.get("column_count"),
            index_count: row.get("index_count"),
            foreign_key_count: row.get("foreign_key_count"),
        })
    }
}
