//! SchemaMap - Relational Schema Introspection Engine
//!
//! Connects to a PostgreSQL database, reconstructs a structural model of a
//! schema (tables, columns, indexes, foreign keys, inferred relations),
//! compares two such models into a classified change report, recommends
//! missing indexes, and emits declarative Prisma-style model definitions.
//!
//! The engine never issues DDL or DML: every query is a parameterized
//! read-only statement against the system catalog. Transport layers
//! (HTTP/RPC tool dispatch) and process bootstrapping live outside this
//! crate; they talk to [`engine::SchemaEngine`] or to the pure components
//! directly.

pub mod advisor;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod generator;
pub mod introspect;
pub mod queries;
pub mod relations;
pub mod schema;

pub use advisor::IndexAdvisor;
pub use config::{DatabaseConfig, IntrospectionConfig, Settings};
pub use diff::{ChangeKind, DiffChange, DiffStatistics, Impact, SchemaDiff, SchemaDiffer};
pub use engine::{DatabaseStats, SchemaEngine};
pub use error::{EngineError, EngineResult};
pub use executor::{CatalogExecutor, ConnectionTestResult};
pub use generator::{FieldDefinition, ModelDefinition, ModelGenerator};
pub use introspect::SchemaIntrospector;
pub use relations::RelationMapper;
pub use schema::{
    Cardinality, ColumnDescriptor, ForeignKeyDescriptor, IndexDescriptor, RelationDescriptor,
    SchemaSnapshot, TableDescriptor,
};
