//! Declarative Model Generator
//!
//! Renders a table descriptor plus its foreign keys into a Prisma-style
//! model block: typed field lines, identity/uniqueness attributes,
//! translated defaults, relation declarations and a table-mapping
//! directive. A whole-schema document is the fixed header followed by the
//! concatenated per-table blocks.

use crate::schema::{ColumnDescriptor, ForeignKeyDescriptor, SchemaSnapshot, TableDescriptor};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Quoted default literal, optionally followed by a catalog cast suffix,
/// e.g. `'active'::character varying`
static QUOTED_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^'(.*)'(?:::[a-zA-Z_][a-zA-Z_ ]*(?:\(\d+\))?)?$").unwrap());

/// Fixed document header for generated schema files
const DOCUMENT_HEADER: &str = r#"generator client {
  provider = "prisma-client-js"
}

datasource db {
  provider = "postgresql"
  url      = env("DATABASE_URL")
}
"#;

/// One generated model field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    pub unique: bool,
    pub id: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A generated model: name, owning table, field metadata, rendered block
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    pub name: String,
    pub table_name: String,
    pub fields: Vec<FieldDefinition>,
    pub body: String,
}

/// Generator from table descriptors to declarative model blocks
pub struct ModelGenerator;

impl ModelGenerator {
    /// Convert a table name to its model name: split on underscore,
    /// capitalize each word (`order_items` -> `OrderItems`).
    pub fn model_name(table_name: &str) -> String {
        table_name
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect()
    }

    /// Render one table into a model block, including relation lines for
    /// every foreign key touching it.
    pub fn generate(
        table: &TableDescriptor,
        foreign_keys: &[ForeignKeyDescriptor],
    ) -> ModelDefinition {
        let model_name = Self::model_name(&table.name);
        let mut lines = vec![format!("model {} {{", model_name)];
        let mut fields = Vec::new();

        for (column_name, column) in &table.columns {
            let field_type = prisma_type(&column.data_type);
            let mut line = format!("  {} {}", column_name, field_type);
            if column.nullable {
                line.push('?');
            }

            let mut attributes = Vec::new();
            if column.is_primary {
                attributes.push("@id".to_string());
            }
            if column.is_unique && !column.is_primary {
                attributes.push("@unique".to_string());
            }
            let default = column.default_value.as_deref().map(translate_default);
            if let Some(default) = &default {
                attributes.push(format!("@default({})", default));
            }
            if !attributes.is_empty() {
                line.push(' ');
                line.push_str(&attributes.join(" "));
            }

            lines.push(line);
            fields.push(FieldDefinition {
                name: column_name.clone(),
                field_type: field_type.to_string(),
                required: !column.nullable,
                unique: column.is_unique,
                id: column.is_primary,
                default,
            });
        }

        // Outgoing: this table references another (singular field name)
        for fk in foreign_keys
            .iter()
            .filter(|fk| fk.source_table == table.name)
        {
            lines.push(format!(
                "  {} {} @relation(fields: [{}], references: [{}])",
                fk.target_table,
                Self::model_name(&fk.target_table),
                fk.source_columns.join(", "),
                fk.target_columns.join(", ")
            ));
        }

        // Incoming: other tables reference this one (naive plural name)
        for fk in foreign_keys
            .iter()
            .filter(|fk| fk.target_table == table.name)
        {
            lines.push(format!(
                "  {} {}[]",
                pluralize(&fk.source_table),
                Self::model_name(&fk.source_table)
            ));
        }

        lines.push(format!("  @@map(\"{}\")", table.name));
        lines.push("}".to_string());

        ModelDefinition {
            name: model_name,
            table_name: table.name.clone(),
            fields,
            body: lines.join("\n"),
        }
    }

    /// Render the whole snapshot: fixed header plus one block per table.
    pub fn generate_document(snapshot: &SchemaSnapshot) -> String {
        let mut document = String::from(DOCUMENT_HEADER);

        for table in snapshot.tables.values() {
            let related: Vec<ForeignKeyDescriptor> = snapshot
                .foreign_keys
                .iter()
                .filter(|fk| fk.source_table == table.name || fk.target_table == table.name)
                .cloned()
                .collect();
            let model = Self::generate(table, &related);
            document.push('\n');
            document.push_str(&model.body);
            document.push('\n');
        }

        document
    }
}

/// Map a raw catalog type name onto a model primitive. Unknown types
/// default to String.
fn prisma_type(raw_type: &str) -> &'static str {
    match raw_type.to_lowercase().as_str() {
        "integer" | "smallint" | "int" | "int2" | "int4" | "serial" | "smallserial" => "Int",
        "bigint" | "int8" | "bigserial" => "BigInt",
        "decimal" | "numeric" => "Decimal",
        "real" | "double precision" | "float4" | "float8" => "Float",
        "character varying" | "varchar" | "character" | "char" | "text" | "uuid" | "citext" => {
            "String"
        }
        "boolean" | "bool" => "Boolean",
        "date" | "time" | "timestamp" | "timestamp with time zone"
        | "timestamp without time zone" => "DateTime",
        "json" | "jsonb" => "Json",
        "bytea" => "Bytes",
        _ => "String",
    }
}

/// Translate a raw catalog default expression into a model default.
/// First matching rule wins.
fn translate_default(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();

    if lowered.contains("nextval(") {
        return "autoincrement()".to_string();
    }
    if lowered.contains("now()") || lowered.contains("current_timestamp") {
        return "now()".to_string();
    }
    if lowered.contains("gen_random_uuid()") || lowered.contains("uuid_generate_v4()") {
        return "uuid()".to_string();
    }
    if trimmed == "true" || trimmed == "false" {
        return trimmed.to_string();
    }
    if trimmed.parse::<f64>().is_ok() {
        return trimmed.to_string();
    }

    if let Some(captures) = QUOTED_LITERAL.captures(trimmed) {
        return format!("\"{}\"", &captures[1]);
    }
    format!("\"{}\"", trimmed)
}

/// Naive pluralization; no irregular-noun handling.
fn pluralize(name: &str) -> String {
    format!("{}s", name)
}
