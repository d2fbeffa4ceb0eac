//! SQL catalog query constants
//!
//! All catalog queries issued by the introspector. Every statement is
//! read-only and parameterized; the engine never issues DDL or DML.

/// List base tables in a namespace ($1 = schema name)
pub const LIST_TABLES: &str = r#"
    SELECT table_name
    FROM information_schema.tables
    WHERE table_schema = $1
        AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

/// Check whether a table exists ($1 = schema, $2 = table)
pub const TABLE_EXISTS: &str = r#"
    SELECT EXISTS (
        SELECT 1
        FROM information_schema.tables
        WHERE table_schema = $1
            AND table_name = $2
    ) AS present
"#;

/// Ordered column metadata for one table ($1 = schema, $2 = table)
pub const TABLE_COLUMNS: &str = r#"
    SELECT
        c.column_name,
        c.data_type,
        c.is_nullable = 'YES' AS nullable,
        c.column_default,
        c.character_maximum_length,
        c.numeric_precision,
        c.numeric_scale
    FROM information_schema.columns c
    WHERE c.table_schema = $1
        AND c.table_name = $2
    ORDER BY c.ordinal_position
"#;

/// Primary-key column names in key order ($1 = schema, $2 = table)
pub const TABLE_PRIMARY_KEY: &str = r#"
    SELECT kcu.column_name
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
        ON tc.constraint_name = kcu.constraint_name
        AND tc.table_schema = kcu.table_schema
    WHERE tc.constraint_type = 'PRIMARY KEY'
        AND tc.table_schema = $1
        AND tc.table_name = $2
    ORDER BY kcu.ordinal_position
"#;

/// Indexes on one table, one row per index with aggregated columns
/// ($1 = table, $2 = schema)
pub const TABLE_INDEXES: &str = r#"
    SELECT
        i.relname AS index_name,
        COALESCE(array_agg(a.attname::text ORDER BY array_position(ix.indkey, a.attnum)), ARRAY[]::text[]) AS columns,
        ix.indisunique AS is_unique,
        am.amname AS index_type
    FROM pg_index ix
    JOIN pg_class i ON i.oid = ix.indexrelid
    JOIN pg_class t ON t.oid = ix.indrelid
    JOIN pg_namespace n ON n.oid = t.relnamespace
    JOIN pg_am am ON am.oid = i.relam
    LEFT JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
    WHERE t.relname = $1
        AND t.relkind = 'r'
        AND n.nspname = $2
    GROUP BY i.relname, ix.indisunique, am.amname
    ORDER BY i.relname
"#;

/// All foreign keys in a namespace, one row per constraint with positionally
/// paired column arrays ($1 = schema)
pub const SCHEMA_FOREIGN_KEYS: &str = r#"
    SELECT
        tc.constraint_name,
        tc.table_name AS source_table,
        COALESCE(array_agg(kcu.column_name::text ORDER BY kcu.ordinal_position), ARRAY[]::text[]) AS source_columns,
        ccu.table_name AS target_table,
        COALESCE(array_agg(ccu.column_name::text ORDER BY kcu.ordinal_position), ARRAY[]::text[]) AS target_columns,
        rc.delete_rule,
        rc.update_rule
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
        ON tc.constraint_name = kcu.constraint_name
        AND tc.table_schema = kcu.table_schema
    JOIN information_schema.constraint_column_usage ccu
        ON ccu.constraint_name = tc.constraint_name
        AND ccu.table_schema = tc.table_schema
    JOIN information_schema.referential_constraints rc
        ON rc.constraint_name = tc.constraint_name
        AND rc.constraint_schema = tc.table_schema
    WHERE tc.constraint_type = 'FOREIGN KEY'
        AND tc.table_schema = $1
    GROUP BY
        tc.constraint_name,
        tc.table_name,
        ccu.table_name,
        rc.delete_rule,
        rc.update_rule
    ORDER BY tc.table_name, tc.constraint_name
"#;

/// Aggregate catalog counts for a namespace ($1 = schema)
pub const DATABASE_STATS: &str = r#"
    SELECT
        (SELECT count(*) FROM information_schema.tables
         WHERE table_schema = $1 AND table_type = 'BASE TABLE') AS table_count,
        (SELECT count(*) FROM information_schema.columns
         WHERE table_schema = $1) AS column_count,
        (SELECT count(*) FROM pg_indexes
         WHERE schemaname = $1) AS index_count,
        (SELECT count(*) FROM information_schema.table_constraints
         WHERE constraint_schema = $1
            AND constraint_type = 'FOREIGN KEY') AS foreign_key_count
"#;
