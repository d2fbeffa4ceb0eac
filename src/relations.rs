//! Relation Mapper
//!
//! Derives bidirectional relation descriptors from the foreign keys of a
//! snapshot: cardinality per foreign key, an inverse on every target table,
//! and synthesized n:m relations for join-table candidates. Relations are
//! recomputed from scratch on every invocation.

use crate::schema::{Cardinality, ForeignKeyDescriptor, RelationDescriptor, SchemaSnapshot};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Relation mapper over a populated snapshot
pub struct RelationMapper;

impl RelationMapper {
    /// Attach relation descriptors to every table referenced by at least one
    /// foreign key. Previously attached relations are discarded first.
    ///
    /// Cardinality is a heuristic: a single-column foreign key is assumed
    /// `1:1`, anything wider defaults to `n:1`. No uniqueness check is
    /// performed on the source side.
    pub fn attach(snapshot: &mut SchemaSnapshot) {
        for table in snapshot.tables.values_mut() {
            table.relations = None;
        }

        let mut pending: Vec<(String, RelationDescriptor)> = Vec::new();

        for fk in &snapshot.foreign_keys {
            if !snapshot.tables.contains_key(&fk.source_table)
                || !snapshot.tables.contains_key(&fk.target_table)
            {
                warn!(
                    "Skipping foreign key {}: references a table absent from the snapshot",
                    fk.name
                );
                continue;
            }

            let cardinality = infer_cardinality(fk);
            let relation = RelationDescriptor {
                cardinality,
                source_table: fk.source_table.clone(),
                source_columns: fk.source_columns.clone(),
                target_table: fk.target_table.clone(),
                target_columns: fk.target_columns.clone(),
                join_table: None,
            };

            pending.push((fk.target_table.clone(), relation.inverse()));
            pending.push((fk.source_table.clone(), relation));
        }

        // Join-table candidates: any table that is the source of two or more
        // foreign keys. Only the first two (catalog return order) seed the
        // n:m relation; further foreign keys are not used.
        let mut fks_by_source: BTreeMap<&str, Vec<&ForeignKeyDescriptor>> = BTreeMap::new();
        for fk in &snapshot.foreign_keys {
            fks_by_source
                .entry(fk.source_table.as_str())
                .or_default()
                .push(fk);
        }

        for (join_table, fks) in &fks_by_source {
            if fks.len() < 2 {
                continue;
            }

            let (first, second) = (fks[0], fks[1]);
            if !snapshot.tables.contains_key(&first.target_table)
                || !snapshot.tables.contains_key(&second.target_table)
            {
                warn!(
                    "Skipping join-table candidate {}: a referenced table is absent from the snapshot",
                    join_table
                );
                continue;
            }

            let relation = RelationDescriptor {
                cardinality: Cardinality::ManyToMany,
                source_table: first.target_table.clone(),
                source_columns: first.target_columns.clone(),
                target_table: second.target_table.clone(),
                target_columns: second.target_columns.clone(),
                join_table: Some((*join_table).to_string()),
            };

            pending.push((second.target_table.clone(), relation.inverse()));
            pending.push((first.target_table.clone(), relation));
        }

        let relation_count = pending.len();
        for (table_name, relation) in pending {
            if let Some(table) = snapshot.tables.get_mut(&table_name) {
                table.relations.get_or_insert_with(Vec::new).push(relation);
            }
        }

        debug!(
            "Attached {} relations across {} foreign keys",
            relation_count,
            snapshot.foreign_keys.len()
        );
    }
}

/// Single-column foreign key ⇒ 1:1, wider keys default to n:1.
fn infer_cardinality(fk: &ForeignKeyDescriptor) -> Cardinality {
    if fk.source_columns.len() == 1 {
        Cardinality::OneToOne
    } else {
        Cardinality::ManyToOne
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TableDescriptor;

    fn table(name: &str) -> TableDescriptor {
        TableDescriptor::empty(name, "public")
    }

    fn foreign_key(
        name: &str,
        source_table: &str,
        source_columns: &[&str],
        target_table: &str,
        target_columns: &[&str],
    ) -> ForeignKeyDescriptor {
        ForeignKeyDescriptor {
            name: name.to_string(),
            source_table: source_table.to_string(),
            source_columns: source_columns.iter().map(|c| c.to_string()).collect(),
            target_table: target_table.to_string(),
            target_columns: target_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: None,
            on_update: None,
        }
    }

    fn snapshot(tables: &[&str], foreign_keys: Vec<ForeignKeyDescriptor>) -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::new("test");
        for name in tables {
            snapshot.tables.insert(name.to_string(), table(name));
        }
        snapshot.foreign_keys = foreign_keys;
        snapshot
    }

    fn relations<'a>(snapshot: &'a SchemaSnapshot, table: &str) -> &'a [RelationDescriptor] {
        snapshot.tables[table]
            .relations
            .as_deref()
            .unwrap_or_default()
    }

    #[test]
    fn test_single_column_fk_is_one_to_one_with_inverse() {
        let mut snap = snapshot(
            &["orders", "users"],
            vec![foreign_key(
                "fk_orders_user",
                "orders",
                &["user_id"],
                "users",
                &["id"],
            )],
        );

        RelationMapper::attach(&mut snap);

        let outgoing = relations(&snap, "orders");
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].cardinality, Cardinality::OneToOne);
        assert_eq!(outgoing[0].target_table, "users");

        let inverse = relations(&snap, "users");
        assert_eq!(inverse.len(), 1);
        assert_eq!(inverse[0].cardinality, Cardinality::OneToOne);
        assert_eq!(inverse[0].target_table, "orders");
        assert_eq!(inverse[0].source_columns, vec!["id".to_string()]);
    }

    #[test]
    fn test_composite_fk_defaults_to_many_to_one() {
        let mut snap = snapshot(
            &["line_items", "shipments"],
            vec![foreign_key(
                "fk_line_items_shipment",
                "line_items",
                &["shipment_id", "region"],
                "shipments",
                &["id", "region"],
            )],
        );

        RelationMapper::attach(&mut snap);

        assert_eq!(
            relations(&snap, "line_items")[0].cardinality,
            Cardinality::ManyToOne
        );
        assert_eq!(
            relations(&snap, "shipments")[0].cardinality,
            Cardinality::OneToMany
        );
    }

    #[test]
    fn test_join_table_synthesizes_many_to_many() {
        let mut snap = snapshot(
            &["order_items", "orders", "products"],
            vec![
                foreign_key("fk_oi_order", "order_items", &["order_id"], "orders", &["id"]),
                foreign_key(
                    "fk_oi_product",
                    "order_items",
                    &["product_id"],
                    "products",
                    &["id"],
                ),
            ],
        );

        RelationMapper::attach(&mut snap);

        let n_to_m: Vec<_> = relations(&snap, "orders")
            .iter()
            .filter(|r| r.cardinality == Cardinality::ManyToMany)
            .collect();
        assert_eq!(n_to_m.len(), 1);
        assert_eq!(n_to_m[0].target_table, "products");
        assert_eq!(n_to_m[0].join_table.as_deref(), Some("order_items"));

        let mirrored: Vec<_> = relations(&snap, "products")
            .iter()
            .filter(|r| r.cardinality == Cardinality::ManyToMany)
            .collect();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].target_table, "orders");
        assert_eq!(mirrored[0].join_table.as_deref(), Some("order_items"));
    }

    #[test]
    fn test_join_table_uses_only_first_two_foreign_keys() {
        let mut snap = snapshot(
            &["grants", "users", "roles", "projects"],
            vec![
                foreign_key("fk_grants_user", "grants", &["user_id"], "users", &["id"]),
                foreign_key("fk_grants_role", "grants", &["role_id"], "roles", &["id"]),
                foreign_key(
                    "fk_grants_project",
                    "grants",
                    &["project_id"],
                    "projects",
                    &["id"],
                ),
            ],
        );

        RelationMapper::attach(&mut snap);

        let all_n_to_m: usize = snap
            .tables
            .values()
            .flat_map(|t| t.relations.as_deref().unwrap_or_default())
            .filter(|r| r.cardinality == Cardinality::ManyToMany)
            .count();

        // one n:m pair (users<->roles); the third FK seeds nothing
        assert_eq!(all_n_to_m, 2);
        assert!(relations(&snap, "projects")
            .iter()
            .all(|r| r.cardinality != Cardinality::ManyToMany));
    }

    #[test]
    fn test_fk_to_absent_table_is_skipped() {
        let mut snap = snapshot(
            &["orders"],
            vec![foreign_key(
                "fk_orders_user",
                "orders",
                &["user_id"],
                "users",
                &["id"],
            )],
        );

        RelationMapper::attach(&mut snap);

        assert!(snap.tables["orders"].relations.is_none());
    }

    #[test]
    fn test_inverse_law_for_non_many_to_many_relations() {
        let mut snap = snapshot(
            &["comments", "posts", "authors"],
            vec![
                foreign_key("fk_comments_post", "comments", &["post_id"], "posts", &["id"]),
                foreign_key(
                    "fk_posts_author",
                    "posts",
                    &["author_id", "tenant_id"],
                    "authors",
                    &["id", "tenant_id"],
                ),
            ],
        );

        RelationMapper::attach(&mut snap);

        for table in snap.tables.values() {
            for relation in table.relations.as_deref().unwrap_or_default() {
                if relation.cardinality == Cardinality::ManyToMany {
                    continue;
                }
                let target = &snap.tables[&relation.target_table];
                let has_inverse = target
                    .relations
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .any(|r| {
                        r.target_table == relation.source_table
                            && r.cardinality == relation.cardinality.inverse()
                            && r.source_columns == relation.target_columns
                    });
                assert!(
                    has_inverse,
                    "missing inverse for relation {} -> {}",
                    relation.source_table, relation.target_table
                );
            }
        }
    }

    #[test]
    fn test_relations_are_recomputed_not_accumulated() {
        let mut snap = snapshot(
            &["orders", "users"],
            vec![foreign_key(
                "fk_orders_user",
                "orders",
                &["user_id"],
                "users",
                &["id"],
            )],
        );

        RelationMapper::attach(&mut snap);
        RelationMapper::attach(&mut snap);

        assert_eq!(relations(&snap, "orders").len(), 1);
        assert_eq!(relations(&snap, "users").len(), 1);
    }
}
