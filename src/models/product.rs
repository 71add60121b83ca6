//! Catalog models: categories, attributes, templates, variants and images.

use serde_json::Value;

use crate::rpc::{many2one_id, replace_command, Domain, Record, SearchOptions};
use crate::sync::mapper::{MapContext, MatchKey, Mapper, Rule};
use crate::sync::registry::{BatchFilter, Dependency, ImportHook, ImportSpec, MirrorSpec, ModelConfig};
use crate::sync::{SyncError, SyncResult};

/// Local model of the website categories mirrored from product categories.
pub const PUBLIC_CATEGORY: &str = "product.public.category";

/// Models an image may belong to.
pub const IMAGE_OWNERS: &[&str] = &["product.template", "product.product"];

/// Last Odoo version storing the main product image in `image_main`.
const LEGACY_IMAGE_VERSION: u32 = 12;

pub(super) fn models() -> Vec<ModelConfig> {
    vec![
        uom(),
        brand(),
        feature_icon(),
        category(),
        category_table_line(),
        attribute_group(),
        attribute(),
        attribute_value(),
        template(),
        attribute_line(),
        feature_line(),
        variant(),
        image(),
    ]
}

fn uom() -> ModelConfig {
    ModelConfig::new("uom.uom").priority(5).with_inactive().importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[
                ("name", "name"),
                ("rounding", "rounding"),
                ("uom_type", "uom_type"),
                ("active", "active"),
            ])
            .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }]).include_inactive()),
        ..ImportSpec::default()
    })
}

fn brand() -> ModelConfig {
    ModelConfig::new("product.brand").importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name"), ("description", "description"), ("logo", "logo")])
            .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }])),
        ..ImportSpec::default()
    })
}

fn feature_icon() -> ModelConfig {
    ModelConfig::new("feature.icon").priority(5).importing(ImportSpec {
        mapper: Mapper::new().direct(&[("name", "name"), ("image", "image")]),
        ..ImportSpec::default()
    })
}

fn category() -> ModelConfig {
    ModelConfig::new("product.category").priority(5).importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[
                ("name", "name"),
                ("sequence", "sequence"),
                ("is_published", "is_published"),
                ("show_in_catalog", "show_in_catalog"),
                ("catalog_sequence", "catalog_sequence"),
                ("ecommerce_image", "ecommerce_image"),
            ])
            .rule(Rule::many2one("parent_id", "parent_id", "product.category"))
            .rule(Rule::many2many("feature_icon_ids", "feature_icon_ids", "feature.icon"))
            .rule(Rule::many2many(
                "catalog_attribute_lines",
                "catalog_attribute_lines",
                "product.category.table.attribute.lines",
            ))
            .rule(Rule::html("catalog_description", "catalog_description")),
        dependencies: vec![
            Dependency::Many2One { field: "parent_id", model: "product.category" },
            Dependency::X2Many { field: "feature_icon_ids", model: "feature.icon" },
            Dependency::X2Many {
                field: "catalog_attribute_lines",
                model: "product.category.table.attribute.lines",
            },
        ],
        hooks: vec![ImportHook::Mirror(MirrorSpec {
            model: PUBLIC_CATEGORY,
            origin_field: "origin_categ_id",
            parent_field: "parent_id",
            fields: &[("name", "name"), ("sequence", "sequence")],
        })],
        ..ImportSpec::default()
    })
}

fn category_table_line() -> ModelConfig {
    ModelConfig::new("product.category.table.attribute.lines")
        .priority(10)
        .importing(ImportSpec {
            mapper: Mapper::new()
                .direct(&[("sequence", "sequence"), ("hierarchy_level", "hierarchy_level")])
                .rule(Rule::many2one("attribute_id", "attribute_id", "product.attribute")),
            dependencies: vec![Dependency::Many2One { field: "attribute_id", model: "product.attribute" }],
            ..ImportSpec::default()
        })
}

fn attribute_group() -> ModelConfig {
    ModelConfig::new("product.attribute.group").priority(5).importing(ImportSpec {
        mapper: Mapper::new().direct(&[("name", "name"), ("sequence", "sequence")]),
        ..ImportSpec::default()
    })
}

fn attribute() -> ModelConfig {
    ModelConfig::new("product.attribute").priority(5).importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name"), ("visibility", "visibility"), ("allow_filling", "allow_filling")])
            .rule(Rule::custom("create_variant", create_variant))
            .rule(Rule::html("html_description", "html_description"))
            .rule(Rule::many2one("attribute_group_id", "attribute_group_id", "product.attribute.group"))
            .rule(Rule::match_existing(&[
                MatchKey::Field { from: "name", to: "name" },
                MatchKey::Field { from: "create_variant", to: "create_variant" },
            ])),
        dependencies: vec![Dependency::Many2One {
            field: "attribute_group_id",
            model: "product.attribute.group",
        }],
        ..ImportSpec::default()
    })
}

/// Only "always" survives; every other mode becomes "no_variant".
fn create_variant(_ctx: &MapContext<'_>, record: &Record) -> SyncResult<Record> {
    let mode = match record.get("create_variant").and_then(Value::as_str) {
        Some("always") => "always",
        _ => "no_variant",
    };
    let mut values = Record::new();
    values.insert("create_variant".to_string(), Value::from(mode));
    Ok(values)
}

fn attribute_value() -> ModelConfig {
    ModelConfig::new("product.attribute.value").priority(10).importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name"), ("numeric_value", "numeric_value"), ("image", "image")])
            .rule(Rule::many2one("attribute_id", "attribute_id", "product.attribute"))
            .rule(Rule::html("html_description", "html_description"))
            .rule(Rule::match_existing(&[
                MatchKey::Many2One { from: "attribute_id", to: "attribute_id", model: "product.attribute" },
                MatchKey::Field { from: "name", to: "name" },
            ])),
        dependencies: vec![Dependency::Many2One { field: "attribute_id", model: "product.attribute" }],
        ..ImportSpec::default()
    })
}

fn template() -> ModelConfig {
    ModelConfig::new("product.template")
        .priority(15)
        .with_inactive()
        .importing(ImportSpec {
            mapper: Mapper::new()
                .direct(&[
                    ("name", "name"),
                    ("default_code", "default_code"),
                    ("active", "active"),
                    ("description", "description"),
                    ("standard_price", "standard_price"),
                    ("barcode", "barcode"),
                    ("sale_ok", "sale_ok"),
                    ("purchase_ok", "purchase_ok"),
                    ("type", "detailed_type"),
                    ("is_published", "is_published"),
                    ("short_public_description", "description_sale"),
                    ("website_sequence", "website_sequence"),
                    ("weight", "weight"),
                    ("volume", "volume"),
                ])
                .rule(Rule::many2one("uom_id", "uom_id", "uom.uom"))
                .rule(Rule::many2one("uom_id", "uom_po_id", "uom.uom"))
                .rule(Rule::many2one("categ_id", "categ_id", "product.category"))
                .rule(Rule::many2one("product_brand_id", "product_brand_id", "product.brand"))
                .rule(Rule::many2many("feature_icon_ids", "feature_icon_ids", "feature.icon"))
                .rule(Rule::many2many("taxes_id", "taxes_id", "account.tax").lenient())
                .rule(Rule::versioned("image_1920", "image_main", "image_1920", LEGACY_IMAGE_VERSION))
                .rule(Rule::html("public_description", "public_description"))
                .rule(Rule::html("catalog_description", "catalog_description"))
                .rule(Rule::custom("public_categ_ids", public_categories)),
            dependencies: vec![
                Dependency::Many2One { field: "uom_id", model: "uom.uom" },
                Dependency::Many2One { field: "categ_id", model: "product.category" },
                Dependency::Many2One { field: "product_brand_id", model: "product.brand" },
                Dependency::X2Many { field: "feature_icon_ids", model: "feature.icon" },
            ],
            hooks: vec![
                ImportHook::DeferChildren {
                    field: "attribute_line_ids",
                    model: "product.template.attribute.line",
                },
                ImportHook::DeferChildren {
                    field: "feature_line_ids",
                    model: "product.template.feature.line",
                },
                ImportHook::Link {
                    field: "accessory_product_ids",
                    to: "accessory_product_ids",
                    model: "product.product",
                },
                ImportHook::LinkOrDefer {
                    field: "default_variant_id",
                    to: "default_variant_id",
                    model: "product.product",
                },
            ],
            ..ImportSpec::default()
        })
}

/// Website categories: the mirror of the product's own category.
fn public_categories(ctx: &MapContext<'_>, record: &Record) -> SyncResult<Record> {
    let mut values = Record::new();
    let Some(remote_categ) = record.get("categ_id").and_then(many2one_id) else {
        return Ok(values);
    };
    let Some(categ) = ctx.resolve("product.category", remote_categ)? else {
        return Err(SyncError::Mapping(format!(
            "product.category with remote id {remote_categ} is not imported yet"
        )));
    };

    let found = ctx.target.search(
        PUBLIC_CATEGORY,
        &Domain::leaf("origin_categ_id", "=", categ),
        &SearchOptions::limit(1),
    )?;
    if let Some(public) = found.first() {
        values.insert("public_categ_ids".to_string(), replace_command(&[*public]));
    }
    Ok(values)
}

fn attribute_line() -> ModelConfig {
    ModelConfig::new("product.template.attribute.line")
        .priority(15)
        .importing(ImportSpec {
            mapper: Mapper::new()
                .rule(Rule::many2one("product_tmpl_id", "product_tmpl_id", "product.template"))
                .rule(Rule::many2one("attribute_id", "attribute_id", "product.attribute"))
                .rule(Rule::many2many("value_ids", "value_ids", "product.attribute.value"))
                .rule(Rule::match_existing(&[
                    MatchKey::Many2One {
                        from: "product_tmpl_id",
                        to: "product_tmpl_id",
                        model: "product.template",
                    },
                    MatchKey::Many2One { from: "attribute_id", to: "attribute_id", model: "product.attribute" },
                ])),
            dependencies: vec![
                Dependency::Many2One { field: "product_tmpl_id", model: "product.template" },
                Dependency::Many2One { field: "attribute_id", model: "product.attribute" },
                Dependency::X2Many { field: "value_ids", model: "product.attribute.value" },
            ],
            ..ImportSpec::default()
        })
}

fn feature_line() -> ModelConfig {
    ModelConfig::new("product.template.feature.line")
        .priority(15)
        .importing(ImportSpec {
            mapper: Mapper::new()
                .direct(&[("sequence", "sequence")])
                .rule(Rule::many2one("product_tmpl_id", "product_tmpl_id", "product.template"))
                .rule(Rule::many2one("feature_id", "feature_id", "product.attribute"))
                .rule(Rule::many2one("value_id", "value_id", "product.attribute.value")),
            dependencies: vec![
                Dependency::Many2One { field: "product_tmpl_id", model: "product.template" },
                Dependency::Many2One { field: "feature_id", model: "product.attribute" },
                Dependency::Many2One { field: "value_id", model: "product.attribute.value" },
            ],
            ..ImportSpec::default()
        })
}

fn variant() -> ModelConfig {
    ModelConfig::new("product.product")
        .priority(15)
        .with_inactive()
        .importing(ImportSpec {
            mapper: Mapper::new()
                .direct(&[
                    ("default_code", "default_code"),
                    ("barcode", "barcode"),
                    ("active", "active"),
                    ("standard_price", "standard_price"),
                    ("weight", "weight"),
                    ("volume", "volume"),
                ])
                .rule(Rule::many2one("product_tmpl_id", "product_tmpl_id", "product.template"))
                .rule(Rule::versioned("image_variant_1920", "image_variant", "image_variant_1920", LEGACY_IMAGE_VERSION))
                .rule(
                    Rule::match_existing(&[
                        MatchKey::Many2One {
                            from: "product_tmpl_id",
                            to: "product_tmpl_id",
                            model: "product.template",
                        },
                        MatchKey::Field { from: "default_code", to: "default_code" },
                    ])
                    .include_inactive(),
                ),
            dependencies: vec![Dependency::Many2One { field: "product_tmpl_id", model: "product.template" }],
            ..ImportSpec::default()
        })
}

fn image() -> ModelConfig {
    ModelConfig::new("base_multi_image.image")
        .priority(15)
        .importing(ImportSpec {
            mapper: Mapper::new()
                .direct(&[
                    ("name", "name"),
                    ("sequence", "sequence"),
                    ("storage", "storage"),
                    ("extension", "extension"),
                    ("comments", "comments"),
                    ("file_db_store", "file_db_store"),
                ])
                .rule(Rule::custom("owner", image_owner))
                .rule(Rule::many2many("product_variant_ids", "product_variant_ids", "product.product").lenient()),
            dependencies: vec![
                Dependency::Polymorphic {
                    model_field: "owner_model",
                    id_field: "owner_id",
                    allowed: IMAGE_OWNERS,
                },
                Dependency::X2Many { field: "product_variant_ids", model: "product.product" },
            ],
            batch_filters: vec![BatchFilter::Static(Domain::leaf("owner_model", "in", IMAGE_OWNERS.to_vec()))],
            ..ImportSpec::default()
        })
}

/// Translate the `(owner_model, owner_id)` pair to the local owner.
fn image_owner(ctx: &MapContext<'_>, record: &Record) -> SyncResult<Record> {
    let owner_model = record.get("owner_model").and_then(Value::as_str).unwrap_or_default();
    let Some(model) = IMAGE_OWNERS.iter().find(|m| **m == owner_model) else {
        return Err(SyncError::Unsupported(format!(
            "image owner model '{owner_model}' is not a product or a product template"
        )));
    };
    let Some(remote_owner) = record.get("owner_id").and_then(many2one_id) else {
        return Err(SyncError::Mapping("image has no owner".to_string()));
    };
    let Some(owner) = ctx.resolve(model, remote_owner)? else {
        return Err(SyncError::Mapping(format!(
            "{model} with remote id {remote_owner} is not imported yet"
        )));
    };

    let mut values = Record::new();
    values.insert("owner_model".to_string(), Value::from(*model));
    values.insert("owner_id".to_string(), Value::from(owner));
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::rpc::memory::MemoryOdoo;
    use crate::storage::SqliteStorage;
    use crate::sync::{Direction, Importer, Registry, SyncAction};
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_category_tree_mirrored_to_public_categories() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let registry = crate::models::builtin();
        let backend = BackendConfig::example();
        let remote = MemoryOdoo::new();
        remote.insert("product.category", 1, json!({"name": "All", "sequence": 1, "parent_id": false}));
        remote.insert(
            "product.category",
            2,
            json!({
                "name": "Chairs",
                "sequence": 4,
                "parent_id": [1, "All"],
                "catalog_description": "<style>p{}</style><p style=\"color:red\">Seats</p>",
            }),
        );
        let local = MemoryOdoo::new();

        Importer::new(&mut storage, &registry, &backend, &remote, &local, "test")
            .import_record("product.category", 2, false)
            .unwrap();

        let categories = local.all("product.category");
        assert_eq!(categories.len(), 2);
        let chairs = categories.iter().find(|c| c["name"] == json!("Chairs")).unwrap();
        assert_eq!(chairs["catalog_description"], json!("<p>Seats</p>"));

        let publics = local.all(PUBLIC_CATEGORY);
        assert_eq!(publics.len(), 2);
        let root = publics.iter().find(|p| p["name"] == json!("All")).unwrap();
        let child = publics.iter().find(|p| p["name"] == json!("Chairs")).unwrap();
        assert_eq!(child["parent_id"], root["id"]);
        assert_eq!(child["origin_categ_id"], chairs["id"]);
    }

    #[test]
    fn test_template_image_field_depends_on_version() {
        let storage = SqliteStorage::open_memory().unwrap();
        let local = MemoryOdoo::new();
        let mut backend = BackendConfig::example();
        let source = record(json!({"image_main": "OLD", "image_1920": "NEW"}));
        let rule = Mapper::new().rule(Rule::versioned("image_1920", "image_main", "image_1920", LEGACY_IMAGE_VERSION));

        for (version, expected) in [("12.0", "OLD"), ("16.0", "NEW")] {
            backend.version = version.to_string();
            let ctx = MapContext {
                direction: Direction::Import,
                backend: &backend,
                storage: &storage,
                target: &local,
                target_model: "product.template",
            };
            let mapped = rule.map(&ctx, &source).unwrap();
            assert_eq!(mapped.values(false)["image_1920"], json!(expected));
        }
    }

    #[test]
    fn test_template_imports_dependencies_and_defers_lines() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let registry = crate::models::builtin();
        let backend = BackendConfig::example();
        let remote = MemoryOdoo::new();
        remote.insert("uom.uom", 1, json!({"name": "Units"}));
        remote.insert("product.category", 3, json!({"name": "Chairs", "parent_id": false}));
        remote.insert(
            "product.template",
            20,
            json!({
                "name": "Stool",
                "uom_id": [1, "Units"],
                "categ_id": [3, "Chairs"],
                "product_brand_id": false,
                "taxes_id": [99],
                "attribute_line_ids": [51, 52],
                "feature_line_ids": [],
                "accessory_product_ids": [],
                "default_variant_id": [70, "Stool"],
            }),
        );
        let local = MemoryOdoo::new();
        local.insert("uom.uom", 1, json!({"name": "Units"}));

        let outcome = Importer::new(&mut storage, &registry, &backend, &remote, &local, "test")
            .import_record("product.template", 20, false)
            .unwrap();
        assert_eq!(outcome.action, SyncAction::Created);

        // The unit of measure is adopted by name, not duplicated.
        assert_eq!(local.all("uom.uom").len(), 1);
        let template = local.all("product.template").pop().unwrap();
        assert_eq!(template["uom_id"], json!(1));
        assert_eq!(template["taxes_id"], json!([]));
        let public = local.all(PUBLIC_CATEGORY).pop().unwrap();
        assert_eq!(template["public_categ_ids"], json!([public["id"]]));

        let jobs = storage.list_jobs(Some("main"), None, None).unwrap();
        let mut deferred: Vec<_> = jobs.iter().map(|j| (j.model.as_str(), j.record_id, j.priority)).collect();
        deferred.sort_unstable();
        assert_eq!(
            deferred,
            vec![
                ("product.product", 70, 15),
                ("product.template.attribute.line", 51, 15),
                ("product.template.attribute.line", 52, 15),
            ]
        );
    }

    #[test]
    fn test_accessories_linked_through_bindings() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.bind("main", "product.product", 8, 80, None, "test").unwrap();
        storage.bind("main", "product.template", 3, 30, None, "test").unwrap();
        let registry = crate::models::builtin();
        let backend = BackendConfig::example();
        let remote = MemoryOdoo::new();
        remote.insert("uom.uom", 1, json!({"name": "Units"}));
        remote.insert("product.category", 3, json!({"name": "Chairs", "parent_id": false}));
        remote.insert(
            "product.template",
            20,
            json!({
                "name": "Stool",
                "uom_id": [1, "Units"],
                "categ_id": [3, "Chairs"],
                "product_brand_id": false,
                "attribute_line_ids": [],
                "feature_line_ids": [],
                "accessory_product_ids": [80, 81, 70],
                "default_variant_id": false,
            }),
        );
        // 81 belongs to another template, 70 is the stool's own variant
        remote.insert("product.product", 81, json!({"product_tmpl_id": [30, "Table"], "default_code": "TBL"}));
        remote.insert("product.product", 70, json!({"product_tmpl_id": [20, "Stool"], "default_code": "STL"}));
        let local = MemoryOdoo::new();
        local.insert("uom.uom", 1, json!({"name": "Units"}));
        local.insert("product.template", 3, json!({"name": "Table"}));
        local.insert("product.product", 8, json!({"default_code": "CSH", "product_tmpl_id": 3}));

        Importer::new(&mut storage, &registry, &backend, &remote, &local, "test")
            .import_record("product.template", 20, false)
            .unwrap();

        let local_of = |external_id| {
            storage
                .binding_by_external("main", "product.product", external_id)
                .unwrap()
                .unwrap()
                .local_id
        };
        let (table_variant, own_variant) = (local_of(81), local_of(70));
        assert_eq!(local.all("product.product").len(), 3);
        assert_eq!(remote.count_calls("read", "product.product"), 2);

        let stool_id = storage.binding_by_external("main", "product.template", 20).unwrap().unwrap().local_id;
        let stool = local.get("product.template", stool_id).unwrap();
        assert_eq!(stool["accessory_product_ids"], json!([8, table_variant, own_variant]));
        assert_eq!(local.get("product.product", own_variant).unwrap()["product_tmpl_id"], json!(stool_id));
    }

    #[test]
    fn test_image_owner_outside_products_rejected() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let registry: Registry = crate::models::builtin();
        let backend = BackendConfig::example();
        let remote = MemoryOdoo::new();
        remote.insert("base_multi_image.image", 5, json!({"owner_model": "res.partner", "owner_id": 3}));
        let local = MemoryOdoo::new();

        let err = Importer::new(&mut storage, &registry, &backend, &remote, &local, "test")
            .import_record("base_multi_image.image", 5, false)
            .unwrap_err();
        assert!(matches!(err, SyncError::Unsupported(_)));
        assert!(local.all("base_multi_image.image").is_empty());
    }

    #[test]
    fn test_attribute_create_variant_mode() {
        let ctx_record = |mode: &str| record(json!({ "create_variant": mode }));
        let storage = SqliteStorage::open_memory().unwrap();
        let local = MemoryOdoo::new();
        let backend = BackendConfig::example();
        let ctx = MapContext {
            direction: Direction::Import,
            backend: &backend,
            storage: &storage,
            target: &local,
            target_model: "product.attribute",
        };
        assert_eq!(create_variant(&ctx, &ctx_record("always")).unwrap()["create_variant"], json!("always"));
        assert_eq!(create_variant(&ctx, &ctx_record("dynamic")).unwrap()["create_variant"], json!("no_variant"));
    }
}
