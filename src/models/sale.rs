//! Sale orders and their lines.

use serde_json::Value;

use crate::rpc::Record;
use crate::sync::mapper::{Literal, MapContext, MatchKey, Mapper, Rule};
use crate::sync::registry::{BatchFilter, Dependency, ExportHook, ExportSpec, ImportHook, ImportSpec, ModelConfig};
use crate::sync::SyncResult;

const PARTNER_FIELDS: [&str; 3] = ["partner_id", "partner_invoice_id", "partner_shipping_id"];

pub(super) fn models() -> Vec<ModelConfig> {
    vec![order(), order_line()]
}

fn partner_dependencies() -> Vec<Dependency> {
    PARTNER_FIELDS
        .iter()
        .map(|field| Dependency::Many2One { field, model: "res.partner" })
        .collect()
}

fn with_partners(mut mapper: Mapper) -> Mapper {
    for field in PARTNER_FIELDS {
        mapper = mapper.rule(Rule::many2one(field, field, "res.partner"));
    }
    mapper
}

fn with_utm(mut mapper: Mapper) -> Mapper {
    for (field, model) in [
        ("campaign_id", "utm.campaign"),
        ("medium_id", "utm.medium"),
        ("source_id", "utm.source"),
    ] {
        mapper = mapper.rule(Rule::many2one(field, field, model).lenient());
    }
    mapper
}

fn order() -> ModelConfig {
    let import_mapper = Mapper::new()
        .direct(&[
            ("name", "name"),
            ("date_order", "date_order"),
            ("confirmation_date", "confirmation_date"),
            ("client_order_ref", "client_order_ref"),
            ("access_token", "access_token"),
            ("sale_weight", "sale_weight"),
            ("sale_volume", "sale_volume"),
        ])
        .rule(Rule::many2one("pricelist_id", "pricelist_id", "product.pricelist"))
        .rule(Rule::many2one("payment_term_id", "payment_term_id", "account.payment.term"))
        .rule(Rule::many2one("fiscal_position_id", "fiscal_position_id", "account.fiscal.position"))
        .rule(Rule::many2one("user_id", "user_id", "res.users"))
        .rule(Rule::custom("backend_fields", backend_fields))
        .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }]));

    let export_mapper = Mapper::new()
        .direct(&[
            ("name", "name"),
            ("date_order", "date_order"),
            ("confirmation_date", "confirmation_date"),
            ("client_order_ref", "client_order_ref"),
            ("access_token", "access_token"),
            ("sale_weight", "sale_weight"),
            ("sale_volume", "sale_volume"),
        ])
        .rule(Rule::fixed("state", Literal::Str("draft")).on_create())
        .rule(Rule::many2one("pricelist_id", "pricelist_id", "product.pricelist").with_fallback("default_pricelist_id"))
        .rule(Rule::many2one("carrier_id", "carrier_id", "delivery.carrier").lenient())
        .rule(Rule::many2one("payment_term_id", "payment_term_id", "account.payment.term").lenient())
        .rule(Rule::many2one("fiscal_position_id", "fiscal_position_id", "account.fiscal.position").lenient())
        .rule(Rule::constant("warehouse_id", "warehouse_id"))
        .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }]));

    ModelConfig::new("sale.order")
        .importing(ImportSpec {
            mapper: with_utm(with_partners(import_mapper)),
            dependencies: [
                vec![Dependency::Many2One { field: "pricelist_id", model: "product.pricelist" }],
                partner_dependencies(),
                vec![
                    Dependency::Many2One { field: "payment_term_id", model: "account.payment.term" },
                    Dependency::Many2One { field: "fiscal_position_id", model: "account.fiscal.position" },
                    Dependency::Many2One { field: "user_id", model: "res.users" },
                ],
            ]
            .concat(),
            hooks: vec![
                ImportHook::ImportChildren { field: "order_line", model: "sale.order.line" },
                ImportHook::StateTransitions { field: "state" },
            ],
            batch_filters: vec![BatchFilter::BoundIn { field: "partner_id", model: "res.partner" }],
        })
        .exporting(ExportSpec {
            mapper: with_utm(with_partners(export_mapper))
                .rule(Rule::many2one("source_id", "source_id", "utm.source").with_fallback("utm_source_id")),
            dependencies: partner_dependencies(),
            hooks: vec![
                ExportHook::ExportChildren { field: "order_line", model: "sale.order.line" },
                ExportHook::StateTransitions { field: "state" },
            ],
        })
}

/// Read-only copies of the remote totals, kept for reconciliation.
fn backend_fields(_ctx: &MapContext<'_>, record: &Record) -> SyncResult<Record> {
    let mut values = Record::new();
    for (from, to) in [
        ("amount_total", "backend_amount_total"),
        ("amount_tax", "backend_amount_tax"),
        ("date_order", "backend_date_order"),
        ("state", "backend_state"),
    ] {
        if let Some(value) = record.get(from) {
            values.insert(to.to_string(), value.clone());
        }
    }
    if let Some(Value::Array(pickings)) = record.get("picking_ids") {
        values.insert("backend_picking_count".to_string(), Value::from(pickings.len()));
    }
    Ok(values)
}

fn order_line() -> ModelConfig {
    ModelConfig::new("sale.order.line")
        .importing(ImportSpec {
            mapper: Mapper::new()
                .direct(&[
                    ("name", "name"),
                    ("sequence", "sequence"),
                    ("discount", "discount"),
                    ("price_unit", "price_unit"),
                    ("product_uom_qty", "product_uom_qty"),
                ])
                .rule(Rule::many2one("order_id", "order_id", "sale.order"))
                .rule(Rule::many2one("product_id", "product_id", "product.product"))
                .rule(Rule::many2one("product_uom", "product_uom", "uom.uom"))
                .rule(Rule::many2many("tax_id", "tax_id", "account.tax").lenient()),
            dependencies: vec![
                Dependency::Many2One { field: "order_id", model: "sale.order" },
                Dependency::Many2One { field: "product_id", model: "product.product" },
                Dependency::Many2One { field: "product_uom", model: "uom.uom" },
            ],
            ..ImportSpec::default()
        })
        .exporting(ExportSpec {
            mapper: Mapper::new()
                .direct(&[
                    ("discount", "discount"),
                    ("price_unit", "price_unit"),
                    ("product_uom_qty", "product_uom_qty"),
                ])
                .rule(Rule::custom("name", line_name))
                .rule(Rule::many2one("order_id", "order_id", "sale.order"))
                .rule(Rule::many2one("product_id", "product_id", "product.product"))
                .rule(Rule::many2one("product_uom", "product_uom", "uom.uom"))
                .rule(Rule::many2many("tax_id", "tax_id", "account.tax").lenient()),
            dependencies: vec![Dependency::Many2One { field: "order_id", model: "sale.order" }],
            ..ExportSpec::default()
        })
}

/// Lines are described by the product display name.
fn line_name(_ctx: &MapContext<'_>, record: &Record) -> SyncResult<Record> {
    let name = match record.get("product_id") {
        Some(Value::Array(pair)) => pair.get(1).cloned(),
        _ => None,
    }
    .or_else(|| record.get("name").cloned())
    .unwrap_or(Value::Bool(false));

    let mut values = Record::new();
    values.insert("name".to_string(), name);
    Ok(values)
}
