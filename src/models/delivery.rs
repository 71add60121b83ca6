//! Carriers and delivery regions.
//!
//! Carrier searches are narrowed per backend through the configured
//! `domain_filters["delivery.carrier"]`.

use crate::sync::mapper::{MatchKey, Mapper, Rule};
use crate::sync::registry::{ExportSpec, ImportSpec, ModelConfig};

pub(super) fn models() -> Vec<ModelConfig> {
    vec![carrier(), region()]
}

fn carrier() -> ModelConfig {
    let fields: &'static [(&'static str, &'static str)] = &[
        ("name", "name"),
        ("active", "active"),
        ("sequence", "sequence"),
        ("delivery_type", "delivery_type"),
        ("fixed_price", "fixed_price"),
        ("is_published", "is_published"),
    ];
    ModelConfig::new("delivery.carrier")
        .with_inactive()
        .importing(ImportSpec {
            mapper: Mapper::new()
                .direct(fields)
                .rule(Rule::many2one("product_id", "product_id", "product.product").lenient())
                .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }]).include_inactive()),
            ..ImportSpec::default()
        })
        .exporting(ExportSpec {
            mapper: Mapper::new()
                .direct(fields)
                .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }]).include_inactive()),
            ..ExportSpec::default()
        })
}

fn region() -> ModelConfig {
    ModelConfig::new("delivery.region").priority(15).importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name")])
            .rule(Rule::many2many("country_ids", "country_ids", "res.country").lenient())
            .rule(Rule::many2many("state_ids", "state_ids", "res.country.state").lenient()),
        ..ImportSpec::default()
    })
}
