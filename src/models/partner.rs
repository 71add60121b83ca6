//! Contacts and users.

use crate::sync::mapper::{MatchKey, Mapper, Rule};
use crate::sync::registry::{Dependency, ExportSpec, ImportSpec, ModelConfig};

const CONTACT_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("type", "type"),
    ("is_company", "is_company"),
    ("ref", "ref"),
    ("vat", "vat"),
    ("email", "email"),
    ("phone", "phone"),
    ("mobile", "mobile"),
    ("street", "street"),
    ("street2", "street2"),
    ("city", "city"),
    ("zip", "zip"),
    ("comment", "comment"),
];

pub(super) fn models() -> Vec<ModelConfig> {
    vec![partner(), user()]
}

fn partner() -> ModelConfig {
    ModelConfig::new("res.partner")
        .with_inactive()
        .importing(ImportSpec {
            mapper: Mapper::new()
                .direct(CONTACT_FIELDS)
                .direct(&[("active", "active")])
                .rule(Rule::many2one("parent_id", "parent_id", "res.partner"))
                .rule(Rule::many2one("country_id", "country_id", "res.country").lenient())
                .rule(Rule::many2one("state_id", "state_id", "res.country.state").lenient()),
            dependencies: vec![Dependency::Many2One { field: "parent_id", model: "res.partner" }],
            ..ImportSpec::default()
        })
        .exporting(ExportSpec {
            mapper: Mapper::new()
                .direct(CONTACT_FIELDS)
                .rule(Rule::many2one("parent_id", "parent_id", "res.partner"))
                .rule(Rule::many2one("country_id", "country_id", "res.country").lenient())
                .rule(Rule::many2one("state_id", "state_id", "res.country.state").lenient()),
            dependencies: vec![Dependency::Many2One { field: "parent_id", model: "res.partner" }],
            ..ExportSpec::default()
        })
}

fn user() -> ModelConfig {
    ModelConfig::new("res.users").with_inactive().importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name"), ("login", "login")])
            .rule(Rule::match_existing(&[MatchKey::Field { from: "login", to: "login" }]).include_inactive()),
        ..ImportSpec::default()
    })
}
