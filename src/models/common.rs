//! Shared reference data: currencies, pricelists and marketing sources.

use crate::sync::mapper::{MatchKey, Mapper, Rule};
use crate::sync::registry::{Dependency, ImportSpec, ModelConfig};

pub(super) fn models() -> Vec<ModelConfig> {
    let mut models = vec![currency(), pricelist()];
    models.extend(["utm.campaign", "utm.medium", "utm.source"].into_iter().map(utm));
    models
}

fn currency() -> ModelConfig {
    ModelConfig::new("res.currency").priority(5).with_inactive().importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[
                ("name", "name"),
                ("active", "active"),
                ("rounding", "rounding"),
                ("currency_unit_label", "currency_unit_label"),
                ("currency_subunit_label", "currency_subunit_label"),
                ("symbol", "symbol"),
                ("position", "position"),
                ("decimal_places", "decimal_places"),
            ])
            .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }]).include_inactive()),
        ..ImportSpec::default()
    })
}

fn pricelist() -> ModelConfig {
    ModelConfig::new("product.pricelist").with_inactive().importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name"), ("active", "active"), ("sequence", "sequence")])
            .rule(Rule::many2one("currency_id", "currency_id", "res.currency")),
        dependencies: vec![Dependency::Many2One { field: "currency_id", model: "res.currency" }],
        ..ImportSpec::default()
    })
}

fn utm(model: &'static str) -> ModelConfig {
    ModelConfig::new(model).importing(ImportSpec {
        mapper: Mapper::new()
            .direct(&[("name", "name")])
            .rule(Rule::match_existing(&[MatchKey::Field { from: "name", to: "name" }])),
        ..ImportSpec::default()
    })
}

#[cfg(test)]
mod tests {
    use crate::config::BackendConfig;
    use crate::rpc::memory::MemoryOdoo;
    use crate::storage::SqliteStorage;
    use crate::sync::{Importer, SyncAction};
    use serde_json::json;

    #[test]
    fn test_archived_currency_adopted_by_name() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let registry = crate::models::builtin();
        let backend = BackendConfig::example();
        let remote = MemoryOdoo::new();
        remote.insert("res.currency", 2, json!({"name": "TRY", "active": true, "symbol": "₺"}));
        remote.insert("product.pricelist", 7, json!({"name": "TRY list", "currency_id": [2, "TRY"]}));
        let local = MemoryOdoo::new();
        local.insert("res.currency", 31, json!({"name": "TRY", "active": false}));

        let mut importer = Importer::new(&mut storage, &registry, &backend, &remote, &local, "test");
        importer.import_record("product.pricelist", 7, false).unwrap();
        let again = importer.import_record("res.currency", 2, false).unwrap();
        assert_eq!(again.action, SyncAction::Updated);
        drop(importer);

        assert_eq!(local.all("res.currency").len(), 1);
        let currency = local.get("res.currency", 31).unwrap();
        assert_eq!(currency["active"], json!(true));
        assert_eq!(currency["symbol"], json!("₺"));
        assert_eq!(local.all("product.pricelist").pop().unwrap()["currency_id"], json!(31));
        assert_eq!(storage.binding_by_external("main", "res.currency", 2).unwrap().unwrap().local_id, 31);
    }
}
