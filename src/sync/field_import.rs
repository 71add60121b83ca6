//! Copy one field from the remote records onto every bound local record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::BackendConfig;
use crate::rpc::{is_falsy, many2one_id, Domain, OdooRpc, Record, SearchOptions};
use crate::storage::SqliteStorage;

use super::binder::Binder;
use super::registry::Registry;
use super::types::SyncResult;

/// Parameters of a field import, also the payload of `import_field` jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldImportRequest {
    pub model: String,
    /// Field read on the remote records.
    pub field: String,
    /// Field written on the local records.
    pub to_field: String,
    /// When set, the remote value is a many2one of this model and is
    /// translated through its bindings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_model: Option<String>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct FieldImportStats {
    /// Bound records considered.
    pub bindings: usize,
    pub written: usize,
    /// Empty remote values, vanished remote records and unbound relations.
    pub skipped: usize,
}

/// Run a field import.
///
/// # Errors
///
/// Returns an error if the model is unknown, or if a remote read or local
/// write fails.
pub fn import_field(
    storage: &SqliteStorage,
    registry: &Registry,
    backend: &BackendConfig,
    remote: &dyn OdooRpc,
    local: &dyn OdooRpc,
    request: &FieldImportRequest,
) -> SyncResult<FieldImportStats> {
    let config = registry.get(&request.model)?;
    let bindings: Vec<_> = storage
        .list_bindings(&backend.name, Some(config.name), None)?
        .into_iter()
        .filter(|b| b.is_bound())
        .collect();

    let mut stats = FieldImportStats {
        bindings: bindings.len(),
        ..FieldImportStats::default()
    };
    if bindings.is_empty() {
        return Ok(stats);
    }

    let external_ids: Vec<i64> = bindings.iter().map(|b| b.external_id).collect();
    // Bound records stay eligible after they are archived remotely.
    let options = SearchOptions::default().with_inactive(true);
    let remote_records = remote.search_read(
        config.remote_model,
        &Domain::leaf("id", "in", external_ids),
        &[request.field.as_str()],
        &options,
    )?;

    let related = request
        .related_model
        .as_deref()
        .map(|model| Binder::new(storage, &backend.name, model));

    for binding in &bindings {
        let value = remote_records
            .iter()
            .find(|r| r.get("id").and_then(Value::as_i64) == Some(binding.external_id))
            .and_then(|r| r.get(&request.field))
            .filter(|v| !is_falsy(v));
        let Some(value) = value else {
            stats.skipped += 1;
            continue;
        };

        let value = match &related {
            Some(binder) => match many2one_id(value) {
                Some(id) => binder.to_internal(id, true)?.map(Value::from),
                None => None,
            },
            None => Some(value.clone()),
        };
        let Some(value) = value else {
            debug!(binding = binding.id, field = %request.field, "related record not bound");
            stats.skipped += 1;
            continue;
        };

        let mut values = Record::new();
        values.insert(request.to_field.clone(), value);
        local.write(config.name, &[binding.local_id], &values)?;
        stats.written += 1;
    }

    info!(
        model = config.name,
        field = %request.field,
        written = stats.written,
        skipped = stats.skipped,
        "field import finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::memory::MemoryOdoo;
    use crate::sync::registry::{ImportSpec, ModelConfig};
    use serde_json::json;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(ModelConfig::new("product.template").importing(ImportSpec::default()));
        registry
    }

    #[test]
    fn test_plain_field_copied_to_bound_records() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.bind("main", "product.template", 1, 10, None, "test").unwrap();
        storage.bind("main", "product.template", 2, 11, None, "test").unwrap();
        let remote = MemoryOdoo::new();
        remote.insert("product.template", 10, json!({"hs_code": "8471"}));
        remote.insert("product.template", 11, json!({"hs_code": false}));
        let local = MemoryOdoo::new();
        local.insert("product.template", 1, json!({}));
        local.insert("product.template", 2, json!({}));

        let request = FieldImportRequest {
            model: "product.template".into(),
            field: "hs_code".into(),
            to_field: "intrastat_code".into(),
            related_model: None,
        };
        let stats = import_field(&storage, &registry(), &BackendConfig::example(), &remote, &local, &request)
            .unwrap();

        assert_eq!(stats.bindings, 2);
        assert_eq!(stats.written, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(local.get("product.template", 1).unwrap()["intrastat_code"], json!("8471"));
        assert!(local.get("product.template", 2).unwrap().get("intrastat_code").is_none());
    }

    #[test]
    fn test_many2one_translated_through_bindings() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.bind("main", "product.template", 1, 10, None, "test").unwrap();
        storage.bind("main", "product.template", 2, 11, None, "test").unwrap();
        storage.bind("main", "product.brand", 7, 70, None, "test").unwrap();
        let remote = MemoryOdoo::new();
        remote.insert("product.template", 10, json!({"brand_id": [70, "Acme"]}));
        remote.insert("product.template", 11, json!({"brand_id": [71, "Unbound"]}));
        let local = MemoryOdoo::new();
        local.insert("product.template", 1, json!({}));
        local.insert("product.template", 2, json!({}));

        let request = FieldImportRequest {
            model: "product.template".into(),
            field: "brand_id".into(),
            to_field: "product_brand_id".into(),
            related_model: Some("product.brand".into()),
        };
        let stats = import_field(&storage, &registry(), &BackendConfig::example(), &remote, &local, &request)
            .unwrap();

        assert_eq!(stats.written, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(local.get("product.template", 1).unwrap()["product_brand_id"], json!(7));
    }

    #[test]
    fn test_archived_remote_records_are_included() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.bind("main", "product.template", 1, 10, None, "test").unwrap();
        let remote = MemoryOdoo::new();
        remote.insert("product.template", 10, json!({"hs_code": "9401", "active": false}));
        let local = MemoryOdoo::new();
        local.insert("product.template", 1, json!({}));

        let registry = registry();
        assert!(!registry.get("product.template").unwrap().include_inactive);
        let request = FieldImportRequest {
            model: "product.template".into(),
            field: "hs_code".into(),
            to_field: "intrastat_code".into(),
            related_model: None,
        };
        let stats = import_field(&storage, &registry, &BackendConfig::example(), &remote, &local, &request)
            .unwrap();

        assert_eq!(stats.written, 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(local.get("product.template", 1).unwrap()["intrastat_code"], json!("9401"));
    }

    #[test]
    fn test_request_payload_shape() {
        let request: FieldImportRequest = serde_json::from_str(
            r#"{"model": "res.partner", "field": "ref", "to_field": "ref"}"#,
        )
        .unwrap();
        assert_eq!(request.related_model, None);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"model": "res.partner", "field": "ref", "to_field": "ref"})
        );
    }
}
