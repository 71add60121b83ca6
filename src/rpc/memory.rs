//! In-memory Odoo database for tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};

use super::{many2one_id, x2many_ids, Domain, OdooRpc, Record, RpcError, RpcResult, SearchOptions};

/// One recorded RPC call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: String,
    pub model: String,
    pub ids: Vec<i64>,
}

/// A fake Odoo database holding records per model.
#[derive(Debug, Default)]
pub struct MemoryOdoo {
    tables: RefCell<HashMap<String, BTreeMap<i64, Record>>>,
    calls: RefCell<Vec<Call>>,
}

impl MemoryOdoo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record with a fixed id. `values` must be a JSON object.
    pub fn insert(&self, model: &str, id: i64, values: Value) {
        let Value::Object(mut record) = values else {
            panic!("record values must be an object");
        };
        record.insert("id".to_string(), json!(id));
        self.tables
            .borrow_mut()
            .entry(model.to_string())
            .or_default()
            .insert(id, record);
    }

    pub fn get(&self, model: &str, id: i64) -> Option<Record> {
        self.tables.borrow().get(model).and_then(|t| t.get(&id)).cloned()
    }

    pub fn remove(&self, model: &str, id: i64) {
        if let Some(table) = self.tables.borrow_mut().get_mut(model) {
            table.remove(&id);
        }
    }

    pub fn all(&self, model: &str) -> Vec<Record> {
        self.tables
            .borrow()
            .get(model)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Number of calls of `method` on `model`.
    pub fn count_calls(&self, method: &str, model: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.method == method && c.model == model)
            .count()
    }

    fn log(&self, method: &str, model: &str, ids: &[i64]) {
        self.calls.borrow_mut().push(Call {
            method: method.to_string(),
            model: model.to_string(),
            ids: ids.to_vec(),
        });
    }
}

/// Store relational commands as plain id lists, the way `read` returns them.
fn normalize(values: &Record) -> Record {
    values
        .iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Array(items) if items.first().is_some_and(Value::is_array) => {
                    json!(x2many_ids(v))
                }
                _ => v.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

fn field_value(record: &Record, field: &str) -> Value {
    let value = record.get(field).cloned().unwrap_or(Value::Bool(false));
    match &value {
        Value::Array(pair) if pair.len() == 2 && pair[1].is_string() => {
            many2one_id(&value).map_or(Value::Bool(false), |id| json!(id))
        }
        _ => value,
    }
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn leaf_matches(record: &Record, leaf: &[Value]) -> bool {
    let field = leaf[0].as_str().unwrap_or_default();
    let operator = leaf[1].as_str().unwrap_or_default();
    let expected = &leaf[2];
    let actual = field_value(record, field);

    let contains = |list: &Value| match &actual {
        Value::Array(values) => values.iter().any(|v| list.as_array().is_some_and(|l| l.contains(v))),
        other => list.as_array().is_some_and(|l| l.contains(other)),
    };
    let like = |case_insensitive: bool| match (&actual, expected) {
        (Value::String(a), Value::String(e)) if case_insensitive => {
            a.to_lowercase().contains(&e.to_lowercase())
        }
        (Value::String(a), Value::String(e)) => a.contains(e.as_str()),
        _ => false,
    };

    match operator {
        "=" => match (&actual, expected) {
            (Value::Array(values), e) => values.contains(e),
            (a, e) => a == e,
        },
        "!=" => actual != *expected,
        "in" => contains(expected),
        "not in" => !contains(expected),
        "ilike" => like(true),
        "like" => like(false),
        "<" => compare(&actual, expected).is_some_and(std::cmp::Ordering::is_lt),
        ">" => compare(&actual, expected).is_some_and(std::cmp::Ordering::is_gt),
        "<=" => compare(&actual, expected).is_some_and(std::cmp::Ordering::is_le),
        ">=" => compare(&actual, expected).is_some_and(std::cmp::Ordering::is_ge),
        other => panic!("unsupported operator in test domain: {other}"),
    }
}

/// Evaluate a Polish-notation domain; leftover terms are AND-ed.
fn evaluate(record: &Record, terms: &[Value]) -> bool {
    fn eval_one<'a>(record: &Record, terms: &'a [Value]) -> (bool, &'a [Value]) {
        match &terms[0] {
            Value::String(op) if op == "!" => {
                let (value, rest) = eval_one(record, &terms[1..]);
                (!value, rest)
            }
            Value::String(op) if op == "&" || op == "|" => {
                let (left, rest) = eval_one(record, &terms[1..]);
                let (right, rest) = eval_one(record, rest);
                (if op == "&" { left && right } else { left || right }, rest)
            }
            Value::Array(leaf) => (leaf_matches(record, leaf), &terms[1..]),
            other => panic!("invalid domain term: {other}"),
        }
    }

    let mut rest = terms;
    while !rest.is_empty() {
        let (value, next) = eval_one(record, rest);
        if !value {
            return false;
        }
        rest = next;
    }
    true
}

impl OdooRpc for MemoryOdoo {
    fn search(&self, model: &str, domain: &Domain, options: &SearchOptions) -> RpcResult<Vec<i64>> {
        self.log("search", model, &[]);
        let tables = self.tables.borrow();
        let Some(table) = tables.get(model) else {
            return Ok(Vec::new());
        };

        let ids = table
            .iter()
            .filter(|(_, record)| {
                options.include_inactive || record.get("active") != Some(&Value::Bool(false))
            })
            .filter(|(_, record)| evaluate(record, domain.terms()))
            .map(|(id, _)| *id)
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(ids)
    }

    fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> RpcResult<Vec<Record>> {
        self.log("read", model, ids);
        let tables = self.tables.borrow();
        let Some(table) = tables.get(model) else {
            return Ok(Vec::new());
        };

        Ok(ids
            .iter()
            .filter_map(|id| table.get(id))
            .map(|record| {
                if fields.is_empty() {
                    return record.clone();
                }
                let mut out = Record::new();
                out.insert("id".to_string(), record["id"].clone());
                for field in fields {
                    out.insert(
                        (*field).to_string(),
                        record.get(*field).cloned().unwrap_or(Value::Bool(false)),
                    );
                }
                out
            })
            .collect())
    }

    fn create(&self, model: &str, values: &Record) -> RpcResult<i64> {
        let mut tables = self.tables.borrow_mut();
        let table = tables.entry(model.to_string()).or_default();
        let id = table.keys().next_back().map_or(1, |last| last + 1);
        let mut record = normalize(values);
        record.insert("id".to_string(), json!(id));
        table.insert(id, record);
        drop(tables);
        self.log("create", model, &[id]);
        Ok(id)
    }

    fn write(&self, model: &str, ids: &[i64], values: &Record) -> RpcResult<()> {
        self.log("write", model, ids);
        let mut tables = self.tables.borrow_mut();
        let table = tables.entry(model.to_string()).or_default();
        for id in ids {
            let Some(record) = table.get_mut(id) else {
                return Err(RpcError::Server {
                    model: model.to_string(),
                    method: "write".to_string(),
                    message: format!("Record does not exist or has been deleted: {id}"),
                });
            };
            record.extend(normalize(values));
        }
        Ok(())
    }

    fn call(&self, model: &str, method: &str, ids: &[i64]) -> RpcResult<Value> {
        self.log(method, model, ids);
        let state = match method {
            "action_confirm" => "sale",
            "action_cancel" => "cancel",
            "action_draft" => "draft",
            "action_done" => "done",
            _ => return Ok(Value::Bool(true)),
        };
        let mut tables = self.tables.borrow_mut();
        if let Some(table) = tables.get_mut(model) {
            for id in ids {
                if let Some(record) = table.get_mut(id) {
                    record.insert("state".to_string(), json!(state));
                }
            }
        }
        Ok(Value::Bool(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_evaluates_domain_and_active() {
        let db = MemoryOdoo::new();
        db.insert("res.partner", 1, json!({"name": "Acme", "active": true}));
        db.insert("res.partner", 2, json!({"name": "Archived Acme", "active": false}));
        db.insert("res.partner", 3, json!({"name": "Other", "active": true}));

        let domain = Domain::leaf("name", "ilike", "acme");
        assert_eq!(db.search("res.partner", &domain, &SearchOptions::default()).unwrap(), vec![1]);
        assert_eq!(
            db.search("res.partner", &domain, &SearchOptions::default().with_inactive(true))
                .unwrap(),
            vec![1, 2]
        );

        let either = Domain::parse(r#"["|", ["id", "=", 1], ["id", "=", 3]]"#).unwrap();
        assert_eq!(db.search("res.partner", &either, &SearchOptions::default()).unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_create_normalizes_commands() {
        let db = MemoryOdoo::new();
        let mut values = Record::new();
        values.insert("tag_ids".into(), json!([[6, 0, [4, 5]]]));
        let id = db.create("res.partner", &values).unwrap();
        assert_eq!(db.get("res.partner", id).unwrap()["tag_ids"], json!([4, 5]));
    }
}
