//! Odoo JSON-RPC client.
//!
//! Talks to the `/jsonrpc` endpoint that every Odoo since 8.0 exposes:
//! `common.login` authenticates, `common.version` identifies the server, and
//! `object.execute_kw` runs model methods. The client owns a tokio runtime
//! and blocks on each request so the synchronization layer can stay
//! synchronous (dependency resolution recurses freely).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use super::{Domain, OdooRpc, Record, RpcError, RpcResult, SearchOptions};

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: ServiceCall<'a>,
    id: u64,
}

#[derive(Debug, Serialize)]
struct ServiceCall<'a> {
    service: &'a str,
    method: &'a str,
    args: Value,
}

/// JSON-RPC response envelope.
///
/// `result: null` is a valid answer (methods returning `None`) and is kept
/// as `Some(Value::Null)`; only a missing member is `None`.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default, deserialize_with = "present")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
    #[serde(default)]
    data: Option<JsonRpcErrorData>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorData {
    #[serde(default)]
    message: Option<String>,
}

impl JsonRpcError {
    /// The most specific message available (Odoo puts the useful one in `data`).
    fn into_message(self) -> String {
        self.data
            .and_then(|d| d.message)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.message)
    }
}

/// Authenticated JSON-RPC connection to one Odoo database.
pub struct JsonRpcClient {
    runtime: tokio::runtime::Runtime,
    client: reqwest::Client,
    endpoint: String,
    database: String,
    password: String,
    uid: i64,
    lang: Option<String>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

impl JsonRpcClient {
    /// Connect and authenticate.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or the credentials are
    /// rejected.
    pub fn connect(
        url: &str,
        database: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> RpcResult<Self> {
        let runtime = tokio::runtime::Runtime::new().map_err(RpcError::Runtime)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let mut this = Self {
            runtime,
            client,
            endpoint: format!("{}/jsonrpc", url.trim_end_matches('/')),
            database: database.to_string(),
            password: password.to_string(),
            uid: 0,
            lang: None,
            next_id: AtomicU64::new(1),
        };

        let uid = this.call_service("common", "login", json!([database, username, password]))?;
        match uid.as_i64() {
            Some(uid) if uid > 0 => this.uid = uid,
            _ => {
                return Err(RpcError::Authentication {
                    database: database.to_string(),
                    username: username.to_string(),
                });
            }
        }

        debug!(endpoint = %this.endpoint, database, uid = this.uid, "Connected to Odoo");
        Ok(this)
    }

    /// Set the language passed in the context of every call.
    #[must_use]
    pub fn with_lang(mut self, lang: Option<&str>) -> Self {
        self.lang = lang.map(str::to_string);
        self
    }

    /// The authenticated user id.
    #[must_use]
    pub fn uid(&self) -> i64 {
        self.uid
    }

    /// The `server_version` string reported by `common.version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the field is missing.
    pub fn server_version(&self) -> RpcResult<String> {
        let info = self.call_service("common", "version", json!([]))?;
        info.get("server_version")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RpcError::Protocol("version info without server_version".to_string()))
    }

    fn call_service(&self, service: &str, method: &str, args: Value) -> RpcResult<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "call",
            params: ServiceCall {
                service,
                method,
                args,
            },
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        trace!(service, method, id = request.id, "JSON-RPC request");

        let response: JsonRpcResponse = self.runtime.block_on(async {
            self.client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        })?;

        if let Some(error) = response.error {
            return Err(RpcError::Server {
                model: service.to_string(),
                method: method.to_string(),
                message: error.into_message(),
            });
        }

        response
            .result
            .ok_or_else(|| RpcError::Protocol(format!("{service}.{method} returned no result")))
    }

    fn execute_kw(&self, model: &str, method: &str, args: Value, kwargs: Value) -> RpcResult<Value> {
        let args = json!([self.database, self.uid, self.password, model, method, args, kwargs]);
        self.call_service("object", "execute_kw", args)
            .map_err(|e| match e {
                RpcError::Server { message, .. } => RpcError::Server {
                    model: model.to_string(),
                    method: method.to_string(),
                    message,
                },
                other => other,
            })
    }

    fn context(&self, include_inactive: bool) -> Value {
        let mut context = serde_json::Map::new();
        if let Some(lang) = &self.lang {
            context.insert("lang".to_string(), Value::String(lang.clone()));
        }
        if include_inactive {
            context.insert("active_test".to_string(), Value::Bool(false));
        }
        Value::Object(context)
    }
}

impl OdooRpc for JsonRpcClient {
    fn search(&self, model: &str, domain: &Domain, options: &SearchOptions) -> RpcResult<Vec<i64>> {
        let mut kwargs = json!({
            "offset": options.offset,
            "context": self.context(options.include_inactive),
        });
        if let Some(limit) = options.limit {
            kwargs["limit"] = json!(limit);
        }
        if let Some(order) = &options.order {
            kwargs["order"] = json!(order);
        }

        let result = self.execute_kw(model, "search", json!([domain]), kwargs)?;
        let ids = result
            .as_array()
            .ok_or_else(|| RpcError::Protocol(format!("{model}.search did not return a list")))?;
        Ok(ids.iter().filter_map(Value::as_i64).collect())
    }

    fn read(&self, model: &str, ids: &[i64], fields: &[&str]) -> RpcResult<Vec<Record>> {
        let kwargs = json!({
            "fields": fields,
            "context": self.context(true),
        });
        let result = self.execute_kw(model, "read", json!([ids]), kwargs)?;
        let Value::Array(rows) = result else {
            return Err(RpcError::Protocol(format!("{model}.read did not return a list")));
        };

        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect())
    }

    fn create(&self, model: &str, values: &Record) -> RpcResult<i64> {
        let kwargs = json!({ "context": self.context(false) });
        let result = self.execute_kw(model, "create", json!([values]), kwargs)?;
        // Odoo >= 12 may return a list when given a list of dicts
        let id = match &result {
            Value::Array(ids) => ids.first().and_then(Value::as_i64),
            other => other.as_i64(),
        };
        id.ok_or_else(|| RpcError::Protocol(format!("{model}.create returned {result}")))
    }

    fn write(&self, model: &str, ids: &[i64], values: &Record) -> RpcResult<()> {
        let kwargs = json!({ "context": self.context(false) });
        self.execute_kw(model, "write", json!([ids, values]), kwargs)?;
        Ok(())
    }

    fn call(&self, model: &str, method: &str, ids: &[i64]) -> RpcResult<Value> {
        let kwargs = json!({ "context": self.context(false) });
        self.execute_kw(model, method, json!([ids]), kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn login_mock(server: &mut mockito::ServerGuard, uid: Value) -> mockito::Mock {
        server
            .mock("POST", "/jsonrpc")
            .match_body(Matcher::PartialJson(json!({"params": {"service": "common", "method": "login"}})))
            .with_header("content-type", "application/json")
            .with_body(json!({"jsonrpc": "2.0", "id": 1, "result": uid}).to_string())
            .create()
    }

    #[test]
    fn test_connect_and_search() {
        let mut server = mockito::Server::new();
        let login = login_mock(&mut server, json!(2));
        let search = server
            .mock("POST", "/jsonrpc")
            .match_body(Matcher::PartialJson(json!({
                "params": {"service": "object", "method": "execute_kw", "args": ["db", 2, "secret", "res.partner", "search"]}
            })))
            .with_header("content-type", "application/json")
            .with_body(json!({"jsonrpc": "2.0", "id": 2, "result": [4, 9]}).to_string())
            .create();

        let client =
            JsonRpcClient::connect(&server.url(), "db", "admin", "secret", Duration::from_secs(5)).unwrap();
        assert_eq!(client.uid(), 2);

        let ids = client
            .search("res.partner", &Domain::leaf("name", "ilike", "acme"), &SearchOptions::default())
            .unwrap();
        assert_eq!(ids, vec![4, 9]);

        login.assert();
        search.assert();
    }

    #[test]
    fn test_rejected_login() {
        let mut server = mockito::Server::new();
        let _login = login_mock(&mut server, json!(false));

        let err = JsonRpcClient::connect(&server.url(), "db", "admin", "wrong", Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, RpcError::Authentication { .. }));
    }

    #[test]
    fn test_null_result_is_a_value() {
        let mut server = mockito::Server::new();
        let _login = login_mock(&mut server, json!(2));
        let _call = server
            .mock("POST", "/jsonrpc")
            .match_body(Matcher::PartialJson(json!({
                "params": {"service": "object", "args": ["db", 2, "secret", "sale.order", "action_draft"]}
            })))
            .with_header("content-type", "application/json")
            .with_body(json!({"jsonrpc": "2.0", "id": 2, "result": null}).to_string())
            .create();

        let client =
            JsonRpcClient::connect(&server.url(), "db", "admin", "secret", Duration::from_secs(5)).unwrap();
        assert_eq!(client.call("sale.order", "action_draft", &[1]).unwrap(), Value::Null);
    }

    #[test]
    fn test_missing_result_is_a_protocol_error() {
        let mut server = mockito::Server::new();
        let _login = login_mock(&mut server, json!(2));
        let _call = server
            .mock("POST", "/jsonrpc")
            .match_body(Matcher::PartialJson(json!({"params": {"service": "object"}})))
            .with_header("content-type", "application/json")
            .with_body(json!({"jsonrpc": "2.0", "id": 2}).to_string())
            .create();

        let client =
            JsonRpcClient::connect(&server.url(), "db", "admin", "secret", Duration::from_secs(5)).unwrap();
        let err = client.call("sale.order", "action_draft", &[1]).unwrap_err();
        assert!(matches!(err, RpcError::Protocol(_)));
    }

    #[test]
    fn test_server_error_carries_model_and_message() {
        let mut server = mockito::Server::new();
        let _login = login_mock(&mut server, json!(2));
        let _write = server
            .mock("POST", "/jsonrpc")
            .match_body(Matcher::PartialJson(json!({"params": {"service": "object"}})))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 2,
                    "error": {
                        "code": 200,
                        "message": "Odoo Server Error",
                        "data": {"name": "odoo.exceptions.ValidationError", "message": "Name is required"}
                    }
                })
                .to_string(),
            )
            .create();

        let client =
            JsonRpcClient::connect(&server.url(), "db", "admin", "secret", Duration::from_secs(5)).unwrap();
        let err = client.write("sale.order", &[1], &Record::new()).unwrap_err();
        match err {
            RpcError::Server { model, method, message } => {
                assert_eq!(model, "sale.order");
                assert_eq!(method, "write");
                assert_eq!(message, "Name is required");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
