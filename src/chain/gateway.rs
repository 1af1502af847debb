/// HTTP chain gateway - JSON access to a Substrate API Sidecar-compatible service
use crate::{
    chain::{
        ChainError, ChainHandle, ChainResult, PalletSurface, QuerySurface, StorageEntry,
        StorageItem, StorageMethod,
    },
    config::ChainConfig,
    error::{IdentityError, IdentityResult},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Pallets described when a gateway handle builds its query surface
const DEFAULT_DESCRIBED_PALLETS: &[&str] = &["Identity"];

/// Chain handle backed by an HTTP gateway
pub struct GatewayChainHandle {
    name: String,
    endpoint: String,
    http_client: Client,
    pallets: Vec<String>,
    surface: OnceCell<Arc<QuerySurface>>,
}

impl GatewayChainHandle {
    /// Create a new gateway handle
    ///
    /// No network traffic happens here; the surface is fetched on first use.
    pub fn new(name: &str, config: &ChainConfig, timeout: Duration) -> IdentityResult<Self> {
        let http_client = Client::builder()
            .user_agent(concat!("identity-lens/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: name.to_string(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            http_client,
            pallets: DEFAULT_DESCRIBED_PALLETS.iter().map(|p| p.to_string()).collect(),
            surface: OnceCell::new(),
        })
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> ChainResult<(StatusCode, Value)> {
        debug!("Gateway GET {} {:?}", url, query);

        let response = self
            .http_client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                ChainError::Transport(format!("Failed to reach gateway {}: {}", self.name, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Ok((status, Value::Null));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| ChainError::Malformed(format!("Invalid gateway body: {}", e)))?;

        Ok((status, body))
    }

    async fn fetch_pallet(&self, pallet: &str) -> ChainResult<PalletSurface> {
        let url = format!(
            "{}/pallets/{}/storage",
            self.endpoint,
            urlencoding::encode(pallet)
        );

        let (status, body) = self.get_json(&url, &[]).await?;

        // Sidecar answers 400 for pallets the runtime does not include
        if status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND {
            debug!("Chain {} does not expose pallet {}", self.name, pallet);
            return Ok(PalletSurface::new(pallet));
        }
        if !status.is_success() {
            return Err(ChainError::Status(status.as_u16()));
        }

        Ok(parse_pallet_listing(pallet, &body))
    }

    async fn fetch_surface(&self) -> ChainResult<Arc<QuerySurface>> {
        let mut surface = QuerySurface::new();
        for pallet in &self.pallets {
            surface.insert_pallet(self.fetch_pallet(pallet).await?);
        }
        debug!(
            "Chain {} surface loaded: {:?}",
            self.name,
            surface.pallet_names()
        );
        Ok(Arc::new(surface))
    }
}

#[async_trait]
impl ChainHandle for GatewayChainHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn query_surface(&self) -> ChainResult<Arc<QuerySurface>> {
        self.surface
            .get_or_try_init(|| self.fetch_surface())
            .await
            .cloned()
    }

    async fn storage_value(
        &self,
        pallet: &str,
        item: &str,
        key: &str,
    ) -> ChainResult<Option<Value>> {
        let url = format!(
            "{}/pallets/{}/storage/{}",
            self.endpoint,
            urlencoding::encode(pallet),
            urlencoding::encode(item)
        );

        let (status, body) = self.get_json(&url, &[("keys[]", key.to_string())]).await?;
        if !status.is_success() {
            return Err(ChainError::Status(status.as_u16()));
        }

        let response: StorageValueResponse = serde_json::from_value(body)
            .map_err(|e| ChainError::Malformed(format!("Invalid storage response: {}", e)))?;

        Ok(response.value.filter(|v| !v.is_null()))
    }

    async fn storage_entries(
        &self,
        pallet: &str,
        item: &str,
        limit: usize,
    ) -> ChainResult<Vec<StorageEntry>> {
        let url = format!(
            "{}/pallets/{}/storage/{}/entries",
            self.endpoint,
            urlencoding::encode(pallet),
            urlencoding::encode(item)
        );

        let (status, body) = self.get_json(&url, &[("limit", limit.to_string())]).await?;
        if !status.is_success() {
            return Err(ChainError::Status(status.as_u16()));
        }

        let response: StorageEntriesResponse = serde_json::from_value(body)
            .map_err(|e| ChainError::Malformed(format!("Invalid entries response: {}", e)))?;

        let mut entries = Vec::with_capacity(response.entries.len().min(limit));
        for raw in response.entries.into_iter().take(limit) {
            match entry_key(&raw.key) {
                Some(key) => entries.push(StorageEntry {
                    key,
                    value: raw.value,
                }),
                None => warn!(
                    "Skipping {}.{} entry with unreadable key: {}",
                    pallet, item, raw.key
                ),
            }
        }

        Ok(entries)
    }
}

#[derive(Debug, Deserialize)]
struct StorageValueResponse {
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StorageEntriesResponse {
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    key: Value,
    #[serde(default)]
    value: Value,
}

/// Entry keys come back either bare or as the list of map keys
fn entry_key(key: &Value) -> Option<String> {
    match key {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(parts) => parts.first().and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Build a pallet surface from a gateway storage listing
///
/// Anything that does not look like a storage item is ignored rather than
/// rejected; an unexpected shape simply means the item is not offered.
pub(crate) fn parse_pallet_listing(pallet: &str, body: &Value) -> PalletSurface {
    let mut surface = PalletSurface::new(pallet);

    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return surface;
    };

    for item in items {
        let parsed = match item {
            // `onlyIds=true` listings carry names without type information
            Value::String(name) => Some(StorageItem {
                name: name.clone(),
                methods: vec![StorageMethod::Get],
            }),
            Value::Object(fields) => {
                let name = fields.get("name").and_then(Value::as_str);
                let kind = fields
                    .get("type")
                    .and_then(Value::as_object)
                    .and_then(|t| t.keys().next().cloned());

                match (name, kind.as_deref()) {
                    (Some(name), Some("map" | "doubleMap" | "nMap")) => Some(StorageItem {
                        name: name.to_string(),
                        methods: vec![StorageMethod::Get, StorageMethod::Entries],
                    }),
                    (Some(name), Some("plain")) => Some(StorageItem {
                        name: name.to_string(),
                        methods: vec![StorageMethod::Get],
                    }),
                    _ => None,
                }
            }
            _ => None,
        };

        if let Some(storage_item) = parsed {
            surface.insert(storage_item);
        }
    }

    surface
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query},
        http::StatusCode as AxumStatus,
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serve a router on an ephemeral port and return its base URL
    async fn spawn_gateway(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn handle_for(url: &str) -> GatewayChainHandle {
        let config = ChainConfig {
            endpoint: url.to_string(),
            descriptor: "people".to_string(),
        };
        GatewayChainHandle::new("people", &config, Duration::from_secs(5)).unwrap()
    }

    fn people_router(surface_calls: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/pallets/:pallet/storage",
                get(move |Path(pallet): Path<String>| {
                    let surface_calls = surface_calls.clone();
                    async move {
                        surface_calls.fetch_add(1, Ordering::SeqCst);
                        if pallet != "Identity" {
                            return (AxumStatus::BAD_REQUEST, Json(json!({"error": "no pallet"})));
                        }
                        (
                            AxumStatus::OK,
                            Json(json!({
                                "pallet": "identity",
                                "items": [
                                    {"name": "IdentityOf", "type": {"map": {"key": "1"}}},
                                    {"name": "Registrars", "type": {"plain": {"value": "2"}}},
                                    {"bogus": true}
                                ]
                            })),
                        )
                    }
                }),
            )
            .route(
                "/pallets/:pallet/storage/:item",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    match params.get("keys[]").map(String::as_str) {
                        Some("14alice") => Json(json!({
                            "value": {
                                "info": {"display": {"raw": "0x416c696365"}},
                                "judgements": []
                            }
                        })),
                        _ => Json(json!({"value": null})),
                    }
                }),
            )
            .route(
                "/pallets/:pallet/storage/:item/entries",
                get(|| async {
                    Json(json!({
                        "entries": [
                            {"key": ["14alice"], "value": {"info": {"display": {"raw": "Alice"}}}},
                            {"key": "14bob", "value": {"info": {"display": {"raw": "Bob"}}}},
                            {"key": 42, "value": null}
                        ]
                    }))
                }),
            )
    }

    #[test]
    fn test_parse_pallet_listing() {
        let body = json!({
            "items": [
                {"name": "IdentityOf", "type": {"map": {}}},
                {"name": "SubsOf", "type": {"nMap": {}}},
                {"name": "Registrars", "type": {"plain": {}}},
                {"name": "Weird", "type": "map"},
                "Usernames"
            ]
        });

        let surface = parse_pallet_listing("Identity", &body);
        assert!(surface.item("IdentityOf").unwrap().supports(StorageMethod::Entries));
        assert!(surface.item("SubsOf").unwrap().supports(StorageMethod::Entries));
        assert!(!surface.item("Registrars").unwrap().supports(StorageMethod::Entries));
        assert!(surface.item("Weird").is_none());
        assert!(surface.item("Usernames").unwrap().supports(StorageMethod::Get));
    }

    #[test]
    fn test_parse_malformed_listing_is_empty() {
        assert!(parse_pallet_listing("Identity", &json!({"items": "nope"})).is_empty());
        assert!(parse_pallet_listing("Identity", &json!(null)).is_empty());
    }

    #[tokio::test]
    async fn test_surface_is_fetched_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let url = spawn_gateway(people_router(calls.clone())).await;
        let handle = handle_for(&url);

        let surface = handle.query_surface().await.unwrap();
        assert!(surface.item("Identity", "IdentityOf").is_some());
        let _ = handle.query_surface().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_pallet_gives_empty_surface() {
        let router = Router::new().route(
            "/pallets/:pallet/storage",
            get(|| async { (AxumStatus::BAD_REQUEST, Json(json!({"error": "no pallet"}))) }),
        );
        let url = spawn_gateway(router).await;
        let handle = handle_for(&url);

        let surface = handle.query_surface().await.unwrap();
        assert!(surface.pallet("Identity").is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_transport_failure() {
        let router = Router::new().route(
            "/pallets/:pallet/storage",
            get(|| async { AxumStatus::INTERNAL_SERVER_ERROR }),
        );
        let url = spawn_gateway(router).await;
        let handle = handle_for(&url);

        let err = handle.query_surface().await.unwrap_err();
        assert!(matches!(err, ChainError::Status(500)));
    }

    #[tokio::test]
    async fn test_storage_value_lookup() {
        let url = spawn_gateway(people_router(Arc::new(AtomicUsize::new(0)))).await;
        let handle = handle_for(&url);

        let value = handle
            .storage_value("Identity", "IdentityOf", "14alice")
            .await
            .unwrap();
        assert!(value.is_some());

        let missing = handle
            .storage_value("Identity", "IdentityOf", "14nobody")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_storage_entries_skip_unreadable_keys() {
        let url = spawn_gateway(people_router(Arc::new(AtomicUsize::new(0)))).await;
        let handle = handle_for(&url);

        let entries = handle
            .storage_entries("Identity", "IdentityOf", 500)
            .await
            .unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["14alice", "14bob"]);
    }

    #[tokio::test]
    async fn test_unreachable_gateway() {
        let handle = handle_for("http://127.0.0.1:1");
        let err = handle.query_surface().await.unwrap_err();
        assert!(matches!(err, ChainError::Transport(_)));
    }
}
