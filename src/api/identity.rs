/// Identity API endpoints
/// Resolves single addresses and searches identities by display name
use crate::{api::envelope, context::AppContext, error::IdentityResult};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct IdentityParams {
    /// Registry name; the default chain when omitted
    pub chain: Option<String>,
    /// `false` answers at once, `pending` while uncached (default: true)
    pub wait: Option<bool>,
    /// `false` reports the cached state only and never touches the chain
    pub fetch: Option<bool>,
}

/// GET /api/identity/of/:address
///
/// Identity registered for an address
pub async fn identity_of(
    State(ctx): State<AppContext>,
    Path(address): Path<String>,
    Query(params): Query<IdentityParams>,
) -> Response {
    let chain = params.chain.as_deref();

    let state = if params.fetch == Some(false) {
        ctx.queries.peek_identity(&address, chain).await
    } else {
        ctx.queries
            .identity_of(&address, chain, params.wait.unwrap_or(true))
            .await
    };
    envelope(state)
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Display-name fragment
    pub q: Option<String>,
    pub chain: Option<String>,
    /// Truncates the ranked results
    pub limit: Option<usize>,
    pub wait: Option<bool>,
}

/// GET /api/identity/search
///
/// Identities whose display name contains the query
pub async fn search_identities(
    State(ctx): State<AppContext>,
    Query(params): Query<SearchParams>,
) -> Response {
    let state = ctx
        .queries
        .search(
            params.q.as_deref(),
            params.chain.as_deref(),
            params.wait.unwrap_or(true),
        )
        .await;

    let state = match params.limit {
        Some(limit) => state.map(|results| results.into_iter().take(limit).collect::<Vec<_>>()),
        None => state,
    };
    envelope(state)
}

#[derive(Debug, Deserialize)]
pub struct InvalidateParams {
    pub chain: Option<String>,
    /// Drop only this address's identity
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub evicted: usize,
}

/// POST /api/identity/invalidate
///
/// Without parameters every cached query is dropped
pub async fn invalidate(
    State(ctx): State<AppContext>,
    Query(params): Query<InvalidateParams>,
) -> IdentityResult<Json<InvalidateResponse>> {
    let evicted = match (params.address.as_deref(), params.chain.as_deref()) {
        (Some(address), chain) => ctx.queries.invalidate_identity(address, chain).await? as usize,
        (None, Some(chain)) => ctx.queries.invalidate_chain(Some(chain)).await?,
        (None, None) => ctx.queries.clear().await,
    };

    Ok(Json(InvalidateResponse { evicted }))
}

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/identity/of/:address", get(identity_of))
        .route("/api/identity/search", get(search_identities))
        .route("/api/identity/invalidate", post(invalidate))
}

#[cfg(test)]
mod tests {
    use crate::chain::{memory::MemoryChain, ChainHandle};
    use crate::{context::test_context, server::build_router};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    const ALICE: &str = "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5";

    fn people_chain() -> MemoryChain {
        MemoryChain::with_identity("people")
            .insert_display(ALICE, "Alice")
            .insert_display("5joanna", "Joanna")
            .insert_display("3annika", "Annika")
            .insert_display("9ann", "Ann")
    }

    fn app_with(chains: Vec<Arc<dyn ChainHandle>>) -> Router {
        build_router(test_context(chains))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_identity_of_success() {
        let app = app_with(vec![Arc::new(people_chain()) as Arc<dyn ChainHandle>]);

        let (status, json) = send(app, get(&format!("/api/identity/of/{}", ALICE))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["address"], ALICE);
        assert_eq!(json["data"]["displayName"], "Alice");
        assert!(json.get("updatedAt").is_some());
    }

    #[tokio::test]
    async fn test_identity_of_unsupported_chain_is_null() {
        let app = app_with(vec![
            Arc::new(people_chain()) as Arc<dyn ChainHandle>,
            Arc::new(MemoryChain::without_identity("polkadot")) as Arc<dyn ChainHandle>,
        ]);

        let uri = format!("/api/identity/of/{}?chain=polkadot", ALICE);
        let (status, json) = send(app, get(&uri)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_identity_of_error_statuses() {
        let app = app_with(vec![Arc::new(people_chain()) as Arc<dyn ChainHandle>]);

        let (status, json) = send(app.clone(), get("/api/identity/of/%20")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "InvalidInput");

        let uri = format!("/api/identity/of/{}?chain=kusama", ALICE);
        let (status, json) = send(app, get(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["kind"], "UnknownChain");
    }

    #[tokio::test]
    async fn test_identity_of_connection_reset_is_bad_gateway() {
        let chain = Arc::new(people_chain().fail_always());
        let app = app_with(vec![chain as Arc<dyn ChainHandle>]);

        let (status, json) = send(app, get(&format!("/api/identity/of/{}", ALICE))).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "ResolutionError");
    }

    #[tokio::test]
    async fn test_search_ranking_and_limit() {
        let app = app_with(vec![Arc::new(people_chain()) as Arc<dyn ChainHandle>]);

        let (status, json) = send(app.clone(), get("/api/identity/search?q=ann")).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["displayName"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Ann", "Annika", "Joanna"]);
        assert_eq!(json["data"][0]["rank"], "exact");

        let (_, json) = send(app, get("/api/identity/search?q=ann&limit=1")).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_empty_query() {
        let chain = Arc::new(people_chain());
        let app = app_with(vec![chain.clone() as Arc<dyn ChainHandle>]);

        let (status, json) = send(app, get("/api/identity/search?q=")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], serde_json::json!([]));
        assert_eq!(chain.transport_calls(), 0);
    }

    #[tokio::test]
    async fn test_identity_of_without_wait_is_pending() {
        let chain = Arc::new(people_chain().with_delay(Duration::from_millis(20)));
        let app = app_with(vec![chain.clone() as Arc<dyn ChainHandle>]);
        let uri = format!("/api/identity/of/{}?wait=false", ALICE);

        let (status, json) = send(app.clone(), get(&uri)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json, serde_json::json!({"status": "pending"}));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let (status, json) = send(app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["displayName"], "Alice");
        assert_eq!(chain.lookup_calls(), 1);
    }

    #[tokio::test]
    async fn test_identity_of_cached_only() {
        let chain = Arc::new(people_chain());
        let app = app_with(vec![chain.clone() as Arc<dyn ChainHandle>]);
        let cached_only = format!("/api/identity/of/{}?fetch=false", ALICE);

        let (status, json) = send(app.clone(), get(&cached_only)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["status"], "pending");
        assert_eq!(chain.transport_calls(), 0);

        send(app.clone(), get(&format!("/api/identity/of/{}", ALICE))).await;
        let calls = chain.transport_calls();

        let (status, json) = send(app, get(&cached_only)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["displayName"], "Alice");
        assert_eq!(chain.transport_calls(), calls);
    }

    #[tokio::test]
    async fn test_search_without_wait_is_pending() {
        let chain = Arc::new(people_chain().with_delay(Duration::from_millis(20)));
        let app = app_with(vec![chain.clone() as Arc<dyn ChainHandle>]);

        let (status, json) = send(app.clone(), get("/api/identity/search?q=ann&wait=false")).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["status"], "pending");

        tokio::time::sleep(Duration::from_millis(200)).await;
        let (status, json) = send(app, get("/api/identity/search?q=ann&wait=false")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"].as_array().unwrap().len(), 3);
        assert_eq!(chain.entries_calls(), 1);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let chain = Arc::new(people_chain());
        let app = app_with(vec![chain.clone() as Arc<dyn ChainHandle>]);

        send(app.clone(), get(&format!("/api/identity/of/{}", ALICE))).await;
        send(app.clone(), get("/api/identity/search?q=ann")).await;

        let post = |uri: &str| Request::post(uri).body(Body::empty()).unwrap();

        let (status, json) =
            send(app.clone(), post("/api/identity/invalidate?chain=kusama")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["kind"], "UnknownChain");

        let (status, json) =
            send(app.clone(), post("/api/identity/invalidate?chain=people")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["evicted"], 2);

        send(app.clone(), get(&format!("/api/identity/of/{}", ALICE))).await;
        assert_eq!(chain.lookup_calls(), 2);

        let (_, json) = send(app, post("/api/identity/invalidate")).await;
        assert_eq!(json["evicted"], 1);
    }
}
