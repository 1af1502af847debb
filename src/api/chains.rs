/// Chain registry endpoints
use crate::context::AppContext;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub name: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListChainsResponse {
    pub default_chain: String,
    pub chains: Vec<ChainInfo>,
}

/// List registered chains
pub async fn list_chains(State(ctx): State<AppContext>) -> Json<ListChainsResponse> {
    let chains = ctx
        .registry
        .handles()
        .map(|handle| ChainInfo {
            name: handle.name().to_string(),
            endpoint: handle.endpoint().to_string(),
            descriptor: ctx.descriptor(handle.name()).map(str::to_string),
        })
        .collect();

    Json(ListChainsResponse {
        default_chain: ctx.registry.default_chain().to_string(),
        chains,
    })
}

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/chains", get(list_chains))
}
