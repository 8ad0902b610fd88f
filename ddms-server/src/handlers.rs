use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use ddms_core::store::ops::Mutation;
use ddms_model::Item;

use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Service banner.
pub async fn index_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "ddms",
        "version": env!("CARGO_PKG_VERSION"),
        "root": state.config.index.root_directory,
    }))
}

/// All indexed items, ordered by path.
pub async fn list_items_handler(State(state): State<AppState>) -> AppResult<Json<Vec<Item>>> {
    Ok(Json(state.store.list_items().await?))
}

/// Items still flagged as recently added.
pub async fn list_recent_handler(State(state): State<AppState>) -> AppResult<Json<Vec<Item>>> {
    Ok(Json(state.store.list_recent().await?))
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// Single-item lookup by root-relative path.
pub async fn item_by_path_handler(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> AppResult<Json<Item>> {
    if query.path.trim().is_empty() {
        return Err(AppError::bad_request("path must not be empty"));
    }
    match state.store.find_by_path(&query.path).await? {
        Some(item) => Ok(Json(item)),
        None => Err(AppError::not_found(format!("no item at {}", query.path))),
    }
}

/// Clear an item's "recently added" flag.
pub async fn mark_seen_handler(
    State(state): State<AppState>,
    Json(body): Json<PathQuery>,
) -> AppResult<Json<Value>> {
    let affected = state
        .store
        .mutate(Mutation::MarkSeen { path: body.path.clone() })
        .await?;
    if affected == 0 {
        return Err(AppError::not_found(format!("no item at {}", body.path)));
    }
    Ok(Json(json!({ "path": body.path, "seen": true })))
}

/// Index size summary.
pub async fn stats_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let total = state.store.count().await?;
    let recent = state.store.list_recent().await?.len();
    Ok(Json(json!({ "items": total, "recent": recent })))
}
