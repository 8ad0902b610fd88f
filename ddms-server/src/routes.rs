use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

/// Build the full application router. Thumbnails (and the documents
/// themselves) are served statically straight from the watched root.
pub fn router(state: AppState) -> Router {
    let static_root = state.config.index.root_directory.clone();

    Router::new()
        .route("/", get(handlers::index_handler))
        .route("/api/items", get(handlers::list_items_handler))
        .route("/api/items/recent", get(handlers::list_recent_handler))
        .route("/api/items/by-path", get(handlers::item_by_path_handler))
        .route("/api/items/seen", post(handlers::mark_seen_handler))
        .route("/api/stats", get(handlers::stats_handler))
        .nest_service("/static", ServeDir::new(static_root))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use ddms_config::Config;
    use ddms_core::store::ops::Mutation;
    use ddms_core::store::{broker, open_in_memory};
    use ddms_model::{ContentHash, Item};

    use super::*;

    async fn app() -> (Router, ddms_core::StoreHandle) {
        let conn = open_in_memory().await.unwrap();
        let (store, _task) = broker::spawn(conn, Duration::from_secs(5));
        let mut config = Config::default();
        config.index.root_directory = std::env::temp_dir();
        let state = AppState::new(store.clone(), Arc::new(config));
        (router(state), store)
    }

    #[tokio::test]
    async fn list_and_lookup_round_trip() {
        let (app, store) = app().await;
        store
            .mutate(Mutation::Insert(Item::captured(
                "a/x.txt".into(),
                ContentHash::of_bytes(b"x"),
                None,
            )))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(Request::get("/api/items").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/items/by-path?path=a/x.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/api/items/by-path?path=missing.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mark_seen_clears_recent() {
        let (app, store) = app().await;
        store
            .mutate(Mutation::Insert(Item::captured(
                "fresh.txt".into(),
                ContentHash::of_bytes(b"fresh"),
                None,
            )))
            .await
            .unwrap();
        assert_eq!(store.list_recent().await.unwrap().len(), 1);

        let response = app
            .oneshot(
                Request::post("/api/items/seen")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"path":"fresh.txt"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(store.list_recent().await.unwrap().is_empty());
    }
}
