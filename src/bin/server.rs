//! Categoria Server - read-only HTTP API over one category snapshot.
//!
//! Loads the category dump once, serves the tree view and the flat paginated
//! table from that same snapshot, and swaps in a fresh snapshot on
//! `POST /refresh`. Readers never see a half-refreshed state.
//!
//! Usage:
//!   CATEGORIA_RECORDS=/path/to/categories.json CATEGORIA_BIND=127.0.0.1:3742 categoria-server
//!
//! Or with args:
//!   categoria-server --records /path/to/categories.json --bind 0.0.0.0:3742

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use categoria_lib::catalog::{parse_records, Category, CategoryId};
use categoria_lib::query::{CategoryQuery, Page, SortDirective, StatusFilter};
use categoria_lib::snapshot::{CategoryDetail, CategorySnapshot, SnapshotStats};
use categoria_lib::{init_logging, settings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

// ============================================================================
// AppState
// ============================================================================

#[derive(Clone)]
struct AppState {
    snapshot: Arc<RwLock<Arc<CategorySnapshot>>>,
    source: PathBuf,
    start_time: Instant,
}

impl AppState {
    /// Current snapshot; the lock is only held long enough to clone the Arc
    async fn current(&self) -> Arc<CategorySnapshot> {
        self.snapshot.read().await.clone()
    }
}

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug)]
struct AppError(StatusCode, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({"error": self.1}))).into_response()
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError(StatusCode::INTERNAL_SERVER_ERROR, s)
    }
}

fn not_found(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::NOT_FOUND, msg.into())
}

fn bad_request(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::BAD_REQUEST, msg.into())
}

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    search: Option<String>,
    status: Option<String>,
    parent_id: Option<CategoryId>,
    sort: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

impl ListParams {
    fn to_query(&self) -> Result<CategoryQuery, AppError> {
        let status = match self.status.as_deref() {
            Some(s) => s.parse::<StatusFilter>().map_err(|e| bad_request(e.to_string()))?,
            None => StatusFilter::All,
        };
        let sort = match self.sort.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(s.parse::<SortDirective>().map_err(|e| bad_request(e.to_string()))?),
            None => settings::default_sort(),
        };

        Ok(CategoryQuery {
            search: self.search.clone(),
            status,
            parent_id: self.parent_id,
            sort,
            page: self.page.unwrap_or(1),
            page_size: self.page_size.unwrap_or_else(settings::default_page_size_setting),
        })
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    version: String,
    source: String,
    loaded_at: String,
    uptime_secs: u64,
    stats: SnapshotStats,
}

#[derive(Serialize)]
struct RefreshResponse {
    categories: usize,
    rejected: usize,
    loaded_at: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.current().await;
    Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        source: state.source.display().to_string(),
        loaded_at: snapshot.loaded_at().to_rfc3339(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        stats: snapshot.stats(),
    })
}

async fn tree_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Category>>, AppError> {
    let query = params.to_query()?;
    let snapshot = state.current().await;
    Ok(Json(snapshot.tree_view(&query)))
}

async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Category>>, AppError> {
    let query = params.to_query()?;
    let snapshot = state.current().await;
    Ok(Json(snapshot.table_page(&query)))
}

async fn get_category_handler(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<Json<CategoryDetail>, AppError> {
    let snapshot = state.current().await;
    snapshot
        .detail(id)
        .map(Json)
        .ok_or_else(|| not_found(format!("Category {} not found", id)))
}

async fn refresh_handler(State(state): State<AppState>) -> Result<Json<RefreshResponse>, AppError> {
    // Build off-lock, then swap
    let fresh = load_snapshot(&state.source).await?;
    let response = RefreshResponse {
        categories: fresh.records().len(),
        rejected: fresh.rejected().len(),
        loaded_at: fresh.loaded_at().to_rfc3339(),
    };
    *state.snapshot.write().await = Arc::new(fresh);

    tracing::info!(categories = response.categories, rejected = response.rejected, "snapshot refreshed");
    Ok(Json(response))
}

async fn load_snapshot(path: &std::path::Path) -> Result<CategorySnapshot, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let raw = parse_records(&content)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    Ok(CategorySnapshot::from_raw(&raw))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        return;
    }
    tracing::info!("shutting down");
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/categories", get(list_handler))
        .route("/categories/tree", get(tree_handler))
        .route("/categories/{id}", get(get_category_handler))
        .route("/refresh", post(refresh_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Parse simple args (no clap to keep binary small)
    let args: Vec<String> = std::env::args().collect();
    let mut records_arg: Option<&str> = None;
    let mut bind_arg: Option<&str> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--records" if i + 1 < args.len() => {
                records_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--bind" if i + 1 < args.len() => {
                bind_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--verbose" | "-v" => {
                verbose = true;
                i += 1;
            }
            "--help" | "-h" => {
                println!("categoria-server - category tree HTTP API");
                println!();
                println!("Usage: categoria-server [--records PATH] [--bind ADDR:PORT] [--verbose]");
                println!();
                println!("Environment variables:");
                println!("  {}  Category dump path", settings::RECORDS_ENV);
                println!("  {}     Bind address (default: 127.0.0.1:3742)", settings::BIND_ENV);
                std::process::exit(0);
            }
            _ => { i += 1; }
        }
    }

    init_logging(if verbose { "categoria_lib=debug,info" } else { "info" });
    settings::init(settings::default_data_dir());

    let bind_addr = bind_arg
        .map(|s| s.to_string())
        .unwrap_or_else(settings::bind_addr);

    let Some(source) = records_arg.map(PathBuf::from).or_else(|| settings::get_records_path().map(PathBuf::from)) else {
        tracing::error!("no category dump configured: pass --records or set {}", settings::RECORDS_ENV);
        std::process::exit(1);
    };

    let snapshot = match load_snapshot(&source).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        source = %source.display(),
        categories = snapshot.records().len(),
        rejected = snapshot.rejected().len(),
        "loaded category snapshot"
    );

    let state = AppState {
        snapshot: Arc::new(RwLock::new(Arc::new(snapshot))),
        source,
        start_time: Instant::now(),
    };

    // Bind and serve
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("listening on {}", bind_addr);
    if let Err(e) = axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DUMP: &str = r#"{"data": [
        {"id": 1, "parent_id": null, "name": "Bath", "is_active": true},
        {"id": 2, "parent_id": 1, "name": "Soap Bars", "is_active": false},
        {"id": 3, "parent_id": 1, "name": "Shampoo", "is_active": true},
        {"id": 4, "parent_id": 99, "name": "Orphan"}
    ]}"#;

    fn state_for(file: &tempfile::NamedTempFile) -> AppState {
        let raw = parse_records(DUMP).unwrap();
        AppState {
            snapshot: Arc::new(RwLock::new(Arc::new(CategorySnapshot::from_raw(&raw)))),
            source: file.path().to_path_buf(),
            start_time: Instant::now(),
        }
    }

    fn dump_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DUMP.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_tree_endpoint_filters_by_status() {
        let file = dump_file();
        let params = ListParams { status: Some("active".into()), ..ListParams::default() };

        let Json(forest) = tree_handler(State(state_for(&file)), Query(params)).await.unwrap();
        let roots: Vec<CategoryId> = forest.iter().map(|c| c.id).collect();
        assert_eq!(roots, vec![1, 4]);
        assert_eq!(forest[0].children.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn test_list_endpoint_paginates() {
        let file = dump_file();
        let params = ListParams { page: Some(2), page_size: Some(3), ..ListParams::default() };

        let Json(page) = list_handler(State(state_for(&file)), Query(params)).await.unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items.iter().map(|c| c.id).collect::<Vec<_>>(), vec![4]);
    }

    #[tokio::test]
    async fn test_bad_sort_is_400() {
        let file = dump_file();
        let params = ListParams { sort: Some("colour".into()), ..ListParams::default() };

        let err = list_handler(State(state_for(&file)), Query(params)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_category_is_404() {
        let file = dump_file();
        let err = get_category_handler(State(state_for(&file)), Path(42)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let Json(detail) = get_category_handler(State(state_for(&file)), Path(3)).await.unwrap();
        assert_eq!(detail.category.name, "Shampoo");
        assert_eq!(detail.ancestors.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);
        assert_eq!(detail.child_count, 0);
    }

    #[tokio::test]
    async fn test_refresh_survives_wrong_typed_entries() {
        let file = dump_file();
        let state = state_for(&file);
        std::fs::write(
            file.path(),
            r#"[{"id": 10, "name": "Garden", "created_at": 1714557600}, null, {"id": 11, "parent_id": 10, "name": "Hoses", "description": 3}]"#,
        )
        .unwrap();

        let Json(refreshed) = refresh_handler(State(state.clone())).await.unwrap();
        assert_eq!(refreshed.categories, 2);
        assert_eq!(refreshed.rejected, 1);
    }

    #[tokio::test]
    async fn test_refresh_swaps_snapshot() {
        let file = dump_file();
        let state = state_for(&file);

        std::fs::write(file.path(), r#"[{"id": 10, "name": "Garden"}]"#).unwrap();

        let Json(refreshed) = refresh_handler(State(state.clone())).await.unwrap();
        assert_eq!(refreshed.categories, 1);

        let Json(forest) = tree_handler(State(state), Query(ListParams::default())).await.unwrap();
        assert_eq!(forest.iter().map(|c| c.id).collect::<Vec<_>>(), vec![10]);
    }
}
