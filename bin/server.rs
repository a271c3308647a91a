// Entity Field - Web Server
// REST API over one shared, in-memory field

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use entity_field::{
    read_csv_from, Entity, Field, FieldError, FieldStats, GroupChange, GroupSummary, LinkOutcome,
    LinkStats, TypeExport, TypeSummary, DEFAULT_GROUP_LIMIT,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

#[derive(Parser, Debug)]
#[command(name = "entity-field-server", version, about = "Entity field REST API")]
struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "ENTITY_FIELD_ADDR", default_value = "0.0.0.0:3000")]
    addr: String,

    /// CSV files imported at startup (comma separated in the env var)
    #[arg(long, env = "ENTITY_FIELD_SEED", value_delimiter = ',')]
    seed: Vec<PathBuf>,

    /// Main entity column for seed files
    #[arg(long, env = "ENTITY_FIELD_MAIN")]
    main: Option<String>,

    #[arg(long, env = "ENTITY_FIELD_LOG", default_value = "info")]
    log_level: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    field: Arc<RwLock<Field>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// FieldError → HTTP response with the error wrapper
struct ApiError(FieldError);

impl From<FieldError> for ApiError {
    fn from(err: FieldError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_lookup() => StatusCode::NOT_FOUND,
            e if e.is_schema() => StatusCode::BAD_REQUEST,
            FieldError::Csv(_) | FieldError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
        }
        (status, Json(ApiResponse::<()>::err(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

/// Entity with its group and direct neighbours
#[derive(Serialize)]
struct EntityResponse {
    id: String,
    entity_type: String,
    name: String,
    value: String,
    group: Option<String>,
    links: Vec<LinkedEntity>,
}

#[derive(Serialize)]
struct LinkedEntity {
    entity_type: String,
    value: String,
}

impl EntityResponse {
    fn build(field: &Field, entity: &Entity) -> Self {
        let links = field
            .neighbours(entity.id)
            .unwrap_or_default()
            .into_iter()
            .map(|other| LinkedEntity {
                entity_type: other.entity_type.clone(),
                value: other.value.clone(),
            })
            .collect();

        Self {
            id: entity.id.to_string(),
            entity_type: entity.entity_type.clone(),
            name: entity.name.clone(),
            value: entity.value.clone(),
            group: entity.group().map(|g| g.to_string()),
            links,
        }
    }
}

#[derive(Serialize)]
struct GroupDetail {
    #[serde(flatten)]
    summary: GroupSummary,
    members: Vec<EntityResponse>,
}

#[derive(Serialize)]
struct LinksResponse {
    by_type: LinkStats,
    types: Vec<TypeSummary>,
    most_linked: Option<String>,
}

#[derive(Deserialize)]
struct GroupsQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct ImportQuery {
    main: Option<String>,
}

#[derive(Deserialize)]
struct EntityRef {
    #[serde(rename = "type")]
    entity_type: String,
    value: String,
}

#[derive(Deserialize)]
struct LinkRequest {
    from: EntityRef,
    to: EntityRef,
}

#[derive(Serialize)]
struct LinkResponse {
    outcome: LinkOutcome,
    new_edge: bool,
    group: Option<String>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/stats - Field counters
async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<FieldStats>> {
    let field = state.field.read().await;
    Json(ApiResponse::ok(field.stats()))
}

/// GET /api/groups?limit=N - Largest groups first
async fn get_groups(
    State(state): State<AppState>,
    Query(query): Query<GroupsQuery>,
) -> Json<ApiResponse<Vec<GroupSummary>>> {
    let field = state.field.read().await;
    let limit = query.limit.unwrap_or(DEFAULT_GROUP_LIMIT);
    Json(ApiResponse::ok(field.list_groups(limit)))
}

/// GET /api/groups/:name - One group with every member
async fn get_group(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<GroupDetail> {
    let field = state.field.read().await;
    let group = field.group_by_name(&name)?;

    let members = group
        .members()
        .filter_map(|id| field.entity(id).ok())
        .map(|entity| EntityResponse::build(&field, entity))
        .collect();

    Ok(Json(ApiResponse::ok(GroupDetail {
        summary: field.group_summary(group),
        members,
    })))
}

/// GET /api/entities/:type/:value - One entity with its neighbours
async fn get_entity(
    State(state): State<AppState>,
    Path((entity_type, value)): Path<(String, String)>,
) -> ApiResult<EntityResponse> {
    // Decode URL-encoded values ("New%20York")
    let value = urlencoding::decode(&value)
        .unwrap_or_else(|_| value.clone().into())
        .into_owned();

    let field = state.field.read().await;
    let entity = field.find_entity(&entity_type, &value)?;
    Ok(Json(ApiResponse::ok(EntityResponse::build(&field, entity))))
}

/// GET /api/links - Cross-type link statistics
async fn get_links(State(state): State<AppState>) -> Json<ApiResponse<LinksResponse>> {
    let field = state.field.read().await;
    Json(ApiResponse::ok(LinksResponse {
        by_type: field.links_by_type(),
        types: field.type_summaries(),
        most_linked: field.most_linked_type(),
    }))
}

/// GET /api/export/:type - Export view of one type
async fn get_export(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
) -> Json<ApiResponse<TypeExport>> {
    let field = state.field.read().await;
    Json(ApiResponse::ok(field.entities_of_type(&entity_type)))
}

/// POST /api/import?main=COL - Import a CSV body
async fn post_import(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
    body: String,
) -> ApiResult<entity_field::ImportReport> {
    let batch = read_csv_from(body.as_bytes())?.with_source("upload");

    let mut field = state.field.write().await;
    let report = field.import_batch(&batch, query.main.as_deref())?;
    Ok(Json(ApiResponse::ok(report)))
}

/// POST /api/link - Link two values, creating them if needed
async fn post_link(
    State(state): State<AppState>,
    Json(request): Json<LinkRequest>,
) -> ApiResult<LinkResponse> {
    let mut field = state.field.write().await;
    let outcome = field.link_values(
        &request.from.entity_type,
        &request.from.value,
        &request.to.entity_type,
        &request.to.value,
    )?;

    let group = match outcome.group_change() {
        Some(change) => Some(change.group().to_string()),
        // Already linked: report the shared group
        None => field
            .find_entity(&request.from.entity_type, &request.from.value)?
            .group()
            .map(|g| g.to_string()),
    };

    if let Some(GroupChange::Merged { winner, absorbed }) = outcome.group_change() {
        info!("Group {} absorbed {}", winner, absorbed);
    }

    Ok(Json(ApiResponse::ok(LinkResponse {
        new_edge: outcome.is_new_edge(),
        outcome,
        group,
    })))
}

fn api_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/groups", get(get_groups))
        .route("/groups/:name", get(get_group))
        .route("/entities/:type/:value", get(get_entity))
        .route("/links", get(get_links))
        .route("/export/:type", get(get_export))
        .route("/import", post(post_import))
        .route("/link", post(post_link))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    println!("🌐 Entity Field - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut field = Field::new();
    for path in &config.seed {
        let report = field
            .import_csv(path, config.main.as_deref())
            .with_context(|| format!("Failed to seed from {}", path.display()))?;
        println!("✓ Seeded {}: {}", path.display(), report);
    }

    // Create shared state
    let state = AppState {
        field: Arc::new(RwLock::new(field)),
    };
    let app = api_router(state);

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr))?;

    println!("\n🚀 Server running on http://{}", config.addr);
    println!("   API: http://{}/api/groups", config.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let mut field = Field::new();
        field.link_values("Person", "Alice", "City", "New York").unwrap();
        field.link_values("Person", "Bob", "City", "New York").unwrap();
        AppState {
            field: Arc::new(RwLock::new(field)),
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_groups_and_group_detail() {
        let app = api_router(test_state());

        let (status, body) = send(app.clone(), get_request("/api/groups")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["name"], "G-0");
        assert_eq!(body["data"][0]["size"], 3);

        let (status, body) = send(app.clone(), get_request("/api/groups/G-0")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["members"].as_array().unwrap().len(), 3);

        let (status, body) = send(app, get_request("/api/groups/G-9")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_entity_lookup_decodes_value() {
        let app = api_router(test_state());

        let (status, body) = send(app.clone(), get_request("/api/entities/city/New%20York")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["entity_type"], "CITY");
        assert_eq!(body["data"]["links"].as_array().unwrap().len(), 2);

        let (status, _) = send(app, get_request("/api/entities/city/Paris")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_import_and_link() {
        let state = test_state();
        let app = api_router(state.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/api/import?main=Person")
            .body(Body::from("Person,City\nCarol,Rome\nDave,Rome\n"))
            .unwrap();
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["entities_created"], 3);
        assert_eq!(body["data"]["groups_created"], 1);

        let request = Request::builder()
            .method("POST")
            .uri("/api/link")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"from":{"type":"Person","value":"Carol"},"to":{"type":"Person","value":"Alice"}}"#,
            ))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["new_edge"], true);
        // Both groups have 3 members: Carol's side was named first and wins
        assert_eq!(body["data"]["group"], "G-1");

        let field = state.field.read().await;
        assert_eq!(field.group_count(), 1);
        assert!(field.audit().is_ok());
    }

    #[tokio::test]
    async fn test_import_rejects_single_column() {
        let app = api_router(test_state());

        let request = Request::builder()
            .method("POST")
            .uri("/api/import")
            .body(Body::from("Person\nAlice\n"))
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("not enough columns"));
    }
}
