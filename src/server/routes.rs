use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::{
    domain::code,
    library::{self, CreateNode, Reconciliation},
    Code, Level, Node,
};

pub(super) fn router() -> Router<AppState> {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/codes/generate", post(generate))
        .route("/api/codes/validate", post(validate))
        .route("/api/codes/{code}/exists", get(exists))
        .route("/api/maintenance/reconcile", post(reconcile));

    for level in Level::ALL {
        let collection = format!("/api/{}", level.plural());
        let member = format!("{collection}/{{code}}");
        router = router
            .route(
                &collection,
                post(
                    move |state: State<AppState>,
                          payload: Result<Json<CreateRequest>, JsonRejection>| {
                        create(state, level, payload)
                    },
                )
                .get(
                    move |state: State<AppState>,
                          query: Result<Query<ListQuery>, QueryRejection>| {
                        list(state, level, query)
                    },
                ),
            )
            .route(
                &member,
                delete(move |state: State<AppState>, code: Path<String>| {
                    deactivate(state, level, code)
                }),
            );
    }

    router
}

fn bad_request(rejection: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(rejection.to_string())
}

fn level_from(value: i64) -> Result<Level, ApiError> {
    Level::try_from(value).map_err(|e| library::Error::from(e).into())
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    level: i64,
    parent_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    code: Code,
}

/// POST /api/codes/generate
/// Propose the next free code; nothing is reserved
async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_request)?;
    let level = level_from(request.level)?;

    let code = state
        .run(move |library| library.generate_code(level, request.parent_code.as_deref()))
        .await?;

    Ok(Json(GenerateResponse { code }))
}

#[derive(Debug, Deserialize)]
struct ValidateRequest {
    code: String,
    level: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sort_key: Option<u64>,
    parent_code: String,
}

/// POST /api/codes/validate
async fn validate(
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let Json(request) = payload.map_err(bad_request)?;
    let level = level_from(request.level)?;

    let valid = code::validate_code(&request.code, level);
    let sort_key = if valid {
        code::sort_key(&request.code).ok()
    } else {
        None
    };

    Ok(Json(ValidateResponse {
        valid,
        sort_key,
        parent_code: code::parent_code(&request.code),
    }))
}

#[derive(Debug, Deserialize)]
struct ExistsQuery {
    level: i64,
}

#[derive(Debug, Serialize)]
struct ExistsResponse {
    exists: bool,
}

/// GET /api/codes/{code}/exists?level=N
async fn exists(
    State(state): State<AppState>,
    Path(code): Path<String>,
    query: Result<Query<ExistsQuery>, QueryRejection>,
) -> Result<Json<ExistsResponse>, ApiError> {
    let Query(query) = query.map_err(bad_request)?;
    let level = level_from(query.level)?;

    let exists = state
        .run(move |library| library.code_exists(&code, level))
        .await?;

    Ok(Json(ExistsResponse { exists }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    #[serde(default)]
    name: String,
    description: Option<String>,
    code: Option<String>,
    parent_code: Option<String>,
}

impl From<CreateRequest> for CreateNode {
    fn from(request: CreateRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
            code: request.code,
            parent_code: request.parent_code,
        }
    }
}

/// POST /api/{divisions,sections,assemblies,items}
/// Create a row, allocating its code unless one is supplied
async fn create(
    State(state): State<AppState>,
    level: Level,
    payload: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let Json(request) = payload.map_err(bad_request)?;

    let node = state
        .run(move |library| library.create(level, request.into()))
        .await?;

    Ok((StatusCode::CREATED, Json(node)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    parent_code: Option<String>,
    #[serde(default)]
    include_inactive: bool,
}

/// GET /api/{divisions,sections,assemblies,items}?parentCode=&includeInactive=
async fn list(
    State(state): State<AppState>,
    level: Level,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Node>>, ApiError> {
    let Query(query) = query.map_err(bad_request)?;

    let nodes = state
        .run(move |library| {
            library.list(level, query.parent_code.as_deref(), query.include_inactive)
        })
        .await?;

    Ok(Json(nodes))
}

/// DELETE /api/{divisions,sections,assemblies,items}/{code}
/// Soft-delete a row that has no active children
async fn deactivate(
    State(state): State<AppState>,
    level: Level,
    Path(code): Path<String>,
) -> Result<Json<Node>, ApiError> {
    let code = Code::parse(&code, level).map_err(library::Error::from)?;

    let node = state
        .run(move |library| library.deactivate(&code))
        .await?;

    Ok(Json(node))
}

#[derive(Debug, Deserialize)]
struct ReconcileQuery {
    #[serde(default)]
    apply: bool,
}

/// POST /api/maintenance/reconcile?apply=bool
/// Report duplicate rows, merging them when `apply` is set
async fn reconcile(
    State(state): State<AppState>,
    query: Result<Query<ReconcileQuery>, QueryRejection>,
) -> Result<Json<Reconciliation>, ApiError> {
    let Query(query) = query.map_err(bad_request)?;

    let report = state
        .run(move |library| library.reconcile(query.apply))
        .await?;

    Ok(Json(report))
}
