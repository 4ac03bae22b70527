use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use sea_orm::{
    ColumnTrait, EntityTrait, QueryFilter, prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    AppState,
    audit::AuditEntry,
    auth_guard,
    entities::{audit_log, prelude::*},
    errors::ApiError,
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateAuditLogBody {
    pub action: String,
    pub message: String,
    pub performed_by: String,
    pub target_entity: String,
    pub target: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogFilters {
    pub action: Option<String>,
    pub performed_by: Option<String>,
    pub target_entity: Option<String>,
    pub target: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogResponse {
    pub id: String,
    pub action: String,
    pub message: String,
    pub performed_by: String,
    pub target_entity: String,
    pub target: String,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTimeWithTimeZone,
}

impl From<audit_log::Model> for AuditLogResponse {
    fn from(row: audit_log::Model) -> Self {
        Self {
            id: row.id,
            action: row.action,
            message: row.message,
            performed_by: row.performed_by,
            target_entity: row.target_entity,
            target: row.target,
            timestamp: row.timestamp,
        }
    }
}

#[utoipa::path(
    post,
    tags = ["AuditLog"],
    description = "Create an audit log entry",
    path = "",
    request_body(content = CreateAuditLogBody, content_type = "application/json"),
    responses(
        (status = 201, description = "Audit log created successfully", body = AuditLogResponse),
    )
)]
pub async fn create_audit_log(
    State(state): State<AppState>,
    Json(body): Json<CreateAuditLogBody>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .audit
        .record(AuditEntry {
            action: body.action,
            message: body.message,
            performed_by: body.performed_by,
            target_entity: body.target_entity,
            target: body.target,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AuditLogResponse::from(row))))
}

#[utoipa::path(
    get,
    tags = ["AuditLog"],
    description = "List audit logs, filterable by action, performedBy, targetEntity and target",
    path = "",
    responses(
        (status = 200, description = "Audit logs fetched successfully", body = Vec<AuditLogResponse>),
    )
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(filters): Query<AuditLogFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let mut query = AuditLog::find();

    if let Some(action) = filters.action {
        query = query.filter(audit_log::Column::Action.eq(action));
    }
    if let Some(performed_by) = filters.performed_by {
        query = query.filter(audit_log::Column::PerformedBy.eq(performed_by));
    }
    if let Some(target_entity) = filters.target_entity {
        query = query.filter(audit_log::Column::TargetEntity.eq(target_entity));
    }
    if let Some(target) = filters.target {
        query = query.filter(audit_log::Column::Target.eq(target));
    }

    let rows = query.all(&state.db).await?;
    let responses: Vec<AuditLogResponse> = rows.into_iter().map(AuditLogResponse::from).collect();
    Ok((StatusCode::OK, Json(responses)))
}

#[utoipa::path(
    get,
    tags = ["AuditLog"],
    description = "Get an audit log entry by ID",
    path = "/{id}",
    responses(
        (status = 200, description = "Audit log fetched successfully", body = AuditLogResponse),
        (status = 404, description = "Audit log not found", body = String),
    )
)]
pub async fn get_audit_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let row = AuditLog::find_by_id(id.as_str())
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Audit log with ID \"{id}\" not found")))?;

    Ok((StatusCode::OK, Json(AuditLogResponse::from(row))))
}

pub fn audit_log_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit_logs).post(create_audit_log))
        .route("/{id}", get(get_audit_log))
        .route_layer(middleware::from_fn_with_state(
            state.token_issuer.clone(),
            auth_guard::require_auth,
        ))
}
