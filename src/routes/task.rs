use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, patch},
};
use chrono::Utc;
use nanoid::nanoid;
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::Set,
    ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    prelude::DateTimeWithTimeZone,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    AppState,
    audit::AuditEntry,
    auth_guard::{self, CurrentUser},
    entities::{
        prelude::*,
        sea_orm_active_enums::{Role, TaskPriority, TaskStatus},
        task, user,
    },
    errors::ApiError,
    routes::MessageResponse,
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTaskBody {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<String>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub due_date: Option<DateTimeWithTimeZone>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTaskBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub due_date: Option<DateTimeWithTimeZone>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssignTaskBody {
    pub assigned_to: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateTaskStatusBody {
    pub status: TaskStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilters {
    pub assigned_to: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

#[derive(Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub user_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub due_date: Option<DateTimeWithTimeZone>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub assigned_to: Option<UserSummary>,
    pub created_by: Option<UserSummary>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: DateTimeWithTimeZone,
}

async fn load_task(db: &DatabaseConnection, id: &str) -> Result<task::Model, ApiError> {
    Task::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))
}

async fn load_user(db: &DatabaseConnection, id: &str) -> Result<user::Model, ApiError> {
    User::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Resolve the referenced user ids in one query and attach first/last/user
/// names onto the task rows.
async fn present(
    db: &DatabaseConnection,
    tasks: Vec<task::Model>,
) -> Result<Vec<TaskResponse>, ApiError> {
    let mut ids: Vec<String> = Vec::new();
    for t in &tasks {
        ids.push(t.created_by.clone());
        if let Some(assigned) = &t.assigned_to {
            ids.push(assigned.clone());
        }
    }

    let mut users: HashMap<String, UserSummary> = HashMap::new();
    if !ids.is_empty() {
        for u in User::find()
            .filter(user::Column::Id.is_in(ids))
            .all(db)
            .await?
        {
            users.insert(
                u.id.clone(),
                UserSummary {
                    id: u.id,
                    first_name: u.first_name,
                    last_name: u.last_name,
                    user_name: u.user_name,
                },
            );
        }
    }

    Ok(tasks
        .into_iter()
        .map(|t| TaskResponse {
            assigned_to: t.assigned_to.as_ref().and_then(|id| users.get(id).cloned()),
            created_by: users.get(&t.created_by).cloned(),
            id: t.id,
            title: t.title,
            description: t.description,
            due_date: t.due_date,
            priority: t.priority,
            status: t.status,
            created_at: t.created_at,
            updated_at: t.updated_at,
        })
        .collect())
}

async fn present_one(
    db: &DatabaseConnection,
    task: task::Model,
) -> Result<TaskResponse, ApiError> {
    let mut responses = present(db, vec![task]).await?;
    Ok(responses.remove(0))
}

async fn record_task_audit(
    state: &AppState,
    action: &str,
    message: String,
    performed_by: &str,
    task_id: &str,
) -> Result<(), ApiError> {
    state
        .audit
        .record(AuditEntry {
            action: action.to_string(),
            message,
            performed_by: performed_by.to_string(),
            target_entity: "Task".to_string(),
            target: task_id.to_string(),
        })
        .await?;
    Ok(())
}

fn can_manage(user: &CurrentUser, task: &task::Model) -> bool {
    user.role == Role::Admin || task.created_by == user.id
}

#[utoipa::path(
    post,
    tags = ["Task"],
    description = "Create a new task",
    path = "",
    request_body(content = CreateTaskBody, content_type = "application/json"),
    responses(
        (status = 201, description = "Task created successfully", body = TaskResponse),
    )
)]
pub async fn create_task(
    user: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<CreateTaskBody>,
) -> Result<impl IntoResponse, ApiError> {
    let new_task = task::ActiveModel {
        id: Set(nanoid!()),
        title: Set(body.title),
        description: Set(body.description),
        due_date: Set(body.due_date),
        priority: Set(body.priority),
        status: Set(body.status.unwrap_or(TaskStatus::Pending)),
        assigned_to: Set(body.assigned_to),
        created_by: Set(user.id.clone()),
        created_at: Set(Utc::now().fixed_offset()),
        updated_at: Set(Utc::now().fixed_offset()),
    };

    let task = new_task.insert(&state.db).await?;

    record_task_audit(
        &state,
        "Task Created",
        format!("Task created with ID: {}", task.id),
        &user.id,
        &task.id,
    )
    .await?;

    let response = present_one(&state.db, task).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    tags = ["Task"],
    description = "List tasks, filterable by assignedTo, status and priority. Non-admins only see tasks they created.",
    path = "",
    responses(
        (status = 200, description = "Tasks fetched successfully", body = Vec<TaskResponse>),
    )
)]
pub async fn list_tasks(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(filters): Query<TaskFilters>,
) -> Result<impl IntoResponse, ApiError> {
    let mut query = Task::find();

    if let Some(assigned_to) = filters.assigned_to {
        query = query.filter(task::Column::AssignedTo.eq(assigned_to));
    }
    if user.role != Role::Admin {
        query = query.filter(task::Column::CreatedBy.eq(&user.id));
    }
    if let Some(status) = filters.status {
        query = query.filter(task::Column::Status.eq(status));
    }
    if let Some(priority) = filters.priority {
        query = query.filter(task::Column::Priority.eq(priority));
    }

    let tasks = query.all(&state.db).await?;
    let responses = present(&state.db, tasks).await?;
    Ok((StatusCode::OK, Json(responses)))
}

#[utoipa::path(
    get,
    tags = ["Task"],
    description = "Get a task by ID",
    path = "/{id}",
    responses(
        (status = 200, description = "Task fetched successfully", body = TaskResponse),
        (status = 404, description = "Task not found", body = String),
    )
)]
pub async fn get_task(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = load_task(&state.db, &id).await?;

    let is_assignee = task.assigned_to.as_deref() == Some(user.id.as_str());
    if !can_manage(&user, &task) && !is_assignee {
        return Err(ApiError::Unauthorized(
            "You are not authorized to view this task".to_string(),
        ));
    }

    let response = present_one(&state.db, task).await?;
    Ok((StatusCode::OK, Json(response)))
}

#[utoipa::path(
    put,
    tags = ["Task"],
    description = "Update a task",
    path = "/{id}",
    request_body(content = UpdateTaskBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Task updated successfully", body = TaskResponse),
        (status = 404, description = "Task not found", body = String),
    )
)]
pub async fn update_task(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTaskBody>,
) -> Result<impl IntoResponse, ApiError> {
    let task = load_task(&state.db, &id).await?;
    let task_id = task.id.clone();

    let mut active: task::ActiveModel = task.into();
    if let Some(title) = body.title {
        active.title = Set(title);
    }
    if let Some(description) = body.description {
        active.description = Set(Some(description));
    }
    if let Some(priority) = body.priority {
        active.priority = Set(priority);
    }
    if let Some(status) = body.status {
        active.status = Set(status);
    }
    if let Some(due_date) = body.due_date {
        active.due_date = Set(Some(due_date));
    }
    active.updated_at = Set(Utc::now().fixed_offset());

    let task = active.update(&state.db).await?;

    record_task_audit(
        &state,
        "Task Updated",
        format!("Task updated with ID: {task_id}"),
        &user.id,
        &task_id,
    )
    .await?;

    let response = present_one(&state.db, task).await?;
    Ok((StatusCode::OK, Json(response)))
}

#[utoipa::path(
    delete,
    tags = ["Task"],
    description = "Delete a task. Only admins or the task's creator may delete it.",
    path = "/{id}",
    responses(
        (status = 200, description = "Task deleted successfully", body = MessageResponse),
        (status = 403, description = "Access denied", body = String),
        (status = 404, description = "Task not found", body = String),
    )
)]
pub async fn delete_task(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = load_task(&state.db, &id).await?;

    if !can_manage(&user, &task) {
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }

    let task_id = task.id.clone();
    task.delete(&state.db).await?;

    record_task_audit(
        &state,
        "Task Deleted",
        format!("Task deleted with ID: {task_id}"),
        &user.id,
        &task_id,
    )
    .await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new("Task deleted successfully")),
    ))
}

#[utoipa::path(
    patch,
    tags = ["Task"],
    description = "Assign a task to a user. Only admins or the task's creator may assign it.",
    path = "/{id}/assign",
    request_body(content = AssignTaskBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Task assigned successfully", body = TaskResponse),
        (status = 403, description = "Access denied", body = String),
        (status = 404, description = "Task or user not found", body = String),
    )
)]
pub async fn assign_task(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AssignTaskBody>,
) -> Result<impl IntoResponse, ApiError> {
    let task = load_task(&state.db, &id).await?;
    let assignee = load_user(&state.db, &body.assigned_to).await?;

    if !can_manage(&user, &task) {
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }

    let task_id = task.id.clone();
    let mut active: task::ActiveModel = task.into();
    active.assigned_to = Set(Some(assignee.id));
    active.updated_at = Set(Utc::now().fixed_offset());
    let task = active.update(&state.db).await?;

    record_task_audit(
        &state,
        "Task Assigned",
        format!("Task assigned with ID: {task_id}"),
        &user.id,
        &task_id,
    )
    .await?;

    let response = present_one(&state.db, task).await?;
    Ok((StatusCode::OK, Json(response)))
}

#[utoipa::path(
    patch,
    tags = ["Task"],
    description = "Update a task's status. Only admins or the task's creator may change it.",
    path = "/{id}/status",
    request_body(content = UpdateTaskStatusBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Task status updated successfully", body = TaskResponse),
        (status = 403, description = "Access denied", body = String),
        (status = 404, description = "Task not found", body = String),
    )
)]
pub async fn update_task_status(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTaskStatusBody>,
) -> Result<impl IntoResponse, ApiError> {
    let task = load_task(&state.db, &id).await?;

    if !can_manage(&user, &task) {
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }

    let task_id = task.id.clone();
    let mut active: task::ActiveModel = task.into();
    active.status = Set(body.status);
    active.updated_at = Set(Utc::now().fixed_offset());
    let task = active.update(&state.db).await?;

    record_task_audit(
        &state,
        "Task Status Updated",
        format!("Task status updated with ID: {task_id}"),
        &user.id,
        &task_id,
    )
    .await?;

    let response = present_one(&state.db, task).await?;
    Ok((StatusCode::OK, Json(response)))
}

pub fn task_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route(
            "/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/{id}/assign", patch(assign_task))
        .route("/{id}/status", patch(update_task_status))
        .route_layer(middleware::from_fn_with_state(
            state.token_issuer.clone(),
            auth_guard::require_auth,
        ))
}
