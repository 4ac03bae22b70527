use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch},
};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, SqlErr};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::{
    AppState,
    auth_guard::{self, CurrentUser},
    entities::{prelude::*, sea_orm_active_enums::Role, user},
    errors::ApiError,
    session::UserData,
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EditProfileBody {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub user_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCountResponse {
    pub deleted_count: u64,
}

fn to_user_data(user: user::Model) -> UserData {
    UserData {
        full_name: format!("{} {}", user.first_name, user.last_name),
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        user_name: user.user_name,
        email: user.email,
        role: user.role,
    }
}

#[utoipa::path(
    get,
    tags = ["User"],
    description = "List every user. Admin only.",
    path = "",
    responses(
        (status = 200, description = "Users fetched successfully", body = Vec<UserData>),
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = User::find().all(&state.db).await?;
    let users: Vec<UserData> = users.into_iter().map(to_user_data).collect();
    Ok((StatusCode::OK, Json(users)))
}

#[utoipa::path(
    get,
    tags = ["User"],
    description = "Get the logged-in user's profile",
    path = "/me",
    responses(
        (status = 200, description = "Identity profile", body = UserData),
    )
)]
pub async fn me_profile(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.sessions.get_identity(&user.id).await?;
    Ok((StatusCode::OK, Json(profile)))
}

#[utoipa::path(
    patch,
    tags = ["User"],
    description = "Edit profile fields (firstName, lastName, userName, email). Changes are reported to the account's email.",
    path = "/{id}",
    request_body(content = EditProfileBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Profile updated successfully", body = UserData),
        (status = 404, description = "User not found", body = String),
    )
)]
pub async fn edit_profile(
    current: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<EditProfileBody>,
) -> Result<impl IntoResponse, ApiError> {
    if current.role != Role::Admin && current.id != id {
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }

    let user = User::find_by_id(id.as_str())
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let mut changes: Vec<String> = Vec::new();
    if let Some(first_name) = &body.first_name
        && *first_name != user.first_name
    {
        changes.push(format!(
            "firstName was updated from '{}' to '{first_name}'",
            user.first_name
        ));
    }
    if let Some(last_name) = &body.last_name
        && *last_name != user.last_name
    {
        changes.push(format!(
            "lastName was updated from '{}' to '{last_name}'",
            user.last_name
        ));
    }
    if let Some(user_name) = &body.user_name
        && Some(user_name.as_str()) != user.user_name.as_deref()
    {
        changes.push(format!(
            "userName was updated from '{}' to '{user_name}'",
            user.user_name.as_deref().unwrap_or("")
        ));
    }
    if let Some(email) = &body.email
        && *email != user.email
    {
        changes.push(format!(
            "email was updated from '{}' to '{email}'",
            user.email
        ));
    }

    let mut active: user::ActiveModel = user.into();
    if let Some(first_name) = body.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = body.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(user_name) = body.user_name {
        active.user_name = Set(Some(user_name));
    }
    if let Some(email) = body.email {
        active.email = Set(email);
    }

    let updated = match active.update(&state.db).await {
        Ok(updated) => updated,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(ApiError::Conflict("Email is already in use".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if !changes.is_empty() {
        let content = format!(
            "The following changes were made to your profile:\n\n{}",
            changes.join("\n")
        );
        // The profile change is already persisted; a failed notice should
        // not fail the request.
        if let Err(e) = state
            .notifier
            .send_profile_update_notice(&updated.email, &updated.first_name, &content)
            .await
        {
            warn!(
                "Failed to send profile update notice to {}: {e}",
                updated.email
            );
        }
    }

    Ok((StatusCode::OK, Json(to_user_data(updated))))
}

#[utoipa::path(
    delete,
    tags = ["User"],
    description = "Delete every user. Admin only.",
    path = "/all",
    responses(
        (status = 200, description = "Users deleted", body = DeletedCountResponse),
    )
)]
pub async fn delete_all_users(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let res = User::delete_many().exec(&state.db).await?;
    Ok((
        StatusCode::OK,
        Json(DeletedCountResponse {
            deleted_count: res.rows_affected,
        }),
    ))
}

pub fn user_router(state: &AppState) -> Router<AppState> {
    let admin_only = Router::new()
        .route("/", get(list_users))
        .route("/all", delete(delete_all_users))
        .route_layer(middleware::from_fn(auth_guard::require_admin));

    Router::new()
        .route("/me", get(me_profile))
        .route("/{id}", patch(edit_profile))
        .merge(admin_only)
        .route_layer(middleware::from_fn_with_state(
            state.token_issuer.clone(),
            auth_guard::require_auth,
        ))
}
