use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    AppState,
    auth_guard::{self, CurrentUser},
    errors::ApiError,
    routes::MessageResponse,
    session::{NewUser, RefreshedToken, TokenPair, UserData},
};

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterBody {
    pub first_name: String,
    pub last_name: String,
    pub user_name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RefreshTokenBody {
    pub refresh_token: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordBody {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifyOtpBody {
    pub otp: String,
    pub email: String,
    pub new_password: String,
}

#[utoipa::path(
    post,
    tags = ["Auth"],
    description = "Register a new user",
    path = "/register",
    request_body(content = RegisterBody, content_type = "application/json"),
    responses(
        (status = 201, description = "User created successfully", body = TokenPair),
        (status = 409, description = "Email is already in use", body = String),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    let tokens = state
        .sessions
        .register(NewUser {
            first_name: body.first_name,
            last_name: body.last_name,
            user_name: body.user_name,
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(tokens)))
}

#[utoipa::path(
    post,
    tags = ["Auth"],
    description = "Log in with email and password",
    path = "/login",
    request_body(content = LoginBody, content_type = "application/json"),
    responses(
        (status = 200, description = "User successfully logged in", body = TokenPair),
        (status = 401, description = "Invalid credentials", body = String),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let tokens = state.sessions.login(&body.email, &body.password).await?;
    Ok((StatusCode::OK, Json(tokens)))
}

#[utoipa::path(
    get,
    tags = ["Auth"],
    description = "Get the logged-in user's profile",
    path = "/me",
    responses(
        (status = 200, description = "Identity profile", body = UserData),
        (status = 401, description = "Unauthorized", body = String),
    )
)]
pub async fn me(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.sessions.get_identity(&user.id).await?;
    Ok((StatusCode::OK, Json(profile)))
}

#[utoipa::path(
    post,
    tags = ["Auth"],
    description = "Exchange a refresh token for a new access token",
    path = "/refresh",
    request_body(content = RefreshTokenBody, content_type = "application/json"),
    responses(
        (status = 200, description = "New access token issued", body = RefreshedToken),
        (status = 401, description = "Invalid refresh token", body = String),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenBody>,
) -> Result<impl IntoResponse, ApiError> {
    let refreshed = state.sessions.refresh(&body.refresh_token).await?;
    Ok((StatusCode::OK, Json(refreshed)))
}

#[utoipa::path(
    post,
    tags = ["Auth"],
    description = "Log out the session behind the given refresh token",
    path = "/logout",
    request_body(content = RefreshTokenBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Invalid refresh token", body = String),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenBody>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.sessions.logout(&body.refresh_token).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(message))))
}

#[utoipa::path(
    post,
    tags = ["Auth"],
    description = "Log out every session of the token's owner, on all devices",
    path = "/logout-all",
    request_body(content = RefreshTokenBody, content_type = "application/json"),
    responses(
        (status = 200, description = "All sessions logged out", body = MessageResponse),
        (status = 401, description = "Invalid refresh token", body = String),
    )
)]
pub async fn logout_all(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenBody>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .sessions
        .logout_all_sessions(&body.refresh_token)
        .await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(message))))
}

#[utoipa::path(
    post,
    tags = ["Auth"],
    description = "Send a 6-digit password-reset code to the given email",
    path = "/forget-password",
    request_body(content = ForgotPasswordBody, content_type = "application/json"),
    responses(
        (status = 200, description = "OTP sent", body = MessageResponse),
        (status = 404, description = "Email not found", body = String),
    )
)]
pub async fn forget_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordBody>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.password_reset.request_reset(&body.email).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(message))))
}

#[utoipa::path(
    post,
    tags = ["Auth"],
    description = "Verify the reset code and set a new password",
    path = "/verify-otp",
    request_body(content = VerifyOtpBody, content_type = "application/json"),
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 401, description = "Invalid or expired OTP", body = String),
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.new_password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    let message = state
        .password_reset
        .verify_and_reset(&body.email, &body.otp, &body.new_password)
        .await?;
    Ok((StatusCode::OK, Json(MessageResponse::new(message))))
}

pub fn auth_router(state: &AppState) -> Router<AppState> {
    let protected = Router::new().route("/me", get(me)).route_layer(
        middleware::from_fn_with_state(state.token_issuer.clone(), auth_guard::require_auth),
    );

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/logout-all", post(logout_all))
        .route("/forget-password", post(forget_password))
        .route("/verify-otp", post(verify_otp))
        .merge(protected)
}
