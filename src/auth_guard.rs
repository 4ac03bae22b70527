use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use sea_orm::ActiveEnum;

use crate::{entities::sea_orm_active_enums::Role, errors::ApiError, token_issuer::TokenIssuer};

/// Identity attached to the request by `require_auth`. This extension is the
/// only channel by which identity reaches handlers; no credential-store
/// lookup happens per request, so staleness is bounded by the access-token
/// expiry.
#[derive(Clone)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized. Please sign in".to_string()))
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Bearer-token gate. Verifies the access token against the issuer alone and
/// requires a role from the allowed set before letting the request through.
pub async fn require_auth(
    State(issuer): State<TokenIssuer>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let token = bearer_token(&request)
            .ok_or_else(|| ApiError::Unauthorized("No authorization header".to_string()))?;
        issuer.verify_access(token)?
    };

    let role = Role::try_from_value(&claims.role).map_err(|_| {
        ApiError::Unauthorized("Access restricted to authorized users".to_string())
    })?;

    request.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        email: claims.email,
        role,
    });

    Ok(next.run(request).await)
}

/// Companion role gate for admin-only routes; layer it after `require_auth`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized. Please sign in".to_string()))?;

    if user.role != Role::Admin {
        return Err(ApiError::Forbidden("Access denied".to_string()));
    }

    Ok(next.run(request).await)
}
