use chrono::{Duration, Utc};
use nanoid::nanoid;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    SqlErr,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    argon_hasher::ArgonHasher,
    entities::{prelude::*, sea_orm_active_enums::Role, user},
    errors::ApiError,
    refresh_token_store::RefreshTokenStore,
    token_issuer::TokenIssuer,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedToken {
    pub new_access_token: String,
}

/// Identity profile returned to clients. Never carries the password hash.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: String,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub user_name: Option<String>,
    pub email: String,
    pub role: Role,
}

pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub user_name: Option<String>,
    pub email: String,
    pub password: String,
}

/// Orchestrates login, registration, token refresh and session revocation.
/// All refresh-token state changes go through the store contract.
#[derive(Clone)]
pub struct SessionManager {
    db: DatabaseConnection,
    tokens: TokenIssuer,
    refresh_tokens: RefreshTokenStore,
    hasher: ArgonHasher,
}

impl SessionManager {
    pub fn new(
        db: DatabaseConnection,
        tokens: TokenIssuer,
        refresh_tokens: RefreshTokenStore,
        hasher: ArgonHasher,
    ) -> Self {
        Self {
            db,
            tokens,
            refresh_tokens,
            hasher,
        }
    }

    /// Sign both tokens, then persist the refresh token. The row is written
    /// only after both signatures succeeded.
    async fn issue_session(&self, user: &user::Model) -> Result<TokenPair, ApiError> {
        let access_token = self.tokens.issue_access_token(user)?;
        let refresh_token = self.tokens.issue_refresh_token(user)?;

        let expires_at =
            (Utc::now() + Duration::days(self.tokens.refresh_token_days())).fixed_offset();
        self.refresh_tokens
            .create(&user.id, &refresh_token, expires_at)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub async fn register(&self, new_user: NewUser) -> Result<TokenPair, ApiError> {
        let existing = User::find()
            .filter(user::Column::Email.eq(&new_user.email))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(ApiError::Conflict("Email is already in use".to_string()));
        }

        let hashed = self
            .hasher
            .hash(new_user.password.as_bytes())
            .await
            .map_err(|e| ApiError::Hash(e.to_string()))?;

        let user = user::ActiveModel {
            id: Set(nanoid!()),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            user_name: Set(new_user.user_name),
            email: Set(new_user.email),
            password: Set(hashed),
            role: Set(Role::User),
            otp: Set(None),
            otp_expires_at: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let user = match user.insert(&self.db).await {
            Ok(user) => user,
            // A concurrent registration can slip past the lookup above; the
            // unique index on email turns the loser into the same conflict.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(ApiError::Conflict("Email is already in use".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        self.issue_session(&user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, ApiError> {
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid email".to_string()))?;

        let password_ok = self
            .hasher
            .verify(password.as_bytes(), &user.password)
            .await
            .unwrap_or(false);
        if !password_ok {
            return Err(ApiError::Unauthorized("Invalid password".to_string()));
        }

        self.issue_session(&user).await
    }

    pub async fn get_identity(&self, user_id: &str) -> Result<UserData, ApiError> {
        let user = User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        Ok(UserData {
            full_name: format!("{} {}", user.first_name, user.last_name),
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            user_name: user.user_name,
            email: user.email,
            role: user.role,
        })
    }

    /// Exchange a refresh token for a fresh access token. The refresh token
    /// itself is not rotated; it stays usable until its own expiry or an
    /// explicit logout.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        self.try_refresh(refresh_token).await.map_err(|e| {
            ApiError::Unauthorized(format!("Could not refresh access token: {e}"))
        })
    }

    async fn try_refresh(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        let claims = self.tokens.verify_refresh(refresh_token)?;

        if !self
            .refresh_tokens
            .is_valid(&claims.sub, refresh_token)
            .await?
        {
            return Err(ApiError::Unauthorized("Invalid refresh token".to_string()));
        }

        let user = User::find_by_id(claims.sub.as_str())
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        let new_access_token = self.tokens.issue_access_token(&user)?;

        Ok(RefreshedToken { new_access_token })
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<String, ApiError> {
        self.try_logout(refresh_token, false)
            .await
            .map_err(|e| ApiError::Unauthorized(format!("Could not logout: {e}")))
    }

    /// Revoke every session the owning user holds, across all devices.
    pub async fn logout_all_sessions(&self, refresh_token: &str) -> Result<String, ApiError> {
        self.try_logout(refresh_token, true)
            .await
            .map_err(|e| ApiError::Unauthorized(format!("Could not logout: {e}")))
    }

    async fn try_logout(&self, refresh_token: &str, everywhere: bool) -> Result<String, ApiError> {
        let claims = self.tokens.verify_refresh(refresh_token)?;

        let record = self
            .refresh_tokens
            .find_by_user_and_token(&claims.sub, refresh_token)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".to_string()))?;

        if everywhere {
            // Delete by the owner recorded on the matched row, not by the
            // token's claims.
            self.refresh_tokens
                .delete_all_by_user(&record.user_id)
                .await?;
        } else {
            self.refresh_tokens.delete_by_id(&record.id).await?;
        }

        Ok("Logged out successfully".to_string())
    }
}
