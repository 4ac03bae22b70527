use chrono::Utc;
use nanoid::nanoid;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    prelude::DateTimeWithTimeZone,
};

use crate::{
    entities::{prelude::*, refresh_token},
    errors::ApiError,
};

/// Sole owner of refresh-token rows. The session manager never creates or
/// deletes rows directly; every mutation goes through this contract.
#[derive(Clone)]
pub struct RefreshTokenStore {
    db: DatabaseConnection,
}

impl RefreshTokenStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        user_id: &str,
        token: &str,
        expires_at: DateTimeWithTimeZone,
    ) -> Result<refresh_token::Model, ApiError> {
        let record = refresh_token::ActiveModel {
            id: Set(nanoid!()),
            user_id: Set(user_id.to_string()),
            token: Set(token.to_string()),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now().fixed_offset()),
        };

        Ok(record.insert(&self.db).await?)
    }

    pub async fn find_by_user_and_token(
        &self,
        user_id: &str,
        token: &str,
    ) -> Result<Option<refresh_token::Model>, ApiError> {
        Ok(RefreshToken::find()
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::Token.eq(token))
            .one(&self.db)
            .await?)
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<(), ApiError> {
        RefreshToken::delete_by_id(id).exec(&self.db).await?;
        Ok(())
    }

    pub async fn delete_all_by_user(&self, user_id: &str) -> Result<u64, ApiError> {
        let res = RefreshToken::delete_many()
            .filter(refresh_token::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        Ok(res.rows_affected)
    }

    /// A token is valid only if a row exists for (user, token) AND the row
    /// has not expired. An expired row found here is removed before the
    /// token is reported invalid.
    pub async fn is_valid(&self, user_id: &str, token: &str) -> Result<bool, ApiError> {
        let Some(record) = self.find_by_user_and_token(user_id, token).await? else {
            return Ok(false);
        };

        if record.expires_at < Utc::now() {
            self.delete_by_id(&record.id).await?;
            return Ok(false);
        }

        Ok(true)
    }
}
