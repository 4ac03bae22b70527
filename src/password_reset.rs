use std::sync::Arc;

use chrono::{Duration, Utc};
use nanoid::nanoid;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

use crate::{
    argon_hasher::ArgonHasher,
    email_client::Notifier,
    entities::{prelude::*, user},
    errors::ApiError,
};

const OTP_TTL_MINUTES: i64 = 10;

fn gen_6_digit_code() -> String {
    const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
    nanoid!(6, &DIGITS)
}

/// One-time-code password reset. The code lives on the user row together
/// with its expiry and is cleared once a reset succeeds.
#[derive(Clone)]
pub struct PasswordResetFlow {
    db: DatabaseConnection,
    hasher: ArgonHasher,
    notifier: Arc<dyn Notifier>,
}

impl PasswordResetFlow {
    pub fn new(db: DatabaseConnection, hasher: ArgonHasher, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            hasher,
            notifier,
        }
    }

    pub async fn request_reset(&self, email: &str) -> Result<String, ApiError> {
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Email not found".to_string()))?;

        let otp = gen_6_digit_code();

        self.notifier
            .send_password_reset_otp(&user.email, &user.first_name, &otp)
            .await?;

        let mut active: user::ActiveModel = user.into();
        active.otp = Set(Some(otp));
        active.otp_expires_at = Set(Some(
            (Utc::now() + Duration::minutes(OTP_TTL_MINUTES)).fixed_offset(),
        ));
        active.update(&self.db).await?;

        Ok("OTP sent to your email".to_string())
    }

    pub async fn verify_and_reset(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<String, ApiError> {
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?;

        // Unknown user, wrong code and elapsed window all collapse into one
        // failure so the caller learns nothing about which check tripped.
        let code_ok = user.as_ref().is_some_and(|u| {
            u.otp.as_deref() == Some(otp)
                && u.otp_expires_at.is_some_and(|expiry| Utc::now() <= expiry)
        });
        let Some(user) = user.filter(|_| code_ok) else {
            return Err(ApiError::Unauthorized("Invalid or expired OTP".to_string()));
        };

        let hashed = self
            .hasher
            .hash(new_password.as_bytes())
            .await
            .map_err(|e| ApiError::Hash(e.to_string()))?;

        let mut active: user::ActiveModel = user.into();
        active.password = Set(hashed);
        active.otp = Set(None);
        active.otp_expires_at = Set(None);
        active.update(&self.db).await?;

        Ok("Password updated successfully".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, entities::sea_orm_active_enums::Role};
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_password_reset_otp(
            &self,
            email: &str,
            name: &str,
            otp: &str,
        ) -> Result<(), mail_send::Error> {
            self.sent
                .lock()
                .unwrap()
                .push((email.to_string(), name.to_string(), otp.to_string()));
            Ok(())
        }

        async fn send_profile_update_notice(
            &self,
            _email: &str,
            _name: &str,
            _content: &str,
        ) -> Result<(), mail_send::Error> {
            Ok(())
        }
    }

    fn sample_user(otp: Option<&str>, expires_in: Duration) -> user::Model {
        user::Model {
            id: "usr_1".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            user_name: None,
            email: "alice@example.com".to_string(),
            password: "$argon2id$stub".to_string(),
            role: Role::User,
            otp: otp.map(str::to_string),
            otp_expires_at: otp.map(|_| (Utc::now() + expires_in).fixed_offset()),
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn flow(db: sea_orm::DatabaseConnection, notifier: Arc<RecordingNotifier>) -> PasswordResetFlow {
        PasswordResetFlow::new(db, ArgonHasher::new(&Config::for_tests()), notifier)
    }

    #[test]
    fn test_code_is_six_digits() {
        for _ in 0..50 {
            let code = gen_6_digit_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_request_reset_unknown_email_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let notifier = Arc::new(RecordingNotifier::default());

        let err = flow(db, notifier.clone())
            .request_reset("nobody@example.com")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_reset_sends_code_and_persists_it() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user(None, Duration::zero())]])
            .append_query_results([vec![sample_user(Some("123456"), Duration::minutes(10))]])
            .into_connection();
        let notifier = Arc::new(RecordingNotifier::default());

        let message = flow(db, notifier.clone())
            .request_reset("alice@example.com")
            .await
            .unwrap();

        assert_eq!(message, "OTP sent to your email");

        let sent = notifier.sent.lock().unwrap();
        let (email, name, otp) = &sent[0];
        assert_eq!(email, "alice@example.com");
        assert_eq!(name, "Alice");
        assert_eq!(otp.len(), 6);
    }

    #[tokio::test]
    async fn test_verify_with_wrong_code_is_unauthorized() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user(Some("123456"), Duration::minutes(5))]])
            .into_connection();

        let err = flow(db, Arc::new(RecordingNotifier::default()))
            .verify_and_reset("alice@example.com", "999999", "new-password")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_verify_with_expired_code_is_unauthorized() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user(Some("123456"), -Duration::minutes(1))]])
            .into_connection();

        let err = flow(db, Arc::new(RecordingNotifier::default()))
            .verify_and_reset("alice@example.com", "123456", "new-password")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_verify_with_correct_code_updates_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user(Some("123456"), Duration::minutes(5))]])
            .append_query_results([vec![sample_user(None, Duration::zero())]])
            .into_connection();

        let message = flow(db, Arc::new(RecordingNotifier::default()))
            .verify_and_reset("alice@example.com", "123456", "new-password")
            .await
            .unwrap();

        assert_eq!(message, "Password updated successfully");
    }
}
