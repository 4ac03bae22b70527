#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};

    use crate::{
        argon_hasher::ArgonHasher,
        config::Config,
        entities::{refresh_token, sea_orm_active_enums::Role, user},
        errors::ApiError,
        refresh_token_store::RefreshTokenStore,
        session::{NewUser, SessionManager},
        token_issuer::TokenIssuer,
    };

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&Config::for_tests())
    }

    fn manager(db: &DatabaseConnection) -> SessionManager {
        let config = Config::for_tests();
        SessionManager::new(
            db.clone(),
            TokenIssuer::new(&config),
            RefreshTokenStore::new(db.clone()),
            ArgonHasher::new(&config),
        )
    }

    fn alice(password_hash: &str) -> user::Model {
        user::Model {
            id: "usr_alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            user_name: Some("alice".to_string()),
            email: "alice@example.com".to_string(),
            password: password_hash.to_string(),
            role: Role::User,
            otp: None,
            otp_expires_at: None,
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn session_row(token: &str, expires_in: Duration) -> refresh_token::Model {
        refresh_token::Model {
            id: "rt_1".to_string(),
            user_id: "usr_alice".to_string(),
            token: token.to_string(),
            expires_at: (Utc::now() + expires_in).fixed_offset(),
            created_at: Utc::now().fixed_offset(),
        }
    }

    async fn hash_of(password: &str) -> String {
        ArgonHasher::new(&Config::for_tests())
            .hash(password)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_returns_verifiable_token_pair() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // no user holds this email yet
            .append_query_results([Vec::<user::Model>::new()])
            // inserted user row
            .append_query_results([vec![alice("$argon2id$stub")]])
            // persisted refresh-token row
            .append_query_results([vec![session_row("pending", Duration::days(7))]])
            .into_connection();

        let tokens = manager(&db)
            .register(NewUser {
                first_name: "Alice".to_string(),
                last_name: "Smith".to_string(),
                user_name: Some("alice".to_string()),
                email: "alice@example.com".to_string(),
                password: "pw1".to_string(),
            })
            .await
            .unwrap();

        let access = issuer().verify_access(&tokens.access_token).unwrap();
        assert_eq!(access.sub, "usr_alice");
        assert_eq!(access.email, "alice@example.com");
        assert_eq!(access.role, "user");

        let refresh = issuer().verify_refresh(&tokens.refresh_token).unwrap();
        assert_eq!(refresh.sub, "usr_alice");
    }

    #[tokio::test]
    async fn test_register_with_taken_email_is_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![alice("$argon2id$stub")]])
            .into_connection();

        let err = manager(&db)
            .register(NewUser {
                first_name: "Alice".to_string(),
                last_name: "Smith".to_string(),
                user_name: None,
                email: "alice@example.com".to_string(),
                password: "pw1".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_issues_and_persists_tokens() {
        let hash = hash_of("pw1").await;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![alice(&hash)]])
            .append_query_results([vec![session_row("pending", Duration::days(7))]])
            .into_connection();

        let tokens = manager(&db).login("alice@example.com", "pw1").await.unwrap();

        let access = issuer().verify_access(&tokens.access_token).unwrap();
        assert_eq!(access.sub, "usr_alice");

        // find-by-email + refresh-token insert
        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let hash = hash_of("pw1").await;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let unknown_email = manager(&db)
            .login("nobody@example.com", "pw1")
            .await
            .unwrap_err();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![alice(&hash)]])
            .into_connection();
        let wrong_password = manager(&db)
            .login("alice@example.com", "pw2")
            .await
            .unwrap_err();

        // Same error kind for both, so callers cannot probe which emails
        // are registered.
        assert!(matches!(unknown_email, ApiError::Unauthorized(_)));
        assert!(matches!(wrong_password, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_get_identity_derives_full_name() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![alice("$argon2id$stub")]])
            .into_connection();

        let profile = manager(&db).get_identity("usr_alice").await.unwrap();
        assert_eq!(profile.full_name, "Alice Smith");
        assert_eq!(profile.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_get_identity_unknown_user_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();

        let err = manager(&db).get_identity("usr_ghost").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_refresh_issues_new_access_token() {
        let token = issuer().issue_refresh_token(&alice("$argon2id$stub")).unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![session_row(&token, Duration::days(3))]])
            .append_query_results([vec![alice("$argon2id$stub")]])
            .into_connection();

        let refreshed = manager(&db).refresh(&token).await.unwrap();

        let claims = issuer().verify_access(&refreshed.new_access_token).unwrap();
        assert_eq!(claims.sub, "usr_alice");
    }

    #[tokio::test]
    async fn test_same_refresh_token_works_repeatedly() {
        let token = issuer().issue_refresh_token(&alice("$argon2id$stub")).unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![session_row(&token, Duration::days(3))]])
            .append_query_results([vec![alice("$argon2id$stub")]])
            .append_query_results([vec![session_row(&token, Duration::days(3))]])
            .append_query_results([vec![alice("$argon2id$stub")]])
            .into_connection();

        let sessions = manager(&db);

        // Not rotated on use: the same token is accepted again until logout
        // or natural expiry.
        assert!(sessions.refresh(&token).await.is_ok());
        assert!(sessions.refresh(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_with_unsigned_token_is_unauthorized() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let err = manager(&db).refresh("not.a.token").await.unwrap_err();

        match err {
            ApiError::Unauthorized(message) => {
                assert!(message.starts_with("Could not refresh access token:"));
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_after_logout_is_unauthorized() {
        let token = issuer().issue_refresh_token(&alice("$argon2id$stub")).unwrap();

        // The store row is gone, as after an explicit logout.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<refresh_token::Model>::new()])
            .into_connection();

        let err = manager(&db).refresh(&token).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_refresh_with_expired_row_is_unauthorized_and_cleans_up() {
        let token = issuer().issue_refresh_token(&alice("$argon2id$stub")).unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![session_row(&token, -Duration::hours(1))]])
            .append_exec_results([MockExecResult {
                rows_affected: 1,
                ..Default::default()
            }])
            .into_connection();

        let err = manager(&db).refresh(&token).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        // The stale row was deleted as a side effect: lookup + delete.
        assert_eq!(db.into_transaction_log().len(), 2);
    }

    #[tokio::test]
    async fn test_logout_deletes_the_single_session() {
        let token = issuer().issue_refresh_token(&alice("$argon2id$stub")).unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![session_row(&token, Duration::days(3))]])
            .append_exec_results([MockExecResult {
                rows_affected: 1,
                ..Default::default()
            }])
            .into_connection();

        let message = manager(&db).logout(&token).await.unwrap();
        assert_eq!(message, "Logged out successfully");
    }

    #[tokio::test]
    async fn test_logout_with_unknown_token_is_unauthorized() {
        let token = issuer().issue_refresh_token(&alice("$argon2id$stub")).unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<refresh_token::Model>::new()])
            .into_connection();

        let err = manager(&db).logout(&token).await.unwrap_err();

        match err {
            ApiError::Unauthorized(message) => {
                assert!(message.starts_with("Could not logout:"));
            }
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_logout_all_sessions_deletes_every_row_for_the_user() {
        let token = issuer().issue_refresh_token(&alice("$argon2id$stub")).unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![session_row(&token, Duration::days(3))]])
            .append_exec_results([MockExecResult {
                rows_affected: 3,
                ..Default::default()
            }])
            .into_connection();

        let message = manager(&db).logout_all_sessions(&token).await.unwrap();
        assert_eq!(message, "Logged out successfully");

        // lookup + bulk delete for the owning user
        assert_eq!(db.into_transaction_log().len(), 2);
    }
}
