use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};

use crate::{config::Config, entities::user, errors::ApiError};

/// Claims carried by an access token. The role travels as its database
/// string value so the guard can check it against the allowed set.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Stateless signer/verifier for both token kinds. Revocation lives in the
/// refresh-token store, never in the token format.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_minutes: i64,
    refresh_token_days: i64,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_token_minutes: config.access_token_minutes,
            refresh_token_days: config.refresh_token_days,
        }
    }

    pub fn refresh_token_days(&self) -> i64 {
        self.refresh_token_days
    }

    pub fn issue_access_token(&self, user: &user::Model) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            role: user.role.to_value(),
            exp: (now + Duration::minutes(self.access_token_minutes)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Token(format!("jwt encode: {e}")))
    }

    pub fn issue_refresh_token(&self, user: &user::Model) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user.id.clone(),
            exp: (now + Duration::days(self.refresh_token_days)).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Token(format!("jwt encode: {e}")))
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, ApiError> {
        decode::<AccessClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ApiError::Unauthorized(format!("Invalid or expired token: {e}")))
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, ApiError> {
        decode::<RefreshClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::sea_orm_active_enums::Role;

    fn sample_user() -> user::Model {
        user::Model {
            id: "usr_1".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Smith".to_string(),
            user_name: Some("alice".to_string()),
            email: "alice@example.com".to_string(),
            password: "$argon2id$stub".to_string(),
            role: Role::User,
            otp: None,
            otp_expires_at: None,
            created_at: "2026-01-01T00:00:00+00:00".parse().unwrap(),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let issuer = TokenIssuer::new(&Config::for_tests());
        let user = sample_user();

        let token = issuer.issue_access_token(&user).unwrap();
        let claims = issuer.verify_access(&token).unwrap();

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, "user");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let issuer = TokenIssuer::new(&Config::for_tests());
        let token = issuer.issue_refresh_token(&sample_user()).unwrap();
        let claims = issuer.verify_refresh(&token).unwrap();

        assert_eq!(claims.sub, "usr_1");
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let issuer = TokenIssuer::new(&Config::for_tests());

        let mut other = Config::for_tests();
        other.jwt_secret = "another-secret".to_string();
        let forged = TokenIssuer::new(&other)
            .issue_access_token(&sample_user())
            .unwrap();

        assert!(issuer.verify_access(&forged).is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        let issuer = TokenIssuer::new(&Config::for_tests());
        assert!(issuer.verify_access("not.a.token").is_err());
        assert!(issuer.verify_refresh("").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Issue a token that expired five minutes ago, well past the
        // decoder's default leeway.
        let mut config = Config::for_tests();
        config.access_token_minutes = -5;
        let issuer = TokenIssuer::new(&config);

        let token = issuer.issue_access_token(&sample_user()).unwrap();
        assert!(issuer.verify_access(&token).is_err());
    }
}
