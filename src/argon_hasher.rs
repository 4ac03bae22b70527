use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{self, SaltString, rand_core::OsRng},
};
use std::sync::Arc;
use tokio::task;

use crate::config::Config;

/// Argon2id hasher keyed with the configured pepper. Hashing runs on the
/// blocking pool so request handlers are not stalled by the work factor.
#[derive(Clone)]
pub struct ArgonHasher {
    argon2: Arc<Argon2<'static>>,
}

impl ArgonHasher {
    pub fn new(config: &Config) -> Self {
        // The Argon2 instance borrows the secret for its whole lifetime;
        // leaking the one startup-owned copy gives it 'static.
        let secret_bytes: &'static [u8] =
            Box::leak(config.password_hashing_secret.clone().into_bytes().into_boxed_slice());

        let argon2 = Argon2::new_with_secret(
            secret_bytes,
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(512, 4, 4, None).unwrap(),
        )
        .unwrap();

        Self {
            argon2: Arc::new(argon2),
        }
    }

    pub async fn hash(&self, password: impl AsRef<[u8]>) -> Result<String, password_hash::Error> {
        let argon2 = self.argon2.clone();
        let password = password.as_ref().to_owned();

        let res = task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(&password, &salt)
                .map(|ph| ph.to_string())
        });

        res.await.unwrap()
    }

    pub async fn verify(
        &self,
        password: impl AsRef<[u8]>,
        hash: impl AsRef<str>,
    ) -> Result<bool, password_hash::Error> {
        let argon2 = self.argon2.clone();
        let password = password.as_ref().to_owned();
        let hash = hash.as_ref().to_owned();

        let res = task::spawn_blocking(move || {
            let hash = PasswordHash::new(&hash)?;
            argon2.verify_password(&password, &hash).map(|_| true)
        });

        res.await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_hasher() -> ArgonHasher {
        ArgonHasher::new(&Config::for_tests())
    }

    #[tokio::test]
    async fn test_hash_then_verify() {
        let hasher = test_hasher();
        let hash = hasher.hash("hunter2").await.unwrap();
        assert!(hasher.verify("hunter2", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let hasher = test_hasher();
        let hash = hasher.hash("hunter2").await.unwrap();
        assert!(hasher.verify("hunter3", &hash).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_hash_rejected() {
        let hasher = test_hasher();
        assert!(hasher.verify("hunter2", "not-a-phc-string").await.is_err());
    }
}
