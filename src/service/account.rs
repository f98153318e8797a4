//! Account service
//!
//! Registration, credential verification, token issuance and
//! revocation, and account deletion.

use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;

use crate::auth::{Claims, RevocationStore, TokenKind, issue_token};
use crate::config::AuthConfig;
use crate::data::{Database, EntityId, User};
use crate::error::AppError;

/// Registration / account deletion payload
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

/// Alias: deletion takes the same credentials as registration
pub type DeleteAccount = Registration;

/// Access + refresh token pair issued at login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid password hash: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(anyhow::anyhow!(
            "password verification failed: {e}"
        ))),
    }
}

fn validate_username(username: &str) -> Result<(), AppError> {
    let length = username.chars().count();
    if !(3..=18).contains(&length) {
        return Err(AppError::Unprocessable(
            "Invalid username. Must be 3 to 18 characters.".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < 8 {
        return Err(AppError::Unprocessable(
            "Invalid password. Must be at least 8 characters.".to_string(),
        ));
    }
    if !password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Unprocessable(
            "Invalid password. Must consist of only letters and digits.".to_string(),
        ));
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(AppError::Unprocessable(
            "Invalid password. Must contain letters and digits.".to_string(),
        ));
    }
    Ok(())
}

/// Account service
pub struct AccountService {
    db: Arc<Database>,
    revoked_tokens: Arc<RevocationStore>,
    auth: AuthConfig,
}

impl AccountService {
    /// Create new account service
    pub fn new(db: Arc<Database>, revoked_tokens: Arc<RevocationStore>, auth: AuthConfig) -> Self {
        Self {
            db,
            revoked_tokens,
            auth,
        }
    }

    /// Register a new user
    ///
    /// Username must be 3-18 characters; the password at least 8
    /// alphanumeric characters mixing letters and digits, and match
    /// its confirmation. A taken username is a conflict.
    pub async fn register(&self, registration: Registration) -> Result<User, AppError> {
        validate_username(&registration.username)?;
        validate_password(&registration.password)?;
        if registration.password != registration.confirm_password {
            return Err(AppError::Validation("Passwords do not match.".to_string()));
        }

        let user = User {
            id: EntityId::new().0,
            username: registration.username,
            password_hash: hash_password(&registration.password)?,
            created_at: Utc::now(),
        };
        self.db.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Delete a user account
    ///
    /// Takes the same credentials as registration. Owned posts and
    /// collection rows cascade away with the user.
    pub async fn delete_account(&self, request: DeleteAccount) -> Result<User, AppError> {
        let user = self.db.get_user_by_username(&request.username).await?;
        let Some(user) = user else {
            return Err(AppError::Validation("Invalid credentials.".to_string()));
        };
        if request.password != request.confirm_password {
            return Err(AppError::Validation("Passwords do not match.".to_string()));
        }
        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        self.db.delete_user(&user.id).await?;
        tracing::info!(user_id = %user.id, username = %user.username, "User deleted");
        Ok(user)
    }

    /// Verify credentials and issue an access/refresh token pair
    ///
    /// The access token is fresh (password-derived) and short-lived;
    /// the refresh token long-lived.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = self.db.get_user_by_username(username).await?;
        let Some(user) = user else {
            return Err(AppError::Unauthorized);
        };
        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        let access = Claims::new(
            &user.id,
            TokenKind::Access,
            true,
            self.auth.access_token_ttl,
        );
        let refresh = Claims::new(
            &user.id,
            TokenKind::Refresh,
            false,
            self.auth.refresh_token_ttl,
        );

        Ok(TokenPair {
            access_token: issue_token(&access, &self.auth.token_secret)?,
            refresh_token: issue_token(&refresh, &self.auth.token_secret)?,
        })
    }

    /// Issue a new (non-fresh) access token from refresh claims
    pub fn refresh(&self, refresh_claims: &Claims) -> Result<String, AppError> {
        let access = Claims::new(
            &refresh_claims.user_id,
            TokenKind::Access,
            false,
            self.auth.access_token_ttl,
        );
        issue_token(&access, &self.auth.token_secret)
    }

    /// Revoke the presented token
    ///
    /// The token id lands in the revocation store and lapses on its
    /// own after the configured TTL.
    pub async fn logout(&self, claims: &Claims) {
        self.revoked_tokens
            .mark_revoked(&claims.token_id, Duration::from_secs(self.auth.revocation_ttl))
            .await;
        tracing::info!(user_id = %claims.user_id, "User logged out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_token;
    use tempfile::TempDir;

    fn test_auth_config() -> AuthConfig {
        AuthConfig {
            token_secret: "test-secret-key-32-bytes-long!!!".to_string(),
            access_token_ttl: 300,
            refresh_token_ttl: 2_592_000,
            revocation_ttl: 3600,
        }
    }

    async fn test_service() -> (AccountService, Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(
            Database::connect(&temp_dir.path().join("test.db"))
                .await
                .unwrap(),
        );
        let service = AccountService::new(
            db.clone(),
            Arc::new(RevocationStore::new()),
            test_auth_config(),
        );
        (service, db, temp_dir)
    }

    fn registration(username: &str, password: &str) -> Registration {
        Registration {
            username: username.to_string(),
            password: password.to_string(),
            confirm_password: password.to_string(),
        }
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("sunshine42").unwrap();
        assert!(verify_password("sunshine42", &hash).unwrap());
        assert!(!verify_password("sunshine43", &hash).unwrap());
    }

    #[test]
    fn password_rules_follow_the_schema() {
        assert!(validate_password("short1").is_err());
        assert!(validate_password("no-digits-here1").is_err());
        assert!(validate_password("lettersonly").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("sunshine42").is_ok());
    }

    #[tokio::test]
    async fn register_and_login() {
        let (service, _db, _tmp) = test_service().await;

        let user = service
            .register(registration("alice", "sunshine42"))
            .await
            .unwrap();
        assert_eq!(user.username, "alice");

        let pair = service.login("alice", "sunshine42").await.unwrap();
        let access = verify_token(&pair.access_token, "test-secret-key-32-bytes-long!!!").unwrap();
        assert_eq!(access.user_id, user.id);
        assert_eq!(access.kind, TokenKind::Access);
        assert!(access.fresh);

        let refresh =
            verify_token(&pair.refresh_token, "test-secret-key-32-bytes-long!!!").unwrap();
        assert_eq!(refresh.kind, TokenKind::Refresh);
    }

    #[tokio::test]
    async fn register_rejects_password_mismatch() {
        let (service, _db, _tmp) = test_service().await;

        let mut bad = registration("alice", "sunshine42");
        bad.confirm_password = "different42".to_string();

        let error = service.register(bad).await.unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn register_rejects_short_username() {
        let (service, _db, _tmp) = test_service().await;
        let error = service
            .register(registration("ab", "sunshine42"))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Unprocessable(_)));
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let (service, _db, _tmp) = test_service().await;
        service
            .register(registration("alice", "sunshine42"))
            .await
            .unwrap();

        let error = service
            .register(registration("alice", "moonlight7"))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_unauthorized() {
        let (service, _db, _tmp) = test_service().await;
        service
            .register(registration("alice", "sunshine42"))
            .await
            .unwrap();

        let error = service.login("alice", "wrongpass1").await.unwrap_err();
        assert!(matches!(error, AppError::Unauthorized));

        let error = service.login("nobody", "sunshine42").await.unwrap_err();
        assert!(matches!(error, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn refresh_issues_non_fresh_access_token() {
        let (service, _db, _tmp) = test_service().await;
        let user = service
            .register(registration("alice", "sunshine42"))
            .await
            .unwrap();
        let pair = service.login("alice", "sunshine42").await.unwrap();
        let refresh_claims =
            verify_token(&pair.refresh_token, "test-secret-key-32-bytes-long!!!").unwrap();

        let token = service.refresh(&refresh_claims).unwrap();
        let claims = verify_token(&token, "test-secret-key-32-bytes-long!!!").unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(!claims.fresh);
    }

    #[tokio::test]
    async fn logout_revokes_the_token_id() {
        let (service, _db, _tmp) = test_service().await;
        service
            .register(registration("alice", "sunshine42"))
            .await
            .unwrap();
        let pair = service.login("alice", "sunshine42").await.unwrap();
        let claims = verify_token(&pair.access_token, "test-secret-key-32-bytes-long!!!").unwrap();

        service.logout(&claims).await;
        assert!(service.revoked_tokens.is_revoked(&claims.token_id).await);
    }

    #[tokio::test]
    async fn delete_account_removes_the_user() {
        let (service, db, _tmp) = test_service().await;
        let user = service
            .register(registration("alice", "sunshine42"))
            .await
            .unwrap();

        service
            .delete_account(registration("alice", "sunshine42"))
            .await
            .unwrap();
        assert!(db.get_user(&user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_account_rejects_wrong_password() {
        let (service, db, _tmp) = test_service().await;
        let user = service
            .register(registration("alice", "sunshine42"))
            .await
            .unwrap();

        let error = service
            .delete_account(registration("alice", "wrongpass1"))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Unauthorized));
        assert!(db.get_user(&user.id).await.unwrap().is_some());
    }
}
