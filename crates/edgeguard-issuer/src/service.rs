//! Registration and login.

use std::collections::BTreeSet;
use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use serde::Deserialize;

use edgeguard_auth::{TokenCodec, TokenPair};
use edgeguard_core::ORIGIN_KEY_PREFIX;

use crate::error::{IssuerError, Result};
use crate::store::{CredentialStore, NewUser, User};

/// Role granted to every new account.
pub const DEFAULT_ROLE: &str = "USER";

/// `POST /auth/register` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Login email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// `POST /auth/login` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

/// Minimum password length in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

impl RegisterRequest {
    /// Trim surrounding whitespace and validate every field.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::Validation` with one `field: message` entry per
    /// failed field, sorted by field name.
    pub fn normalized(mut self) -> Result<Self> {
        self.email = self.email.trim().to_string();
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();

        let mut errors = FieldErrors::default();
        errors.check_email(&self.email);
        if self.password.chars().count() < MIN_PASSWORD_CHARS {
            errors.push("password", "Password must be at least 8 characters");
        }
        if self.first_name.is_empty() {
            errors.push("firstName", "First name is required");
        }
        if self.last_name.is_empty() {
            errors.push("lastName", "Last name is required");
        }
        errors.finish()?;
        Ok(self)
    }
}

impl LoginRequest {
    /// Trim the email and validate.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::Validation` with one `field: message` entry per
    /// failed field, sorted by field name.
    pub fn normalized(mut self) -> Result<Self> {
        self.email = self.email.trim().to_string();

        let mut errors = FieldErrors::default();
        errors.check_email(&self.email);
        if self.password.is_empty() {
            errors.push("password", "Password is required");
        }
        errors.finish()?;
        Ok(self)
    }
}

/// Collects per-field validation failures.
#[derive(Default)]
struct FieldErrors(Vec<String>);

impl FieldErrors {
    fn push(&mut self, field: &str, message: &str) {
        self.0.push(format!("{field}: {message}"));
    }

    fn check_email(&mut self, email: &str) {
        if email.is_empty() {
            self.push("email", "Email is required");
        } else if !is_valid_email(email) || email.starts_with(ORIGIN_KEY_PREFIX) {
            // Subjects under the origin prefix cannot be put into a token.
            self.push("email", "Email must be valid");
        }
    }

    fn finish(mut self) -> Result<()> {
        if self.0.is_empty() {
            return Ok(());
        }
        self.0.sort();
        Err(IssuerError::Validation(self.0))
    }
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Registration and login use cases.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    argon2: Argon2<'static>,
}

impl AuthService {
    /// Create a service with the default argon2 parameters.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, codec: Arc<TokenCodec>) -> Self {
        Self::with_argon2(store, codec, Argon2::default())
    }

    /// Create a service with explicit argon2 parameters.
    #[must_use]
    pub fn with_argon2(
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        argon2: Argon2<'static>,
    ) -> Self {
        Self {
            store,
            codec,
            argon2,
        }
    }

    /// Register a new user with the default role.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::UserAlreadyExists` if the email is taken, or
    /// `IssuerError::Hashing` if the password cannot be hashed.
    pub async fn register(&self, request: RegisterRequest) -> Result<User> {
        tracing::info!(email = %request.email, "Attempting to register user");

        if self.store.find_by_email(&request.email).await?.is_some() {
            tracing::warn!(email = %request.email, "Registration conflict");
            return Err(IssuerError::UserAlreadyExists(request.email.to_lowercase()));
        }

        let argon2 = self.argon2.clone();
        let password = request.password;
        let password_hash = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            argon2
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| IssuerError::Hashing(e.to_string()))
        })
        .await
        .map_err(|e| IssuerError::Hashing(e.to_string()))??;

        let user = self
            .store
            .insert(NewUser {
                email: request.email,
                password_hash,
                first_name: request.first_name,
                last_name: request.last_name,
                roles: BTreeSet::from([DEFAULT_ROLE.to_string()]),
            })
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Check credentials and issue a token pair.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::InvalidCredentials` for an unknown email or a
    /// wrong password, or `IssuerError::Token` if signing fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair> {
        tracing::info!(email = %email, "Attempting login");

        let Some(user) = self.store.find_by_email(email).await? else {
            tracing::warn!(email = %email, "Login failed: unknown email");
            return Err(IssuerError::InvalidCredentials);
        };

        let argon2 = self.argon2.clone();
        let stored = user.password_hash.clone();
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || {
            let parsed =
                PasswordHash::new(&stored).map_err(|e| IssuerError::Hashing(e.to_string()))?;
            Ok::<_, IssuerError>(argon2.verify_password(password.as_bytes(), &parsed).is_ok())
        })
        .await
        .map_err(|e| IssuerError::Hashing(e.to_string()))??;
        if !matches {
            tracing::warn!(email = %email, "Login failed: wrong password");
            return Err(IssuerError::InvalidCredentials);
        }

        let tokens = self.codec.issue_pair(&user.email, &user.roles, Utc::now())?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok(tokens)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::InMemoryCredentialStore;
    use argon2::{Algorithm, Params, Version};
    use edgeguard_auth::{AuthConfig, TokenKind, TokenVerifier};

    pub(crate) const SECRET: &str = "issuer-test-secret-long-enough-for-hs256";

    /// Cheap argon2 parameters so tests stay fast.
    pub(crate) fn fast_argon2() -> Argon2<'static> {
        Argon2::new(
            Algorithm::Argon2id,
            Version::V0x13,
            Params::new(1024, 1, 1, None).unwrap(),
        )
    }

    pub(crate) fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(&AuthConfig::new(SECRET)).unwrap())
    }

    fn service() -> (Arc<InMemoryCredentialStore>, AuthService) {
        let store = Arc::new(InMemoryCredentialStore::new());
        let service = AuthService::with_argon2(store.clone(), codec(), fast_argon2());
        (store, service)
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "correct horse".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    #[tokio::test]
    async fn register_hashes_password_and_grants_user_role() {
        let (_store, service) = service();
        let user = service
            .register(register_request("ada@example.com"))
            .await
            .unwrap();

        assert!(user.password_hash.starts_with("$argon2id$"));
        assert!(!user.password_hash.contains("correct horse"));
        assert!(user.roles.contains(DEFAULT_ROLE));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (store, service) = service();
        service
            .register(register_request("ada@example.com"))
            .await
            .unwrap();

        let result = service.register(register_request("ADA@example.com")).await;
        assert!(matches!(result, Err(IssuerError::UserAlreadyExists(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn login_issues_verifiable_tokens() {
        let (_store, service) = service();
        service
            .register(register_request("ada@example.com"))
            .await
            .unwrap();

        let tokens = service.login("ada@example.com", "correct horse").await.unwrap();
        assert_eq!(tokens.token_type, "Bearer");

        let identity = codec().verify(&tokens.access_token, Utc::now()).unwrap();
        assert_eq!(identity.email(), "ada@example.com");
        assert!(identity.has_role("USER"));

        let refresh = codec()
            .verify_as(&tokens.refresh_token, TokenKind::Refresh, Utc::now())
            .unwrap();
        assert!(refresh.roles().is_empty());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (_store, service) = service();
        service
            .register(register_request("ada@example.com"))
            .await
            .unwrap();

        let wrong = service.login("ada@example.com", "battery staple").await;
        let unknown = service.login("bob@example.com", "correct horse").await;

        assert!(matches!(wrong, Err(IssuerError::InvalidCredentials)));
        assert!(matches!(unknown, Err(IssuerError::InvalidCredentials)));
    }

    #[test]
    fn register_validation_reports_every_field() {
        let request = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            first_name: "   ".to_string(),
            last_name: "Lovelace".to_string(),
        };

        let Err(IssuerError::Validation(errors)) = request.normalized() else {
            panic!("expected validation errors");
        };
        assert_eq!(
            errors,
            vec![
                "email: Email must be valid",
                "firstName: First name is required",
                "password: Password must be at least 8 characters",
            ]
        );
    }

    #[test]
    fn origin_prefixed_email_is_invalid() {
        let request = register_request("ip:1.2.3.4@example.com");
        let Err(IssuerError::Validation(errors)) = request.normalized() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors, vec!["email: Email must be valid"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn hashing_runs_off_the_async_workers() {
        let (_store, service) = service();
        let service = Arc::new(service);

        let logins = (0..4).map(|n| {
            let service = service.clone();
            tokio::spawn(async move {
                let email = format!("user{n}@example.com");
                service.register(register_request(&email)).await.unwrap();
                service.login(&email, "correct horse").await.unwrap()
            })
        });
        for login in logins.collect::<Vec<_>>() {
            let tokens = login.await.unwrap();
            assert!(codec().verify(&tokens.access_token, Utc::now()).is_ok());
        }
    }

    #[test]
    fn register_normalization_trims() {
        let request = RegisterRequest {
            email: "  ada@example.com ".to_string(),
            ..register_request("unused@example.com")
        };
        let normalized = request.normalized().unwrap();
        assert_eq!(normalized.email, "ada@example.com");
    }

    #[test]
    fn login_validation_requires_password() {
        let request = LoginRequest {
            email: "ada@example.com".to_string(),
            password: String::new(),
        };
        let Err(IssuerError::Validation(errors)) = request.normalized() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors, vec!["password: Password is required"]);
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("ada.lovelace@mail.example.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@localhost"));
        assert!(!is_valid_email("ada@@example.com"));
        assert!(!is_valid_email("ada lovelace@example.com"));
    }

    #[test]
    fn empty_email_is_required_not_invalid() {
        let request = LoginRequest {
            email: "  ".to_string(),
            password: "x".to_string(),
        };
        let Err(IssuerError::Validation(errors)) = request.normalized() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors, vec!["email: Email is required"]);
    }
}
