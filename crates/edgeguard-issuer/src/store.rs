//! Credential persistence.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{IssuerError, Result};

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Store-assigned id.
    pub id: u64,
    /// Login email, stored lowercase.
    pub email: String,
    /// PHC-format argon2 hash.
    pub password_hash: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Granted roles.
    pub roles: BTreeSet<String>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// A user that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login email.
    pub email: String,
    /// PHC-format argon2 hash.
    pub password_hash: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Granted roles.
    pub roles: BTreeSet<String>,
}

/// Storage for user credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Store a new user.
    ///
    /// # Errors
    ///
    /// Returns `IssuerError::UserAlreadyExists` if the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User>;
}

/// Credential store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<HashMap<String, User>>,
    next_id: AtomicU64,
}

impl InMemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether no users are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(&email.to_lowercase()).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User> {
        let email = user.email.to_lowercase();
        let mut users = self.users.write();
        if users.contains_key(&email) {
            return Err(IssuerError::UserAlreadyExists(email));
        }

        let stored = User {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            email: email.clone(),
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            roles: user.roles,
            created_at: Utc::now(),
        };
        users.insert(email, stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            roles: BTreeSet::from(["USER".to_string()]),
        }
    }

    #[tokio::test]
    async fn insert_and_find() {
        let store = InMemoryCredentialStore::new();
        let user = store.insert(new_user("Ada@Example.com")).await.unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(user.email, "ada@example.com");

        let found = store.find_by_email("ADA@example.com").await.unwrap();
        assert_eq!(found, Some(user));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = InMemoryCredentialStore::new();
        store.insert(new_user("ada@example.com")).await.unwrap();

        let result = store.insert(new_user("ada@example.com")).await;
        assert!(matches!(result, Err(IssuerError::UserAlreadyExists(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn ids_increase() {
        let store = InMemoryCredentialStore::new();
        let a = store.insert(new_user("a@example.com")).await.unwrap();
        let b = store.insert(new_user("b@example.com")).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn unknown_email_is_none() {
        let store = InMemoryCredentialStore::new();
        assert!(store.is_empty());
        assert_eq!(store.find_by_email("nobody@example.com").await.unwrap(), None);
    }
}
