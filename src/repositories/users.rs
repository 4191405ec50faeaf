use std::sync::Arc;

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;
use serde::Serialize;
use serde_json::{Value, json};

use super::active;
use crate::{
    error::{AppError, AppResult},
    models::{Role, User},
    storage::{
        Document, Filter, StorageAdapter, StorageError, from_document, new_id, now_timestamp,
        to_document,
    },
};

pub const USERS: &str = "users";
/// One document per claimed address, keyed by the normalized email, so the
/// backend's duplicate-id check enforces uniqueness at write time.
pub const USER_EMAILS: &str = "user_emails";
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub address: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Serialize)]
struct StoredUser<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
    role: Role,
    address: &'a str,
    phone: &'a str,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> AppResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid email address".into()))
    }
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

/// Owns the `users` collection and is the only code that sees password hashes.
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn StorageAdapter>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self { store }
    }

    pub async fn create(&self, new_user: NewUser) -> AppResult<User> {
        let name = new_user.name.trim();
        let email = normalize_email(&new_user.email);
        if name.is_empty() || email.is_empty() || new_user.password.is_empty() {
            return Err(AppError::Validation(
                "Name, email and password are required".into(),
            ));
        }
        validate_email(&email)?;
        validate_password(&new_user.password)?;

        if self.email_taken(&email).await? {
            return Err(AppError::Conflict("Email is already taken".into()));
        }

        let id = new_id();
        self.claim_email(&email, &id).await?;

        let saved = match self.insert_user(&id, name, &email, &new_user).await {
            Ok(saved) => saved,
            Err(err) => {
                self.release_email(&email).await;
                return Err(err);
            }
        };
        Ok(from_document(USERS, saved)?)
    }

    async fn insert_user(
        &self,
        id: &str,
        name: &str,
        email: &str,
        new_user: &NewUser,
    ) -> AppResult<Document> {
        let password = hash_password(&new_user.password)?;
        let mut doc = to_document(
            USERS,
            &StoredUser {
                name,
                email,
                password: &password,
                role: new_user.role,
                address: new_user.address.trim(),
                phone: new_user.phone.trim(),
            },
        )?;
        doc.insert("id".into(), Value::String(id.to_string()));
        Ok(self.store.insert(USERS, doc).await?)
    }

    /// Reserves `email` for `user_id`; a second claim on the same address
    /// fails with `Conflict` in every backend.
    async fn claim_email(&self, email: &str, user_id: &str) -> AppResult<()> {
        let claim = to_document(USER_EMAILS, &json!({ "id": email, "user": user_id }))?;
        match self.store.insert(USER_EMAILS, claim).await {
            Ok(_) => Ok(()),
            Err(StorageError::DuplicateId { .. }) => {
                Err(AppError::Conflict("Email is already taken".into()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn release_email(&self, email: &str) {
        if let Err(err) = self.store.delete(USER_EMAILS, email).await {
            tracing::warn!(error = %err, "failed to release email claim");
        }
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        let filter = active().eq("id", id);
        self.find_one(&filter).await
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let filter = active().eq("email", normalize_email(email));
        self.find_one(&filter).await
    }

    /// Soft-deleted accounts keep their address reserved.
    async fn email_taken(&self, email: &str) -> AppResult<bool> {
        let filter = Filter::new().eq("email", normalize_email(email));
        Ok(self.store.count(USERS, &filter).await? > 0)
    }

    async fn find_one(&self, filter: &Filter) -> AppResult<Option<User>> {
        match self.store.find_one(USERS, filter).await? {
            Some(doc) => Ok(Some(from_document(USERS, doc)?)),
            None => Ok(None),
        }
    }

    pub fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Returns the user only when the email exists and the password matches.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<Option<User>> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        if self.verify_password(&user, password)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub async fn update_profile(&self, id: &str, mut update: ProfileUpdate) -> AppResult<User> {
        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        if let Some(name) = update.name.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::Validation("Name cannot be empty".into()));
            }
        }
        if let Some(email) = update.email.take() {
            let email = normalize_email(&email);
            validate_email(&email)?;
            if email != current.email {
                if self.email_taken(&email).await? {
                    return Err(AppError::Conflict("Email is already taken".into()));
                }
                self.claim_email(&email, id).await?;
            }
            update.email = Some(email);
        }

        let changed_email = update.email.clone().filter(|email| *email != current.email);
        let patch = to_document(USERS, &update)?;
        match self.apply(id, patch).await {
            Ok(user) => {
                if changed_email.is_some() {
                    self.release_email(&current.email).await;
                }
                Ok(user)
            }
            Err(err) => {
                if let Some(email) = changed_email {
                    self.release_email(&email).await;
                }
                Err(err)
            }
        }
    }

    pub async fn update_password(&self, id: &str, new_password: &str) -> AppResult<()> {
        validate_password(new_password)?;
        let hash = hash_password(new_password)?;
        let mut patch = Document::new();
        patch.insert("password".into(), Value::String(hash));
        self.apply(id, patch).await?;
        Ok(())
    }

    pub async fn set_role(&self, id: &str, role: Role) -> AppResult<User> {
        if self.find_by_id(id).await?.is_none() {
            return Err(AppError::not_found("User"));
        }
        let mut patch = Document::new();
        patch.insert("role".into(), json!(role));
        self.apply(id, patch).await
    }

    pub async fn soft_delete(&self, id: &str) -> AppResult<bool> {
        if self.find_by_id(id).await?.is_none() {
            return Ok(false);
        }
        let mut patch = Document::new();
        patch.insert("deletedAt".into(), Value::String(now_timestamp()));
        Ok(self.store.update(USERS, id, patch).await?.is_some())
    }

    pub async fn list_active(&self) -> AppResult<Vec<User>> {
        self.store
            .find(USERS, &active())
            .await?
            .into_iter()
            .map(|doc| from_document(USERS, doc).map_err(AppError::from))
            .collect()
    }

    /// Live users, newest first, optionally narrowed by a case-insensitive
    /// name/email search and a role.
    pub async fn list(&self, search: Option<&str>, role: Option<Role>) -> AppResult<Vec<User>> {
        let filter = match role {
            Some(role) => active().eq("role", role.as_str()),
            None => active(),
        };
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut users = Vec::new();
        for doc in self.store.find(USERS, &filter).await? {
            let user: User = from_document(USERS, doc)?;
            let hit = needle.as_deref().is_none_or(|needle| {
                user.name.to_lowercase().contains(needle) || user.email.contains(needle)
            });
            if hit {
                users.push(user);
            }
        }
        users.reverse();
        Ok(users)
    }

    pub async fn count_by_role(&self, role: Role) -> AppResult<u64> {
        let filter = active().eq("role", role.as_str());
        Ok(self.store.count(USERS, &filter).await?)
    }

    async fn apply(&self, id: &str, patch: Document) -> AppResult<User> {
        let updated = self
            .store
            .update(USERS, id, patch)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        Ok(from_document(USERS, updated)?)
    }
}
