// src/services/users.rs

use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ServiceError, ServiceResult};
use crate::models::{NewUser, User, UserChanges, UserRole};
use crate::store::{Store, StoreError};

const TOKEN_SALT: &str = "salt123";

pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn hash_password(password: &str) -> String {
    sha256_hex(password)
}

/// Opaque login token. Nothing verifies it server-side yet.
pub fn session_token(username: &str) -> String {
    sha256_hex(&format!("{username}{TOKEN_SALT}"))
}

fn bad_credentials() -> ServiceError {
    ServiceError::Auth("invalid username or password".into())
}

fn username_taken() -> ServiceError {
    ServiceError::Conflict("username is already taken".into())
}

fn user_not_found() -> ServiceError {
    ServiceError::NotFound("user not found".into())
}

pub async fn find_by_username(store: &dyn Store, username: &str) -> ServiceResult<Option<User>> {
    Ok(store.find_user_by_username(username).await?)
}

/// Unknown user, inactive user and wrong password all yield the same error.
pub async fn verify_credentials(
    store: &dyn Store,
    username: &str,
    password: &str,
) -> ServiceResult<User> {
    let user = find_by_username(store, username)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(bad_credentials)?;

    if user.password_hash != hash_password(password) {
        tracing::warn!(username, "login rejected");
        return Err(bad_credentials());
    }
    Ok(user)
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: Option<UserRole>,
}

/// Partial update; empty strings leave the field untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub async fn list(store: &dyn Store) -> ServiceResult<Vec<User>> {
    Ok(store.list_users(None).await?)
}

pub async fn create(store: &dyn Store, req: CreateUserRequest) -> ServiceResult<User> {
    let username = req.username.trim();
    let name = req.name.trim();
    if username.is_empty() || name.is_empty() || req.password.is_empty() {
        return Err(ServiceError::Validation("username, password and name are required".into()));
    }

    if store.find_user_by_username(username).await?.is_some() {
        return Err(username_taken());
    }

    let user = store
        .insert_user(NewUser {
            username: username.to_string(),
            password_hash: hash_password(&req.password),
            name: name.to_string(),
            role: req.role.unwrap_or(UserRole::Cleaner),
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => username_taken(),
            other => other.into(),
        })?;

    tracing::info!(user_id = user.id, username = %user.username, role = user.role.as_str(), "user created");
    Ok(user)
}

pub async fn update(store: &dyn Store, id: i64, req: UpdateUserRequest) -> ServiceResult<User> {
    let current = store.find_user(id).await?.ok_or_else(user_not_found)?;

    let username = non_empty(req.username).filter(|u| *u != current.username);
    if let Some(u) = &username {
        if store.find_user_by_username(u).await?.is_some() {
            return Err(username_taken());
        }
    }

    let changes = UserChanges {
        username,
        password_hash: req.password.filter(|p| !p.is_empty()).map(|p| hash_password(&p)),
        name: non_empty(req.name),
        role: req.role,
        is_active: req.is_active,
    };

    let user = store
        .update_user(id, changes)
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => username_taken(),
            other => other.into(),
        })?
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = id, "user updated");
    Ok(user)
}

pub async fn delete(store: &dyn Store, id: i64) -> ServiceResult<()> {
    if !store.delete_user(id).await? {
        return Err(user_not_found());
    }
    tracing::info!(user_id = id, "user deleted");
    Ok(())
}

/// Create the bootstrap administrator unless an admin already exists.
pub async fn ensure_admin(store: &dyn Store, username: &str, password: &str) -> ServiceResult<()> {
    let (admins, _) = store.count_users(UserRole::Admin).await?;
    if admins > 0 {
        return Ok(());
    }

    create(
        store,
        CreateUserRequest {
            username: username.to_string(),
            password: password.to_string(),
            name: "Administrator".to_string(),
            role: Some(UserRole::Admin),
        },
    )
    .await?;
    tracing::warn!(username, "bootstrap admin created; change its password");
    Ok(())
}
