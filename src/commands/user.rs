use crate::db::{DbPool, User};
use crate::error::{SipesdaError, SipesdaResult};
use crate::middleware::auth::{issue_token, Claims};
use crate::state::AppState;
use axum::{extract::State, Extension, Json};
use bcrypt::{hash, verify, DEFAULT_COST};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const ROLES: [&str; 2] = ["admin", "operator"];

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub token: String,
}

async fn find_user(pool: &DbPool, username: &str) -> SipesdaResult<Option<User>> {
    Ok(sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, role, created_at FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?)
}

pub async fn login_axum(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> SipesdaResult<Json<LoginResponse>> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(SipesdaError::Auth(
            "Username dan password harus diisi".to_string(),
        ));
    }

    let invalid = || SipesdaError::Auth("Username atau password salah".to_string());

    let user = find_user(&state.pool, username).await?.ok_or_else(invalid)?;
    // Malformed hashes count as a failed login rather than a server error.
    if !verify(&payload.password, &user.password_hash).unwrap_or(false) {
        tracing::warn!("Failed login for '{}'", username);
        return Err(invalid());
    }

    let token = issue_token(&state.config.jwt_secret, user.id, &user.username, &user.role)?;
    tracing::info!("User '{}' logged in", user.username);

    Ok(Json(LoginResponse { user, token }))
}

pub async fn get_users_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> SipesdaResult<Json<Vec<User>>> {
    claims.require_admin()?;
    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, role, created_at FROM users ORDER BY username",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Option<String>,
}

impl CreateUserRequest {
    fn validated_role(&self) -> SipesdaResult<&str> {
        let role = self.role.as_deref().map(str::trim).unwrap_or("operator");
        if ROLES.contains(&role) {
            Ok(role)
        } else {
            Err(SipesdaError::Validation(format!(
                "Role tidak dikenal: {}",
                role
            )))
        }
    }
}

pub async fn create_user_axum(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateUserRequest>,
) -> SipesdaResult<Json<Value>> {
    claims.require_admin()?;

    let username = req.username.trim();
    if username.is_empty() || req.password.len() < 4 {
        return Err(SipesdaError::Validation(
            "Username harus diisi dan password minimal 4 karakter".to_string(),
        ));
    }
    let role = req.validated_role()?;
    let password_hash = hash(&req.password, DEFAULT_COST)?;

    let result: Result<(i32,), sqlx::Error> = sqlx::query_as(
        "INSERT INTO users (username, password_hash, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .fetch_one(&state.pool)
    .await;

    let id = match result {
        Ok((id,)) => id,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(SipesdaError::Conflict(format!(
                "Username {} sudah digunakan",
                username
            )))
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!("User '{}' created by '{}'", username, claims.sub);

    Ok(Json(json!({ "message": "User ditambahkan", "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_defaults_to_operator_and_rejects_unknown() {
        let mut req = CreateUserRequest {
            username: "kasir".to_string(),
            password: "rahasia".to_string(),
            role: None,
        };
        assert_eq!(req.validated_role().unwrap(), "operator");
        req.role = Some("admin".to_string());
        assert_eq!(req.validated_role().unwrap(), "admin");
        req.role = Some("guru".to_string());
        assert!(matches!(
            req.validated_role(),
            Err(SipesdaError::Validation(_))
        ));
    }
}
