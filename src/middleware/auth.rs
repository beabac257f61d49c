use crate::error::{SipesdaError, SipesdaResult};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Tokens stay valid for one working day.
pub const TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

pub const PUBLIC_ROUTES: [&str; 2] = ["/api/ping", "/api/users/login"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: i32,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn require_admin(&self) -> SipesdaResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(SipesdaError::Forbidden(
                "Hanya admin yang dapat mengakses fitur ini".to_string(),
            ))
        }
    }
}

pub fn issue_token(secret: &[u8], user_id: i32, username: &str, role: &str) -> SipesdaResult<String> {
    let exp = chrono::Utc::now().timestamp() + TOKEN_TTL_SECS;
    let claims = Claims {
        sub: username.to_string(),
        user_id,
        role: role.to_string(),
        exp: exp as usize,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )?)
}

pub fn verify_token(secret: &[u8], token: &str) -> SipesdaResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = request.uri().path();
    if !path.starts_with("/api/") || PUBLIC_ROUTES.contains(&path) {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = verify_token(&state.config.jwt_secret, token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let token = issue_token(b"s3cret", 7, "bendahara", "operator").unwrap();
        let claims = verify_token(b"s3cret", &token).unwrap();
        assert_eq!(claims.sub, "bendahara");
        assert_eq!(claims.user_id, 7);
        assert!(!claims.is_admin());
        assert!(matches!(
            claims.require_admin(),
            Err(SipesdaError::Forbidden(_))
        ));

        assert!(verify_token(b"other", &token).is_err());
    }
}
