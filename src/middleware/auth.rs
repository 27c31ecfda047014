use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::auth::jwt::verify_token;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub role: String,
    pub username: String,
}

impl AuthContext {
    /// Stock corrections (manual movements, count reconciliation) are
    /// restricted to managers and admins.
    pub fn require_manager(&self, action: &str) -> Result<(), AppError> {
        match self.role.as_str() {
            "manager" | "admin" => Ok(()),
            _ => {
                tracing::warn!(
                    user_id = self.user_id,
                    username = %self.username,
                    role = %self.role,
                    action,
                    "Role check failed"
                );
                Err(AppError::forbidden(format!("Only managers can {action}")))
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = match req.headers().get("Authorization").and_then(|v| v.to_str().ok()) {
        Some(h) => h,
        None => return unauthorized("Missing Authorization header"),
    };

    // Expect "Bearer <token>"
    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return unauthorized("Invalid Authorization format"),
    };

    let claims = match verify_token(token, &state.config.jwt_secret) {
        Ok(c) => c,
        Err(_) => return unauthorized("Invalid or expired token"),
    };

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        role: claims.role,
        username: claims.username,
    });

    next.run(req).await
}

fn unauthorized(msg: &str) -> Response {
    let body = axum::Json(ErrorBody { error: msg.to_string(), code: "unauthorized" });
    (StatusCode::UNAUTHORIZED, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: &str) -> AuthContext {
        AuthContext { user_id: 1, role: role.into(), username: "u".into() }
    }

    #[test]
    fn managers_and_admins_pass() {
        assert!(ctx("manager").require_manager("reconcile stock").is_ok());
        assert!(ctx("admin").require_manager("reconcile stock").is_ok());
        assert!(matches!(
            ctx("staff").require_manager("reconcile stock"),
            Err(AppError::Forbidden(_))
        ));
    }
}
