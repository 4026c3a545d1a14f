//! Account service - registration, login and bearer authentication

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{extract_token_from_header, hash_password, verify_password, JwtValidator};
use crate::db::{now, users, Database};
use crate::types::requests::{LoginRequest, RegisterRequest};
use crate::types::{NorthstarError, Result};

/// Response to a successful registration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Caller identity resolved from a bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

pub struct AccountService {
    db: Arc<Database>,
    jwt: JwtValidator,
}

impl AccountService {
    pub fn new(db: Arc<Database>, jwt: JwtValidator) -> Self {
        Self { db, jwt }
    }

    /// Create an account and issue its first token
    pub fn register(&self, request: &RegisterRequest) -> Result<RegisteredUser> {
        let new_user = request.validate()?;
        let password_hash = hash_password(&new_user.credentials.password)?;

        let user = self.db.with_conn(|conn| {
            users::insert_user(
                conn,
                &new_user.credentials.email,
                &password_hash,
                new_user.name.as_deref(),
                now(),
            )
        })?;

        let token = self.jwt.generate_token(&user.id, &user.email)?;
        info!(user_id = %user.id, "User registered");

        Ok(RegisteredUser {
            id: user.id,
            email: user.email,
            name: user.name,
            token,
        })
    }

    /// Exchange credentials for a token
    pub fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        let credentials = request.validate()?;

        let user = self
            .db
            .with_conn(|conn| users::find_by_email(conn, &credentials.email))?;

        let stored = user.as_ref().map(|u| u.password_hash.as_str());
        let verified = verify_password(&credentials.password, stored)?;

        let user = match user {
            Some(user) if verified => user,
            Some(user) => {
                warn!(user_id = %user.id, "Login failed: wrong password");
                return Err(invalid_credentials());
            }
            None => {
                debug!("Login for unknown email");
                return Err(invalid_credentials());
            }
        };

        let token = self.jwt.generate_token(&user.id, &user.email)?;
        debug!(user_id = %user.id, "User logged in");
        Ok(LoginResponse { token })
    }

    /// Resolve the `Authorization` header to a user that still exists
    pub fn authenticate(&self, auth_header: Option<&str>) -> Result<AuthUser> {
        let token = extract_token_from_header(auth_header)
            .ok_or_else(|| NorthstarError::Unauthorized("Missing Authorization header".into()))?;

        let claims = self.jwt.verify_token(token)?;

        let exists = self
            .db
            .with_conn(|conn| users::get_user(conn, &claims.sub))?
            .is_some();
        if !exists {
            return Err(NorthstarError::Unauthorized("Invalid token".into()));
        }

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}

fn invalid_credentials() -> NorthstarError {
    NorthstarError::Unauthorized("Invalid credentials".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AccountService {
        let db = Arc::new(Database::open_in_memory().unwrap());
        AccountService::new(db, JwtValidator::new_dev(3600))
    }

    fn register_req(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: Some(email.into()),
            password: Some("password1".into()),
            name: Some("Ada".into()),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[test]
    fn test_register_then_login() {
        let svc = service();
        let registered = svc.register(&register_req("a@x.com")).unwrap();
        assert_eq!(registered.email, "a@x.com");
        assert_eq!(registered.name.as_deref(), Some("Ada"));

        let auth = svc
            .authenticate(Some(&format!("Bearer {}", registered.token)))
            .unwrap();
        assert_eq!(auth.user_id, registered.id);

        let login = svc.login(&login_req("a@x.com", "password1")).unwrap();
        let auth = svc
            .authenticate(Some(&format!("Bearer {}", login.token)))
            .unwrap();
        assert_eq!(auth.email, "a@x.com");
    }

    #[test]
    fn test_duplicate_email() {
        let svc = service();
        svc.register(&register_req("a@x.com")).unwrap();
        let err = svc.register(&register_req("A@X.com")).unwrap_err();
        assert!(matches!(err, NorthstarError::Conflict(_)));
    }

    #[test]
    fn test_bad_credentials() {
        let svc = service();
        svc.register(&register_req("a@x.com")).unwrap();

        let wrong = svc.login(&login_req("a@x.com", "password2")).unwrap_err();
        assert!(matches!(wrong, NorthstarError::Unauthorized(ref m) if m == "Invalid credentials"));

        let unknown = svc.login(&login_req("b@x.com", "password1")).unwrap_err();
        assert!(matches!(unknown, NorthstarError::Unauthorized(ref m) if m == "Invalid credentials"));

        let invalid = svc.login(&login_req("b@x.com", "short")).unwrap_err();
        assert!(matches!(invalid, NorthstarError::Validation(_)));
    }

    #[test]
    fn test_authenticate_rejects() {
        let svc = service();
        assert!(matches!(
            svc.authenticate(None),
            Err(NorthstarError::Unauthorized(ref m)) if m == "Missing Authorization header"
        ));
        assert!(matches!(
            svc.authenticate(Some("Bearer garbage")),
            Err(NorthstarError::Unauthorized(_))
        ));

        // Well-formed token for a user this database has never seen
        let token = JwtValidator::new_dev(3600)
            .generate_token("ghost", "ghost@x.com")
            .unwrap();
        assert!(svc.authenticate(Some(&format!("Bearer {}", token))).is_err());
    }
}
