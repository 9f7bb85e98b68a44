use std::{sync::Arc, time::Duration};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{ApiError, AuthError, RepoError},
    repository::{Repository, RepositoryState},
};

/// Role
///
/// Which collection the token subject lives in. Serialized lowercase inside the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

/// Claims
///
/// Payload of every bearer token issued by this service.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): id of the admin or user, depending on `role`.
    pub sub: Uuid,
    pub role: Role,
    /// Expiration Time (exp): seconds since the epoch; checked with zero leeway.
    pub exp: usize,
    /// Issued At (iat)
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. The gate attaches it to the
/// request extensions once; handlers extract it from there.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admin-only routes.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }

    /// Routes on `/users/{id}`: the user themself or any admin.
    pub fn require_self_or_admin(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.is_admin() || (self.role == Role::User && self.id == user_id) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// TokenAuthority
///
/// Issues and verifies HS256 bearer tokens. Built once from `AppConfig`, so the shared
/// secret is injected at construction rather than read from the environment.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
    verify_timeout: Duration,
}

/// TokenState
///
/// Shared handle to the token authority, pulled from the app state via `FromRef`.
pub type TokenState = Arc<TokenAuthority>;

impl TokenAuthority {
    pub fn new(config: &AppConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl_secs: config.token_ttl_secs,
            verify_timeout: config.verify_timeout(),
        }
    }

    /// Signs a token for `id` in the `role` collection, valid for the configured TTL.
    pub fn issue(&self, id: Uuid, role: Role) -> Result<String, ApiError> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = Claims {
            sub: id,
            role,
            iat: now,
            exp: now + self.ttl_secs as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }

    /// Checks signature and expiry. Every failure collapses to `InvalidCredential`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(kind = ?e.kind(), "rejected bearer token");
                AuthError::InvalidCredential
            })
    }

    /// authorize
    ///
    /// The gate's single decision for one request:
    /// 1. No `Authorization` header: `MissingCredential`.
    /// 2. Not `Bearer <token>`, bad signature, expired or malformed: `InvalidCredential`.
    /// 3. The subject no longer exists in its collection: `InvalidCredential`.
    ///
    /// Steps 2 and 3 share one deadline; running past it fails closed.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        repo: &dyn Repository,
    ) -> Result<AuthUser, AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingCredential)?;

        let token = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AuthError::InvalidCredential)?;

        match tokio::time::timeout(self.verify_timeout, self.resolve(token, repo)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.verify_timeout.as_millis() as u64,
                    "credential verification timed out"
                );
                Err(AuthError::InvalidCredential)
            }
        }
    }

    async fn resolve(&self, token: &str, repo: &dyn Repository) -> Result<AuthUser, AuthError> {
        let claims = self.verify(token)?;

        // The token may outlive its subject.
        let lookup = match claims.role {
            Role::Admin => repo.get_admin(claims.sub).await.map(|a| a.username),
            Role::User => repo.get_user(claims.sub).await.map(|u| u.username),
        };

        match lookup {
            Ok(username) => Ok(AuthUser {
                id: claims.sub,
                username,
                role: claims.role,
            }),
            Err(RepoError::NotFound(_)) => {
                tracing::debug!(sub = %claims.sub, role = claims.role.as_str(), "token subject no longer exists");
                Err(AuthError::InvalidCredential)
            }
            Err(e) => {
                tracing::error!("principal lookup failed: {e}");
                Err(AuthError::InvalidCredential)
            }
        }
    }
}

/// AuthUser Extractor Implementation
///
/// Behind the auth middleware this just clones the identity the gate already attached.
/// Used on a route without the middleware, it runs the gate itself.
///
/// Rejection: `AuthError`, rendered as 401 with a JSON `{ message }` body.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    TokenState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let tokens = TokenState::from_ref(state);
        tokens.authorize(&parts.headers, repo.as_ref()).await
    }
}
