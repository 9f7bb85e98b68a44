use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Stored Entities ---

/// Admin
///
/// Identity-only record from the `admins` table. The password is held only as an
/// Argon2 PHC string and is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Admin {
    pub id: Uuid,
    // Unique among admins; the sign-in lookup key.
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
}

/// User
///
/// A customer record from the `users` table. `purchased_courses` is an ordered list of
/// weak references into `courses`: the user does not own the course lifecycle, and an
/// entry may dangle after the course is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    // Unique among users; the sign-in lookup key.
    pub username: String,
    // `None` for accounts created by an admin without a password: they cannot sign in.
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub purchased_courses: Vec<Uuid>,
}

/// Course
///
/// Independently owned catalog entry from the `courses` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    // Image URL or object key, stored verbatim.
    pub image: String,
}

// --- Store Inputs ---
// Handlers hash passwords before building these; the store never sees plain text.

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NewCourse {
    pub title: String,
    pub image: String,
}

/// Partial update for an admin. Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct AdminPatch {
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

/// Partial update for a user. Only `Some` fields are written;
/// `purchased_courses` is changed only through the relationship operations.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

/// CoursePatch
///
/// Partial update payload for `PUT /courses/{id}`; doubles as the store input.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CoursePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// CredentialsRequest
///
/// Body of the signup and signin endpoints for both admins and users.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// CreateUserRequest
///
/// Admin-side user creation (`POST /users`). Accepts `name` as an alias of `username`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    #[serde(alias = "name")]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// UpdateAccountRequest
///
/// Partial update for an admin or user account (`PUT /users/{id}`, `PUT /admins/{id}`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateAccountRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

// --- Responses ---

/// TokenResponse
///
/// Returned by signup and signin. `token` goes in `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// MeResponse
///
/// The caller's resolved identity (`GET /me`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MeResponse {
    pub id: Uuid,
    pub username: String,
    // "admin" | "user"
    pub role: String,
}

/// MessageResponse
///
/// Plain acknowledgement for operations with no record to return (delete, purchase).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
